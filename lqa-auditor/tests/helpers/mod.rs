//! Test Helper Utilities
//!
//! Fake collaborators for driving the audit state machine without a browser,
//! a model API or a database.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lqa_auditor::models::{
    apply_transition, AuditJob, AuditKind, AuditMode, AuditStatus, AuditTarget, Dimension,
    Transition, PROGRESS_TOTAL_STEPS,
};
use lqa_auditor::types::{
    AcquiredContent, Acquisition, AcquisitionError, BlockedSignal, ContentAcquirer,
    GlossaryProvider, GlossaryTerm, ModelCallError, ModelCaller, ModelRequest, ModelResponse,
    PersistenceStore, ProgressSink, VisionClassifier,
};
use uuid::Uuid;

// ============================================================================
// Persistence
// ============================================================================

/// In-memory store keeping every saved snapshot
#[derive(Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<Uuid, AuditJob>>,
    history: Mutex<Vec<AuditJob>>,
    pub saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with_job(job: &AuditJob) -> Arc<Self> {
        let store = Arc::new(Self::default());
        store.jobs.lock().unwrap().insert(job.id, job.clone());
        store
    }

    pub fn get(&self, id: Uuid) -> Option<AuditJob> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub fn history(&self) -> Vec<AuditJob> {
        self.history.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn save(&self, job: &AuditJob) -> lqa_common::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.history.lock().unwrap().push(job.clone());
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> lqa_common::Result<Option<AuditJob>> {
        Ok(self.get(id))
    }
}

// ============================================================================
// Content acquisition
// ============================================================================

#[derive(Clone)]
pub enum AcquireBehavior {
    Content {
        text: Option<String>,
        screenshot: Option<Vec<u8>>,
    },
    Blocked {
        reason: String,
        screenshot: Option<Vec<u8>>,
    },
    Fail(String),
}

/// Acquirer replaying scripted behaviors; the last one repeats
pub struct FakeAcquirer {
    script: Mutex<VecDeque<AcquireBehavior>>,
    last: Mutex<Option<AcquireBehavior>>,
    pub calls: AtomicUsize,
}

impl FakeAcquirer {
    pub fn scripted(behaviors: Vec<AcquireBehavior>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(behaviors.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::scripted(vec![AcquireBehavior::Content {
            text: Some(text.to_string()),
            screenshot: None,
        }])
    }

    pub fn text_and_screenshot(text: &str, screenshot: &[u8]) -> Arc<Self> {
        Self::scripted(vec![AcquireBehavior::Content {
            text: Some(text.to_string()),
            screenshot: Some(screenshot.to_vec()),
        }])
    }

    pub fn blocked(reason: &str, screenshot: &[u8]) -> Arc<Self> {
        Self::scripted(vec![AcquireBehavior::Blocked {
            reason: reason.to_string(),
            screenshot: Some(screenshot.to_vec()),
        }])
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(vec![AcquireBehavior::Fail(message.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentAcquirer for FakeAcquirer {
    async fn acquire(&self, _job: &AuditJob) -> Result<Acquisition, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let behavior = match self.script.lock().unwrap().pop_front() {
            Some(next) => {
                *self.last.lock().unwrap() = Some(next.clone());
                next
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .expect("acquirer script is empty"),
        };

        match behavior {
            AcquireBehavior::Content { text, screenshot } => {
                Ok(Acquisition::Content(AcquiredContent { text, screenshot }))
            }
            AcquireBehavior::Blocked { reason, screenshot } => {
                Ok(Acquisition::Blocked(BlockedSignal { reason, screenshot }))
            }
            AcquireBehavior::Fail(message) => Err(AcquisitionError::Navigation(message)),
        }
    }
}

// ============================================================================
// Model calls
// ============================================================================

/// Model replaying scripted replies; the last one repeats
pub struct FakeModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
    cost_usd: f64,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn scripted(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            cost_usd: 0.5,
            calls: AtomicUsize::new(0),
        })
    }

    /// Replies like `replying` but reports no cost of its own
    pub fn unpriced(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(vec![Ok(text.into())].into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            cost_usd: 0.0,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn replying(text: impl Into<String>) -> Arc<Self> {
        Self::scripted(vec![Ok(text.into())])
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(vec![Err(message.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelCaller for FakeModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let reply = match self.replies.lock().unwrap().pop_front() {
            Some(next) => {
                *self.last.lock().unwrap() = Some(next.clone());
                next
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .expect("model script is empty"),
        };

        match reply {
            Ok(text) => Ok(ModelResponse {
                text,
                input_tokens: 1000,
                output_tokens: 500,
                cost_usd: self.cost_usd,
                duration_ms: 20,
            }),
            Err(message) => Err(ModelCallError::Api(message)),
        }
    }
}

/// Vision classifier with a fixed answer
pub struct FakeClassifier {
    answer: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(answer.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: Err("vision model unavailable".to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClassifier for FakeClassifier {
    async fn classify(&self, _prompt: &str, _screenshot: &[u8]) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(ModelCallError::Api)
    }
}

// ============================================================================
// Glossary
// ============================================================================

pub struct FakeGlossary {
    terms: Option<Vec<GlossaryTerm>>,
    pub calls: AtomicUsize,
}

impl FakeGlossary {
    pub fn with_terms(terms: Vec<GlossaryTerm>) -> Arc<Self> {
        Arc::new(Self {
            terms: Some(terms),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            terms: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GlossaryProvider for FakeGlossary {
    async fn terms(&self, _job: &AuditJob) -> lqa_common::Result<Vec<GlossaryTerm>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.terms
            .clone()
            .ok_or_else(|| lqa_common::Error::Internal("glossary database offline".to_string()))
    }
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub audit_id: Uuid,
    pub message: String,
    pub step: u32,
    pub total: u32,
    /// Whether the store already held this progress when it was reported
    pub persisted: bool,
}

/// Sink recording reports and checking them against the store
pub struct RecordingSink {
    store: Arc<MemoryStore>,
    reports: Mutex<Vec<Report>>,
    statuses: Mutex<Vec<(AuditStatus, AuditStatus)>>,
}

impl RecordingSink {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            reports: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
        })
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<(AuditStatus, AuditStatus)> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, audit_id: Uuid, message: &str, step: u32, total: u32) {
        let persisted = self
            .store
            .get(audit_id)
            .map(|job| job.progress.message == message && job.progress.step == step)
            .unwrap_or(false);
        self.reports.lock().unwrap().push(Report {
            audit_id,
            message: message.to_string(),
            step,
            total,
            persisted,
        });
    }

    fn status_changed(&self, _audit_id: Uuid, old: AuditStatus, new: AuditStatus) {
        self.statuses.lock().unwrap().push((old, new));
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn pending_job(kind: AuditKind, mode: AuditMode) -> AuditJob {
    AuditJob::new(
        kind,
        mode,
        AuditTarget {
            audit_url: Some("https://example.com/de/".to_string()),
            original_url: None,
            source_language: Some("en".to_string()),
            target_language: Some("de".to_string()),
            industry: Some("ecommerce".to_string()),
        },
    )
}

/// Job that was blocked during acquisition, as a store would hold it
pub fn blocked_job(kind: AuditKind, mode: AuditMode, screenshot: Option<&[u8]>) -> AuditJob {
    let job = pending_job(kind, mode);
    let job = apply_transition(&job, Transition::Begin { total: PROGRESS_TOTAL_STEPS }).unwrap();
    let job = apply_transition(&job, Transition::AcquisitionStarted).unwrap();
    apply_transition(
        &job,
        Transition::Blocked {
            reason: "Cookie wall".to_string(),
            screenshot: screenshot.map(<[u8]>::to_vec),
        },
    )
    .unwrap()
}

/// Well-formed model reply covering `dimensions`, each scored `score`
pub fn model_reply(dimensions: &[Dimension], score: u8) -> String {
    let entries: Vec<serde_json::Value> = dimensions
        .iter()
        .map(|d| {
            serde_json::json!({
                "dimension": d.as_str(),
                "score": score,
                "findings": [{"issue": format!("{} issue", d.as_str()), "severity": "low"}],
                "good_examples": [],
                "recommendations": [format!("Improve {}", d.as_str())]
            })
        })
        .collect();
    let body = serde_json::json!({ "overall_score": score, "dimensions": entries });
    format!(
        "Here is my assessment of the page.\n\n```json\n{}\n```\n",
        serde_json::to_string_pretty(&body).unwrap()
    )
}
