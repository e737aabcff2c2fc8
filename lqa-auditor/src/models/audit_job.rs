//! Audit lifecycle state machine
//!
//! An audit moves PENDING → ANALYZING ⇄ SCRAPING → {COMPLETED | FAILED | BLOCKED}.
//! BLOCKED has two operator-triggered back-edges: retry (→ PENDING) and
//! force-proceed (→ ANALYZING).
//!
//! Jobs are treated as immutable snapshots: [`apply_transition`] validates a
//! [`Transition`] against the current status and returns the next snapshot.
//! Persisting the snapshot is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::score::{AuditKind, AuditScore};

/// Number of progress steps in one audit run
pub const PROGRESS_TOTAL_STEPS: u32 = 4;

/// Audit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    /// Created, waiting for a run
    Pending,
    /// Content acquisition in progress
    Scraping,
    /// Initialization or model analysis in progress
    Analyzing,
    /// Score recovered and persisted
    Completed,
    /// Terminal failure, see `error_message`
    Failed,
    /// Target page served anti-bot content; waiting for operator
    Blocked,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "PENDING",
            AuditStatus::Scraping => "SCRAPING",
            AuditStatus::Analyzing => "ANALYZING",
            AuditStatus::Completed => "COMPLETED",
            AuditStatus::Failed => "FAILED",
            AuditStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "PENDING" => Some(AuditStatus::Pending),
            "SCRAPING" => Some(AuditStatus::Scraping),
            "ANALYZING" => Some(AuditStatus::Analyzing),
            "COMPLETED" => Some(AuditStatus::Completed),
            "FAILED" => Some(AuditStatus::Failed),
            "BLOCKED" => Some(AuditStatus::Blocked),
            _ => None,
        }
    }

    /// Check if a run has finished in this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Completed | AuditStatus::Failed)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which content the model is asked to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditMode {
    /// Text when available, screenshot otherwise
    #[default]
    Auto,
    Text,
    Screenshot,
    /// Text and screenshot analyzed separately, results merged
    Combined,
}

impl AuditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditMode::Auto => "AUTO",
            AuditMode::Text => "TEXT",
            AuditMode::Screenshot => "SCREENSHOT",
            AuditMode::Combined => "COMBINED",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Some(AuditMode::Auto),
            "TEXT" => Some(AuditMode::Text),
            "SCREENSHOT" => Some(AuditMode::Screenshot),
            "COMBINED" => Some(AuditMode::Combined),
            _ => None,
        }
    }
}

/// Analysis actually performed for a completed audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisMethod {
    Text,
    Screenshot,
    Combined,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Text => "TEXT",
            AnalysisMethod::Screenshot => "SCREENSHOT",
            AnalysisMethod::Combined => "COMBINED",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "TEXT" => Some(AnalysisMethod::Text),
            "SCREENSHOT" => Some(AnalysisMethod::Screenshot),
            "COMBINED" => Some(AnalysisMethod::Combined),
            _ => None,
        }
    }
}

/// What is being audited
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditTarget {
    /// Localized page under audit
    pub audit_url: Option<String>,
    /// Source page (comparison audits)
    pub original_url: Option<String>,
    /// Language the content was translated from
    pub source_language: Option<String>,
    /// Language the content is in
    pub target_language: Option<String>,
    /// Industry context, e.g. "ecommerce"
    pub industry: Option<String>,
}

/// Progress of the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditProgress {
    pub message: String,
    pub step: u32,
    pub total: u32,
}

impl Default for AuditProgress {
    fn default() -> Self {
        Self {
            message: String::from("Queued"),
            step: 0,
            total: PROGRESS_TOTAL_STEPS,
        }
    }
}

/// Model usage accumulated over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

impl ModelUsage {
    /// Sum of two usages (combined analysis makes two model calls)
    pub fn combine(self, other: ModelUsage) -> ModelUsage {
        ModelUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cost_usd: self.cost_usd + other.cost_usd,
            duration_ms: self.duration_ms + other.duration_ms,
        }
    }
}

/// One audit job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditJob {
    pub id: Uuid,
    pub kind: AuditKind,
    pub mode: AuditMode,
    pub target: AuditTarget,
    pub status: AuditStatus,
    pub progress: AuditProgress,
    /// Set only when the job enters BLOCKED
    pub blocked_reason: Option<String>,
    /// Screenshot captured when the job was blocked; reused by force-proceed
    #[serde(skip)]
    pub blocked_screenshot: Option<Vec<u8>>,
    /// Set only when the job enters FAILED
    pub error_message: Option<String>,
    /// Present iff status is COMPLETED
    pub result: Option<AuditScore>,
    pub usage: Option<ModelUsage>,
    pub analysis_method: Option<AnalysisMethod>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AuditJob {
    /// Create new PENDING job
    pub fn new(kind: AuditKind, mode: AuditMode, target: AuditTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            mode,
            target,
            status: AuditStatus::Pending,
            progress: AuditProgress::default(),
            blocked_reason: None,
            blocked_screenshot: None,
            error_message: None,
            result: None,
            usage: None,
            analysis_method: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Event driving the lifecycle forward
#[derive(Debug, Clone)]
pub enum Transition {
    /// Start a run
    Begin { total: u32 },
    /// Report progress within the current run
    Progress { message: String, step: u32 },
    /// Content acquisition begins
    AcquisitionStarted,
    /// Model analysis begins
    AnalysisStarted,
    /// Acquisition hit an anti-bot page
    Blocked {
        reason: String,
        screenshot: Option<Vec<u8>>,
    },
    /// Run ended with an error
    Failed { message: String },
    /// Run produced a score
    Completed {
        score: AuditScore,
        usage: ModelUsage,
        method: AnalysisMethod,
        at: DateTime<Utc>,
    },
    /// Operator retry of a blocked job
    Retry,
    /// Operator decided blocked content is usable anyway
    ForceProceed,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Begin { .. } => "begin",
            Transition::Progress { .. } => "progress",
            Transition::AcquisitionStarted => "acquisition_started",
            Transition::AnalysisStarted => "analysis_started",
            Transition::Blocked { .. } => "blocked",
            Transition::Failed { .. } => "failed",
            Transition::Completed { .. } => "completed",
            Transition::Retry => "retry",
            Transition::ForceProceed => "force_proceed",
        }
    }
}

/// Transition not permitted from the job's current status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal transition '{attempted}' from status {from}")]
pub struct IllegalTransition {
    pub from: AuditStatus,
    pub attempted: &'static str,
}

/// Apply a transition to a job snapshot
///
/// Returns the next snapshot, or [`IllegalTransition`] without touching the
/// input when the transition is not legal from the current status.
pub fn apply_transition(job: &AuditJob, transition: Transition) -> Result<AuditJob, IllegalTransition> {
    use AuditStatus::*;

    let illegal = IllegalTransition {
        from: job.status,
        attempted: transition.name(),
    };
    let mut next = job.clone();

    match (job.status, transition) {
        (Pending, Transition::Begin { total }) => {
            next.status = Analyzing;
            next.progress = AuditProgress {
                message: "Initializing audit".to_string(),
                step: 1,
                total,
            };
        }
        (Scraping | Analyzing, Transition::Progress { message, step }) => {
            if step < job.progress.step {
                return Err(illegal);
            }
            next.progress.message = message;
            next.progress.step = step;
        }
        (Analyzing, Transition::AcquisitionStarted) => {
            next.status = Scraping;
        }
        (Scraping | Analyzing, Transition::AnalysisStarted) => {
            next.status = Analyzing;
        }
        (Scraping, Transition::Blocked { reason, screenshot }) => {
            next.status = Blocked;
            next.progress.message = format!("Blocked: {}", reason);
            next.blocked_reason = Some(reason);
            next.blocked_screenshot = screenshot;
        }
        (Scraping | Analyzing, Transition::Failed { message }) => {
            next.status = Failed;
            next.progress.message = "Audit failed".to_string();
            next.error_message = Some(message);
        }
        (Analyzing, Transition::Completed { score, usage, method, at }) => {
            next.status = Completed;
            next.progress.message = "Audit complete".to_string();
            next.progress.step = next.progress.total;
            next.result = Some(score);
            next.usage = Some(usage);
            next.analysis_method = Some(method);
            next.completed_at = Some(at);
        }
        (Blocked, Transition::Retry) => {
            next.status = Pending;
            next.progress = AuditProgress {
                message: "Queued for retry".to_string(),
                ..AuditProgress::default()
            };
            next.blocked_reason = None;
            next.blocked_screenshot = None;
            next.error_message = None;
        }
        (Blocked, Transition::ForceProceed) => {
            next.status = Analyzing;
            next.progress.message = "Proceeding with captured screenshot".to_string();
            next.blocked_reason = None;
            next.error_message = None;
        }
        _ => return Err(illegal),
    }

    Ok(next)
}
