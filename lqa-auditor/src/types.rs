//! Collaborator traits for the audit state machine
//!
//! Everything with side effects (scraping, model calls, glossary lookup,
//! persistence, progress fan-out) sits behind one of these traits so the
//! state machine can be driven by fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuditJob, AuditStatus};

// ============================================================================
// Content acquisition
// ============================================================================

/// Content captured for an audit target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquiredContent {
    /// Extracted page text, if any
    pub text: Option<String>,
    /// Full-page screenshot (PNG bytes)
    pub screenshot: Option<Vec<u8>>,
}

/// Acquisition reached an anti-bot or access-denied page
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedSignal {
    pub reason: String,
    pub screenshot: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Content(AcquiredContent),
    Blocked(BlockedSignal),
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

/// Fetches text and screenshot for a job's target
#[async_trait]
pub trait ContentAcquirer: Send + Sync {
    async fn acquire(&self, job: &AuditJob) -> Result<Acquisition, AcquisitionError>;
}

// ============================================================================
// Model calls
// ============================================================================

/// One analysis request to the language model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub prompt: String,
    /// Attached image for screenshot analysis
    pub screenshot: Option<Vec<u8>>,
}

/// Raw model reply with usage accounting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("Model API error: {0}")]
    Api(String),

    #[error("Model call timed out after {0} ms")]
    Timeout(u64),

    #[error("Rate limited")]
    RateLimited,
}

#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError>;
}

/// Vision model used to classify screenshots
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    async fn classify(&self, prompt: &str, screenshot: &[u8]) -> Result<String, ModelCallError>;
}

// ============================================================================
// Glossary
// ============================================================================

/// Required translation of one term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub source_term: String,
    pub target_term: String,
    #[serde(default)]
    pub context: Option<String>,
}

/// Industry glossary lookup for a job's languages
#[async_trait]
pub trait GlossaryProvider: Send + Sync {
    async fn terms(&self, job: &AuditJob) -> lqa_common::Result<Vec<GlossaryTerm>>;
}

// ============================================================================
// Progress and persistence
// ============================================================================

/// Receives progress of running audits
///
/// Implementations must not block; reports are emitted inline with the run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, audit_id: Uuid, message: &str, step: u32, total: u32);

    fn status_changed(&self, _audit_id: Uuid, _old: AuditStatus, _new: AuditStatus) {}
}

/// Durable storage of audit jobs
///
/// `save` is an idempotent upsert keyed by job id.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn save(&self, job: &AuditJob) -> lqa_common::Result<()>;

    async fn load(&self, id: Uuid) -> lqa_common::Result<Option<AuditJob>>;
}
