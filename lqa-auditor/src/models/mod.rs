//! Data models for lqa-auditor
//!
//! - Audit job lifecycle (status, progress, transitions)
//! - Normalized audit scores

pub mod audit_job;
pub mod score;

pub use audit_job::{
    apply_transition, AnalysisMethod, AuditJob, AuditMode, AuditProgress, AuditStatus,
    AuditTarget, IllegalTransition, ModelUsage, Transition, PROGRESS_TOTAL_STEPS,
};
pub use score::{
    clamp_score, AuditKind, AuditScore, Dimension, DimensionScore, FALLBACK_DIMENSION_SCORE,
    FALLBACK_RECOMMENDATION,
};
