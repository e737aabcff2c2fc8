//! Structured output recovery
//!
//! Turns free-form model output into a validated, normalized [`AuditScore`].
//! Candidate JSON substrings are located in the raw text and each is tried
//! through an ordered chain of pure text transforms until one parses into the
//! score shape. If none does, scores are pattern-matched out of the raw text.
//!
//! Nothing in this module performs I/O or logs; callers receive the attempt
//! list and decide what to report.
//!
//! [`AuditScore`]: crate::models::AuditScore

pub mod extract;
pub mod locate;
pub mod normalize;
pub mod regex_fallback;
pub mod repair;
pub mod sanitize;

use serde::Serialize;
use thiserror::Error;

pub use extract::{expected_dimensions, extract, extract_with_diagnostics, Extraction, RecoveredBy, Transform};
pub use locate::{locate_candidates, Candidate, CandidateSource};
pub use normalize::{merge_scores, normalize};
pub use regex_fallback::REGEX_FALLBACK_RECOMMENDATION;
pub use repair::repair_truncated;

/// Result of one candidate × transform attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    ParseError(String),
}

/// Diagnostic record of one parse attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryAttempt {
    pub source: CandidateSource,
    pub transform: Transform,
    pub outcome: AttemptOutcome,
}

/// Every recovery strategy failed
///
/// Display stays short; the full attempt list is for logs.
#[derive(Debug, Clone, Error)]
#[error("Could not recover audit scores from model output ({} parse attempts, {regex_matched}/{expected} dimensions pattern-matched)", .attempts.len())]
pub struct RecoveryExhausted {
    pub attempts: Vec<RecoveryAttempt>,
    pub regex_matched: usize,
    pub expected: usize,
}

impl RecoveryExhausted {
    /// Last failure per candidate source, for log output
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for attempt in self.attempts.iter().rev() {
            if let AttemptOutcome::ParseError(reason) = &attempt.outcome {
                let prefix = format!("{}/", attempt.source);
                if lines.iter().any(|l| l.starts_with(&prefix)) {
                    continue;
                }
                lines.push(format!("{}{}: {}", prefix, attempt.transform, reason));
            }
        }
        if lines.is_empty() {
            return "no JSON candidates found".to_string();
        }
        lines.reverse();
        lines.join("; ")
    }
}
