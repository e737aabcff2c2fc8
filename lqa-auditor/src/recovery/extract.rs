//! Candidate × transform cascade producing a validated [`AuditScore`]

use serde::Serialize;
use serde_json::{Map, Value};

use super::locate::{locate_candidates, CandidateSource};
use super::normalize::normalize;
use super::regex_fallback::recover_scores;
use super::repair::repair_truncated;
use super::sanitize::{aggressive_cleanup, combined_cleanup, escape_control_chars, printable_only};
use super::{AttemptOutcome, RecoveryAttempt, RecoveryExhausted};
use crate::models::{clamp_score, AuditKind, AuditScore, Dimension, DimensionScore};

/// Text transform applied to a candidate before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Identity,
    EscapeControl,
    Aggressive,
    PrintableOnly,
    Combined,
    TruncationRepair,
}

impl Transform {
    /// Transforms in the order they are tried
    pub const CHAIN: [Transform; 6] = [
        Transform::Identity,
        Transform::EscapeControl,
        Transform::Aggressive,
        Transform::PrintableOnly,
        Transform::Combined,
        Transform::TruncationRepair,
    ];

    pub fn apply(&self, input: &str) -> String {
        match self {
            Transform::Identity => input.to_string(),
            Transform::EscapeControl => escape_control_chars(input),
            Transform::Aggressive => aggressive_cleanup(input),
            Transform::PrintableOnly => printable_only(input),
            Transform::Combined => combined_cleanup(input),
            Transform::TruncationRepair => repair_truncated(&combined_cleanup(input)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::EscapeControl => "escape_control",
            Transform::Aggressive => "aggressive",
            Transform::PrintableOnly => "printable_only",
            Transform::Combined => "combined",
            Transform::TruncationRepair => "truncation_repair",
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage of the pipeline produced the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RecoveredBy {
    Json {
        source: CandidateSource,
        transform: Transform,
    },
    Regex {
        matched: usize,
    },
}

/// Successful extraction with its diagnostics
#[derive(Debug, Clone)]
pub struct Extraction {
    pub score: AuditScore,
    pub recovered_by: RecoveredBy,
    /// Every JSON attempt made, in order, ending with the successful one
    /// unless the regex stage produced the score
    pub attempts: Vec<RecoveryAttempt>,
}

/// Dimensions an audit of `kind` is scored on
pub fn expected_dimensions(kind: AuditKind) -> &'static [Dimension] {
    kind.expected_dimensions()
}

/// Recover a normalized score from raw model output
pub fn extract(raw: &str, expected: &[Dimension]) -> Result<AuditScore, RecoveryExhausted> {
    extract_with_diagnostics(raw, expected).map(|e| e.score)
}

/// [`extract`], also reporting how the score was obtained
pub fn extract_with_diagnostics(
    raw: &str,
    expected: &[Dimension],
) -> Result<Extraction, RecoveryExhausted> {
    let mut attempts = Vec::new();

    for candidate in locate_candidates(raw) {
        for transform in Transform::CHAIN {
            let text = transform.apply(candidate.text);
            match parse_score_object(&text) {
                Ok(score) => {
                    attempts.push(RecoveryAttempt {
                        source: candidate.source,
                        transform,
                        outcome: AttemptOutcome::Success,
                    });
                    return Ok(Extraction {
                        score: normalize(score, expected),
                        recovered_by: RecoveredBy::Json {
                            source: candidate.source,
                            transform,
                        },
                        attempts,
                    });
                }
                Err(reason) => attempts.push(RecoveryAttempt {
                    source: candidate.source,
                    transform,
                    outcome: AttemptOutcome::ParseError(reason),
                }),
            }
        }
    }

    let recovery = recover_scores(raw, expected);
    match recovery.score {
        Some(score) => Ok(Extraction {
            score: normalize(score, expected),
            recovered_by: RecoveredBy::Regex {
                matched: recovery.matched,
            },
            attempts,
        }),
        None => Err(RecoveryExhausted {
            attempts,
            regex_matched: recovery.matched,
            expected: expected.len(),
        }),
    }
}

/// Parse `text` and check it has the audit score shape
///
/// The returned score is not yet normalized: it holds every recognized
/// dimension entry in document order, duplicates included.
pub(crate) fn parse_score_object(text: &str) -> Result<AuditScore, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;

    let Value::Object(object) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let overall = object
        .get("overall_score")
        .and_then(as_number)
        .ok_or_else(|| "missing numeric overall_score".to_string())?;

    let entries = object
        .get("dimensions")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing dimensions array".to_string())?;

    let dimensions = entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(parse_dimension_entry)
        .collect();

    Ok(AuditScore {
        overall_score: clamp_score(overall),
        dimensions,
    })
}

fn parse_dimension_entry(entry: &Map<String, Value>) -> Option<DimensionScore> {
    let dimension = entry
        .get("dimension")
        .and_then(Value::as_str)
        .and_then(Dimension::parse)?;
    let score = entry.get("score").and_then(as_number)?;

    Some(DimensionScore {
        dimension,
        score: clamp_score(score),
        findings: detail_list(entry.get("findings")),
        good_examples: detail_list(entry.get("good_examples")),
        recommendations: detail_list(entry.get("recommendations")),
    })
}

/// JSON number, or a string holding one
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn detail_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}
