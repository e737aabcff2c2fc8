//! Schema completion and COMBINED-mode score merging

use std::collections::HashSet;

use serde_json::Value;

use crate::models::{AuditScore, Dimension, DimensionScore};

/// Length of the `issue` prefix used to recognize duplicate findings
const FINDING_KEY_CHARS: usize = 50;

/// Force `score` onto exactly the `expected` dimension set
///
/// Dimensions outside `expected` are dropped, duplicates keep their first
/// occurrence, missing dimensions are synthesized with
/// [`DimensionScore::fallback`], and the result follows the order of
/// `expected`. `overall_score` is passed through unchanged.
pub fn normalize(score: AuditScore, expected: &[Dimension]) -> AuditScore {
    let mut found: Vec<Option<DimensionScore>> = vec![None; expected.len()];

    for entry in score.dimensions {
        if let Some(slot) = expected.iter().position(|d| *d == entry.dimension) {
            if found[slot].is_none() {
                found[slot] = Some(entry);
            }
        }
    }

    let dimensions = expected
        .iter()
        .zip(found)
        .map(|(dim, entry)| entry.unwrap_or_else(|| DimensionScore::fallback(*dim)))
        .collect();

    AuditScore {
        overall_score: score.overall_score,
        dimensions,
    }
}

/// Merge the text-based and screenshot-based results of a COMBINED audit
///
/// Shared dimensions take the floor average score; findings are deduplicated
/// by the leading characters of their `issue`, good examples concatenated and
/// recommendations deduplicated in order. Dimensions present on one side only
/// are carried over. The overall score is recomputed as the floor average of
/// the merged dimensions.
pub fn merge_scores(text: Option<AuditScore>, screenshot: Option<AuditScore>) -> Option<AuditScore> {
    let (text, screenshot) = match (text, screenshot) {
        (None, None) => return None,
        (Some(one), None) | (None, Some(one)) => return Some(one),
        (Some(text), Some(screenshot)) => (text, screenshot),
    };

    let mut remaining = screenshot.dimensions;
    let mut dimensions = Vec::with_capacity(text.dimensions.len());

    for text_dim in text.dimensions {
        match remaining.iter().position(|d| d.dimension == text_dim.dimension) {
            Some(idx) => {
                let other = remaining.remove(idx);
                dimensions.push(merge_dimension(text_dim, other));
            }
            None => dimensions.push(text_dim),
        }
    }
    dimensions.extend(remaining);
    dimensions.sort_by_key(|d| d.dimension);

    let overall_score = if dimensions.is_empty() {
        0
    } else {
        let total: u32 = dimensions.iter().map(|d| u32::from(d.score)).sum();
        (total / dimensions.len() as u32) as u8
    };

    Some(AuditScore {
        overall_score,
        dimensions,
    })
}

fn merge_dimension(text: DimensionScore, screenshot: DimensionScore) -> DimensionScore {
    let score = ((u16::from(text.score) + u16::from(screenshot.score)) / 2) as u8;

    let mut seen = HashSet::new();
    let findings = text
        .findings
        .into_iter()
        .chain(screenshot.findings)
        .filter(|finding| seen.insert(finding_key(finding)))
        .collect();

    let mut good_examples = text.good_examples;
    good_examples.extend(screenshot.good_examples);

    let mut recommendations: Vec<Value> = Vec::new();
    for rec in text.recommendations.into_iter().chain(screenshot.recommendations) {
        if !recommendations.contains(&rec) {
            recommendations.push(rec);
        }
    }

    DimensionScore {
        dimension: text.dimension,
        score,
        findings,
        good_examples,
        recommendations,
    }
}

/// Findings without a textual `issue` are compared by their full JSON
fn finding_key(finding: &Value) -> String {
    match finding.get("issue").and_then(Value::as_str) {
        Some(issue) => issue.chars().take(FINDING_KEY_CHARS).collect(),
        None => finding.to_string(),
    }
}
