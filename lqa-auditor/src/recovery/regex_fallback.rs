//! Last-resort score recovery by pattern matching
//!
//! Used when no candidate parses as JSON. Scores are pulled out of the raw
//! text dimension by dimension; detail arrays are recovered from each
//! dimension's block where possible.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::extract::Transform;
use crate::models::{clamp_score, AuditScore, Dimension, DimensionScore};

/// Recommendation attached to a regex-recovered dimension with none of its own
pub const REGEX_FALLBACK_RECOMMENDATION: &str = "Extracted via fallback parser";

const DETAIL_ARRAYS: [&str; 3] = ["findings", "good_examples", "recommendations"];

struct DimensionPatterns {
    dimension: Dimension,
    /// `"dimension": "<NAME>" ... "score": <n>` within one object
    entry: Regex,
    /// `"<NAME>": { ... "score": <n>`
    keyed_object: Regex,
    /// `"<NAME>": <n>`
    keyed_number: Regex,
    /// Start of the dimension's entry, for locating its detail arrays
    mention: Regex,
}

static PATTERNS: Lazy<Vec<DimensionPatterns>> = Lazy::new(|| {
    Dimension::ALL
        .iter()
        .map(|&dimension| {
            let name = regex::escape(dimension.as_str());
            let compile = |pattern: String| Regex::new(&pattern).expect("dimension pattern is valid");
            DimensionPatterns {
                dimension,
                entry: compile(format!(
                    r#"(?is)"dimension"\s*:\s*"{name}"[^}}]*?"score"\s*:\s*"?(\d+)"#
                )),
                keyed_object: compile(format!(
                    r#"(?is)"{name}"\s*:\s*\{{[^}}]*?"score"\s*:\s*"?(\d+)"#
                )),
                keyed_number: compile(format!(r#"(?i)"{name}"\s*:\s*(\d+)"#)),
                mention: compile(format!(r#"(?i)"dimension"\s*:\s*"{name}""#)),
            }
        })
        .collect()
});

static ANY_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"dimension"\s*:\s*"[A-Z_]+""#).expect("mention pattern is valid")
});

static OVERALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""overall_score"\s*:\s*(\d+)"#).expect("overall pattern is valid")
});

/// Outcome of the pattern-matching pass
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegexRecovery {
    /// Number of expected dimensions whose score was found
    pub matched: usize,
    /// Present when at least half the expected dimensions matched
    pub score: Option<AuditScore>,
}

/// Recover scores for `expected` from `raw`
///
/// The returned score lists matched dimensions only; the caller normalizes.
pub(crate) fn recover_scores(raw: &str, expected: &[Dimension]) -> RegexRecovery {
    let mut dimensions = Vec::new();

    for patterns in PATTERNS.iter().filter(|p| expected.contains(&p.dimension)) {
        let Some(score) = match_score(raw, patterns) else {
            continue;
        };

        let mut entry = DimensionScore {
            dimension: patterns.dimension,
            score,
            findings: Vec::new(),
            good_examples: Vec::new(),
            recommendations: Vec::new(),
        };

        if let Some(block) = dimension_block(raw, patterns) {
            let [findings, good_examples, recommendations] =
                DETAIL_ARRAYS.map(|name| detail_array(block, name));
            entry.findings = findings;
            entry.good_examples = good_examples;
            entry.recommendations = recommendations;
        }
        if entry.recommendations.is_empty() {
            entry.recommendations = vec![Value::String(REGEX_FALLBACK_RECOMMENDATION.to_string())];
        }

        dimensions.push(entry);
    }

    let matched = dimensions.len();
    if matched == 0 || matched * 2 < expected.len() {
        return RegexRecovery { matched, score: None };
    }

    let overall_score = OVERALL
        .captures(raw)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(clamp_score)
        .unwrap_or_else(|| {
            let total: u32 = dimensions.iter().map(|d| u32::from(d.score)).sum();
            (total / matched as u32) as u8
        });

    RegexRecovery {
        matched,
        score: Some(AuditScore {
            overall_score,
            dimensions,
        }),
    }
}

fn match_score(raw: &str, patterns: &DimensionPatterns) -> Option<u8> {
    [&patterns.entry, &patterns.keyed_object, &patterns.keyed_number]
        .into_iter()
        .find_map(|re| re.captures(raw))
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(clamp_score)
}

/// Text from this dimension's `"dimension"` mention to the next mention
fn dimension_block<'a>(raw: &'a str, patterns: &DimensionPatterns) -> Option<&'a str> {
    let start = patterns.mention.find(raw)?.start();
    let end = ANY_MENTION
        .find_at(raw, start + 1)
        .map(|m| m.start())
        .unwrap_or(raw.len());
    Some(&raw[start..end])
}

/// Parse the array named `name` inside `block`; empty when absent or broken
fn detail_array(block: &str, name: &str) -> Vec<Value> {
    let pattern = format!(r#"(?i)"{}"\s*:\s*\["#, regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let Some(m) = re.find(block) else {
        return Vec::new();
    };

    let array = balanced_array(&block[m.end() - 1..]);

    Transform::CHAIN
        .iter()
        .find_map(|t| serde_json::from_str::<Vec<Value>>(&t.apply(array)).ok())
        .unwrap_or_default()
}

/// Prefix of `text` (which starts at `[`) up to its matching `]`, or all of it
fn balanced_array(text: &str) -> &str {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..=i];
                }
            }
            _ => {}
        }
    }

    text
}
