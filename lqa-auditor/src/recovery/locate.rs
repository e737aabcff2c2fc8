//! Candidate JSON substrings inside free-form model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::repair::scan_structure;

/// How far past a `{` to look for the score object's keys
const KEY_LOOKAHEAD: usize = 500;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)```json\s*(.*?)\s*```").expect("fenced block pattern is valid")
});

static ANCHORED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\{.*"overall_score".*"dimensions".*\}"#)
        .expect("anchored object pattern is valid")
});

/// Where a candidate was found, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// First fenced code block tagged `json`
    FencedBlock,
    /// Object spanning `"overall_score"` and `"dimensions"`
    AnchoredKeys,
    /// First `{` to last `}`
    BraceSpan,
    /// First `{` to end of text, when left unclosed
    OpenTail,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::FencedBlock => "fenced_block",
            CandidateSource::AnchoredKeys => "anchored_keys",
            CandidateSource::BraceSpan => "brace_span",
            CandidateSource::OpenTail => "open_tail",
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub source: CandidateSource,
    pub text: &'a str,
}

/// Collect candidate substrings of `raw` in priority order
///
/// A string found by more than one source is returned once, under the first
/// source that produced it.
pub fn locate_candidates(raw: &str) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::with_capacity(4);

    if let Some(m) = FENCED_JSON.captures(raw).and_then(|c| c.get(1)) {
        push_unique(&mut candidates, CandidateSource::FencedBlock, m.as_str());
    }

    let Some(start) = json_start(raw) else {
        return candidates;
    };
    let body = &raw[start..];

    if let Some(m) = ANCHORED_OBJECT.find(body) {
        push_unique(&mut candidates, CandidateSource::AnchoredKeys, m.as_str());
    }

    if let Some(end) = body.rfind('}') {
        push_unique(&mut candidates, CandidateSource::BraceSpan, &body[..=end]);
    }

    if !scan_structure(body).is_balanced() {
        push_unique(&mut candidates, CandidateSource::OpenTail, body);
    }

    candidates
}

/// Offset of the `{` the score object starts at
///
/// The first `{` that stays open up to an `"overall_score"` or `"dimensions"`
/// key within [`KEY_LOOKAHEAD`] bytes. Braces in leading prose close before
/// the key and are skipped. Falls back to the first `{`.
fn json_start(raw: &str) -> Option<usize> {
    let first = raw.find('{')?;

    let enclosing = raw.match_indices('{').map(|(i, _)| i).find(|&i| {
        let mut end = (i + KEY_LOOKAHEAD).min(raw.len());
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        let window = &raw[i..end];
        ["\"overall_score\"", "\"dimensions\""]
            .iter()
            .filter_map(|key| window.find(key))
            .min()
            .is_some_and(|key_at| stays_open(&window[..key_at]))
    });

    Some(enclosing.unwrap_or(first))
}

/// `segment` starts with `{` that is not closed anywhere in `segment`
fn stays_open(segment: &str) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in segment.chars() {
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
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return false;
                }
            }
            _ => {}
        }
    }

    depth > 0
}

fn push_unique<'a>(candidates: &mut Vec<Candidate<'a>>, source: CandidateSource, text: &'a str) {
    let text = text.trim();
    if text.is_empty() || candidates.iter().any(|c| c.text == text) {
        return;
    }
    candidates.push(Candidate { source, text });
}
