//! Structural repair of truncated JSON documents
//!
//! Model output is regularly cut off by the output token limit. The repair
//! closes whatever was left open so the well-formed prefix can still be
//! parsed.

/// Result of a string-aware scan over a JSON-ish document
#[derive(Debug, Default)]
pub(crate) struct StructureScan {
    /// Unmatched `{` / `[` in nesting order
    pub stack: Vec<char>,
    /// Document ends inside a string literal
    pub in_string: bool,
    /// Document ends right after a backslash inside a string
    pub dangling_escape: bool,
}

impl StructureScan {
    pub fn is_balanced(&self) -> bool {
        self.stack.is_empty() && !self.in_string
    }
}

/// Scan `input`, tracking open containers outside string literals
pub(crate) fn scan_structure(input: &str) -> StructureScan {
    let mut scan = StructureScan::default();
    let mut escaped = false;

    for c in input.chars() {
        if scan.in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                scan.in_string = false;
            }
            continue;
        }

        match c {
            '"' => scan.in_string = true,
            '{' | '[' => scan.stack.push(c),
            '}' | ']' => {
                scan.stack.pop();
            }
            _ => {}
        }
    }

    scan.dangling_escape = scan.in_string && escaped;
    scan
}

/// Close a truncated document
///
/// Closes an unterminated string, removes a dangling tail that cannot be
/// completed (trailing comma, `"key":` without value, a bare object key, a
/// bare number or literal that may have been cut short), then appends one
/// closer per unmatched opener, innermost first. Balanced input is returned
/// unchanged.
pub fn repair_truncated(input: &str) -> String {
    let mut out = input.trim_end().to_string();

    let scan = scan_structure(&out);
    if scan.is_balanced() {
        return out;
    }
    if scan.in_string {
        if scan.dangling_escape {
            out.pop();
        }
        out.push('"');
    }

    trim_dangling_tail(&mut out);

    let scan = scan_structure(&out);
    for opener in scan.stack.iter().rev() {
        out.push(if *opener == '{' { '}' } else { ']' });
    }

    out
}

fn trim_dangling_tail(out: &mut String) {
    // The final bare token may have lost digits, so it is never trusted
    if let Some(start) = trailing_literal_start(out) {
        out.truncate(start);
    }

    loop {
        let len = out.trim_end().len();
        out.truncate(len);

        if out.ends_with(',') {
            out.pop();
            continue;
        }

        if out.ends_with(':') {
            out.pop();
            let len = out.trim_end().len();
            out.truncate(len);
            if let Some(start) = trailing_string_start(out) {
                out.truncate(start);
            }
            continue;
        }

        if out.ends_with('"') {
            match trailing_string_start(out) {
                Some(start) if is_object_key(out, start) => {
                    out.truncate(start);
                    continue;
                }
                _ => break,
            }
        }

        break;
    }
}

/// Byte index of the opening quote of the string literal ending `s`
fn trailing_string_start(s: &str) -> Option<usize> {
    if !s.ends_with('"') {
        return None;
    }
    let bytes = s.as_bytes();
    let mut i = bytes.len() - 1;
    while i > 0 {
        i -= 1;
        if bytes[i] == b'"' {
            let backslashes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
            if backslashes % 2 == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// The string starting at `start` sits in key position of an object
fn is_object_key(s: &str, start: usize) -> bool {
    let before = s[..start].trim_end();
    let in_object = scan_structure(before).stack.last() == Some(&'{');
    in_object && (before.ends_with('{') || before.ends_with(','))
}

/// Start of a trailing bare token (number or literal), if any
fn trailing_literal_start(s: &str) -> Option<usize> {
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
        .last()
        .map(|(i, _)| i)?;
    Some(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parses(s: &str) -> Value {
        serde_json::from_str(s).unwrap_or_else(|e| panic!("{e}: {s}"))
    }

    #[test]
    fn balanced_input_is_unchanged() {
        let input = r#"{"a": [1, {"b": "c"}]}"#;
        assert_eq!(repair_truncated(input), input);
    }

    #[test]
    fn closes_string_then_containers_innermost_first() {
        let input = r#"{"overall_score": 70, "dimensions": [{"dimension": "CORRECTNESS", "score": 85, "recommendations": ["Use formal ton"#;
        let repaired = repair_truncated(input);
        assert!(repaired.ends_with(r#"ton"]}]}"#));
        let value = parses(&repaired);
        assert_eq!(value["dimensions"][0]["recommendations"][0], "Use formal ton");
    }

    #[test]
    fn drops_trailing_comma() {
        let value = parses(&repair_truncated(r#"{"a": ["x", "y","#));
        assert_eq!(value["a"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn drops_key_without_value() {
        let value = parses(&repair_truncated(r#"{"a": 1, "score":"#));
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn drops_dangling_key_fragment() {
        let value = parses(&repair_truncated(r#"{"a": 1, "good_exam"#));
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn keeps_string_values_in_arrays() {
        let value = parses(&repair_truncated(r#"{"a": ["x", "y"#));
        assert_eq!(value["a"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn drops_trailing_bare_token() {
        let value = parses(&repair_truncated(r#"{"a": 1, "ok": tru"#));
        assert_eq!(value, serde_json::json!({"a": 1}));
        let value = parses(&repair_truncated(r#"{"a": 1, "score": 8"#));
        assert_eq!(value, serde_json::json!({"a": 1}));
        let value = parses(&repair_truncated(r#"{"a": [1, 2"#));
        assert_eq!(value["a"], serde_json::json!([1]));
    }

    #[test]
    fn drops_dangling_escape_before_closing_string() {
        let value = parses(&repair_truncated("{\"a\": \"half\\"));
        assert_eq!(value["a"], "half");
    }

    #[test]
    fn scan_ignores_brackets_inside_strings() {
        let scan = scan_structure(r#"{"a": "[{"}"#);
        assert!(scan.is_balanced());
        let scan = scan_structure(r#"{"a": ["#);
        assert_eq!(scan.stack, vec!['{', '[']);
    }
}
