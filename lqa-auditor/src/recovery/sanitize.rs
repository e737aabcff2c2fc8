//! Lexical cleanup of near-JSON text
//!
//! Each function is a pure `&str -> String` transform targeting one observed
//! failure mode of model output. They are applied in increasing order of
//! aggressiveness by the extractor; none of them changes valid JSON except
//! where noted.

/// Characters that may legally follow a backslash inside a JSON string
fn is_escape_letter(c: char) -> bool {
    matches!(c, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')
}

/// Escape raw control characters inside string literals
///
/// Inside strings: raw newline, carriage return and tab become their escaped
/// forms, other control characters become a space, valid escape sequences are
/// kept, and a backslash not followed by an escape letter is doubled.
/// Outside strings: control characters other than JSON whitespace are dropped.
pub fn escape_control_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\\' => match chars.peek() {
                    Some(&next) if is_escape_letter(next) => {
                        out.push('\\');
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push_str("\\\\"),
                },
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_ascii_control() => out.push(' '),
                c => out.push(c),
            }
        } else {
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                ' ' | '\t' | '\n' | '\r' => out.push(c),
                c if c.is_ascii_control() => {}
                c => out.push(c),
            }
        }
    }

    out
}

/// Drop control characters, repair escapes, strip trailing commas
///
/// Control characters other than newline and tab are removed. Invalid escape
/// sequences lose their backslash; a `\u` escape with fewer than four hex
/// digits loses its `\u` prefix; a trailing lone backslash is dropped.
pub fn aggressive_cleanup(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|&c| !c.is_ascii_control() || c == '\n' || c == '\t')
        .collect();

    strip_trailing_commas(&repair_escapes(&stripped))
}

fn repair_escapes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1).copied() {
            Some('u') => {
                let hex = chars[i + 2..]
                    .iter()
                    .take(4)
                    .take_while(|h| h.is_ascii_hexdigit())
                    .count();
                if hex == 4 {
                    out.extend(&chars[i..i + 6]);
                }
                // Truncated escape: keep whatever hex digits there were as text
                else {
                    out.extend(&chars[i + 2..i + 2 + hex]);
                }
                i += 2 + hex;
            }
            Some(next) if is_escape_letter(next) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some(next) => {
                out.push(next);
                i += 2;
            }
            None => i += 1,
        }
    }

    out
}

/// Remove commas directly followed (modulo whitespace) by `}` or `]`
///
/// String-aware: commas inside string literals are never touched.
pub fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Keep printable ASCII, newline, tab and every non-ASCII codepoint
///
/// Target-language text is frequently non-Latin, so only ASCII control
/// characters are removed.
pub fn printable_only(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, ' '..='~' | '\n' | '\t') || (c as u32) > 127)
        .collect()
}

/// All lexical cleanups in sequence
pub fn combined_cleanup(input: &str) -> String {
    printable_only(&aggressive_cleanup(&escape_control_chars(input)))
}
