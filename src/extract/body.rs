//! Delimiter balancing over raw source text.
//!
//! This is not a parser. It walks bytes, tracking `()`, `{}` and `[]`, and
//! steps over string literals, template literals and comments so that
//! delimiters inside them are ignored. All delimiters are ASCII, so every
//! offset it returns is a valid UTF-8 boundary.

/// Where balancing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// An unmatched closing delimiter at depth zero, at this offset.
    Closer(usize, u8),
    /// A closing delimiter that does not match the innermost open one.
    Mismatch(usize),
    /// The text ran out first.
    Eof,
}

/// The extent of a test body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    /// Offset one past the last byte of the body.
    pub end: usize,
    /// Whether the closing `)` of the call was not found cleanly.
    pub degraded: bool,
}

/// Scan from `start` (just after the comma following a test name) to the `)`
/// closing the registration call.
pub(crate) fn call_body(content: &str, start: usize) -> Span {
    let bytes = content.as_bytes();
    match balance(bytes, start) {
        Stop::Closer(end, b')') => Span {
            end,
            degraded: false,
        },
        Stop::Closer(end, _) | Stop::Mismatch(end) => Span {
            end,
            degraded: true,
        },
        Stop::Eof => Span {
            end: bytes.len(),
            degraded: true,
        },
    }
}

/// Walk forward from `start` until a closing delimiter is found at depth zero.
pub(crate) fn balance(bytes: &[u8], start: usize) -> Stop {
    let mut open: Vec<u8> = Vec::new();
    let mut i = start;

    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'\'' | b'"' => i = skip_string(bytes, i),
            b'`' => i = skip_template(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'(' => {
                open.push(b')');
                i += 1;
            }
            b'{' => {
                open.push(b'}');
                i += 1;
            }
            b'[' => {
                open.push(b']');
                i += 1;
            }
            b')' | b'}' | b']' => match open.pop() {
                None => return Stop::Closer(i, byte),
                Some(expected) if expected == byte => i += 1,
                Some(_) => return Stop::Mismatch(i),
            },
            _ => i += 1,
        }
    }

    Stop::Eof
}

/// Skip a `'` or `"` string starting at `start`, returning the offset after
/// it.
///
/// An unescaped newline ends the string, which keeps one unterminated quote
/// from swallowing the rest of the file.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip a template literal starting at the backtick at `start`, including any
/// `${...}` expressions, returning the offset after the closing backtick.
pub(crate) fn skip_template(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => match balance(bytes, i + 2) {
                Stop::Closer(end, b'}') => i = end + 1,
                _ => return bytes.len(),
            },
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(content: &str) -> (&str, bool) {
        let span = call_body(content, 0);
        (&content[..span.end], span.degraded)
    }

    #[test]
    fn stops_at_closing_paren_of_call() {
        let (text, degraded) = body(" () => { expect(1+1).toBe(2); });\nnext();");
        assert_eq!(text, " () => { expect(1+1).toBe(2); }");
        assert!(!degraded);
    }

    #[test]
    fn ignores_delimiters_in_strings() {
        let (text, degraded) = body(" () => { log(')', \"}\"); })");
        assert_eq!(text, " () => { log(')', \"}\"); }");
        assert!(!degraded);
    }

    #[test]
    fn ignores_delimiters_in_template_literals() {
        let (text, _) = body(" () => { log(`) ${fn({a: ')'})} }`); })");
        assert_eq!(text, " () => { log(`) ${fn({a: ')'})} }`); }");
    }

    #[test]
    fn ignores_delimiters_in_comments() {
        let (text, degraded) = body(" () => {\n// )\n/* } */\n})");
        assert_eq!(text, " () => {\n// )\n/* } */\n}");
        assert!(!degraded);
    }

    #[test]
    fn includes_trailing_arguments() {
        let (text, degraded) = body(" () => {}, 5000)");
        assert_eq!(text, " () => {}, 5000");
        assert!(!degraded);
    }

    #[test]
    fn unbalanced_input_runs_to_end_and_degrades() {
        let content = " () => { expect(1).toBe(1);";
        let (text, degraded) = body(content);
        assert_eq!(text, content);
        assert!(degraded);
    }

    #[test]
    fn mismatched_closer_degrades() {
        let (_, degraded) = body(" () => { ])");
        assert!(degraded);
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let (text, _) = body(r#" () => { say('it\'s )'); })"#);
        assert_eq!(text, r#" () => { say('it\'s )'); }"#);
    }

    #[test]
    fn template_skip_returns_offset_after_backtick() {
        let bytes = b"`a ${b} c` rest";
        assert_eq!(skip_template(bytes, 0), 10);
    }
}
