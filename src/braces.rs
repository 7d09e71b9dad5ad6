//! Extraction of balanced delimiter groups from free-form TeX text
//!
//! A delimiter is escaped when the character right before it is a backslash. The first
//! character of the text being searched is never considered escaped.

use crate::common::{DelimiterFault, ScanError};

/// Find the first occurrence of `symbol` in `text` that is not preceded by a backslash
pub fn find_unescaped(text: &str, symbol: &str) -> Option<usize> {
    if symbol.is_empty() {
        return None;
    }
    let mut offset = 0;
    loop {
        let rest = &text[offset..];
        let idx = rest.find(symbol)?;
        if idx > 0 && rest.as_bytes()[idx - 1] == b'\\' {
            offset += idx + symbol.len();
            if offset >= text.len() {
                return None;
            }
        } else {
            return Some(offset + idx);
        }
    }
}

/// next unescaped occurrence of `symbol` strictly after the one at `pos`
fn find_unescaped_after(text: &str, symbol: &str, pos: usize) -> Option<usize> {
    let start = pos + symbol.len();
    if start >= text.len() {
        return None;
    }
    find_unescaped(&text[start..], symbol).map(|i| i + start)
}

fn malformed(text: &str, open: &str, close: &str, reason: DelimiterFault) -> ScanError {
    ScanError::MalformedDelimiters {
        text: text.to_owned(),
        open: open.to_owned(),
        close: close.to_owned(),
        reason,
    }
}

/// Extract the content of every balanced `open`/`close` group in `text`
///
/// Groups are returned in the order their closing symbol appears, so a nested group
/// comes before the group containing it:
///
/// ```
/// # use texdeps::braces::extract_balanced;
/// let groups = extract_balanced("a{b{c}d}e", "{", "}").unwrap();
/// assert_eq!(groups, vec!["c", "b{c}d"]);
/// ```
///
/// A closing symbol with no open group, or one that precedes the innermost open group,
/// is an error. Groups left open at the end of the text are dropped, unless the text
/// contains a closing symbol somewhere, in which case they are reported as unbalanced.
pub fn extract_balanced(text: &str, open: &str, close: &str) -> Result<Vec<String>, ScanError> {
    let mut output = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    let mut next_open = find_unescaped(text, open);
    let mut next_close = find_unescaped(text, close);

    loop {
        match (stack.last().copied(), next_open, next_close) {
            (None, None, None) => break,
            (None, None, Some(_)) => {
                return Err(malformed(text, open, close, DelimiterFault::Unbalanced));
            }
            (None, Some(l), _) | (Some(_), Some(l), None) => {
                stack.push(l);
                next_open = find_unescaped_after(text, open, l);
            }
            // nest deeper while the next opening comes before the pending closing
            (Some(_), Some(l), Some(r)) if l < r => {
                stack.push(l);
                next_open = find_unescaped_after(text, open, l);
            }
            (Some(top), _, Some(r)) => {
                if top >= r {
                    return Err(malformed(text, open, close, DelimiterFault::CloseBeforeOpen));
                }
                stack.pop();
                output.push(text[top + open.len()..r].to_owned());
                next_close = find_unescaped_after(text, close, r);
            }
            (Some(_), None, None) => {
                if find_unescaped(text, close).is_some() {
                    return Err(malformed(text, open, close, DelimiterFault::Unbalanced));
                }
                break;
            }
        }
    }

    Ok(output)
}

pub fn extract_curly(text: &str) -> Result<Vec<String>, ScanError> {
    extract_balanced(text, "{", "}")
}

pub fn extract_square(text: &str) -> Result<Vec<String>, ScanError> {
    extract_balanced(text, "[", "]")
}

/// Split a comma-separated argument, trimming every entry and dropping empty ones
pub fn split_comma_separated(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split a `key=value` option at the first `=`; flag-style options yield None
pub fn split_key_value(option: &str) -> Option<(String, String)> {
    option
        .split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
}
