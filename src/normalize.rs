//! Flattening of TeX sources before directive matching
//!
//! Comments and blank lines are removed, and arguments that span several physical
//! lines are joined so that every directive invocation sits on a single line.

use regex::Regex;

use crate::common::ScanError;

/// The compiled rewriting passes, built once per scan
pub struct Normalizer {
    line_break: Regex,
    comment: Regex,
    leading_blank: Regex,
    comma_ended_line: Regex,
    /// (pattern, replacement) pairs joining delimiters with their continuation
    joins: Vec<(Regex, &'static str)>,
}

impl Normalizer {
    pub fn new() -> Result<Self, ScanError> {
        let joins = [
            (r"\{\s+", "{"),
            (r"\s+\}", "}"),
            (r"\[\s+", "["),
            (r"\s+\]", "]"),
            (r"\]\s+\{", "]{"),
            (r"\}\s+\{", "}{"),
            (r"\]\s+\[", "]["),
            (r"\}\s+\[", "}["),
        ]
        .iter()
        .map(|(p, r)| Ok((Regex::new(p)?, *r)))
        .collect::<Result<Vec<_>, ScanError>>()?;

        Ok(Self {
            line_break: Regex::new(r"\\\\")?,
            // the character before the marker is kept through the capture
            comment: Regex::new(r"(?m)(^|[^\\])%.*$")?,
            leading_blank: Regex::new(r"(?m)^\s+")?,
            comma_ended_line: Regex::new(r",\s+")?,
            joins,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let text = self.line_break.replace_all(raw, "");
        let text = self.comment.replace_all(&text, "${1}");
        let text = self.leading_blank.replace_all(&text, "");
        let mut text = self.comma_ended_line.replace_all(&text, ",").into_owned();
        for (re, replacement) in &self.joins {
            text = re.replace_all(&text, *replacement).into_owned();
        }
        text
    }
}
