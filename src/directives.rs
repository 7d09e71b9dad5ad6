//! Pattern-based recognition of the directives that contribute to the build manifest
//!
//! Only a fixed set of command forms is recognised; there is no macro expansion.

use regex::Regex;
use serde::Serialize;

use crate::braces::{extract_curly, extract_square, split_comma_separated};
use crate::common::ScanError;

// argument character classes
const OPTION: &str = r"[\w \-\.,=\\]*";
const COMMA_DIRS: &str = r"[\w \-\.,/\\]*";
const PATH: &str = r"[\w \-\./\\]*";
const EXTENSIONS: &str = r"[\w \-\.,]*";

/// How bibliography databases are declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BibliographyForm {
    /// `\bibliography{a,b}`
    Bibtex,
    /// `\addbibresource{a.bib}`, used once biblatex is loaded
    Biblatex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectiveKind {
    /// `\documentclass` or `\LoadClass`
    DocumentClass,
    /// `\usepackage` or `\RequirePackage`
    Package,
    GraphicsPath,
    GraphicsExtensions,
    /// `\includegraphics`
    Figure,
    /// `\input` or `\include`
    SubDocument,
    Bibliography(BibliographyForm),
    /// `\makeglossaries` (or the legacy `\makeglossary`)
    GlossaryInit,
}

/// A single directive invocation found in normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveMatch {
    pub kind: DirectiveKind,
    /// command name without the leading backslash
    pub command: String,
    /// optional argument, brackets included
    pub options: Option<String>,
    /// required argument, braces included
    pub argument: Option<String>,
}

impl DirectiveMatch {
    /// The content of the outermost required-argument group
    pub fn argument_text(&self) -> Result<Option<String>, ScanError> {
        match &self.argument {
            Some(arg) => Ok(extract_curly(arg)?.pop()),
            None => Ok(None),
        }
    }

    /// The required argument read as a comma-separated list of names
    pub fn names(&self) -> Result<Vec<String>, ScanError> {
        Ok(self
            .argument_text()?
            .map(|t| split_comma_separated(&t))
            .unwrap_or_default())
    }

    /// The directory groups of a `\graphicspath{{a/}{b/}}` argument
    pub fn directories(&self) -> Result<Vec<String>, ScanError> {
        let groups = match &self.argument {
            Some(arg) => extract_curly(arg)?,
            None => return Ok(Vec::new()),
        };
        Ok(groups
            .iter()
            .filter(|g| !g.contains('{') && !g.contains('}'))
            .map(|g| g.trim().to_owned())
            .filter(|g| !g.is_empty())
            .collect())
    }

    /// The optional argument read as a comma-separated list
    pub fn option_list(&self) -> Result<Vec<String>, ScanError> {
        match &self.options {
            Some(opt) => Ok(extract_square(opt)?
                .pop()
                .map(|t| split_comma_separated(&t))
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}

/// The compiled recognition rules, one per directive kind
pub struct DirectiveTable {
    rules: Vec<(DirectiveKind, Regex)>,
}

impl DirectiveTable {
    pub fn new() -> Result<Self, ScanError> {
        let sources = [
            (
                DirectiveKind::DocumentClass,
                [
                    r"\\(?P<cmd>documentclass|LoadClass)(?P<opt>\[",
                    OPTION,
                    r"\])?(?P<arg>\{",
                    COMMA_DIRS,
                    r"\})",
                ]
                .concat(),
            ),
            (
                DirectiveKind::Package,
                [
                    r"\\(?P<cmd>usepackage|RequirePackage)(?P<opt>\[",
                    OPTION,
                    r"\])?(?P<arg>\{",
                    COMMA_DIRS,
                    r"\})",
                ]
                .concat(),
            ),
            (
                DirectiveKind::GraphicsPath,
                [r"\\(?P<cmd>graphicspath)(?P<arg>\{(?:\{", PATH, r"\}|\s)*\})"].concat(),
            ),
            (
                DirectiveKind::GraphicsExtensions,
                [r"\\(?P<cmd>DeclareGraphicsExtensions)(?P<arg>\{", EXTENSIONS, r"\})"].concat(),
            ),
            (
                DirectiveKind::Figure,
                [
                    r"\\(?P<cmd>includegraphics)\*?(?P<opt>\[",
                    OPTION,
                    r"\])?\s*(?P<arg>\{",
                    PATH,
                    r"\})",
                ]
                .concat(),
            ),
            (
                DirectiveKind::SubDocument,
                [r"\\(?P<cmd>include|input)(?P<arg>\{", PATH, r"\})"].concat(),
            ),
            (
                DirectiveKind::Bibliography(BibliographyForm::Bibtex),
                [r"\\(?P<cmd>bibliography)(?P<arg>\{", COMMA_DIRS, r"\})"].concat(),
            ),
            (
                DirectiveKind::Bibliography(BibliographyForm::Biblatex),
                [
                    r"\\(?P<cmd>addbibresource)(?P<opt>\[",
                    OPTION,
                    r"\])?(?P<arg>\{",
                    COMMA_DIRS,
                    r"\})",
                ]
                .concat(),
            ),
            (
                DirectiveKind::GlossaryInit,
                r"\\(?P<cmd>makeglossaries|makeglossary)\b".to_owned(),
            ),
        ];

        let rules = sources
            .into_iter()
            .map(|(kind, src)| Ok((kind, Regex::new(&src)?)))
            .collect::<Result<Vec<_>, ScanError>>()?;
        Ok(Self { rules })
    }

    fn rule(&self, kind: DirectiveKind) -> Option<&Regex> {
        self.rules.iter().find(|(k, _)| *k == kind).map(|(_, re)| re)
    }

    /// All invocations of the given directive kind, in order of appearance
    pub fn find(&self, kind: DirectiveKind, text: &str) -> Vec<DirectiveMatch> {
        let re = match self.rule(kind) {
            Some(re) => re,
            None => return Vec::new(),
        };
        re.captures_iter(text)
            .map(|c| DirectiveMatch {
                kind,
                command: c.name("cmd").map(|m| m.as_str().to_owned()).unwrap_or_default(),
                options: c.name("opt").map(|m| m.as_str().to_owned()),
                argument: c.name("arg").map(|m| m.as_str().to_owned()),
            })
            .collect()
    }
}
