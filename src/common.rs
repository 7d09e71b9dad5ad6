use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Why a delimiter group could not be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DelimiterFault {
    /// a closing symbol without any open group
    Unbalanced,
    /// the innermost open group starts after the closing symbol
    CloseBeforeOpen,
}

impl fmt::Display for DelimiterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbalanced => write!(f, "unbalanced"),
            Self::CloseBeforeOpen => write!(f, "closing symbol appears before opening symbol"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("In string '{text}': {reason} {open}{close}")]
    MalformedDelimiters {
        text: String,
        open: String,
        close: String,
        reason: DelimiterFault,
    },

    #[error("The file {0:?} does not exist")]
    EntryFileNotFound(PathBuf),

    #[error("The path {0:?} is a directory, not a TeX document")]
    InvalidEntryFile(PathBuf),

    #[error("{0} is not in your PATH")]
    MissingBuildTool(String),

    #[error("While scanning {file:?}: {source}")]
    InDocument {
        file: PathBuf,
        source: Box<ScanError>,
    },

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    RegexError(#[from] regex::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl ScanError {
    /// attach the document being scanned, unless a deeper frame already did
    pub(crate) fn in_document<P: AsRef<Path>>(self, file: P) -> Self {
        match self {
            e @ Self::InDocument { .. } => e,
            e => Self::InDocument {
                file: file.as_ref().to_owned(),
                source: Box::new(e),
            },
        }
    }

    /// the error at the bottom of the chain of document frames
    pub fn root_cause(&self) -> &ScanError {
        match self {
            Self::InDocument { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

pub fn path_to_string<P: AsRef<Path>>(p: P) -> String {
    p.as_ref()
        .to_str()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{:?}", p.as_ref()))
}

/// Strip the verbatim prefix that canonicalize adds on Windows
pub fn decanonicalize(s: &str) -> String {
    s.strip_prefix(r"\\?\").unwrap_or(s).to_owned()
}

pub fn readable_canonical_path<P: AsRef<Path>>(p: P) -> Result<String, ScanError> {
    Ok(decanonicalize(&path_to_string(fs_err::canonicalize(p.as_ref())?)))
}

/// Make a path absolute with respect to `base`, folding `.` and `..` lexically
pub fn absolute_from<P: AsRef<Path>, Q: AsRef<Path>>(p: P, base: Q) -> PathBuf {
    let joined = if p.as_ref().is_absolute() {
        p.as_ref().to_owned()
    } else {
        base.as_ref().join(p.as_ref())
    };
    let mut ret = PathBuf::new();
    for c in joined.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => match ret.components().next_back() {
                Some(Component::Normal(_)) => {
                    ret.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => ret.push(c),
            },
            c => ret.push(c),
        }
    }
    ret
}

/// Express `p` relative to `base`, climbing with `..` where the two diverge
///
/// Both paths are made absolute against `base` first. If they live on different
/// prefixes (e.g. different drives) the absolute path is returned.
pub fn relative_to<P: AsRef<Path>, Q: AsRef<Path>>(p: P, base: Q) -> PathBuf {
    let base = absolute_from(base.as_ref(), base.as_ref());
    let target = absolute_from(p, &base);

    let mut target_components = target.components().peekable();
    let mut base_components = base.components().peekable();

    if target_components.peek() != base_components.peek() {
        return target;
    }

    while let (Some(t), Some(b)) = (target_components.peek(), base_components.peek()) {
        if t != b {
            break;
        }
        target_components.next();
        base_components.next();
    }

    let mut ret: PathBuf = base_components.map(|_| Component::ParentDir).collect();
    ret.extend(target_components);
    if ret.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_folded() {
        assert_eq!(
            absolute_from("./figs/../plot.pdf", "/doc"),
            PathBuf::from("/doc/plot.pdf")
        );
        assert_eq!(absolute_from("/etc/./x", "/doc"), PathBuf::from("/etc/x"));
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_to("/doc/figs/plot.pdf", "/doc"), PathBuf::from("figs/plot.pdf"));
        assert_eq!(relative_to("/doc", "/doc"), PathBuf::from("."));
        assert_eq!(relative_to("/shared/refs.bib", "/doc/thesis"), PathBuf::from("../../shared/refs.bib"));
        assert_eq!(relative_to("figs/plot.pdf", "/doc"), PathBuf::from("figs/plot.pdf"));
    }

    #[test]
    fn document_frames() {
        let e = ScanError::MissingBuildTool("make".to_owned())
            .in_document("appendix.tex")
            .in_document("main.tex");
        match &e {
            ScanError::InDocument { file, .. } => assert_eq!(file, &PathBuf::from("appendix.tex")),
            _ => panic!("expected a document frame"),
        }
        assert!(matches!(e.root_cause(), ScanError::MissingBuildTool(_)));
    }

    #[test]
    fn decanonicalized() {
        assert_eq!(decanonicalize(r"\\?\C:\Windows"), r"C:\Windows");
        assert_eq!(decanonicalize("/usr/share"), "/usr/share");
    }
}
