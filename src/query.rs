//! Data structures that must be filled with the input and the parameters for a dependency scan

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::common::ScanError;
use crate::manifest::BibliographyBackend;

/// The TeX engine the generated build will run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TexEngine {
    Latex,
    #[default]
    PdfLatex,
    LuaLatex,
    XeLatex,
}

impl TexEngine {
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Latex => "latex",
            Self::PdfLatex => "pdflatex",
            Self::LuaLatex => "lualatex",
            Self::XeLatex => "xelatex",
        }
    }

    /// Whether the engine writes PDF directly (as opposed to DVI)
    pub fn is_pdf_producing(&self) -> bool {
        !matches!(self, Self::Latex)
    }
}

impl fmt::Display for TexEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable())
    }
}

impl FromStr for TexEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latex" => Ok(Self::Latex),
            "pdflatex" => Ok(Self::PdfLatex),
            "lualatex" => Ok(Self::LuaLatex),
            "xelatex" => Ok(Self::XeLatex),
            other => Err(format!("unknown TeX engine {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanTarget {
    /// Path to the top-level document
    pub entry_file: PathBuf,
    /// Project root; relative names found in documents are resolved against it
    pub base_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParameters {
    /// Report file paths as absolute instead of relative to the project root
    pub use_absolute_file_paths: bool,
    /// Report tools by their absolute location instead of their name
    pub use_absolute_executable_paths: bool,
    pub verbose: bool,
    pub tex_engine: TexEngine,
    /// External package trees, searched in order after the project tree
    pub texmf_roots: Vec<PathBuf>,
    /// Glob patterns of names left out of captured texmf packages
    pub texmf_exclude: Vec<String>,
    pub graphics_paths: Vec<PathBuf>,
    pub figure_extensions: Vec<String>,
    /// Suffixes of converted figures, tried only when nothing else matches
    pub figure_fallback_suffixes: Vec<String>,
    pub default_bibliography_backend: BibliographyBackend,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            use_absolute_file_paths: false,
            use_absolute_executable_paths: false,
            verbose: false,
            tex_engine: TexEngine::default(),
            texmf_roots: detect_texmf_roots(),
            texmf_exclude: vec![".DS_Store".to_owned()],
            graphics_paths: vec![PathBuf::from(".")],
            figure_extensions: [".pdf", ".png", ".jpg", ".jpeg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            figure_fallback_suffixes: vec!["-converted-to.pdf".to_owned()],
            default_bibliography_backend: BibliographyBackend::default(),
        }
    }
}

impl ScanParameters {
    /// Load parameters from a JSON file; missing fields take their default value
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut ret: Self = serde_json::from_str(&content)?;
        ret.texmf_roots = ret.texmf_roots.iter().map(expand_home).collect();
        ret.graphics_paths = ret.graphics_paths.iter().map(expand_home).collect();
        Ok(ret)
    }

    pub fn texmf_exclude_patterns(&self) -> Result<Vec<glob::Pattern>, ScanError> {
        self.texmf_exclude
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    ScanError::ParameterError(format!("invalid texmf exclusion pattern {}: {}", p, e))
                })
            })
            .collect()
    }
}

/// Replace a leading `~` with the home directory of the current user
pub fn expand_home<P: AsRef<Path>>(p: P) -> PathBuf {
    let p = p.as_ref();
    match (p.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => p.to_owned(),
    }
}

/// The conventional user and site texmf trees that exist on this machine
pub fn detect_texmf_roots() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("Library").join("texmf"));
    }
    candidates.push(PathBuf::from("/usr/local/texlive/texmf-local"));
    candidates.into_iter().filter(|p| p.is_dir()).collect()
}

/// Everything a scan needs: what to scan and how
#[derive(Clone, Debug)]
pub struct ScanQuery {
    pub target: ScanTarget,
    pub parameters: ScanParameters,
}

impl ScanQuery {
    /// autodetects the settings with sensible defaults
    ///
    /// The entry file is taken literally if it exists, otherwise with `.tex` appended.
    /// The project root will be set to the directory containing the entry file.
    pub fn deduce_from_entry_file<P: AsRef<Path>>(entry_file: P) -> Result<Self, ScanError> {
        let given = entry_file.as_ref();
        let entry_file = if given.is_dir() {
            return Err(ScanError::InvalidEntryFile(given.to_owned()));
        } else if given.is_file() {
            given.to_owned()
        } else {
            let mut with_ext = OsString::from(given.as_os_str());
            with_ext.push(".tex");
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                with_ext
            } else {
                return Err(ScanError::EntryFileNotFound(given.to_owned()));
            }
        };

        let entry_file = fs::canonicalize(entry_file)?;
        let base_dir = entry_file
            .parent()
            .ok_or_else(|| ScanError::InvalidEntryFile(entry_file.clone()))?
            .to_owned();

        Ok(Self {
            target: ScanTarget {
                entry_file,
                base_dir,
            },
            parameters: ScanParameters::default(),
        })
    }
}
