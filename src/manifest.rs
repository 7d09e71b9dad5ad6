use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{absolute_from, relative_to};
use crate::query::ScanParameters;

/// Tool processing the bibliography databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BibliographyBackend {
    #[default]
    Bibtex,
    Bibtex8,
    Biber,
}

impl BibliographyBackend {
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Bibtex => "bibtex",
            Self::Bibtex8 => "bibtex8",
            Self::Biber => "biber",
        }
    }
}

/// Upper-cased, as the build script refers to the tool through a variable of that name
impl fmt::Display for BibliographyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable().to_uppercase())
    }
}

impl FromStr for BibliographyBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bibtex" => Ok(Self::Bibtex),
            "bibtex8" => Ok(Self::Bibtex8),
            "biber" => Ok(Self::Biber),
            other => Err(format!("unknown bibliography backend {}", other)),
        }
    }
}

/// The build dependencies of a document tree, as recovered by a scan
///
/// Directory and package collections only accept new entries; build-pass flags
/// can be raised but never lowered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    source_files: Vec<PathBuf>,
    figure_files: Vec<PathBuf>,
    duplicate_figure_files: Vec<PathBuf>,
    bibliography_files: Vec<PathBuf>,
    style_files: Vec<PathBuf>,
    class_files: Vec<PathBuf>,
    /// searched in order when resolving figures
    graphics_paths: Vec<PathBuf>,
    sub_paths: Vec<PathBuf>,
    packages: BTreeSet<String>,
    texmf_roots: Vec<PathBuf>,
    texmf_package_paths: Vec<String>,
    needs_bibliography_pass: bool,
    needs_index_pass: bool,
    needs_glossary_pass: bool,
    bibliography_backend: BibliographyBackend,
    figure_extensions: Vec<String>,
}

fn push_unique<T: PartialEq>(v: &mut Vec<T>, item: T) -> bool {
    if v.contains(&item) {
        false
    } else {
        v.push(item);
        true
    }
}

impl Manifest {
    /// An empty manifest seeded with the configured search settings
    pub fn new(parameters: &ScanParameters, base_dir: &Path) -> Self {
        let mut ret = Self {
            source_files: Vec::new(),
            figure_files: Vec::new(),
            duplicate_figure_files: Vec::new(),
            bibliography_files: Vec::new(),
            style_files: Vec::new(),
            class_files: Vec::new(),
            graphics_paths: Vec::new(),
            sub_paths: Vec::new(),
            packages: BTreeSet::new(),
            texmf_roots: parameters.texmf_roots.clone(),
            texmf_package_paths: Vec::new(),
            needs_bibliography_pass: false,
            needs_index_pass: false,
            needs_glossary_pass: false,
            bibliography_backend: parameters.default_bibliography_backend,
            figure_extensions: Vec::new(),
        };
        for p in &parameters.graphics_paths {
            ret.add_graphics_path(absolute_from(p, base_dir));
        }
        for ext in &parameters.figure_extensions {
            ret.add_figure_extension(ext);
        }
        ret
    }

    pub fn source_files(&self) -> &[PathBuf] {
        &self.source_files
    }

    pub fn figure_files(&self) -> &[PathBuf] {
        &self.figure_files
    }

    pub fn duplicate_figure_files(&self) -> &[PathBuf] {
        &self.duplicate_figure_files
    }

    pub fn bibliography_files(&self) -> &[PathBuf] {
        &self.bibliography_files
    }

    pub fn style_files(&self) -> &[PathBuf] {
        &self.style_files
    }

    pub fn class_files(&self) -> &[PathBuf] {
        &self.class_files
    }

    pub fn graphics_paths(&self) -> &[PathBuf] {
        &self.graphics_paths
    }

    pub fn sub_paths(&self) -> &[PathBuf] {
        &self.sub_paths
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    pub fn texmf_roots(&self) -> &[PathBuf] {
        &self.texmf_roots
    }

    pub fn texmf_package_paths(&self) -> &[String] {
        &self.texmf_package_paths
    }

    pub fn needs_bibliography_pass(&self) -> bool {
        self.needs_bibliography_pass
    }

    pub fn needs_index_pass(&self) -> bool {
        self.needs_index_pass
    }

    pub fn needs_glossary_pass(&self) -> bool {
        self.needs_glossary_pass
    }

    pub fn bibliography_backend(&self) -> BibliographyBackend {
        self.bibliography_backend
    }

    pub fn figure_extensions(&self) -> &[String] {
        &self.figure_extensions
    }

    pub fn add_source_file(&mut self, p: PathBuf) {
        self.source_files.push(p);
    }

    pub fn add_figure_file(&mut self, p: PathBuf) {
        self.figure_files.push(p);
    }

    pub fn add_duplicate_figure_file(&mut self, p: PathBuf) {
        self.duplicate_figure_files.push(p);
    }

    pub fn add_bibliography_file(&mut self, p: PathBuf) {
        self.bibliography_files.push(p);
    }

    pub fn add_style_file(&mut self, p: PathBuf) {
        self.style_files.push(p);
    }

    pub fn add_class_file(&mut self, p: PathBuf) {
        self.class_files.push(p);
    }

    pub fn add_graphics_path(&mut self, p: PathBuf) -> bool {
        push_unique(&mut self.graphics_paths, p)
    }

    pub fn add_sub_path(&mut self, p: PathBuf) -> bool {
        push_unique(&mut self.sub_paths, p)
    }

    pub fn add_package(&mut self, name: &str) -> bool {
        self.packages.insert(name.to_owned())
    }

    pub fn add_texmf_package_path(&mut self, p: String) -> bool {
        push_unique(&mut self.texmf_package_paths, p)
    }

    pub fn add_figure_extension(&mut self, ext: &str) -> bool {
        push_unique(&mut self.figure_extensions, ext.to_owned())
    }

    /// `\DeclareGraphicsExtensions` replaces the list wholesale
    pub fn set_figure_extensions(&mut self, extensions: Vec<String>) {
        self.figure_extensions.clear();
        for ext in extensions {
            push_unique(&mut self.figure_extensions, ext);
        }
    }

    pub fn set_bibliography_backend(&mut self, backend: BibliographyBackend) {
        self.bibliography_backend = backend;
    }

    pub fn require_bibliography_pass(&mut self) {
        self.needs_bibliography_pass = true;
    }

    pub fn require_index_pass(&mut self) {
        self.needs_index_pass = true;
    }

    pub fn require_glossary_pass(&mut self) {
        self.needs_glossary_pass = true;
    }

    /// Copy of this manifest with every file and directory path made absolute,
    /// or relative to `base_dir`
    pub fn finalize(&self, base_dir: &Path, absolute: bool) -> Manifest {
        let convert = |paths: &[PathBuf]| -> Vec<PathBuf> {
            paths
                .iter()
                .map(|p| {
                    if absolute {
                        absolute_from(p, base_dir)
                    } else {
                        relative_to(p, base_dir)
                    }
                })
                .collect()
        };

        Manifest {
            source_files: convert(&self.source_files),
            figure_files: convert(&self.figure_files),
            duplicate_figure_files: convert(&self.duplicate_figure_files),
            bibliography_files: convert(&self.bibliography_files),
            style_files: convert(&self.style_files),
            class_files: convert(&self.class_files),
            graphics_paths: convert(&self.graphics_paths),
            sub_paths: convert(&self.sub_paths),
            ..self.clone()
        }
    }
}
