use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::braces::split_key_value;
use crate::common::{absolute_from, path_to_string, ScanError};
use crate::directives::{BibliographyForm, DirectiveKind, DirectiveTable};
use crate::manifest::{BibliographyBackend, Manifest};
use crate::normalize::Normalizer;
use crate::query::{ScanParameters, ScanQuery};
use crate::resolver::{DefinitionKind, Resolver};
use crate::tools::ToolLocator;

/// What kind of name a document referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    Class,
    Style,
    Figure,
    Bibliography,
    SubDocument,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Class => "class",
            Self::Style => "style",
            Self::Figure => "figure",
            Self::Bibliography => "bibliography",
            Self::SubDocument => "tex file",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    UnresolvedReference { kind: ReferenceKind, name: String },
    InvalidGraphicsPath(String),
    UnavailableBackend(String),
    CircularInclusion(PathBuf),
}

/// A problem that did not stop the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// the document containing the offending directive
    pub file: PathBuf,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "In \"{}\": ", path_to_string(&self.file))?;
        match &self.kind {
            DiagnosticKind::UnresolvedReference { kind, name } => {
                write!(f, "{} not found: \"{}\"", kind, name)
            }
            DiagnosticKind::InvalidGraphicsPath(p) => write!(f, "\"{}\" is not a valid graphicspath", p),
            DiagnosticKind::UnavailableBackend(b) => {
                write!(f, "the bibliography backend \"{}\" cannot be found", b)
            }
            DiagnosticKind::CircularInclusion(p) => {
                write!(f, "circular inclusion of \"{}\" skipped", path_to_string(p))
            }
        }
    }
}

/// The outcome of a successful scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub manifest: Manifest,
    pub diagnostics: Vec<Diagnostic>,
}

/// How a scanned file contributes to the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileRole {
    Document,
    Definition,
}

/// Builds the manifest of a document tree, following inclusions depth-first
pub(crate) struct Scanner<'a> {
    parameters: ScanParameters,
    entry_file: PathBuf,
    tools: &'a dyn ToolLocator,
    normalizer: Normalizer,
    directives: DirectiveTable,
    resolver: Resolver,
    manifest: Manifest,
    visited: HashSet<PathBuf>, // canonical paths
    active: Vec<PathBuf>,      // canonical paths of the files being scanned, outermost first
    current: Vec<PathBuf>,     // same files, as resolved
    diagnostics: Vec<Diagnostic>,
    bibliography_form: BibliographyForm,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(query: &ScanQuery, tools: &'a dyn ToolLocator) -> Result<Self, ScanError> {
        let parameters = query.parameters.clone();
        let base_dir = query.target.base_dir.clone();
        let resolver = Resolver::new(
            base_dir.clone(),
            parameters.texmf_roots.clone(),
            parameters.texmf_exclude_patterns()?,
        );
        Ok(Self {
            manifest: Manifest::new(&parameters, &base_dir),
            entry_file: absolute_from(&query.target.entry_file, &base_dir),
            parameters,
            tools,
            normalizer: Normalizer::new()?,
            directives: DirectiveTable::new()?,
            resolver,
            visited: HashSet::new(),
            active: Vec::new(),
            current: Vec::new(),
            diagnostics: Vec::new(),
            bibliography_form: BibliographyForm::Bibtex,
        })
    }

    pub(crate) fn run(mut self) -> Result<ScanReport, ScanError> {
        if !self.entry_file.is_file() {
            return Err(ScanError::EntryFileNotFound(self.entry_file));
        }
        let entry_file = self.entry_file.clone();
        self.scan_file(&entry_file, FileRole::Document)?;

        let manifest = self.manifest.finalize(
            self.resolver.base_dir(),
            self.parameters.use_absolute_file_paths,
        );
        Ok(ScanReport {
            manifest,
            diagnostics: self.diagnostics,
        })
    }

    fn report(&mut self, kind: DiagnosticKind) {
        let file = self
            .current
            .last()
            .cloned()
            .unwrap_or_else(|| self.entry_file.clone());
        let diagnostic = Diagnostic { file, kind };
        match &diagnostic.kind {
            // classes and styles usually live in the TeX distribution
            DiagnosticKind::UnresolvedReference {
                kind: ReferenceKind::Class | ReferenceKind::Style,
                ..
            } => debug!("{}", diagnostic),
            _ => warn!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    fn unresolved(&mut self, kind: ReferenceKind, name: &str) {
        self.report(DiagnosticKind::UnresolvedReference {
            kind,
            name: name.to_owned(),
        });
    }

    fn scan_file(&mut self, path: &Path, role: FileRole) -> Result<(), ScanError> {
        let canonical = fs::canonicalize(path).map_err(|e| ScanError::from(e).in_document(path))?;

        if self.active.contains(&canonical) {
            self.report(DiagnosticKind::CircularInclusion(path.to_owned()));
            return Ok(());
        }
        if !self.visited.insert(canonical.clone()) {
            debug!("{} was already scanned", path_to_string(path));
            return Ok(());
        }

        info!("scanning {}", path_to_string(path));
        if role == FileRole::Document {
            self.manifest.add_source_file(path.to_owned());
        }

        self.active.push(canonical);
        self.current.push(path.to_owned());
        let result = self.scan_content(path);
        self.current.pop();
        self.active.pop();

        result.map_err(|e| e.in_document(path))
    }

    fn scan_content(&mut self, path: &Path) -> Result<(), ScanError> {
        let raw = fs::read(path)?;
        let text = self.normalizer.normalize(&String::from_utf8_lossy(&raw));

        // packages come first: their side effects change how later directives are read
        self.scan_classes(&text)?;
        self.scan_packages(&text)?;
        self.scan_graphics_paths(&text)?;
        self.scan_graphics_extensions(&text)?;
        self.scan_figures(&text)?;
        self.scan_bibliographies(&text)?;
        self.scan_glossary(&text);
        self.scan_sub_documents(&text)
    }

    /// Record a style or class definition, scanning it when it belongs to the project
    ///
    /// Classes may also be provided as styles by older documents.
    fn resolve_definition(&mut self, name: &str, kind: DefinitionKind) -> Result<(), ScanError> {
        let candidates: &[DefinitionKind] = match kind {
            DefinitionKind::Class => &[DefinitionKind::Class, DefinitionKind::Style],
            DefinitionKind::Style => &[DefinitionKind::Style],
        };

        for candidate in candidates {
            if let Some(p) = self.resolver.resolve_local(name, *candidate)? {
                match candidate {
                    DefinitionKind::Class => self.manifest.add_class_file(p.clone()),
                    DefinitionKind::Style => self.manifest.add_style_file(p.clone()),
                }
                return self.scan_file(&p, FileRole::Definition);
            }
        }

        for candidate in candidates {
            if let Some(m) = self.resolver.resolve_texmf(name, *candidate)? {
                debug!("{} found in texmf tree at {}", name, path_to_string(&m.path));
                for p in m.package_paths {
                    self.manifest.add_texmf_package_path(p);
                }
                return Ok(());
            }
        }

        let reference = match kind {
            DefinitionKind::Class => ReferenceKind::Class,
            DefinitionKind::Style => ReferenceKind::Style,
        };
        self.unresolved(reference, name);
        Ok(())
    }

    fn scan_classes(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::DocumentClass, text) {
            if let Some(name) = m.names()?.into_iter().next() {
                self.resolve_definition(&name, DefinitionKind::Class)?;
            }
        }
        Ok(())
    }

    fn scan_packages(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::Package, text) {
            let options = m.option_list()?;
            for package in m.names()? {
                self.manifest.add_package(&package);
                self.resolve_definition(&package, DefinitionKind::Style)?;
                self.apply_package_side_effects(&package, &options);
            }
        }
        Ok(())
    }

    fn apply_package_side_effects(&mut self, package: &str, options: &[String]) {
        match package {
            "biblatex" => {
                self.bibliography_form = BibliographyForm::Biblatex;
                let backend = options
                    .iter()
                    .filter_map(|o| split_key_value(o))
                    .filter(|(k, _)| k == "backend")
                    .map(|(_, v)| v)
                    .last();
                if let Some(backend) = backend {
                    self.select_backend(&backend);
                }
            }
            "epstopdf" => {
                if self.parameters.tex_engine.is_pdf_producing() {
                    self.manifest.add_figure_extension(".eps");
                }
            }
            "makeidx" => self.manifest.require_index_pass(),
            _ => {}
        }
    }

    fn select_backend(&mut self, name: &str) {
        match name.parse::<BibliographyBackend>() {
            Ok(backend) if self.tools.exists(backend.executable()) => {
                debug!("using bibliography backend {}", backend);
                self.manifest.set_bibliography_backend(backend);
            }
            _ => self.report(DiagnosticKind::UnavailableBackend(name.to_owned())),
        }
    }

    fn scan_graphics_paths(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::GraphicsPath, text) {
            for dir in m.directories()? {
                let p = absolute_from(&dir, self.resolver.base_dir());
                if p.is_dir() {
                    self.manifest.add_graphics_path(p.clone());
                    self.manifest.add_sub_path(p);
                } else {
                    self.report(DiagnosticKind::InvalidGraphicsPath(dir));
                }
            }
        }
        Ok(())
    }

    fn scan_graphics_extensions(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::GraphicsExtensions, text) {
            let extensions = m.names()?;
            if !extensions.is_empty() {
                self.manifest.set_figure_extensions(extensions);
            }
        }
        Ok(())
    }

    fn scan_figures(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::Figure, text) {
            let name = match m.argument_text()? {
                Some(name) if !name.trim().is_empty() => name.trim().to_owned(),
                _ => continue,
            };
            let resolution = self.resolver.resolve_figure(
                &name,
                self.manifest.graphics_paths(),
                self.manifest.figure_extensions(),
                &self.parameters.figure_fallback_suffixes,
            )?;
            match resolution.primary() {
                Some(p) => {
                    self.manifest.add_figure_file(p.clone());
                    for d in resolution.duplicates() {
                        debug!("figure {} is also satisfied by {}", name, path_to_string(d));
                        self.manifest.add_duplicate_figure_file(d.clone());
                    }
                }
                None => self.unresolved(ReferenceKind::Figure, &name),
            }
        }
        Ok(())
    }

    fn scan_bibliographies(&mut self, text: &str) -> Result<(), ScanError> {
        let found = self
            .directives
            .find(DirectiveKind::Bibliography(self.bibliography_form), text);
        if found.is_empty() {
            return Ok(());
        }
        self.manifest.require_bibliography_pass();
        for m in found {
            for key in m.names()? {
                match self.resolver.resolve_bibliography(&key)? {
                    Some(p) => self.manifest.add_bibliography_file(p),
                    None => self.unresolved(ReferenceKind::Bibliography, &key),
                }
            }
        }
        Ok(())
    }

    fn scan_glossary(&mut self, text: &str) {
        let modern = self.manifest.has_package("glossaries");
        let legacy = self.manifest.has_package("glossary");
        if !modern && !legacy {
            return;
        }
        let initialized = self
            .directives
            .find(DirectiveKind::GlossaryInit, text)
            .iter()
            .any(|m| m.command == "makeglossaries" || (legacy && m.command == "makeglossary"));
        if initialized {
            self.manifest.require_glossary_pass();
        }
    }

    fn scan_sub_documents(&mut self, text: &str) -> Result<(), ScanError> {
        for m in self.directives.find(DirectiveKind::SubDocument, text) {
            let name = match m.argument_text()? {
                Some(name) if !name.trim().is_empty() => name.trim().to_owned(),
                _ => continue,
            };
            match self.resolver.resolve_document(&name)? {
                Some(p) => {
                    if let Some(parent) = p.parent() {
                        if parent != self.resolver.base_dir() {
                            self.manifest.add_sub_path(parent.to_owned());
                        }
                    }
                    self.scan_file(&p, FileRole::Document)?;
                }
                None => self.unresolved(ReferenceKind::SubDocument, &name),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DelimiterFault;
    use crate::query::TexEngine;
    use crate::tools::FakeTools;

    fn write<P: AsRef<Path>>(p: P, content: &str) {
        if let Some(parent) = p.as_ref().parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(p, content).unwrap();
    }

    fn query_for(entry: &Path) -> Result<ScanQuery, ScanError> {
        let mut query = ScanQuery::deduce_from_entry_file(entry)?;
        query.parameters.texmf_roots = Vec::new();
        query.parameters.use_absolute_file_paths = true;
        Ok(query)
    }

    fn scan_with(query: &ScanQuery, tools: &FakeTools) -> Result<ScanReport, ScanError> {
        Scanner::new(query, tools)?.run()
    }

    fn warnings(report: &ScanReport) -> Vec<&Diagnostic> {
        report
            .diagnostics
            .iter()
            .filter(|d| {
                !matches!(
                    d.kind,
                    DiagnosticKind::UnresolvedReference {
                        kind: ReferenceKind::Class | ReferenceKind::Style,
                        ..
                    }
                )
            })
            .collect()
    }

    #[test]
    fn two_file_document() -> Result<(), ScanError> {
        let d = fs::canonicalize(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_data/two_file_doc"),
        )?;
        let query = query_for(&d.join("main.tex"))?;
        let report = scan_with(&query, &FakeTools::new(&[]))?;
        let m = &report.manifest;

        assert_eq!(m.source_files(), &[d.join("main.tex"), d.join("appendix.tex")]);
        assert_eq!(m.graphics_paths(), &[d.clone(), d.join("figs")]);
        assert_eq!(m.figure_files(), &[d.join("figs/plot.pdf"), d.join("figs/plot2.png")]);
        assert!(m.duplicate_figure_files().is_empty());
        assert_eq!(m.bibliography_files(), &[d.join("refs.bib")]);
        assert!(m.needs_bibliography_pass());
        assert!(!m.needs_index_pass());
        assert!(m.has_package("amsmath"));
        assert_eq!(m.sub_paths(), &[d.join("figs")]);
        assert!(warnings(&report).is_empty());
        assert!(report.diagnostics.contains(&Diagnostic {
            file: d.join("main.tex"),
            kind: DiagnosticKind::UnresolvedReference {
                kind: ReferenceKind::Class,
                name: "article".to_owned()
            }
        }));
        Ok(())
    }

    #[test]
    fn relative_output() -> Result<(), ScanError> {
        let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_data/two_file_doc");
        let mut query = query_for(&d.join("main.tex"))?;
        query.parameters.use_absolute_file_paths = false;
        let report = scan_with(&query, &FakeTools::new(&[]))?;
        let m = &report.manifest;
        assert_eq!(
            m.source_files(),
            &[PathBuf::from("main.tex"), PathBuf::from("appendix.tex")]
        );
        assert_eq!(m.graphics_paths(), &[PathBuf::from("."), PathBuf::from("figs")]);
        assert_eq!(m.figure_files()[0], PathBuf::from("figs/plot.pdf"));
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_dependencies_are_resolved() -> Result<(), ScanError> {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir()?;
        let root = fs::canonicalize(tmp.path())?;
        let shared = root.join("shared");
        let base = root.join("proj");
        write(shared.join("refs.bib"), "");
        write(shared.join("plot.pdf"), "");
        write(shared.join("chap.tex"), "\\includegraphics{plot}\n");
        write(
            base.join("main.tex"),
            "\\input{chap}\n\\includegraphics{plot}\n\\bibliography{refs}\n",
        );
        for name in ["refs.bib", "plot.pdf", "chap.tex"] {
            symlink(shared.join(name), base.join(name))?;
        }

        let report = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]))?;
        let m = &report.manifest;
        assert_eq!(m.source_files(), &[base.join("main.tex"), base.join("chap.tex")]);
        assert_eq!(m.figure_files(), &[base.join("plot.pdf"), base.join("plot.pdf")]);
        assert_eq!(m.bibliography_files(), &[base.join("refs.bib")]);
        assert!(warnings(&report).is_empty());
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn unreadable_directory_does_not_abort_the_scan() -> Result<(), ScanError> {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("main.tex"), "\\usepackage{amsmath}\n\\input{intro}\n");
        write(base.join("intro.tex"), "");
        std::fs::create_dir_all(base.join("private"))?;
        std::fs::set_permissions(base.join("private"), std::fs::Permissions::from_mode(0o000))?;

        let report = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]));

        std::fs::set_permissions(base.join("private"), std::fs::Permissions::from_mode(0o755))?;

        let report = report?;
        assert_eq!(
            report.manifest.source_files(),
            &[base.join("main.tex"), base.join("intro.tex")]
        );
        assert!(report.manifest.has_package("amsmath"));
        Ok(())
    }

    #[test]
    fn circular_inclusions_are_reported_once() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("main.tex"), "\\input{chap}\n\\input{chap}\n");
        write(base.join("chap.tex"), "\\input{main}\n\\input{chap}\n");

        let report = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]))?;
        assert_eq!(
            report.manifest.source_files(),
            &[base.join("main.tex"), base.join("chap.tex")]
        );
        let circular: Vec<&DiagnosticKind> = report
            .diagnostics
            .iter()
            .map(|d| &d.kind)
            .filter(|k| matches!(k, DiagnosticKind::CircularInclusion(_)))
            .collect();
        assert_eq!(
            circular,
            vec![
                &DiagnosticKind::CircularInclusion(base.join("main.tex")),
                &DiagnosticKind::CircularInclusion(base.join("chap.tex")),
            ]
        );
        Ok(())
    }

    #[test]
    fn biblatex_backend_is_adopted_when_available() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(
            base.join("main.tex"),
            "\\usepackage[style=ieee,\n  backend=biber]{biblatex}\n\\addbibresource{refs.bib}\n\\bibliography{ignored}\n",
        );
        write(base.join("refs.bib"), "");
        let query = query_for(&base.join("main.tex"))?;

        let report = scan_with(&query, &FakeTools::new(&["biber"]))?;
        assert_eq!(report.manifest.bibliography_backend(), BibliographyBackend::Biber);
        assert_eq!(report.manifest.bibliography_files(), &[base.join("refs.bib")]);
        assert!(report.manifest.needs_bibliography_pass());
        assert!(warnings(&report).is_empty());

        let report = scan_with(&query, &FakeTools::new(&[]))?;
        assert_eq!(report.manifest.bibliography_backend(), BibliographyBackend::Bibtex);
        assert_eq!(report.manifest.bibliography_files(), &[base.join("refs.bib")]);
        assert_eq!(
            warnings(&report)[0].kind,
            DiagnosticKind::UnavailableBackend("biber".to_owned())
        );
        Ok(())
    }

    #[test]
    fn later_packages_do_not_change_earlier_bibliographies() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("main.tex"), "\\bibliography{refs}\n\\input{late}\n");
        write(
            base.join("late.tex"),
            "\\usepackage{biblatex}\n\\addbibresource{other.bib}\n\\bibliography{refs}\n",
        );
        write(base.join("refs.bib"), "");
        write(base.join("other.bib"), "");

        let report = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]))?;
        assert_eq!(
            report.manifest.bibliography_files(),
            &[base.join("refs.bib"), base.join("other.bib")]
        );
        Ok(())
    }

    #[test]
    fn package_side_effects() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(
            base.join("main.tex"),
            "\\usepackage{epstopdf,makeidx}\n\\usepackage{glossaries}\n\\makeglossaries\n\\includegraphics{diagram}\n",
        );
        write(base.join("diagram.eps"), "");
        let mut query = query_for(&base.join("main.tex"))?;

        let report = scan_with(&query, &FakeTools::new(&[]))?;
        let m = &report.manifest;
        assert!(m.figure_extensions().contains(&".eps".to_owned()));
        assert_eq!(m.figure_files(), &[base.join("diagram.eps")]);
        assert!(m.needs_index_pass());
        assert!(m.needs_glossary_pass());
        assert!(!m.needs_bibliography_pass());

        query.parameters.tex_engine = TexEngine::Latex;
        let report = scan_with(&query, &FakeTools::new(&[]))?;
        assert!(report.manifest.figure_files().is_empty());
        assert_eq!(
            warnings(&report)[0].kind,
            DiagnosticKind::UnresolvedReference {
                kind: ReferenceKind::Figure,
                name: "diagram".to_owned()
            }
        );
        Ok(())
    }

    #[test]
    fn glossary_needs_its_package() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("plain.tex"), "\\makeglossaries\n");
        write(base.join("legacy.tex"), "\\usepackage{glossary}\n\\makeglossary\n");
        write(base.join("modern.tex"), "\\usepackage{glossaries}\n\\makeglossary\n");

        let tools = FakeTools::new(&[]);
        let plain = scan_with(&query_for(&base.join("plain.tex"))?, &tools)?;
        assert!(!plain.manifest.needs_glossary_pass());
        let legacy = scan_with(&query_for(&base.join("legacy.tex"))?, &tools)?;
        assert!(legacy.manifest.needs_glossary_pass());
        let modern = scan_with(&query_for(&base.join("modern.tex"))?, &tools)?;
        assert!(!modern.manifest.needs_glossary_pass());
        Ok(())
    }

    #[test]
    fn local_definitions_are_scanned() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("main.tex"), "\\documentclass{thesis}\n\\usepackage{notes}\n");
        write(
            base.join("styles/thesis.cls"),
            "\\LoadClass{report}\n\\RequirePackage{makeidx}\n",
        );
        write(base.join("styles/notes.sty"), "\\RequirePackage{epstopdf}\n");
        write(base.join("old.tex"), "\\documentclass{legacy}\n");
        write(base.join("styles/legacy.sty"), "");

        let tools = FakeTools::new(&[]);
        let report = scan_with(&query_for(&base.join("main.tex"))?, &tools)?;
        let m = &report.manifest;
        assert_eq!(m.source_files(), &[base.join("main.tex")]);
        assert_eq!(m.class_files(), &[base.join("styles/thesis.cls")]);
        assert_eq!(m.style_files(), &[base.join("styles/notes.sty")]);
        assert!(m.needs_index_pass());
        assert!(m.has_package("epstopdf"));
        assert!(m.figure_extensions().contains(&".eps".to_owned()));

        let report = scan_with(&query_for(&base.join("old.tex"))?, &tools)?;
        assert!(report.manifest.class_files().is_empty());
        assert_eq!(report.manifest.style_files(), &[base.join("styles/legacy.sty")]);
        Ok(())
    }

    #[test]
    fn texmf_packages_are_recorded() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("project/main.tex"), "\\usepackage{fancy}\n");
        write(base.join("texmf/tex/latex/fancy/fancy.sty"), "");

        let mut query = query_for(&base.join("project/main.tex"))?;
        query.parameters.texmf_roots = vec![base.join("texmf")];
        let report = scan_with(&query, &FakeTools::new(&[]))?;
        let m = &report.manifest;
        assert!(m.style_files().is_empty());
        assert_eq!(
            m.texmf_package_paths(),
            &[
                path_to_string(PathBuf::from("${TEXMF_PATH0}/tex/latex/fancy")),
                path_to_string(PathBuf::from("${TEXMF_PATH0}/tex/latex/fancy/fancy.sty")),
            ]
        );
        assert!(report.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn graphics_paths_and_duplicates() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(
            base.join("main.tex"),
            "\\graphicspath{\n  {figs/}\n  {missing/}\n}\n\\DeclareGraphicsExtensions{.png,.pdf}\n\\includegraphics[width=3cm]{plot}\n\\input{chapters/one}\n",
        );
        write(base.join("figs/plot.png"), "");
        write(base.join("figs/plot.pdf"), "");
        write(base.join("chapters/one.tex"), "\\includegraphics{nothing}\n");

        let report = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]))?;
        let m = &report.manifest;
        assert_eq!(m.figure_extensions(), &[".png", ".pdf"]);
        assert_eq!(m.figure_files(), &[base.join("figs/plot.png")]);
        assert_eq!(m.duplicate_figure_files(), &[base.join("figs/plot.pdf")]);
        assert_eq!(m.sub_paths(), &[base.join("figs"), base.join("chapters")]);
        assert_eq!(
            warnings(&report)
                .iter()
                .map(|d| (d.file.clone(), d.kind.clone()))
                .collect::<Vec<_>>(),
            vec![
                (
                    base.join("main.tex"),
                    DiagnosticKind::InvalidGraphicsPath("missing/".to_owned())
                ),
                (
                    base.join("chapters/one.tex"),
                    DiagnosticKind::UnresolvedReference {
                        kind: ReferenceKind::Figure,
                        name: "nothing".to_owned()
                    }
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn malformed_delimiters_abort_the_scan() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        let base = fs::canonicalize(tmp.path())?;
        write(base.join("main.tex"), "\\input{broken}\n");
        write(base.join("broken.tex"), "\\graphicspath{{figs/\\}}\n");

        let err = scan_with(&query_for(&base.join("main.tex"))?, &FakeTools::new(&[]))
            .expect_err("the scan should fail");
        match &err {
            ScanError::InDocument { file, .. } => assert_eq!(file, &base.join("broken.tex")),
            e => panic!("unexpected error {}", e),
        }
        assert!(matches!(
            err.root_cause(),
            ScanError::MalformedDelimiters {
                reason: DelimiterFault::Unbalanced,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn missing_entry_file() -> Result<(), ScanError> {
        let tmp = tempfile::tempdir()?;
        write(tmp.path().join("main.tex"), "");
        let mut query = query_for(&tmp.path().join("main.tex"))?;
        query.target.entry_file = tmp.path().join("gone.tex");
        assert!(matches!(
            scan_with(&query, &FakeTools::new(&[])),
            Err(ScanError::EntryFileNotFound(_))
        ));
        Ok(())
    }
}
