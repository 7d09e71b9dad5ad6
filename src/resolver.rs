use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::Serialize;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::common::{path_to_string, ScanError};

/// Version-control metadata directories, never descended into
const VCS_DIRS: [&str; 5] = [".git", ".svn", ".hg", ".bzr", "CVS"];

/// Kind of a TeX definition file looked up by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefinitionKind {
    Style,
    Class,
}

impl DefinitionKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Style => "sty",
            Self::Class => "cls",
        }
    }
}

/// A style or class found under one of the texmf roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexmfMatch {
    pub path: PathBuf,
    /// the package directory and everything below it, relative to a `${TEXMF_PATH<i>}` token
    pub package_paths: Vec<String>,
}

/// Outcome of the figure fallback chain for one logical figure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FigureResolution {
    /// every file satisfying the reference, in search order
    pub all: Vec<PathBuf>,
}

impl FigureResolution {
    pub fn primary(&self) -> Option<&PathBuf> {
        self.all.first()
    }

    pub fn duplicates(&self) -> &[PathBuf] {
        if self.all.len() > 1 {
            &self.all[1..]
        } else {
            &[]
        }
    }
}

/// Caches the content of already listed directories, to avoid repeated filesystem access
pub(crate) struct DirCache {
    files_in_dirs: HashMap<PathBuf, HashSet<OsString>>,
    /// directories below each walked root, in walk order
    dirs_in_trees: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DirCache {
    pub(crate) fn new() -> Self {
        Self {
            files_in_dirs: HashMap::new(),
            dirs_in_trees: HashMap::new(),
        }
    }

    pub(crate) fn test_file_in_folder<P: AsRef<Path>>(
        &mut self,
        filename: &OsStr,
        folder: P,
    ) -> Result<Option<PathBuf>, ScanError> {
        let folder = folder.as_ref();
        if !self.files_in_dirs.contains_key(folder) {
            self.scan_folder(folder)?;
        }
        Ok(self
            .files_in_dirs
            .get(folder)
            .filter(|files| files.contains(filename))
            .map(|_| folder.join(filename)))
    }

    fn scan_folder(&mut self, folder: &Path) -> Result<(), ScanError> {
        let files = if folder.is_dir() {
            match fs::read_dir(folder) {
                // is_file follows symlinks, unlike DirEntry::metadata
                Ok(entries) => entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.path().is_file())
                    .map(|entry| entry.file_name())
                    .collect(),
                Err(e) => {
                    debug!("skipping unreadable directory: {}", e);
                    HashSet::new()
                }
            }
        } else {
            HashSet::new()
        };
        self.files_in_dirs.insert(folder.to_owned(), files);
        Ok(())
    }

    /// Every directory below `root` (itself included), skipping version-control metadata
    pub(crate) fn dirs_under(&mut self, root: &Path) -> Vec<PathBuf> {
        self.dirs_in_trees
            .entry(root.to_owned())
            .or_insert_with(|| {
                WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| !is_vcs_dir(e))
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            debug!("skipping unreadable entry under {}: {}", path_to_string(root), e);
                            None
                        }
                    })
                    .filter(|entry| entry.file_type().is_dir())
                    .map(|entry| entry.into_path())
                    .collect()
            })
            .clone()
    }
}

fn is_vcs_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|s| VCS_DIRS.contains(&s))
            .unwrap_or(false)
}

/// Resolves the names referenced by a document against the project tree,
/// the texmf roots and the graphics paths
pub struct Resolver {
    base_dir: PathBuf,
    texmf_roots: Vec<PathBuf>,
    texmf_exclude: Vec<glob::Pattern>,
    fs_cache: RefCell<DirCache>,
}

impl Resolver {
    pub fn new(base_dir: PathBuf, texmf_roots: Vec<PathBuf>, texmf_exclude: Vec<glob::Pattern>) -> Self {
        Self {
            base_dir,
            texmf_roots,
            texmf_exclude,
            fs_cache: RefCell::new(DirCache::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Check whether `name`, relative to `folder` unless absolute, is an existing file
    fn find_file<P: AsRef<Path>>(&self, folder: P, name: &str) -> Result<Option<PathBuf>, ScanError> {
        let candidate = folder.as_ref().join(name);
        let (parent, filename) = match (candidate.parent(), candidate.file_name()) {
            (Some(p), Some(f)) => (p.to_owned(), f.to_owned()),
            _ => return Ok(None),
        };
        trace!("trying {}", path_to_string(&candidate));
        self.fs_cache
            .borrow_mut()
            .test_file_in_folder(&filename, parent)
    }

    /// Try the literal name, then the name with each extension appended
    fn find_with_extensions(
        &self,
        folder: &Path,
        name: &str,
        extensions: &[&str],
    ) -> Result<Option<PathBuf>, ScanError> {
        if let Some(p) = self.find_file(folder, name)? {
            return Ok(Some(p));
        }
        for ext in extensions {
            if let Some(p) = self.find_file(folder, &format!("{}{}", name, ext))? {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    /// Resolve a sub-document name: literal, then with `.tex` appended
    pub fn resolve_document(&self, name: &str) -> Result<Option<PathBuf>, ScanError> {
        self.find_with_extensions(&self.base_dir, name, &[".tex"])
    }

    /// Resolve a bibliography key: literal, then with `.bib` appended
    pub fn resolve_bibliography(&self, key: &str) -> Result<Option<PathBuf>, ScanError> {
        self.find_with_extensions(&self.base_dir, key, &[".bib"])
    }

    /// Walk `root` and return the first directory holding `name` or `name.<ext>`
    fn walk_for_definition(
        &self,
        root: &Path,
        name: &str,
        kind: DefinitionKind,
    ) -> Result<Option<PathBuf>, ScanError> {
        let with_ext = format!("{}.{}", name, kind.extension());
        let dirs = self.fs_cache.borrow_mut().dirs_under(root);
        for dir in dirs {
            if let Some(p) = self.find_file(&dir, name)? {
                return Ok(Some(p));
            }
            if let Some(p) = self.find_file(&dir, &with_ext)? {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    /// Look for a style or class definition within the project tree
    pub fn resolve_local(&self, name: &str, kind: DefinitionKind) -> Result<Option<PathBuf>, ScanError> {
        self.walk_for_definition(&self.base_dir, name, kind)
    }

    /// Look for a style or class definition within the texmf roots, in order
    ///
    /// On a match the whole package directory is captured relative to the
    /// `${TEXMF_PATH<i>}` token of the root it was found in.
    pub fn resolve_texmf(&self, name: &str, kind: DefinitionKind) -> Result<Option<TexmfMatch>, ScanError> {
        for (i, root) in self.texmf_roots.iter().enumerate() {
            if !root.is_dir() {
                debug!("texmf root {} is not a directory", path_to_string(root));
                continue;
            }
            if let Some(path) = self.walk_for_definition(root, name, kind)? {
                let package_dir = path.parent().unwrap_or(root);
                let token = PathBuf::from(format!("${{TEXMF_PATH{}}}", i));
                let package_paths = self.texmf_package_paths(root, package_dir, &token);
                return Ok(Some(TexmfMatch { path, package_paths }));
            }
        }
        Ok(None)
    }

    fn is_texmf_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.texmf_exclude.iter().any(|p| p.matches(&name))
    }

    fn texmf_package_paths(&self, root: &Path, package_dir: &Path, token: &Path) -> Vec<String> {
        let to_token = |p: &Path| -> String {
            match p.strip_prefix(root) {
                Ok(rel) if rel.as_os_str().is_empty() => path_to_string(token),
                Ok(rel) => path_to_string(token.join(rel)),
                Err(_) => path_to_string(p),
            }
        };

        let mut ret = vec![to_token(package_dir)];
        let walker = WalkDir::new(package_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_vcs_dir(e) && !self.is_texmf_excluded(e));
        ret.extend(walker.filter_map(|e| e.ok()).map(|e| to_token(e.path())));
        ret
    }

    /// Run the figure fallback chain for one reference
    ///
    /// Per graphics path in order, the literal name and then the name with each
    /// extension are tried. Only if nothing matches anywhere are the fallback
    /// suffixes tried, again per graphics path.
    pub fn resolve_figure(
        &self,
        name: &str,
        graphics_paths: &[PathBuf],
        extensions: &[String],
        fallback_suffixes: &[String],
    ) -> Result<FigureResolution, ScanError> {
        let mut all = Vec::new();

        for dir in graphics_paths {
            if let Some(p) = self.find_file(dir, name)? {
                all.push(p);
            }
            for ext in extensions {
                if let Some(p) = self.find_file(dir, &format!("{}{}", name, ext))? {
                    all.push(p);
                }
            }
        }

        if all.is_empty() {
            for dir in graphics_paths {
                for suffix in fallback_suffixes {
                    if let Some(p) = self.find_file(dir, &format!("{}{}", name, suffix))? {
                        all.push(p);
                    }
                }
            }
        }

        // a graphics path listed twice must not turn a file into its own duplicate
        let mut seen = HashSet::new();
        all.retain(|p| seen.insert(p.clone()));

        Ok(FigureResolution { all })
    }
}
