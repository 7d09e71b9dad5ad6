//! Availability of the external programs a generated build relies on

use std::path::PathBuf;

use serde::Serialize;

use crate::common::{path_to_string, ScanError};
use crate::manifest::Manifest;
use crate::query::ScanParameters;

/// Finds executables by name
pub trait ToolLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;

    fn exists(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }
}

/// Looks tools up in the PATH of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

impl ToolLocator for SystemTools {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// Fail unless the build driver itself can be found
pub fn check_build_tool(locator: &dyn ToolLocator, name: &str) -> Result<PathBuf, ScanError> {
    locator
        .locate(name)
        .ok_or_else(|| ScanError::MissingBuildTool(name.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
    /// how the build should invoke the tool
    pub command: String,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// The tools needed to build a document with the given manifest, in pass order
pub fn required_tools(
    manifest: &Manifest,
    parameters: &ScanParameters,
    locator: &dyn ToolLocator,
) -> Vec<ToolStatus> {
    let mut names = vec![parameters.tex_engine.executable()];
    if manifest.needs_bibliography_pass() {
        names.push(manifest.bibliography_backend().executable());
    }
    if manifest.needs_index_pass() {
        names.push("makeindex");
    }
    if manifest.needs_glossary_pass() {
        names.push("makeglossaries");
    }

    names
        .into_iter()
        .map(|name| {
            let path = locator.locate(name);
            let command = match &path {
                Some(p) if parameters.use_absolute_executable_paths => path_to_string(p),
                _ => name.to_owned(),
            };
            ToolStatus {
                name: name.to_owned(),
                path,
                command,
            }
        })
        .collect()
}

/// A fixed set of available tools, all living in `/usr/bin`
#[cfg(test)]
pub(crate) struct FakeTools {
    available: Vec<String>,
}

#[cfg(test)]
impl FakeTools {
    pub(crate) fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
impl ToolLocator for FakeTools {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        if self.available.iter().any(|a| a == name) {
            Some(PathBuf::from("/usr/bin").join(name))
        } else {
            None
        }
    }
}
