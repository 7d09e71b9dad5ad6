extern crate thiserror;

mod scanner;

pub mod braces;
pub mod common;
pub mod directives;
pub mod manifest;
pub mod normalize;
pub mod query;
pub mod resolver;
pub mod tools;

pub use common::{decanonicalize, path_to_string, readable_canonical_path, ScanError};
pub use manifest::{BibliographyBackend, Manifest};
pub use query::{ScanParameters, ScanQuery, ScanTarget, TexEngine};
pub use scanner::{Diagnostic, DiagnosticKind, ReferenceKind, ScanReport};
pub use tools::{SystemTools, ToolLocator};

/// Recover the build dependencies of the document tree rooted at the query's entry file
pub fn scan(query: &ScanQuery, tools: &dyn ToolLocator) -> Result<ScanReport, ScanError> {
    let scanner = scanner::Scanner::new(query, tools)?;
    scanner.run()
}
