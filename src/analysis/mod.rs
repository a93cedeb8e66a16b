//! Static source analysis of unpacked packages.
//!
//! A [`SourceFrontEnd`] turns the text of one source file into the import
//! statements it contains; [`PackageAnalyzer`] walks a package directory and
//! accumulates sizes, extensions, dependencies and syntax errors.

mod analyzer;
mod python;

use thiserror::Error;

pub use analyzer::{AnalysisSummary, PackageAnalyzer, SENTINEL_KEY, SYNTAX_ERROR_KEY};
pub use python::PythonFrontEnd;

/// One import statement found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    /// `import a, b.c`
    Module { names: Vec<String> },
    /// `from m import x, y`; `level` counts the leading dots.
    From {
        module: Option<String>,
        level: u32,
        names: Vec<String>,
    },
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
}

/// Parses source files of one language.
pub trait SourceFrontEnd {
    /// Whether files with this extension (`.py`, or `""` for none) are parsed.
    fn handles(&self, extension: &str) -> bool;

    /// Every import statement in `source`. `source_path` only labels errors.
    fn imports(&self, source: &str, source_path: &str) -> Result<Vec<Import>, SyntaxError>;
}
