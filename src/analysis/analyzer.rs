use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::report::format::thousands;
use crate::runtime::Runtime;

use super::{Import, PythonFrontEnd, SourceFrontEnd, SyntaxError};

/// Dependency key collecting the names of plain `import x` statements.
pub const SENTINEL_KEY: &str = "";
/// Dependency key collecting the names of files that failed to parse.
pub const SYNTAX_ERROR_KEY: &str = "{SyntaxError}";

/// Report-ready view of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    /// Total size, e.g. `1,234 kb`.
    pub size: String,
    /// Size in units of 100 bytes, zero-padded to seven digits for sorting.
    pub size_sort: String,
    /// Sorted, comma-separated extensions.
    pub extensions: String,
    /// One `[module] name, name` line per key, joined by `<br>\n`.
    pub dependencies: String,
    pub syntax_errors: usize,
}

/// Accumulates facts about the files of an unpacked package.
///
/// Reuse across packages by calling [`clear`](Self::clear) between them.
pub struct PackageAnalyzer<'a, R: Runtime, F: SourceFrontEnd = PythonFrontEnd> {
    runtime: &'a R,
    front_end: F,
    size: u64,
    extensions: BTreeSet<String>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
    errors: Vec<String>,
}

impl<'a, R: Runtime> PackageAnalyzer<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self::with_front_end(runtime, PythonFrontEnd)
    }
}

impl<'a, R: Runtime, F: SourceFrontEnd> PackageAnalyzer<'a, R, F> {
    pub fn with_front_end(runtime: &'a R, front_end: F) -> Self {
        let mut analyzer = Self {
            runtime,
            front_end,
            size: 0,
            extensions: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            errors: Vec::new(),
        };
        analyzer.clear();
        analyzer
    }

    /// Reset to the empty state: no size, no extensions, only the sentinel
    /// dependency key, no errors.
    pub fn clear(&mut self) {
        self.size = 0;
        self.extensions.clear();
        self.dependencies.clear();
        self.dependencies
            .insert(SENTINEL_KEY.to_string(), BTreeSet::new());
        self.errors.clear();
    }

    /// Walk `package_dir` recursively and add its files to the accumulated
    /// state. A missing directory adds nothing.
    ///
    /// Afterwards, dependency keys starting with the directory's own name
    /// (the package importing itself) are dropped.
    #[tracing::instrument(skip(self))]
    pub fn analyze(&mut self, package_dir: &Path, verbose: bool) {
        if self.runtime.is_dir(package_dir) {
            self.visit_dir(package_dir, verbose);
        } else {
            debug!("Nothing to analyze at {:?}", package_dir);
        }

        let dirname = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dependencies.retain(|key, _| !key.starts_with(&dirname));
    }

    fn visit_dir(&mut self, dir: &Path, verbose: bool) {
        let entries = match self.runtime.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {:?}: {:#}", dir, e);
                return;
            }
        };

        let (dirs, files): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|p| self.runtime.is_dir(p));

        for file in &files {
            self.visit_file(file, verbose);
        }
        for sub in &dirs {
            if self.runtime.is_symlink(sub) {
                debug!("Not following symlinked directory {:?}", sub);
                continue;
            }
            self.visit_dir(sub, verbose);
        }
    }

    fn visit_file(&mut self, path: &Path, verbose: bool) {
        match self.runtime.file_size(path) {
            Ok(size) => self.size += size,
            Err(e) => warn!("Cannot stat {:?}: {:#}", path, e),
        }

        let extension = match path.extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => String::new(),
        };
        let parse = self.front_end.handles(&extension);
        self.extensions.insert(extension);
        if !parse {
            return;
        }

        let bytes = match self.runtime.read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read {:?}: {:#}", path, e);
                return;
            }
        };
        let decoded = String::from_utf8_lossy(&bytes);
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

        let source_path = path.to_string_lossy();
        match self.front_end.imports(text, &source_path) {
            Ok(imports) => self.record_imports(imports),
            Err(e) => self.record_syntax_error(path, &e, verbose),
        }
    }

    fn record_imports(&mut self, imports: Vec<Import>) {
        for import in imports {
            match import {
                Import::Module { names } => self
                    .dependencies
                    .entry(SENTINEL_KEY.to_string())
                    .or_default()
                    .extend(names),
                Import::From {
                    module: Some(module),
                    level: 0,
                    names,
                } => self.dependencies.entry(module).or_default().extend(names),
                // Relative imports refer to the package itself.
                Import::From { .. } => {}
            }
        }
    }

    fn record_syntax_error(&mut self, path: &Path, error: &SyntaxError, verbose: bool) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dependencies
            .entry(SYNTAX_ERROR_KEY.to_string())
            .or_default()
            .insert(file_name);

        let message = format!("SyntaxError: {} ({})", path.display(), error);
        if verbose {
            warn!("{}", message);
        } else {
            debug!("{}", message);
        }
        self.errors.push(message);
    }

    /// Total size in bytes of the files seen.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    pub fn dependencies(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.dependencies
    }

    /// One message per file that failed to parse, in walk order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn results(&self) -> AnalysisSummary {
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        let dependencies: Vec<String> = self
            .dependencies
            .iter()
            .map(|(key, names)| {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                format!("[{}] {}", key, names.join(", "))
            })
            .collect();

        AnalysisSummary {
            size: format!("{} kb", thousands(self.size / 1000)),
            size_sort: format!("{:0>7}", self.size / 100),
            extensions: extensions.join(", "),
            dependencies: dependencies.join("<br>\n"),
            syntax_errors: self.errors.len(),
        }
    }
}
