//! Reader for the `metadata.txt` file shipped inside every package.

use anyhow::{Context, Result};
use ini::{Ini, ParseOption};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::runtime::Runtime;

/// File name of the package metadata inside a package directory.
pub const METADATA_FILE: &str = "metadata.txt";

const GENERAL_SECTION: &str = "general";
const VERSION_KEY: &str = "version";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("malformed metadata file: {0}")]
    Malformed(#[from] ini::ParseError),

    #[error("metadata has no version field in its [general] section")]
    MissingVersion,
}

/// The `[general]` fields the mirror cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMetadata {
    version: String,
}

impl PackageMetadata {
    /// Parse metadata text. The section name is case-sensitive, keys are not;
    /// indented continuation lines and comment lines are ignored.
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let flattened = drop_continuation_lines(text);

        let option = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_str_opt(&flattened, option)?;

        let general = ini
            .section(Some(GENERAL_SECTION))
            .ok_or(MetadataError::MissingVersion)?;
        let version = general
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(VERSION_KEY))
            .map(|(_, value)| value.trim().to_string())
            .ok_or(MetadataError::MissingVersion)?;

        Ok(Self { version })
    }

    /// Load the metadata of the package at `path`, which may be the package
    /// directory or the metadata file itself.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let file = metadata_path(runtime, path);
        let text = runtime
            .read_to_string(&file)
            .with_context(|| format!("Failed to read {:?}", file))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {:?}", file))
    }

    /// The raw, unnormalized version string.
    pub fn version(&self) -> &str {
        &self.version
    }
}

fn metadata_path<R: Runtime>(runtime: &R, path: &Path) -> PathBuf {
    if runtime.is_dir(path) {
        path.join(METADATA_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Multi-line values (`about=`, `changelog=`) continue on indented lines.
/// Only single-line keys are read, so continuations and comments are dropped.
fn drop_continuation_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let is_continuation = line.starts_with([' ', '\t']) && !line.trim().is_empty();
            let trimmed = line.trim_start();
            let is_comment = trimmed.starts_with('#') || trimmed.starts_with(';');
            !is_continuation && !is_comment
        })
        .collect::<Vec<_>>()
        .join("\n")
}
