//! Version normalization for installed and catalog versions.
//!
//! Versions are only ever compared for equality ("is the installed copy the
//! one the catalog lists?"); there is no ordering between two versions.

use std::fmt;

use super::metadata::{MetadataError, PackageMetadata};

/// A version string in canonical form.
///
/// Built with [`Version::normalize`]: the literal labels `version` and
/// `Version` are removed, and each dot-separated component that is an integer
/// is rewritten in plain decimal (`"02"` becomes `"2"`). Other components are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn normalize(raw: &str) -> Self {
        let stripped = raw.replace("version", "").replace("Version", "");
        let components: Vec<String> = stripped
            .trim()
            .split('.')
            .map(|component| {
                canonical_integer(component).unwrap_or_else(|| component.to_string())
            })
            .collect();
        Version(components.join("."))
    }

    /// Read the `[general] version` field of a metadata file and normalize it.
    pub fn from_metadata(text: &str) -> Result<Self, MetadataError> {
        let metadata = PackageMetadata::parse(text)?;
        Ok(Self::normalize(metadata.version()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this version is the one declared by the catalog.
    pub fn matches(&self, declared: &str) -> bool {
        *self == Self::normalize(declared)
    }
}

/// Decimal form of an integer component of any length: optional sign,
/// ASCII digits, surrounding whitespace ignored, leading zeros dropped.
fn canonical_integer(component: &str) -> Option<String> {
    let trimmed = component.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let significant = digits.trim_start_matches('0');
    Some(if significant.is_empty() {
        "0".to_string()
    } else if negative {
        format!("-{}", significant)
    } else {
        significant.to_string()
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
