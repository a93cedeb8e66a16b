use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Url;
use roxmltree::Node;

use super::ManifestError;

/// Index of the slug among the download URL's path segments:
/// `/plugins/<slug>/version/<version>/download/`.
const SLUG_SEGMENT: usize = 1;

/// One catalog entry. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    /// Directory name of the package, taken from the download URL.
    pub slug: String,
    pub name: String,
    /// Declared version, as written in the catalog.
    pub version: String,
    pub download_url: String,
    /// Archive file name in the local cache.
    pub file_name: String,
    pub experimental: bool,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
    pub downloads: u64,
    pub average_vote: f64,
    pub rating_votes: u64,
    pub trusted: bool,
    pub author_name: String,
    pub description: String,
    pub about: String,
    pub tags: String,
    pub repository: String,
}

impl PackageRecord {
    pub(super) fn from_node(node: Node<'_, '_>, index: usize) -> Result<Self, ManifestError> {
        let missing = |field: &'static str| ManifestError::MissingField { index, field };

        let download_url = child_text(node, "download_url").ok_or_else(|| missing("download_url"))?;
        let slug = slug_from_url(download_url)
            .ok_or_else(|| ManifestError::InvalidDownloadUrl(download_url.to_string()))?;

        Ok(Self {
            slug,
            name: node.attribute("name").ok_or_else(|| missing("name"))?.to_string(),
            version: node
                .attribute("version")
                .ok_or_else(|| missing("version"))?
                .to_string(),
            download_url: download_url.to_string(),
            file_name: child_text(node, "file_name")
                .ok_or_else(|| missing("file_name"))?
                .to_string(),
            experimental: is_experimental(node),
            created: child_text(node, "create_date").and_then(parse_timestamp),
            updated: child_text(node, "update_date").and_then(parse_timestamp),
            downloads: child_number(node, "downloads"),
            average_vote: child_text(node, "average_vote")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_default(),
            rating_votes: child_number(node, "rating_votes"),
            trusted: child_text(node, "trusted") == Some("True"),
            author_name: child_string(node, "author_name"),
            description: child_string(node, "description"),
            about: child_string(node, "about"),
            tags: child_string(node, "tags"),
            repository: child_string(node, "repository"),
        })
    }
}

pub(super) fn is_experimental(node: Node<'_, '_>) -> bool {
    child_text(node, "experimental") == Some("True")
}

/// Extract the package slug from a catalog download URL.
pub fn slug_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let slug = url.path_segments()?.nth(SLUG_SEGMENT)?;
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
}

fn child_string(node: Node<'_, '_>, tag: &str) -> String {
    child_text(node, tag).unwrap_or_default().to_string()
}

fn child_number(node: Node<'_, '_>, tag: &str) -> u64 {
    child_text(node, tag)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}

/// Catalog timestamps look like `2024-01-30T12:01:02.123456`, sometimes with
/// a zone suffix, which is ignored.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok((datetime, _zone)) = NaiveDateTime::parse_and_remainder(text, "%Y-%m-%dT%H:%M:%S%.f")
    {
        return Some(datetime);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}
