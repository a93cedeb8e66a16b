//! Catalog manifest reader.
//!
//! The manifest is an XML document whose root holds one element per package:
//!
//! ```xml
//! <plugins>
//!   <pyqgis_plugin name="City Generator" version="0.3">
//!     <download_url>https://plugins.qgis.org/plugins/citygen/version/0.3/download/</download_url>
//!     <file_name>citygen-0.3.zip</file_name>
//!     <experimental>False</experimental>
//!     ...
//!   </pyqgis_plugin>
//! </plugins>
//! ```
//!
//! The document is parsed in full up front; records are then produced lazily,
//! in document order, by a single-pass iterator.

mod record;

use anyhow::{Context, Result};
use roxmltree::{Document, NodeId};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::runtime::Runtime;

pub use record::{PackageRecord, slug_from_url};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed catalog manifest: {0}")]
    Malformed(#[from] roxmltree::Error),

    #[error("manifest entry #{index} has no `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("cannot derive a package directory from download URL {0:?}")]
    InvalidDownloadUrl(String),
}

/// The raw manifest text. Each call to [`Manifest::packages`] parses it anew.
#[derive(Debug, Clone)]
pub struct Manifest {
    text: String,
}

impl Manifest {
    pub fn from_string(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read catalog manifest {:?}", path))?;
        Ok(Self::from_string(text))
    }

    /// Parse the document and iterate its entries, optionally skipping
    /// experimental ones.
    pub fn packages(&self, exclude_experimental: bool) -> Result<Packages<'_>, ManifestError> {
        let doc = Document::parse(&self.text)?;
        let cursor = doc.root_element().first_element_child().map(|n| n.id());
        Ok(Packages {
            doc,
            cursor,
            index: 0,
            exclude_experimental,
        })
    }

    /// Every record, or the first error.
    #[cfg(test)]
    pub(crate) fn collect_packages(
        &self,
        exclude_experimental: bool,
    ) -> Result<Vec<PackageRecord>, ManifestError> {
        self.packages(exclude_experimental)?.collect()
    }

    /// Archive file names of all entries, experimental ones included.
    pub fn file_names(&self) -> Result<BTreeSet<String>, ManifestError> {
        self.packages(false)?
            .map(|record| record.map(|r| r.file_name))
            .collect()
    }
}

/// Lazy iterator over the entries of a parsed manifest.
pub struct Packages<'a> {
    doc: Document<'a>,
    cursor: Option<NodeId>,
    index: usize,
    exclude_experimental: bool,
}

impl Iterator for Packages<'_> {
    type Item = Result<PackageRecord, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.doc.get_node(self.cursor?)?;
            self.cursor = node.next_sibling_element().map(|n| n.id());
            let index = self.index;
            self.index += 1;

            if self.exclude_experimental && record::is_experimental(node) {
                continue;
            }
            return Some(PackageRecord::from_node(node, index));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    /// Render one `<pyqgis_plugin>` element for test manifests.
    pub(crate) fn plugin_xml(slug: &str, version: &str, experimental: bool) -> String {
        format!(
            r#"<pyqgis_plugin name="{slug} plugin" version="{version}" plugin_id="1">
    <description><![CDATA[Does {slug} things]]></description>
    <about><![CDATA[About {slug}]]></about>
    <version>{version}</version>
    <trusted>False</trusted>
    <file_name>{slug}.{version}.zip</file_name>
    <author_name><![CDATA[Jane Doe]]></author_name>
    <download_url>https://plugins.qgis.org/plugins/{slug}/version/{version}/download/</download_url>
    <create_date>2020-05-01T08:00:00.000000</create_date>
    <update_date>2024-01-30T12:01:02.123456</update_date>
    <experimental>{experimental}</experimental>
    <deprecated>False</deprecated>
    <tags><![CDATA[vector,analysis]]></tags>
    <downloads>1234567</downloads>
    <average_vote>4.25</average_vote>
    <rating_votes>12</rating_votes>
    <repository><![CDATA[https://example.com/{slug}]]></repository>
</pyqgis_plugin>"#,
            experimental = if experimental { "True" } else { "False" }
        )
    }

    pub(crate) fn manifest_xml(plugins: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plugins>\n{}\n</plugins>\n",
            plugins.join("\n")
        )
    }

    #[test]
    fn test_packages_in_document_order() {
        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("citygen", "0.3", false),
            plugin_xml("alpha", "1.0", false),
        ]));

        let records = manifest.collect_packages(true).unwrap();
        let slugs: Vec<&str> = records.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["citygen", "alpha"]);
    }

    #[test]
    fn test_record_fields() {
        let manifest = Manifest::from_string(manifest_xml(&[plugin_xml("citygen", "0.3", false)]));
        let record = manifest.collect_packages(true).unwrap().remove(0);

        assert_eq!(record.slug, "citygen");
        assert_eq!(record.name, "citygen plugin");
        assert_eq!(record.version, "0.3");
        assert_eq!(record.file_name, "citygen.0.3.zip");
        assert_eq!(
            record.download_url,
            "https://plugins.qgis.org/plugins/citygen/version/0.3/download/"
        );
        assert!(!record.experimental);
        assert!(!record.trusted);
        assert_eq!(record.downloads, 1_234_567);
        assert_eq!(record.average_vote, 4.25);
        assert_eq!(record.rating_votes, 12);
        assert_eq!(record.author_name, "Jane Doe");
        assert_eq!(record.description, "Does citygen things");
        assert_eq!(record.tags, "vector,analysis");
        assert_eq!(record.repository, "https://example.com/citygen");
        assert!(record.created.is_some());
        assert!(record.updated.is_some());
    }

    #[test]
    fn test_excludes_experimental_entries() {
        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("stable", "1.0", false),
            plugin_xml("shiny", "0.1", true),
        ]));

        let stable = manifest.collect_packages(true).unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].slug, "stable");

        let all = manifest.collect_packages(false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].experimental);
    }

    #[test]
    fn test_iteration_is_lazy() {
        // The broken second entry is never reached when only the first is taken.
        let broken = r#"<pyqgis_plugin name="x" version="1"><file_name>x.zip</file_name></pyqgis_plugin>"#;
        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("first", "1.0", false),
            broken.to_string(),
        ]));

        let mut packages = manifest.packages(true).unwrap();
        assert_eq!(packages.next().unwrap().unwrap().slug, "first");
        assert!(matches!(
            packages.next(),
            Some(Err(ManifestError::MissingField {
                index: 1,
                field: "download_url"
            }))
        ));
        assert!(packages.next().is_none());
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let manifest = Manifest::from_string("<plugins><pyqgis_plugin></plugins>");
        assert!(matches!(
            manifest.packages(true),
            Err(ManifestError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_download_url() {
        let entry = r#"<pyqgis_plugin name="x" version="1">
            <download_url>https://plugins.qgis.org/</download_url>
            <file_name>x.zip</file_name>
        </pyqgis_plugin>"#;
        let manifest = Manifest::from_string(manifest_xml(&[entry.to_string()]));

        let result = manifest.collect_packages(true);
        assert!(matches!(result, Err(ManifestError::InvalidDownloadUrl(_))));
    }

    #[test]
    fn test_empty_catalog() {
        let manifest = Manifest::from_string("<plugins/>");
        assert_eq!(manifest.collect_packages(true).unwrap().len(), 0);
    }

    #[test]
    fn test_file_names_include_experimental() {
        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("stable", "1.0", false),
            plugin_xml("shiny", "0.1", true),
        ]));

        let names: Vec<String> = manifest.file_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["shiny.0.1.zip", "stable.1.0.zip"]);
    }

    #[test]
    fn test_load_reads_through_runtime() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/mirror/plugins.xml")))
            .returning(|_| Ok("<plugins/>".to_string()));

        let manifest = Manifest::load(&runtime, Path::new("/mirror/plugins.xml")).unwrap();
        assert_eq!(manifest.collect_packages(false).unwrap().len(), 0);
    }
}
