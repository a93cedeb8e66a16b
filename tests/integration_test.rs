use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::{Server, ServerGuard};
use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn create_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn plugin_entry(base_url: &str, slug: &str, version: &str, experimental: bool) -> String {
    format!(
        r#"<pyqgis_plugin name="{slug}" version="{version}" plugin_id="7">
    <description><![CDATA[The {slug} plugin]]></description>
    <version>{version}</version>
    <trusted>True</trusted>
    <file_name>{slug}.{version}.zip</file_name>
    <author_name><![CDATA[Jane Doe]]></author_name>
    <download_url>{base_url}/plugins/{slug}/version/{version}/download/</download_url>
    <create_date>2019-03-01T10:00:00.000000</create_date>
    <update_date>2024-06-01T10:00:00.000000</update_date>
    <experimental>{experimental}</experimental>
    <tags><![CDATA[raster]]></tags>
    <downloads>2048</downloads>
    <average_vote>4.5</average_vote>
    <rating_votes>3</rating_votes>
</pyqgis_plugin>"#,
        experimental = if experimental { "True" } else { "False" }
    )
}

fn mock_catalog(server: &mut ServerGuard) -> Vec<mockito::Mock> {
    let url = server.url();
    let manifest = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plugins>\n{}\n{}\n</plugins>\n",
        plugin_entry(&url, "hydro", "1.2", false),
        plugin_entry(&url, "nightly", "0.1", true),
    );

    let hydro = create_zip(&[
        (
            "hydro/metadata.txt",
            "[general]\nname=Hydro\nversion=1.2\nauthor=Jane Doe\n",
        ),
        (
            "hydro/__init__.py",
            "import numpy as np\nfrom qgis.core import QgsProject\n\ndef classFactory(iface):\n    from .plugin import Hydro\n    return Hydro(iface)\n",
        ),
        ("hydro/broken.py", "def oops(:\n"),
    ]);

    vec![
        server
            .mock("GET", "/plugins/plugins.xml?qgis=3.34")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(manifest)
            .create(),
        server
            .mock("GET", "/plugins/hydro/version/1.2/download/")
            .with_status(200)
            .with_header("content-type", "application/zip")
            .with_body(hydro)
            .expect(1)
            .create(),
        server
            .mock("GET", "/plugins/nightly/version/0.1/download/")
            .expect(0)
            .create(),
    ]
}

fn plugin_mirror(root: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("plugin-mirror"));
    cmd.arg("--root").arg(root);
    cmd
}

#[test]
fn test_end_to_end_sync() {
    let mut server = Server::new();
    let mocks = mock_catalog(&mut server);

    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");
    let out_dir = dir.path().join("www");

    plugin_mirror(&root)
        .arg("--catalog-url")
        .arg(format!("{}/plugins/", server.url()))
        .args(["sync", "-u", "-i", "0", "-o"])
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 Downloading"))
        .stdout(predicate::str::contains("1 files downloaded. 0 errors."))
        .stdout(predicate::str::contains("Unpacked 1 archives."))
        .stdout(predicate::str::contains("*** New packages ***"))
        .stdout(predicate::str::contains("Total: 1, SyntaxErrors: 1"));

    for mock in &mocks {
        mock.assert();
    }

    assert!(root.join("plugins.xml").exists());
    assert!(root.join("archives/hydro.1.2.zip").exists());
    assert!(root.join("stable/hydro/metadata.txt").exists());
    assert!(!root.join("stable/nightly").exists());
    assert!(!root.join("stable_temp_extract").exists());

    let html = fs::read_to_string(out_dir.join("index.html")).unwrap();
    assert!(html.contains("hydro"));
    assert!(html.contains("numpy"));
    assert!(html.contains("qgis.core"));
    assert!(html.contains("{SyntaxError}"));
    assert!(!html.contains("{records}"));
}

#[test]
fn test_second_sync_uses_cache() {
    let mut server = Server::new();
    let _mocks = mock_catalog(&mut server);

    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");
    let catalog_url = format!("{}/plugins/", server.url());

    plugin_mirror(&root)
        .arg("--catalog-url")
        .arg(&catalog_url)
        .args(["sync", "-u", "-i", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Output directory not specified. Generating summary skipped.",
        ));

    plugin_mirror(&root)
        .arg("--catalog-url")
        .arg(&catalog_url)
        .args(["sync", "-i", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 archives already cached."))
        .stdout(predicate::str::contains("0 files downloaded. 0 errors."))
        .stdout(predicate::str::contains(
            "1 packages are already at the latest version.",
        ));
}

#[test]
fn test_clean_removes_old_archives() {
    let mut server = Server::new();
    let _mocks = mock_catalog(&mut server);

    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");

    plugin_mirror(&root)
        .arg("--catalog-url")
        .arg(format!("{}/plugins/", server.url()))
        .args(["sync", "-u", "-s"])
        .assert()
        .success();

    fs::create_dir_all(root.join("archives")).unwrap();
    fs::write(root.join("archives/hydro.1.1.zip"), b"old").unwrap();
    fs::write(root.join("archives/hydro.1.2.zip"), b"current").unwrap();

    plugin_mirror(&root)
        .args(["clean", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hydro.1.1.zip"))
        .stdout(predicate::str::contains("1 files removed."));

    assert!(!root.join("archives/hydro.1.1.zip").exists());
    assert!(root.join("archives/hydro.1.2.zip").exists());
}

#[test]
fn test_report_without_manifest_fails() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");

    plugin_mirror(&root)
        .args(["report", "-o"])
        .arg(dir.path().join("www"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--update-xml"));
}

#[test]
fn test_catalog_error_is_reported() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/plugins/plugins.xml?qgis=3.34")
        .with_status(404)
        .create();

    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");

    plugin_mirror(&root)
        .arg("--catalog-url")
        .arg(format!("{}/plugins/", server.url()))
        .args(["sync", "-u"])
        .assert()
        .failure();

    assert!(!root.join("plugins.xml").exists());
}
