use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::ArchiveExtractor;

/// Extractor for .zip archives
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
    ) -> Result<()> {
        let mut archive = open_archive(runtime, archive_path)?;

        runtime.create_dir_all(dest)?;
        let scratch = scratch_dir(dest)?;
        if runtime.exists(&scratch) {
            runtime.remove_dir_all(&scratch)?;
        }
        runtime.create_dir_all(&scratch)?;

        let result = unpack(runtime, &mut archive, &scratch)
            .and_then(|_| move_into_place(runtime, &scratch, dest));

        if let Err(e) = runtime.remove_dir_all(&scratch) {
            warn!("Failed to remove scratch directory {:?}: {:#}", scratch, e);
        }
        result.with_context(|| format!("Failed to extract {:?}", archive_path))
    }
}

fn open_archive<R: Runtime>(runtime: &R, archive_path: &Path) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    let mut file = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

    // zip needs Read + Seek; Runtime::open only gives Read.
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

    ZipArchive::new(Cursor::new(buffer)).context("Failed to parse ZIP archive")
}

/// `<dest>_temp_extract`, next to `dest` so the final moves are renames on
/// one filesystem.
fn scratch_dir(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .ok_or_else(|| anyhow!("Invalid extraction target {:?}", dest))?;
    Ok(dest.with_file_name(format!("{}_temp_extract", name.to_string_lossy())))
}

fn unpack<R: Runtime>(
    runtime: &R,
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    scratch: &Path,
) -> Result<()> {
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry {}", i))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                debug!("Skipping entry with unsafe path {:?}", entry.name());
                continue;
            }
        };

        let full_path = scratch.join(&entry_path);

        if entry.is_dir() {
            runtime.create_dir_all(&full_path)?;
        } else {
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut dest_file = runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode()
                && let Err(e) = runtime.set_permissions(&full_path, mode)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        }
    }
    Ok(())
}

fn move_into_place<R: Runtime>(runtime: &R, scratch: &Path, dest: &Path) -> Result<()> {
    let entries = runtime
        .read_dir(scratch)
        .context("Failed to read temp extraction directory")?;
    if entries.is_empty() {
        return Err(anyhow!("Archive appears to be empty."));
    }

    for item in entries {
        let name = item
            .file_name()
            .ok_or_else(|| anyhow!("Invalid entry {:?}", item))?;
        let target = dest.join(name);
        if runtime.is_dir(&target) {
            runtime.remove_dir_all(&target)?;
        } else if runtime.exists(&target) {
            runtime.remove_file(&target)?;
        }
        debug!("Installing {:?}", target);
        runtime.rename(&item, &target)?;
    }
    Ok(())
}
