//! Writes exported documents and archives to the filesystem.
//!
//! A bulk archive becomes a gzip-compressed tarball whose entries sit under a
//! single top-level directory named after the archive.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::domain::{AppError, ExportArchive, ExportedDocument, Result};

/// Base name (without extension) of an archive exported at `at`.
#[must_use]
pub fn archive_name(at: DateTime<Local>) -> String {
    format!("claude-export-{}", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Writes the archive to `<parent>/<name>.tar.gz`.
///
/// The tarball is built under a `.part` name and renamed once complete, so
/// a failed export leaves nothing behind. Returns the written file.
///
/// # Errors
/// Returns error if the target already exists or any write fails.
pub fn write_archive(archive: &ExportArchive, parent: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(parent)
        .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e))?;

    let target = parent.join(format!("{name}.tar.gz"));
    if target.exists() {
        return Err(AppError::io(
            format!("Refusing to overwrite {}", target.display()),
            io::ErrorKind::AlreadyExists.into(),
        ));
    }

    let partial = parent.join(format!("{name}.tar.gz.part"));
    let written = write_tarball(archive, &partial, name)
        .and_then(|()| fs::rename(&partial, &target))
        .map_err(|e| AppError::io(format!("Failed to write {}", target.display()), e));

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&partial) {
            tracing::debug!(
                file = %partial.display(),
                error = %cleanup,
                "No partial archive to remove"
            );
        }
        return Err(e);
    }

    tracing::info!(
        file = %target.display(),
        entries = archive.entries.len(),
        "Archive written"
    );

    Ok(target)
}

fn write_tarball(archive: &ExportArchive, path: &Path, prefix: &str) -> io::Result<()> {
    let file: File = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let mtime = u64::try_from(archive.summary.exported_at.timestamp()).unwrap_or(0);

    for entry in &archive.entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder.append_data(
            &mut header,
            format!("{prefix}/{}", entry.name),
            entry.bytes.as_slice(),
        )?;
        tracing::debug!(entry = %entry.name, bytes = entry.bytes.len(), "Added archive entry");
    }

    builder.into_inner()?.finish()?.sync_all()
}

/// Writes a single document to `path`, or into `path` when it is a directory.
///
/// Returns the file that was written.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn write_document(document: &ExportedDocument, path: &Path) -> Result<PathBuf> {
    let target = if path.is_dir() {
        path.join(&document.file_name)
    } else {
        path.to_path_buf()
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e))?;
    }

    fs::write(&target, &document.bytes)
        .map_err(|e| AppError::io(format!("Failed to write {}", target.display()), e))?;

    Ok(target)
}
