//! Archive/upload collaborator: packages captured photos under a session
//! identifier and reports progress through a callback.

use crate::{sequencer::PhotoRecord, Error, Result};
use log::info;
use std::{
    fs::File,
    io::{Seek, Write},
    path::{Path, PathBuf},
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Progress report: percentage (0-100) and a status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub percent: u8,
    pub message: String,
}

impl UploadProgress {
    #[must_use]
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// One file inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, `{session}/{label}_{n}.jpg`
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What an uploader produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub archive_name: String,
    pub entries: Vec<String>,
    pub total_bytes: u64,
    /// Where the archive ended up, if it has a local location
    pub location: Option<PathBuf>,
}

/// Transport for a finished session.
///
/// Implementations own packaging and transfer. A failed upload leaves the
/// photo list untouched, so the caller may simply call `upload` again.
pub trait ArchiveUploader {
    /// # Errors
    ///
    /// Returns [`Error::UploadError`] (or an I/O error) when packaging or
    /// transfer fails.
    fn upload(
        &mut self,
        session_id: &str,
        photos: &[PhotoRecord],
        progress: &mut dyn FnMut(UploadProgress),
    ) -> Result<UploadReceipt>;
}

/// Keep label characters that are safe in file names
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Archive file name for a session
#[must_use]
pub fn archive_name(session_id: &str) -> String {
    format!("{}.zip", sanitize_label(session_id))
}

/// Name the archive entries `{session}/{label}_{n}.jpg`, numbered from 1.
///
/// # Errors
///
/// Returns [`Error::UploadError`] for an empty photo list or a blank session id.
pub fn archive_entries(session_id: &str, photos: &[PhotoRecord]) -> Result<Vec<ArchiveEntry>> {
    if photos.is_empty() {
        return Err(Error::UploadError("No photos to upload".to_string()));
    }
    if session_id.trim().is_empty() {
        return Err(Error::UploadError("Session identifier is required".to_string()));
    }

    let folder = sanitize_label(session_id);
    Ok(photos
        .iter()
        .enumerate()
        .map(|(i, photo)| ArchiveEntry {
            name: format!("{folder}/{}_{}.jpg", sanitize_label(&photo.label), i + 1),
            bytes: photo.image.clone(),
        })
        .collect())
}

/// Compress entries into a zip archive, reporting progress from 30% to 90%.
///
/// # Errors
///
/// Returns [`Error::Archive`] or an I/O error when the archive cannot be written.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    entries: &[ArchiveEntry],
    progress: &mut dyn FnMut(UploadProgress),
) -> Result<W> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let total = entries.len().max(1);

    for (i, entry) in entries.iter().enumerate() {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
        let pct = (i + 1) * 100 / total;
        progress(UploadProgress::new(
            u8::try_from(30 + pct * 60 / 100).unwrap_or(90),
            format!("Compressing: {pct}%"),
        ));
    }
    Ok(zip.finish()?)
}

/// Writes the session archive as `{root}/{session}.zip`
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveUploader for DirectoryUploader {
    fn upload(
        &mut self,
        session_id: &str,
        photos: &[PhotoRecord],
        progress: &mut dyn FnMut(UploadProgress),
    ) -> Result<UploadReceipt> {
        let entries = archive_entries(session_id, photos)?;
        progress(UploadProgress::new(10, "Preparing archive"));

        std::fs::create_dir_all(&self.root)?;
        let name = archive_name(session_id);
        let path = self.root.join(&name);
        let file = write_archive(File::create(&path)?, &entries, progress)?;

        progress(UploadProgress::new(90, "Transferring"));
        file.sync_all()?;
        let total_bytes = file.metadata()?.len();
        progress(UploadProgress::new(100, "Upload complete"));

        let receipt = UploadReceipt {
            archive_name: name,
            entries: entries.into_iter().map(|e| e.name).collect(),
            total_bytes,
            location: Some(path),
        };
        info!(
            "Uploaded {} photos ({} bytes) for session {session_id}",
            receipt.entries.len(),
            receipt.total_bytes
        );
        Ok(receipt)
    }
}
