//! Domain models for the upload orchestrator.
//!
//! - [`UploadId`] - Opaque, never-reused identifier of a tracked selection
//! - [`FileHandle`] - Immutable handle to the bytes the user selected
//! - [`FileSource`] - Where those bytes live (disk or memory)
//! - [`Entry`] - One tracked file with its status, progress and error

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::preview::PreviewUri;
use crate::status::UploadStatus;

/// MIME type used when nothing better is known.
pub const DEFAULT_MIME: &str = "application/octet-stream";

static MIME_BY_EXTENSION: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("bmp", "image/bmp"),
        ("svg", "image/svg+xml"),
        ("pdf", "application/pdf"),
        ("json", "application/json"),
        ("zip", "application/zip"),
        ("txt", "text/plain"),
        ("csv", "text/csv"),
        ("html", "text/html"),
        ("mp4", "video/mp4"),
        ("mp3", "audio/mpeg"),
    ])
});

/// Guess a MIME type from a file name's extension.
pub fn guess_mime(name: &str) -> &'static str {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| MIME_BY_EXTENSION.get(e.to_lowercase().as_str()).copied())
        .unwrap_or(DEFAULT_MIME)
}

// =============================================================================
// Upload Identifier
// =============================================================================

/// Unique token assigned to every entry at intake.
///
/// Backed by a random v4 UUID, so ids are never reused across the
/// lifetime of an orchestrator (or across orchestrators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// File Handle
// =============================================================================

/// Where a selected file's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on disk, read lazily.
    Path(PathBuf),
    /// Bytes already held in memory (e.g. a dropped blob).
    Memory(Arc<[u8]>),
}

impl FileSource {
    /// Read the full contents.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Opaque handle to one selected file.
///
/// Cloning is cheap and the handle is never mutated after creation.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    size: u64,
    mime: String,
    source: FileSource,
}

impl FileHandle {
    /// Build a handle for an on-disk file, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime = guess_mime(&name).to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            mime,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Build an in-memory handle.
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime: mime.into(),
            source: FileSource::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Whether the MIME type is an `image/*` type.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Read the full contents of the file.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        self.source.read().await
    }
}

// =============================================================================
// Entry
// =============================================================================

/// One tracked file selection.
///
/// `status`, `progress` and `error` are the system of record for the
/// outcome of the file; notifications only mirror them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Assigned at intake, never reused
    pub upload_id: UploadId,
    /// The selected file
    #[serde(skip)]
    pub file: FileHandle,
    /// File name, mirrored for serialisation
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Preview URI, only for live image entries
    pub preview: Option<PreviewUri>,
    /// Current lifecycle status
    pub status: UploadStatus,
    /// 0..=100
    pub progress: u8,
    /// Set only when `status` is `Error`
    pub error: Option<String>,
    /// When the entry was created
    pub added_at: DateTime<Utc>,
}

impl Entry {
    /// An entry that passed validation and waits for upload.
    pub fn pending(file: FileHandle) -> Self {
        Self::new(file, UploadStatus::Pending, None)
    }

    /// An entry that failed validation; it never enters `Pending`.
    pub fn rejected(file: FileHandle, message: impl Into<String>) -> Self {
        Self::new(file, UploadStatus::Error, Some(message.into()))
    }

    fn new(file: FileHandle, status: UploadStatus, error: Option<String>) -> Self {
        Self {
            upload_id: UploadId::new(),
            name: file.name().to_string(),
            size: file.size(),
            file,
            preview: None,
            status,
            progress: 0,
            error,
            added_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
