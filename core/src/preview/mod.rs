//! Preview Registry - transient preview URIs bound to entries.
//!
//! A preview is a `blob:` style URI that points at the in-memory (or
//! on-disk) bytes of an image entry, for thumbnail rendering. Each URI is
//! bound 1:1 to an [`UploadId`] and must be released exactly once: when
//! the entry is removed, on bulk clear, or when the registry is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{FileHandle, FileSource, UploadId};

/// Scheme prefix of every preview URI.
const URI_PREFIX: &str = "blob:dropzone/";

/// A live preview URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewUri(String);

impl PreviewUri {
    fn mint() -> Self {
        Self(format!("{}{}", URI_PREFIX, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One allocated preview
#[derive(Debug)]
struct StoredPreview {
    uri: PreviewUri,
    source: FileSource,
}

/// Owns every preview resource of one orchestrator.
///
/// Internally synchronised so intake can allocate while the scheduler
/// holds its own state.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    /// Live previews (upload id -> preview)
    previews: Mutex<HashMap<UploadId, StoredPreview>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UploadId, StoredPreview>> {
        self.previews.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a preview for an image file.
    ///
    /// Returns `None` for non-image files. Allocating twice for the same
    /// id returns the existing URI rather than leaking a second one.
    pub fn allocate(&self, id: UploadId, file: &FileHandle) -> Option<PreviewUri> {
        if !file.is_image() {
            return None;
        }

        let mut previews = self.lock();
        let stored = previews.entry(id).or_insert_with(|| {
            let uri = PreviewUri::mint();
            log::debug!("Allocated preview {} for {}", uri, file.name());
            StoredPreview {
                uri,
                source: file.source().clone(),
            }
        });
        Some(stored.uri.clone())
    }

    /// Revoke the preview bound to `id`.
    ///
    /// Idempotent: returns `false` when nothing was allocated or it was
    /// already released.
    pub fn release(&self, id: UploadId) -> bool {
        match self.lock().remove(&id) {
            Some(stored) => {
                log::debug!("Revoked preview {}", stored.uri);
                true
            }
            None => false,
        }
    }

    /// Revoke every live preview, returning how many were released.
    pub fn release_all(&self) -> usize {
        let released: Vec<StoredPreview> = self.lock().drain().map(|(_, p)| p).collect();
        for stored in &released {
            log::debug!("Revoked preview {}", stored.uri);
        }
        released.len()
    }

    /// Look up the bytes behind a live URI.
    pub fn resolve(&self, uri: &PreviewUri) -> Option<FileSource> {
        self.lock()
            .values()
            .find(|p| &p.uri == uri)
            .map(|p| p.source.clone())
    }

    pub fn get(&self, id: UploadId) -> Option<PreviewUri> {
        self.lock().get(&id).map(|p| p.uri.clone())
    }

    /// Number of previews currently allocated.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }
}

impl Drop for PreviewRegistry {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            log::debug!("Released {} preview(s) on teardown", released);
        }
    }
}
