//! Intake Pipeline - turns a raw selection into tracked entries.
//!
//! 1. Capacity check for the whole batch (all-or-nothing)
//! 2. Validate every file; failures become `Error` entries, not drops
//! 3. Allocate previews for valid image entries
//!
//! Locking, notifications and queue hand-off are done by the
//! orchestrator around these steps.

use std::sync::Arc;

use crate::error::CapacityError;
use crate::models::{Entry, FileHandle, UploadId};
use crate::preview::PreviewRegistry;
use crate::status::UploadStatus;
use crate::validation::Validator;

/// Counts reported after a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entries admitted as `Pending`
    pub admitted: usize,
    /// Entries admitted as `Error`
    pub rejected: usize,
}

impl BatchSummary {
    pub fn of(entries: &[Entry]) -> Self {
        let admitted = entries
            .iter()
            .filter(|e| e.status == UploadStatus::Pending)
            .count();
        Self {
            admitted,
            rejected: entries.len() - admitted,
        }
    }
}

/// Refuse the whole batch when `live + incoming` would exceed `max_files`.
pub fn check_capacity(max_files: usize, live: usize, incoming: usize) -> Result<(), CapacityError> {
    if live + incoming > max_files {
        return Err(CapacityError {
            max_files,
            remaining: max_files.saturating_sub(live),
            incoming,
        });
    }
    Ok(())
}

/// Validator plus preview allocation for one batch.
pub struct IntakePipeline<'a> {
    validator: Validator,
    previews: Option<&'a Arc<PreviewRegistry>>,
}

impl<'a> IntakePipeline<'a> {
    /// `previews` is `None` when preview generation is disabled.
    pub fn new(validator: Validator, previews: Option<&'a Arc<PreviewRegistry>>) -> Self {
        Self { validator, previews }
    }

    /// Validate each file in order and build its entry.
    ///
    /// Dropping the future midway releases the previews it allocated.
    pub async fn admit(&self, files: Vec<FileHandle>) -> Vec<Entry> {
        let mut entries = Vec::with_capacity(files.len());
        let mut allocated = PreviewGuard {
            registry: self.previews,
            ids: Vec::new(),
        };

        for file in files {
            let entry = match self.validator.validate(&file).await {
                Ok(()) => {
                    let mut entry = Entry::pending(file);
                    if let Some(previews) = self.previews {
                        entry.preview = previews.allocate(entry.upload_id, &entry.file);
                        if entry.preview.is_some() {
                            allocated.ids.push(entry.upload_id);
                        }
                    }
                    entry
                }
                Err(e) => {
                    log::info!("Rejected {}: {}", file.name(), e);
                    Entry::rejected(file, e.to_string())
                }
            };
            entries.push(entry);
        }

        allocated.ids.clear();
        entries
    }
}

/// Previews of a batch that has not been handed back yet.
struct PreviewGuard<'a> {
    registry: Option<&'a Arc<PreviewRegistry>>,
    ids: Vec<UploadId>,
}

impl Drop for PreviewGuard<'_> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry {
            for id in self.ids.drain(..) {
                registry.release(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::validation::{ImageProbe, ProbeOutcome};
    use futures::future::{BoxFuture, FutureExt};

    fn file(name: &str, mime: &str, len: usize) -> FileHandle {
        FileHandle::from_bytes(name, mime, vec![0u8; len])
    }

    #[test]
    fn test_capacity_is_all_or_nothing() {
        assert!(check_capacity(2, 1, 1).is_ok());
        let err = check_capacity(2, 2, 1).unwrap_err();
        assert_eq!(err.remaining, 0);
        assert_eq!(err.incoming, 1);

        let err = check_capacity(10, 7, 5).unwrap_err();
        assert_eq!(err.remaining, 3);
    }

    #[tokio::test]
    async fn test_scenario_size_limit() {
        let config = UploadConfig::default().with_max_size(1024);
        let pipeline = IntakePipeline::new(Validator::new(Arc::new(config)), None);

        let entries = pipeline
            .admit(vec![file("small.bin", "application/pdf", 500), file("big.bin", "application/pdf", 2048)])
            .await;

        assert_eq!(entries[0].status, UploadStatus::Pending);
        assert!(entries[0].error.is_none());
        assert_eq!(entries[1].status, UploadStatus::Error);
        assert!(entries[1].error.as_deref().unwrap().contains("1 KB"));
        assert_ne!(entries[0].upload_id, entries[1].upload_id);
        assert_eq!(BatchSummary::of(&entries), BatchSummary { admitted: 1, rejected: 1 });
    }

    #[tokio::test]
    async fn test_previews_only_for_valid_images() {
        let previews = Arc::new(PreviewRegistry::new());
        let config = UploadConfig::default().with_allowed_types(["image/svg+xml", "text/plain"]);
        let pipeline = IntakePipeline::new(Validator::new(Arc::new(config)), Some(&previews));

        let entries = pipeline
            .admit(vec![
                file("logo.svg", "image/svg+xml", 10),
                file("notes.txt", "text/plain", 10),
                file("photo.png", "image/png", 10),
            ])
            .await;

        assert!(entries[0].preview.is_some());
        assert!(entries[1].preview.is_none());
        assert_eq!(entries[2].status, UploadStatus::Error);
        assert!(entries[2].preview.is_none());
        assert_eq!(previews.live_count(), 1);
    }

    /// Measures the first file, then never answers again.
    struct StallAfterFirst(std::sync::atomic::AtomicBool);

    impl ImageProbe for StallAfterFirst {
        fn probe(&self, _file: &FileHandle) -> BoxFuture<'static, ProbeOutcome> {
            if self.0.swap(true, std::sync::atomic::Ordering::SeqCst) {
                futures::future::pending::<ProbeOutcome>().boxed()
            } else {
                futures::future::ready(ProbeOutcome::Dimensions { width: 10, height: 10 }).boxed()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_batch_releases_previews() {
        let previews = Arc::new(PreviewRegistry::new());
        let probe = Arc::new(StallAfterFirst(Default::default()));
        let validator = Validator::with_probe(Arc::new(UploadConfig::default()), probe);
        let pipeline = IntakePipeline::new(validator, Some(&previews));

        let batch = pipeline.admit(vec![file("a.png", "image/png", 10), file("b.png", "image/png", 10)]);
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(1), batch).await;

        assert!(outcome.is_err());
        assert_eq!(previews.live_count(), 0);
    }

    #[tokio::test]
    async fn test_previews_disabled() {
        let pipeline = IntakePipeline::new(Validator::new(Arc::new(UploadConfig::default())), None);
        let entries = pipeline.admit(vec![file("logo.svg", "image/svg+xml", 10)]).await;
        assert!(entries[0].preview.is_none());
    }
}
