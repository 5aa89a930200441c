//! Per-file admission checks.
//!
//! Checks run in order and stop at the first failure:
//!
//! 1. **Size** - `file.size > maxSize`
//! 2. **Type** - MIME type not in a non-empty `allowedTypes`
//! 3. **Dimensions** (images only) - decoded width/height above
//!    `maxWidth`/`maxHeight`, or the image cannot be read at all
//!
//! The only I/O is the dimension probe, which is asynchronous.
//!
//! # Example
//!
//! ```rust,ignore
//! use dropzone::{FileHandle, UploadConfig, Validator};
//!
//! let validator = Validator::new(UploadConfig::default().with_max_size(1024).into());
//! let file = FileHandle::from_bytes("big.bin", "application/octet-stream", vec![0u8; 2048]);
//! let err = validator.validate(&file).await.unwrap_err();
//! assert_eq!(err.to_string(), "File size must be less than 1 KB");
//! ```

mod probe;
mod size;

pub use probe::{DecodingProbe, ImageProbe, ProbeOutcome};
pub use size::format_size;

use std::sync::Arc;

use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::models::FileHandle;

/// Applies an [`UploadConfig`] to individual files.
#[derive(Clone)]
pub struct Validator {
    config: Arc<UploadConfig>,
    probe: Arc<dyn ImageProbe>,
}

impl Validator {
    /// Validator with the header-reading [`DecodingProbe`].
    pub fn new(config: Arc<UploadConfig>) -> Self {
        Self::with_probe(config, Arc::new(DecodingProbe))
    }

    pub fn with_probe(config: Arc<UploadConfig>, probe: Arc<dyn ImageProbe>) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Run every check against `file`.
    pub async fn validate(&self, file: &FileHandle) -> Result<(), ValidationError> {
        self.check_size(file)?;
        self.check_type(file)?;
        if file.is_image() {
            self.check_dimensions(file).await?;
        }
        Ok(())
    }

    fn check_size(&self, file: &FileHandle) -> Result<(), ValidationError> {
        if file.size() > self.config.max_size {
            return Err(ValidationError::TooLarge {
                limit: format_size(self.config.max_size),
            });
        }
        Ok(())
    }

    fn check_type(&self, file: &FileHandle) -> Result<(), ValidationError> {
        if !self.config.allows_type(file.mime()) {
            let allowed: Vec<&str> = self.config.allowed_types.iter().map(String::as_str).collect();
            return Err(ValidationError::TypeNotAllowed {
                allowed: allowed.join(", "),
            });
        }
        Ok(())
    }

    async fn check_dimensions(&self, file: &FileHandle) -> Result<(), ValidationError> {
        match self.probe.probe(file).await {
            ProbeOutcome::Dimensions { width, height } => {
                if width > self.config.max_width || height > self.config.max_height {
                    log::debug!(
                        "{} is {}x{}, limit {}x{}",
                        file.name(),
                        width,
                        height,
                        self.config.max_width,
                        self.config.max_height
                    );
                    return Err(ValidationError::DimensionsExceeded {
                        max_width: self.config.max_width,
                        max_height: self.config.max_height,
                    });
                }
                Ok(())
            }
            ProbeOutcome::Unsupported => {
                log::debug!("Skipping dimension check for {} ({})", file.name(), file.mime());
                Ok(())
            }
            ProbeOutcome::Undecodable(reason) => {
                log::debug!("Could not decode {}: {}", file.name(), reason);
                Err(ValidationError::InvalidImage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::probe::tests::png_bytes;
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that reports a fixed outcome and counts calls.
    struct FixedProbe {
        outcome: ProbeOutcome,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(outcome: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ImageProbe for FixedProbe {
        fn probe(&self, _file: &FileHandle) -> BoxFuture<'static, ProbeOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(self.outcome.clone()).boxed()
        }
    }

    fn bytes(name: &str, mime: &str, len: usize) -> FileHandle {
        FileHandle::from_bytes(name, mime, vec![0u8; len])
    }

    #[tokio::test]
    async fn test_size_limit() {
        let validator = Validator::new(Arc::new(UploadConfig::default().with_max_size(1024)));

        assert!(validator.validate(&bytes("ok.bin", "application/pdf", 500)).await.is_ok());
        assert!(validator.validate(&bytes("edge.bin", "application/pdf", 1024)).await.is_ok());

        let err = validator
            .validate(&bytes("big.bin", "application/pdf", 2048))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 1 KB");
    }

    #[tokio::test]
    async fn test_type_allow_list() {
        let probe = FixedProbe::new(ProbeOutcome::Dimensions { width: 10, height: 10 });
        let config = UploadConfig::default().with_allowed_types(["image/png"]);
        let validator = Validator::with_probe(Arc::new(config), probe);

        let err = validator
            .validate(&bytes("a.jpg", "image/jpeg", 10))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeNotAllowed {
                allowed: "image/png".into()
            }
        );
        assert!(validator.validate(&bytes("a.png", "image/png", 10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_dimension_limit_from_real_png() {
        let config = UploadConfig::default().with_max_dimensions(100, 50);
        let validator = Validator::new(Arc::new(config));

        let small = FileHandle::from_bytes("s.png", "image/png", png_bytes(100, 50));
        assert!(validator.validate(&small).await.is_ok());

        let wide = FileHandle::from_bytes("w.png", "image/png", png_bytes(101, 10));
        assert_eq!(
            validator.validate(&wide).await.unwrap_err(),
            ValidationError::DimensionsExceeded {
                max_width: 100,
                max_height: 50
            }
        );

        let tall = FileHandle::from_bytes("t.png", "image/png", png_bytes(10, 51));
        assert!(validator.validate(&tall).await.is_err());
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let validator = Validator::new(Arc::new(UploadConfig::default()));
        let err = validator
            .validate(&bytes("broken.png", "image/png", 16))
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidImage);
        assert_eq!(err.to_string(), "Invalid image file");
    }

    #[tokio::test]
    async fn test_non_images_are_not_probed() {
        let probe = FixedProbe::new(ProbeOutcome::Undecodable("boom".into()));
        let validator = Validator::with_probe(Arc::new(UploadConfig::default()), probe.clone());

        assert!(validator.validate(&bytes("doc.pdf", "application/pdf", 10)).await.is_ok());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_size_failure_short_circuits_probe() {
        let probe = FixedProbe::new(ProbeOutcome::Dimensions { width: 1, height: 1 });
        let config = UploadConfig::default().with_max_size(4);
        let validator = Validator::with_probe(Arc::new(config), probe.clone());

        assert!(validator.validate(&bytes("a.png", "image/png", 5)).await.is_err());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
