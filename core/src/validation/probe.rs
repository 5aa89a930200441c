//! Image dimension probing.
//!
//! The validator only needs width and height, so the default probe reads
//! the image header with the `image` crate instead of decoding pixels.
//! Decoding runs on tokio's blocking pool.

use futures::future::{BoxFuture, FutureExt};
use std::io::Cursor;

use crate::models::{FileHandle, FileSource};

/// Result of probing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Dimensions { width: u32, height: u32 },
    /// The probe cannot measure this format; the dimension check is skipped
    Unsupported,
    /// The bytes are not a readable image
    Undecodable(String),
}

/// Asynchronously measures image files.
pub trait ImageProbe: Send + Sync {
    fn probe(&self, file: &FileHandle) -> BoxFuture<'static, ProbeOutcome>;
}

/// Vector formats the raster decoder does not measure.
const UNMEASURED_TYPES: [&str; 1] = ["image/svg+xml"];

/// Reads dimensions from the image header.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodingProbe;

impl ImageProbe for DecodingProbe {
    fn probe(&self, file: &FileHandle) -> BoxFuture<'static, ProbeOutcome> {
        if UNMEASURED_TYPES.iter().any(|t| *t == file.mime()) {
            return futures::future::ready(ProbeOutcome::Unsupported).boxed();
        }

        let source = file.source().clone();
        async move {
            match tokio::task::spawn_blocking(move || read_dimensions(&source)).await {
                Ok(Ok((width, height))) => ProbeOutcome::Dimensions { width, height },
                Ok(Err(e)) => ProbeOutcome::Undecodable(e.to_string()),
                Err(e) => ProbeOutcome::Undecodable(format!("decoder task failed: {}", e)),
            }
        }
        .boxed()
    }
}

fn read_dimensions(source: &FileSource) -> image::ImageResult<(u32, u32)> {
    match source {
        FileSource::Path(path) => image::io::Reader::open(path)?
            .with_guessed_format()?
            .into_dimensions(),
        FileSource::Memory(bytes) => image::io::Reader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()?
            .into_dimensions(),
    }
}
