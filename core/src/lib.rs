//! # Dropzone - file upload orchestration
//!
//! Dropzone takes files selected by a user (drag-and-drop or picker),
//! validates them against configurable constraints, tracks each one
//! through an upload lifecycle, and drives the uploads through a FIFO
//! queue with bounded concurrency.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Selection  │────▶│   Intake    │────▶│    Queue    │────▶│  Uploader   │
//! │ (FileHandle)│     │ (validate + │     │ (FIFO, N in │     │ (HTTP, sim, │
//! │             │     │  previews)  │     │   flight)   │     │  closure)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │                   │
//!                            ▼                   ▼                   ▼
//!                     ┌──────────────────────────────────────────────────┐
//!                     │     Entries (status machine) + Notifications     │
//!                     └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dropzone::{FileHandle, HttpUploader, Orchestrator, UploadConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Orchestrator::builder(HttpUploader::new("http://localhost:8080/upload"))
//!         .config(UploadConfig::default().with_max_files(5))
//!         .build()
//!         .unwrap();
//!
//!     let file = FileHandle::from_path("photo.png").await.unwrap();
//!     orchestrator.select_files(vec![file]).await.unwrap();
//!     orchestrator.wait_idle().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`config`] - Admission rules and orchestrator options
//! - [`models`] - File handles, upload ids and entries
//! - [`status`] - Upload status state machine
//! - [`validation`] - Size, type and image dimension checks
//! - [`preview`] - Preview URI registry
//! - [`intake`] - Selection to entries
//! - [`scheduler`] - FIFO queue, active set and progress
//! - [`uploader`] - Upload transports
//! - [`notify`] - Notification bridge and sinks
//! - [`orchestrator`] - The facade tying it all together

// Core modules
pub mod error;
pub mod config;
pub mod models;
pub mod status;

// Admission
pub mod validation;
pub mod preview;
pub mod intake;

// Scheduling
pub mod scheduler;
pub mod uploader;

// Reporting
pub mod notify;

// Facade
pub mod orchestrator;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CapacityError,
    ConfigError,
    NotifyError,
    OrchestratorError,
    RemoveError,
    TransitionError,
    TriggerError,
    UploadError,
    ValidationError,
    DEFAULT_UPLOAD_ERROR,
};

// =============================================================================
// Re-exports - Models & Config
// =============================================================================

pub use config::{OrchestratorOptions, SelectionMode, UploadConfig};
pub use models::{Entry, FileHandle, FileSource, UploadId};
pub use status::UploadStatus;

// =============================================================================
// Re-exports - Components
// =============================================================================

pub use validation::{format_size, DecodingProbe, ImageProbe, ProbeOutcome, Validator};
pub use preview::{PreviewRegistry, PreviewUri};
pub use scheduler::{NoProgress, ProgressReporter, ProgressSink, SimulatedProgress};
pub use uploader::{HttpUploader, SimulatedUploader, Uploader};
pub use notify::{
    BroadcastSink,
    LogSink,
    NoopSink,
    Notification,
    NotificationLevel,
    NotificationSink,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
