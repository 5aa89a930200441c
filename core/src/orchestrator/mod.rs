//! Upload orchestrator.
//!
//! Owns the entry list, the queue and the active set of one upload
//! surface, and is the only place that mutates them:
//!
//! ```text
//! select_files ──▶ IntakePipeline ──▶ entries ──▶ enqueue ──▶ tick ──▶ Uploader
//!                   (Validator,                     ▲                    │
//!                    PreviewRegistry)               └──── finish ◀───────┘
//!                                                     (state machine,
//!                                                      NotificationBridge)
//! ```
//!
//! `tick` runs synchronously after every enqueue, completion, failure
//! and removal, and fills free slots from the head of the queue. Upload
//! callbacks run as tokio tasks on the runtime the orchestrator was
//! built in.
//!
//! # Example
//!
//! ```rust,ignore
//! use dropzone::{FileHandle, Orchestrator, SimulatedUploader};
//! use std::time::Duration;
//!
//! let orchestrator = Orchestrator::builder(SimulatedUploader::new(Duration::from_millis(300)))
//!     .build()?;
//! let file = FileHandle::from_path("photo.png").await?;
//! orchestrator.select_files(vec![file]).await?;
//! orchestrator.wait_idle().await;
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::config::{OrchestratorOptions, SelectionMode, UploadConfig};
use crate::error::{
    CapacityError, ConfigError, OrchestratorError, OrchestratorResult, RemoveError, TriggerError, UploadResult,
};
use crate::intake::{check_capacity, BatchSummary, IntakePipeline};
use crate::models::{Entry, FileHandle, UploadId};
use crate::notify::{NotificationBridge, NotificationSink, NoopSink};
use crate::preview::PreviewRegistry;
use crate::scheduler::{
    drive_upload, next_progress, ProgressReporter, ProgressSink, SimulatedProgress, UploadQueue, PROGRESS_DONE,
};
use crate::status::UploadStatus;
use crate::uploader::Uploader;
use crate::validation::{DecodingProbe, ImageProbe, Validator};


type EntriesHook = Arc<dyn Fn(&[Entry]) + Send + Sync>;
type RemoveHook = Arc<dyn Fn(UploadId) + Send + Sync>;

/// Caller-facing callbacks.
#[derive(Clone, Default)]
struct Hooks {
    on_files_select: Option<EntriesHook>,
    on_file_remove: Option<RemoveHook>,
    on_all_complete: Option<EntriesHook>,
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and builds an [`Orchestrator`].
pub struct OrchestratorBuilder {
    uploader: Arc<dyn Uploader>,
    config: UploadConfig,
    options: OrchestratorOptions,
    sink: Arc<dyn NotificationSink>,
    reporter: Arc<dyn ProgressReporter>,
    probe: Arc<dyn ImageProbe>,
    hooks: Hooks,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: UploadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Where notifications go. Defaults to [`NoopSink`].
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Progress source for in-flight uploads. Defaults to [`SimulatedProgress`].
    pub fn progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Image measuring for the dimension check. Defaults to [`DecodingProbe`].
    pub fn probe(mut self, probe: Arc<dyn ImageProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Called with the entries of every admitted batch.
    pub fn on_files_select(mut self, hook: impl Fn(&[Entry]) + Send + Sync + 'static) -> Self {
        self.hooks.on_files_select = Some(Arc::new(hook));
        self
    }

    /// Called with the id of every removed entry.
    pub fn on_file_remove(mut self, hook: impl Fn(UploadId) + Send + Sync + 'static) -> Self {
        self.hooks.on_file_remove = Some(Arc::new(hook));
        self
    }

    /// Called once every live entry has reached a terminal status.
    pub fn on_all_complete(mut self, hook: impl Fn(&[Entry]) + Send + Sync + 'static) -> Self {
        self.hooks.on_all_complete = Some(Arc::new(hook));
        self
    }

    /// Validate configuration and bind to the current tokio runtime.
    ///
    /// A configuration error is reported through the sink once and returned.
    pub fn build(self) -> OrchestratorResult<Orchestrator> {
        let bridge = NotificationBridge::new(self.sink);

        if let Err(e) = self.config.validate().and_then(|_| self.options.validate()) {
            bridge.config_invalid(&e);
            return Err(e.into());
        }

        let runtime = Handle::try_current().map_err(|e| OrchestratorError::NoRuntime(e.to_string()))?;

        log::debug!(
            "Orchestrator ready: mode={:?}, auto_upload={}, concurrency={}",
            self.options.mode,
            self.options.auto_upload,
            self.options.concurrency_limit
        );

        let state = State {
            config: Arc::new(self.config),
            entries: Vec::new(),
            queue: UploadQueue::new(self.options.concurrency_limit),
            reserved: 0,
            all_complete_fired: false,
            closed: false,
        };

        Ok(Orchestrator {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                options: self.options,
                uploader: self.uploader,
                reporter: self.reporter,
                probe: self.probe,
                previews: Arc::new(PreviewRegistry::new()),
                bridge,
                hooks: self.hooks,
                runtime,
                idle: Notify::new(),
            }),
        })
    }
}

// =============================================================================
// Shared State
// =============================================================================

struct State {
    config: Arc<UploadConfig>,
    /// Live entries in intake order
    entries: Vec<Entry>,
    queue: UploadQueue,
    /// Slots held by batches still being validated
    reserved: usize,
    all_complete_fired: bool,
    closed: bool,
}

impl State {
    fn entry_mut(&mut self, id: UploadId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.upload_id == id)
    }

    fn is_idle(&self) -> bool {
        self.queue.active_len() == 0 && self.queue.queued().is_empty()
    }

    /// Entries snapshot, once per quiescent period, when all are terminal.
    ///
    /// An empty list never fires; the latch resets on every admitted batch.
    fn take_all_complete(&mut self) -> Option<Vec<Entry>> {
        if self.all_complete_fired || self.entries.is_empty() || !self.entries.iter().all(Entry::is_terminal) {
            return None;
        }
        self.all_complete_fired = true;
        Some(self.entries.clone())
    }
}

struct Shared {
    state: Mutex<State>,
    options: OrchestratorOptions,
    uploader: Arc<dyn Uploader>,
    reporter: Arc<dyn ProgressReporter>,
    probe: Arc<dyn ImageProbe>,
    previews: Arc<PreviewRegistry>,
    bridge: NotificationBridge,
    hooks: Hooks,
    runtime: Handle,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fill free slots from the head of the queue.
    fn tick(self: &Arc<Self>) {
        let launches = {
            let mut state = self.lock();
            if state.closed {
                return;
            }

            let mut launches = Vec::new();
            loop {
                let State { queue, entries, .. } = &mut *state;
                let next = queue.admit_next(|id| {
                    entries
                        .iter()
                        .any(|e| e.upload_id == id && e.status == UploadStatus::Pending)
                });
                let Some(id) = next else { break };

                if let Some(file) = start_entry(&mut state, id) {
                    launches.push((id, file));
                }
            }
            launches
        };

        for (id, file) in launches {
            self.spawn_upload(id, file);
        }
    }

    fn spawn_upload(self: &Arc<Self>, id: UploadId, file: FileHandle) {
        let weak = Arc::downgrade(self);
        let sink = ProgressSink::new(move |percent| {
            if let Some(shared) = weak.upgrade() {
                shared.report_progress(id, percent);
            }
        });

        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = drive_upload(shared.uploader.as_ref(), shared.reporter.as_ref(), file, sink).await;
            shared.finish_upload(id, outcome);
        });
    }

    fn report_progress(&self, id: UploadId, percent: u8) {
        let mut state = self.lock();
        if let Some(entry) = state.entry_mut(id) {
            if entry.status == UploadStatus::Uploading {
                entry.progress = next_progress(entry.progress, percent);
            }
        }
    }

    fn finish_upload(self: &Arc<Self>, id: UploadId, outcome: UploadResult) {
        let finished = {
            let mut state = self.lock();
            state.queue.finish(id);

            let finished = match state.entry_mut(id) {
                Some(entry) => {
                    let next = if outcome.is_ok() {
                        UploadStatus::Completed
                    } else {
                        UploadStatus::Error
                    };
                    match entry.status.transition(next) {
                        Ok(status) => {
                            entry.status = status;
                            match &outcome {
                                Ok(()) => entry.progress = PROGRESS_DONE,
                                Err(e) => entry.error = Some(e.message().to_string()),
                            }
                            Some(entry.clone())
                        }
                        Err(e) => {
                            log::error!("Ignoring upload outcome for {}: {}", id, e);
                            None
                        }
                    }
                }
                None => {
                    log::warn!("Upload finished for unknown entry {}", id);
                    None
                }
            };

            finished
        };

        if let Some(entry) = finished {
            match &outcome {
                Ok(()) => {
                    log::info!("Uploaded {}", entry.name);
                    self.bridge.upload_succeeded(&entry);
                }
                Err(e) => {
                    log::warn!("Upload of {} failed: {}", entry.name, e);
                    self.bridge.upload_failed(&entry, e.message());
                }
            }
        }

        self.check_all_complete();
        self.tick();

        if self.lock().is_idle() {
            self.idle.notify_waiters();
        }
    }

    /// Fire `on_all_complete` if every live entry is now terminal.
    fn check_all_complete(&self) {
        let all_complete = self.lock().take_all_complete();
        if let (Some(entries), Some(hook)) = (all_complete, &self.hooks.on_all_complete) {
            hook(&entries);
        }
    }

    fn removed(self: &Arc<Self>, ids: &[UploadId]) {
        for id in ids {
            self.previews.release(*id);
            if let Some(hook) = &self.hooks.on_file_remove {
                hook(*id);
            }
        }
    }
}

/// `Pending -> Uploading` for an id the queue just admitted.
fn start_entry(state: &mut State, id: UploadId) -> Option<FileHandle> {
    let started = match state.entry_mut(id) {
        Some(entry) => match entry.status.transition(UploadStatus::Uploading) {
            Ok(status) => {
                entry.status = status;
                log::info!("Uploading {}", entry.name);
                Some(entry.file.clone())
            }
            Err(e) => {
                log::error!("Cannot start {}: {}", id, e);
                None
            }
        },
        None => None,
    };

    if started.is_none() {
        state.queue.finish(id);
    }
    started
}

/// Releases reserved intake slots if the batch future is dropped early.
struct Reservation<'a> {
    shared: &'a Shared,
    count: usize,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            let mut state = self.shared.lock();
            state.reserved = state.reserved.saturating_sub(self.count);
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Handle to one upload surface. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Start building an orchestrator around an upload transport.
    pub fn builder(uploader: impl Uploader + 'static) -> OrchestratorBuilder {
        Self::builder_arc(Arc::new(uploader))
    }

    pub fn builder_arc(uploader: Arc<dyn Uploader>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            uploader,
            config: UploadConfig::default(),
            options: OrchestratorOptions::default(),
            sink: Arc::new(NoopSink),
            reporter: Arc::new(SimulatedProgress::default()),
            probe: Arc::new(DecodingProbe),
            hooks: Hooks::default(),
        }
    }

    /// Admit a selection (drop or picker) as new entries.
    ///
    /// In multi-file mode the whole batch is refused when it would push
    /// the live count past `maxFiles`. In single-file mode only the first
    /// file is taken and it replaces the current entry. Files that fail
    /// validation are returned as `Error` entries.
    pub async fn select_files(&self, files: Vec<FileHandle>) -> OrchestratorResult<Vec<Entry>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let shared = &self.shared;

        let (files, config) = {
            let mut state = shared.lock();
            if state.closed {
                return Err(OrchestratorError::Closed);
            }

            let admitted = match shared.options.mode {
                SelectionMode::Multiple => {
                    check_capacity(state.config.max_files, state.entries.len() + state.reserved, files.len())
                        .map(|_| files)
                }
                SelectionMode::Single => single_slot_free(&state).map(|_| files.into_iter().take(1).collect()),
            };

            match admitted {
                Ok(files) => {
                    state.reserved += files.len();
                    (files, Arc::clone(&state.config))
                }
                Err(e) => {
                    drop(state);
                    log::warn!("Refused selection: {}", e);
                    shared.bridge.capacity_exceeded(&e);
                    return Err(e.into());
                }
            }
        };

        let mut reservation = Reservation {
            shared: shared.as_ref(),
            count: files.len(),
        };

        let validator = Validator::with_probe(config, Arc::clone(&shared.probe));
        let previews = shared.options.generate_previews.then_some(&shared.previews);
        let entries = IntakePipeline::new(validator, previews).admit(files).await;

        let removed = {
            let mut state = shared.lock();
            state.reserved = state.reserved.saturating_sub(reservation.count);
            reservation.count = 0;

            let refusal = if state.closed {
                Some(OrchestratorError::Closed)
            } else if shared.options.mode == SelectionMode::Single {
                single_slot_free(&state).err().map(OrchestratorError::from)
            } else {
                None
            };
            if let Some(e) = refusal {
                drop(state);
                for entry in &entries {
                    shared.previews.release(entry.upload_id);
                }
                if let OrchestratorError::Capacity(cap) = &e {
                    shared.bridge.capacity_exceeded(cap);
                }
                return Err(e);
            }

            let mut removed = Vec::new();
            if shared.options.mode == SelectionMode::Single {
                for old in state.entries.drain(..) {
                    removed.push(old.upload_id);
                }
                for id in &removed {
                    state.queue.remove(*id);
                }
            }

            state.all_complete_fired = false;
            state.entries.extend(entries.iter().cloned());
            removed
        };

        shared.removed(&removed);

        let summary = BatchSummary::of(&entries);
        log::info!(
            "Admitted batch of {}: {} pending, {} rejected",
            entries.len(),
            summary.admitted,
            summary.rejected
        );
        if let Some(hook) = &shared.hooks.on_files_select {
            hook(&entries);
        }
        shared.bridge.batch_summary(summary.admitted, summary.rejected);

        if shared.options.auto_upload {
            let pending: Vec<UploadId> = entries
                .iter()
                .filter(|e| e.status == UploadStatus::Pending)
                .map(|e| e.upload_id)
                .collect();
            self.enqueue(&pending);
        }
        shared.check_all_complete();

        Ok(entries)
    }

    /// Append pending entries to the queue tail, then tick.
    ///
    /// Ids that are unknown, not `Pending`, or already queued/active are
    /// skipped. Returns how many were queued.
    pub fn enqueue(&self, ids: &[UploadId]) -> usize {
        let queued = {
            let mut state = self.shared.lock();
            let mut queued = 0;
            for id in ids {
                let pending = state
                    .entries
                    .iter()
                    .any(|e| e.upload_id == *id && e.status == UploadStatus::Pending);
                if pending && state.queue.enqueue(*id) {
                    queued += 1;
                }
            }
            queued
        };

        if queued > 0 {
            log::debug!("Queued {} entr(y/ies)", queued);
        }
        self.tick();
        queued
    }

    /// Queue every pending entry, in intake order.
    pub fn upload_all(&self) -> usize {
        let pending: Vec<UploadId> = {
            let state = self.shared.lock();
            state
                .entries
                .iter()
                .filter(|e| e.status == UploadStatus::Pending)
                .map(|e| e.upload_id)
                .collect()
        };
        self.enqueue(&pending)
    }

    /// One scheduling pass. Safe to call at any time.
    pub fn tick(&self) {
        self.shared.tick();
    }

    /// Start one pending entry now, ahead of the queue (multi-file mode).
    ///
    /// Refused when every upload slot is busy.
    pub fn upload_entry(&self, id: UploadId) -> Result<(), TriggerError> {
        if self.shared.options.mode == SelectionMode::Single {
            return Err(TriggerError::SingleMode);
        }

        let file = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(TriggerError::Closed);
            }
            let status = state
                .entries
                .iter()
                .find(|e| e.upload_id == id)
                .map(|e| e.status)
                .ok_or(TriggerError::NotFound(id))?;
            if status != UploadStatus::Pending {
                return Err(TriggerError::NotPending { id, status });
            }
            if !state.queue.admit(id) {
                return Err(TriggerError::Busy {
                    limit: state.queue.limit(),
                });
            }
            start_entry(&mut state, id).ok_or(TriggerError::NotFound(id))?
        };

        self.shared.spawn_upload(id, file);
        Ok(())
    }

    /// Remove one entry and revoke its preview.
    ///
    /// A pending entry leaves the queue without its callback ever being
    /// invoked. Entries that are uploading cannot be removed.
    pub fn remove(&self, id: UploadId) -> Result<(), RemoveError> {
        {
            let mut state = self.shared.lock();
            let index = state
                .entries
                .iter()
                .position(|e| e.upload_id == id)
                .ok_or(RemoveError::NotFound(id))?;
            if !state.entries[index].status.is_removable() {
                return Err(RemoveError::Uploading(id));
            }
            let entry = state.entries.remove(index);
            state.queue.remove(id);
            log::info!("Removed {}", entry.name);
        }

        self.shared.removed(&[id]);
        self.tick();
        self.shared.check_all_complete();
        Ok(())
    }

    /// Remove every entry that is not uploading. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let removed: Vec<UploadId> = {
            let mut state = self.shared.lock();
            let (keep, drop): (Vec<Entry>, Vec<Entry>) =
                state.entries.drain(..).partition(|e| !e.status.is_removable());
            state.entries = keep;
            let ids: Vec<UploadId> = drop.iter().map(|e| e.upload_id).collect();
            for id in &ids {
                state.queue.remove(*id);
            }
            ids
        };

        if !removed.is_empty() {
            log::info!("Cleared {} entr(y/ies)", removed.len());
        }
        self.shared.removed(&removed);
        self.tick();
        self.shared.check_all_complete();
        removed.len()
    }

    /// Replace the admission rules for future selections.
    ///
    /// An invalid config is reported once, returned, and the current one
    /// stays in force. Existing entries are not re-validated.
    pub fn reconfigure(&self, config: UploadConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected configuration: {}", e);
            self.shared.bridge.config_invalid(&e);
            return Err(e);
        }
        self.shared.lock().config = Arc::new(config);
        Ok(())
    }

    /// Revoke every preview, drop the queue and stop starting uploads.
    ///
    /// Uploads already in flight still record their outcome.
    pub fn teardown(&self) {
        {
            let mut state = self.shared.lock();
            state.closed = true;
            state.queue.clear_queue();
        }
        let released = self.shared.previews.release_all();
        log::debug!("Teardown released {} preview(s)", released);
        if self.shared.lock().is_idle() {
            self.shared.idle.notify_waiters();
        }
    }

    /// Resolve once nothing is queued or uploading.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Snapshot of live entries in intake order.
    pub fn entries(&self) -> Vec<Entry> {
        self.shared.lock().entries.clone()
    }

    pub fn entry(&self, id: UploadId) -> Option<Entry> {
        self.shared.lock().entries.iter().find(|e| e.upload_id == id).cloned()
    }

    /// Queued ids, head first.
    pub fn queued(&self) -> Vec<UploadId> {
        self.shared.lock().queue.queued()
    }

    /// Ids currently uploading.
    pub fn active(&self) -> Vec<UploadId> {
        self.shared.lock().queue.active()
    }

    pub fn config(&self) -> Arc<UploadConfig> {
        Arc::clone(&self.shared.lock().config)
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.shared.options
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.shared.previews
    }
}

/// Single-file mode refuses a new selection while its entry uploads.
fn single_slot_free(state: &State) -> Result<(), CapacityError> {
    let busy = state.reserved > 0 || state.entries.iter().any(|e| e.status == UploadStatus::Uploading);
    if busy {
        return Err(CapacityError {
            max_files: 1,
            remaining: 0,
            incoming: 1,
        });
    }
    Ok(())
}
