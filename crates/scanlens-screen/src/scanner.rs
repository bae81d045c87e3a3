//! Per-screen scanner state holder.
//!
//! Owns the accumulated results for one detection kind, the UI state, the
//! camera selection and the camera on/off toggle. Operations return at once;
//! inference and persistence run as tasks that apply their outcome when they
//! complete. Tasks hold only a weak reference to the state, so completions
//! that arrive after the scanner is dropped are discarded.

use crate::engine::{Completion, EngineError, EngineHandle};
use crate::permission::{PermissionHub, PermissionId};
use crate::persist::{self, CardSink};
use crate::state::{Observable, UiState};
use crate::tasks::TaskScope;
use chrono::Utc;
use image::DynamicImage;
use scanlens_core::card;
use scanlens_core::{reconcile, Batch, Detection, DetectionKind, Reconciled, ResultSet};
use scanlens_hw::{CameraFacing, Frame, InputImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

const NOTHING_TO_SAVE: &str = "Nothing to save";
const PERMISSION_REQUIRED: &str = "permission required";
const MESSAGE_CAPACITY: usize = 16;

struct Shared<S> {
    kind: DetectionKind,
    engine: EngineHandle,
    sink: Arc<S>,
    permissions: PermissionHub,
    results: Observable<ResultSet>,
    ui_state: Observable<UiState>,
    camera_facing: Observable<CameraFacing>,
    camera_active: Observable<bool>,
    messages: broadcast::Sender<String>,
    /// Completion order of the live batch the results currently reflect; 0 before any.
    live_order: AtomicU64,
}

impl<S> Shared<S> {
    /// Reconcile `batch` into the results. Subscribers hear about real changes only.
    fn apply(&self, batch: Batch) -> bool {
        let live = batch.is_live();
        let changed = self.results.update(|set| merge(set, batch));
        tracing::trace!(kind = %self.kind, live, changed, "batch reconciled");
        changed
    }

    /// Reconcile a live batch unless a later-completed one has already been applied.
    ///
    /// The order check and the merge run under the same `results` write, so
    /// racing completions cannot interleave between them.
    fn apply_live(&self, order: u64, detections: Vec<Detection>) -> bool {
        let mut stale = false;
        let changed = self.results.update(|set| {
            if order <= self.live_order.load(Ordering::Relaxed) {
                stale = true;
                return false;
            }
            self.live_order.store(order, Ordering::Relaxed);
            merge(set, Batch::live(detections))
        });
        if stale {
            tracing::debug!(kind = %self.kind, order, "stale live batch discarded");
        } else {
            tracing::trace!(kind = %self.kind, order, changed, "live batch reconciled");
        }
        changed
    }

    fn fail(&self, err: &dyn std::error::Error) {
        tracing::warn!(kind = %self.kind, error = %err, "scanner operation failed");
        self.ui_state.set(UiState::error(err.to_string()));
    }

    fn notify(&self, message: String) {
        tracing::debug!(kind = %self.kind, %message, "informational message");
        // No subscribers means nobody is showing messages right now.
        let _ = self.messages.send(message);
    }
}

/// State holder for one detection screen.
///
/// Must be created and driven inside a Tokio runtime.
pub struct Scanner<S: CardSink> {
    // Declared first so in-flight tasks are aborted before the state goes away.
    tasks: TaskScope,
    shared: Arc<Shared<S>>,
}

impl<S: CardSink> Scanner<S> {
    pub fn new(engine: EngineHandle, sink: Arc<S>, permissions: PermissionHub) -> Self {
        let kind = engine.kind();
        let (messages, _) = broadcast::channel(MESSAGE_CAPACITY);
        tracing::debug!(%kind, "scanner created");
        Self {
            tasks: TaskScope::default(),
            shared: Arc::new(Shared {
                kind,
                engine,
                sink,
                permissions,
                results: Observable::default(),
                ui_state: Observable::default(),
                camera_facing: Observable::default(),
                camera_active: Observable::new(false),
                messages,
                live_order: AtomicU64::new(0),
            }),
        }
    }

    pub fn kind(&self) -> DetectionKind {
        self.shared.kind
    }

    pub fn results(&self) -> &Observable<ResultSet> {
        &self.shared.results
    }

    pub fn ui_state(&self) -> &Observable<UiState> {
        &self.shared.ui_state
    }

    pub fn camera_facing(&self) -> &Observable<CameraFacing> {
        &self.shared.camera_facing
    }

    pub fn camera_active(&self) -> &Observable<bool> {
        &self.shared.camera_active
    }

    /// One-shot informational messages such as "No barcodes found".
    pub fn messages(&self) -> broadcast::Receiver<String> {
        self.shared.messages.subscribe()
    }

    /// Analyze one live camera frame.
    ///
    /// Never blocks on inference. The frame is released on every path: here
    /// when the camera permission is missing or the engine is busy, otherwise
    /// on the engine thread once inference is done. The UI state is left alone
    /// on success; live frames are too frequent for a loading indicator.
    pub fn analyze_live(&self, frame: Frame) {
        let shared = &self.shared;
        if !shared.permissions.is_granted(PermissionId::Camera) {
            shared.ui_state.set(UiState::PermissionAction(PermissionId::Camera));
            frame.release();
            return;
        }

        let seq = frame.sequence;
        let reply = match shared.engine.try_detect(InputImage::Frame(frame)) {
            Ok(reply) => reply,
            Err(EngineError::Busy) => {
                tracing::debug!(kind = %shared.kind, seq, "engine busy; live frame dropped");
                return;
            }
            Err(e) => {
                shared.fail(&e);
                return;
            }
        };

        let weak = Arc::downgrade(&self.shared);
        self.tasks.spawn(async move {
            let completion = reply.completion().await;
            let Some(shared) = Weak::upgrade(&weak) else {
                return;
            };
            // The latest completed frame wins, whichever task runs last.
            match completion {
                Ok(Completion { order, result: Ok(detections) }) => {
                    shared.apply_live(order, detections);
                }
                Ok(Completion { result: Err(e), .. }) | Err(e) => shared.fail(&e),
            }
        });
    }

    /// Analyze a picked image identified by `image_id`.
    ///
    /// Goes to `Loading` immediately, then to `Idle` once the detections are
    /// merged (or `Error` on failure). An image with no detections leaves the
    /// results untouched and posts a "No … found" message.
    pub fn analyze_static(&self, image: DynamicImage, image_id: impl Into<String>) {
        let image_id = image_id.into();
        self.shared.ui_state.set(UiState::Loading);

        let engine = self.shared.engine.clone();
        let weak = Arc::downgrade(&self.shared);
        self.tasks.spawn(async move {
            let result = engine.detect(InputImage::Still(image)).await;
            let Some(shared) = Weak::upgrade(&weak) else {
                return;
            };
            match result {
                Ok(detections) => {
                    let found = detections.len();
                    let batch = Batch::still(image_id.as_str(), detections);
                    if batch.is_empty() {
                        shared.notify(format!("No {} found", shared.kind.plural_noun()));
                    } else {
                        let changed = shared.apply(batch);
                        tracing::info!(kind = %shared.kind, image = %image_id, found, changed, "image analyzed");
                    }
                    shared.ui_state.set(UiState::Idle);
                }
                Err(e) => shared.fail(&e),
            }
        });
    }

    pub fn toggle_camera_facing(&self) {
        self.shared.camera_facing.update(|facing| {
            *facing = facing.toggled();
            true
        });
    }

    /// Turn the live camera on or off. Requires the camera permission.
    pub fn toggle_camera_active(&self) {
        if !self.shared.permissions.is_granted(PermissionId::Camera) {
            self.shared.ui_state.set(UiState::error(PERMISSION_REQUIRED));
            return;
        }
        self.shared.camera_active.update(|active| {
            *active = !*active;
            true
        });
    }

    /// Save every accumulated result as a result card.
    ///
    /// The accumulated results are kept. Ends in `Idle` once all writes
    /// succeed, or `Error` at the first failed write.
    pub fn save(&self) {
        let cards = card::project(&self.shared.results.get(), Utc::now());
        if cards.is_empty() {
            self.shared.ui_state.set(UiState::error(NOTHING_TO_SAVE));
            return;
        }

        let sink = self.shared.sink.clone();
        let weak = Arc::downgrade(&self.shared);
        self.tasks.spawn(async move {
            let outcome = persist::save_all(&*sink, cards).await;
            let Some(shared) = Weak::upgrade(&weak) else {
                return;
            };
            match outcome {
                Ok(ids) => {
                    tracing::info!(kind = %shared.kind, saved = ids.len(), "results saved");
                    shared.ui_state.set(UiState::Idle);
                }
                Err(e) => shared.fail(&e),
            }
        });
    }

    /// Drop every accumulated result, live and still.
    pub fn clear_results(&self) {
        self.shared.results.update(|set| {
            if set.is_empty() {
                return false;
            }
            *set = ResultSet::new();
            true
        });
    }

    pub fn reset_ui_state(&self) {
        self.shared.ui_state.set(UiState::Idle);
    }

    /// Wait for every operation issued so far to finish.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }
}

/// Replace `set` with the reconciled result. Returns whether it changed.
fn merge(set: &mut ResultSet, batch: Batch) -> bool {
    match reconcile(set, batch) {
        Reconciled::Unchanged => false,
        Reconciled::Replaced(next) => {
            *set = next;
            true
        }
    }
}
