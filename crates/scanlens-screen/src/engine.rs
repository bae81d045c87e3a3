use scanlens_core::{Detection, DetectionKind, Detector, DetectorError};
use scanlens_hw::{FrameError, InputImage};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Requests that may wait in the queue before new live frames are dropped.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("engine busy; input dropped")]
    Busy,
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
}

type Reply = Result<Vec<Detection>, EngineError>;

/// An inference outcome stamped with its place in the engine's completion order.
///
/// `order` starts at 1 and increases by one for every request the engine
/// finishes, so a larger value always means a later completion.
#[derive(Debug)]
pub struct Completion {
    pub order: u64,
    pub result: Reply,
}

/// One inference request sent to the engine thread.
struct EngineRequest {
    input: InputImage,
    reply: oneshot::Sender<Completion>,
}

/// Clone-safe handle to an engine thread.
///
/// The thread, and the detector it owns, shut down once every handle is dropped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    kind: DetectionKind,
}

/// Pending result of a request accepted by [`EngineHandle::try_detect`].
pub struct DetectionReply {
    rx: oneshot::Receiver<Completion>,
}

impl DetectionReply {
    pub async fn wait(self) -> Reply {
        self.completion().await?.result
    }

    /// The outcome together with its completion order.
    pub async fn completion(self) -> Result<Completion, EngineError> {
        self.rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

impl EngineHandle {
    pub fn kind(&self) -> DetectionKind {
        self.kind
    }

    /// Queue `input`, waiting for queue space, and await the detections.
    pub async fn detect(&self, input: InputImage) -> Reply {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest { input, reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        DetectionReply { rx }.wait().await
    }

    /// Queue `input` without waiting.
    ///
    /// When the queue is full the input is dropped on the spot (a frame is
    /// released back to the capture pipeline) and [`EngineError::Busy`] is returned.
    pub fn try_detect(&self, input: InputImage) -> Result<DetectionReply, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(EngineRequest { input, reply })
            .map_err(|e| match e {
                TrySendError::Full(_) => EngineError::Busy,
                TrySendError::Closed(_) => EngineError::ChannelClosed,
            })?;
        Ok(DetectionReply { rx })
    }
}

/// Spawn `detector` on a dedicated OS thread.
///
/// Requests are served in order. Frames are converted to upright images and
/// released on the engine thread as soon as inference finishes, before the
/// reply is sent.
pub fn spawn_engine<D: Detector>(detector: D, queue_depth: usize) -> Result<EngineHandle, EngineError> {
    let kind = detector.kind();
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name(format!("scanlens-{kind}"))
        .spawn(move || {
            let mut detector = detector;
            let mut completed: u64 = 0;
            tracing::info!(%kind, "engine thread started");
            while let Some(EngineRequest { input, reply }) = rx.blocking_recv() {
                let live = input.is_live();
                if reply.is_closed() {
                    tracing::debug!(%kind, live, "requester gone; skipping inference");
                    continue;
                }
                let result = run_detect(&mut detector, &input);
                drop(input);
                match &result {
                    Ok(found) => tracing::trace!(%kind, live, found = found.len(), "inference done"),
                    Err(e) => tracing::warn!(%kind, live, error = %e, "inference failed"),
                }
                completed += 1;
                let _ = reply.send(Completion {
                    order: completed,
                    result,
                });
            }
            tracing::info!(%kind, "engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx, kind })
}

fn run_detect<D: Detector>(detector: &mut D, input: &InputImage) -> Reply {
    let image = input.to_image()?;
    Ok(detector.detect(&image)?)
}
