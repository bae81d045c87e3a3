//! Test doubles for the inference and storage collaborators.

use crate::persist::CardSink;
use image::DynamicImage;
use scanlens_core::{BarcodeFormat, Detection, DetectionKind, Detector, DetectorError, ResultCard};
use scanlens_hw::{Frame, PixelFormat};
use scanlens_store::StoreError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub(crate) fn barcode(raw: &str) -> Detection {
    Detection::Barcode {
        raw_value: raw.into(),
        display_value: raw.into(),
        format: BarcodeFormat::QrCode,
        bounds: None,
    }
}

pub(crate) fn still() -> DynamicImage {
    DynamicImage::new_luma8(32, 32)
}

/// Counts how often a frame's release callback ran.
#[derive(Clone, Default)]
pub(crate) struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) fn counted_frame(frame: Frame) -> (Frame, ReleaseCounter) {
    let counter = ReleaseCounter::default();
    let c = counter.clone();
    let frame = frame.on_release(move || {
        c.0.fetch_add(1, Ordering::SeqCst);
    });
    (frame, counter)
}

pub(crate) fn gray_frame() -> (Frame, ReleaseCounter) {
    counted_frame(Frame::new(vec![128; 16], 4, 4, PixelFormat::Gray))
}

/// Poll `cond` until it holds, failing the test after a couple of seconds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Default)]
struct ProbeState {
    script: Mutex<VecDeque<Result<Vec<Detection>, String>>>,
    calls: AtomicUsize,
    dropped: AtomicBool,
}

/// Test-side view of a [`ScriptedDetector`] that lives on the engine thread.
#[derive(Clone, Default)]
pub(crate) struct Probe(Arc<ProbeState>);

impl Probe {
    pub(crate) fn push_ok(&self, detections: Vec<Detection>) {
        self.script().push_back(Ok(detections));
    }

    pub(crate) fn push_err(&self, message: &str) {
        self.script().push_back(Err(message.to_string()));
    }

    pub(crate) fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.0.dropped.load(Ordering::SeqCst)
    }

    fn script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<Detection>, String>>> {
        self.0.script.lock().unwrap()
    }
}

/// Detector that replays scripted results; an empty script yields no detections.
pub(crate) struct ScriptedDetector {
    kind: DetectionKind,
    probe: Probe,
    gate: Option<mpsc::Receiver<()>>,
}

impl ScriptedDetector {
    pub(crate) fn new(kind: DetectionKind) -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                kind,
                probe: probe.clone(),
                gate: None,
            },
            probe,
        )
    }

    /// Make every call block until the returned sender delivers one unit.
    pub(crate) fn gate(&mut self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        tx
    }
}

impl Detector for ScriptedDetector {
    fn kind(&self) -> DetectionKind {
        self.kind
    }

    fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        self.probe.0.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        match self.probe.script().pop_front() {
            Some(Ok(detections)) => Ok(detections),
            Some(Err(message)) => Err(DetectorError::InferenceFailed(message)),
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for ScriptedDetector {
    fn drop(&mut self) {
        self.probe.0.dropped.store(true, Ordering::SeqCst);
    }
}

/// Sink that records every card, optionally failing the n-th write.
#[derive(Default)]
pub(crate) struct RecordingSink {
    saved: Mutex<Vec<ResultCard>>,
    fail_at: Option<usize>,
}

impl RecordingSink {
    pub(crate) fn failing_at(index: usize) -> Self {
        Self {
            saved: Mutex::default(),
            fail_at: Some(index),
        }
    }

    pub(crate) fn saved(&self) -> Vec<ResultCard> {
        self.saved.lock().unwrap().clone()
    }
}

impl CardSink for RecordingSink {
    fn save(&self, card: ResultCard) -> impl Future<Output = Result<i64, StoreError>> + Send {
        let mut saved = self.saved.lock().unwrap();
        let result = if self.fail_at == Some(saved.len()) {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        } else {
            saved.push(card);
            Ok(saved.len() as i64)
        };
        std::future::ready(result)
    }
}
