//! Capture sessions
//!
//! A session owns everything one scan needs between ticks: the
//! preprocessor, the detector handle, the document pipeline, the outward
//! signals and the captured artifact. Exactly one frame is processed at a
//! time; a frame offered while another is in flight is dropped.

pub mod runner;
pub mod selfie;

pub use runner::ScanLoop;
pub use selfie::{SelfieSession, SelfieTick};

use crate::artifact::CapturedArtifact;
use crate::config::AutoCaptureConfig;
use crate::errors::CaptureError;
use crate::inference::Detector;
use crate::pipeline::{DocumentObservation, DocumentPipeline};
use crate::preprocess::FramePreprocessor;
use crate::quality::StabilityUpdate;
use crate::source::FrameSource;
use crate::types::{Detection, Frame, ScanSignals};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const STATUS_READY: &str = "Position an ID card in the frame";
const STATUS_LOADING: &str = "Loading detection model...";
const STATUS_STOPPED: &str = "Camera stopped";
const STATUS_CROP_FAILED: &str = "Capture failed - please hold the card steady and try again";

/// What happened to one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Camera or model not ready; try again next tick
    NotReady,
    /// Another frame was still in flight
    Dropped,
    /// Frame could not be processed and was skipped
    Skipped,
    Observed(StabilityUpdate),
    Captured,
    /// Stable run completed but the crop failed; the run starts over
    CropFailed,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub processed: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub not_ready: u64,
    pub captures: u64,
    pub crop_failures: u64,
}

pub struct ScanSession<D: Detector> {
    preprocessor: FramePreprocessor,
    detector: D,
    pipeline: DocumentPipeline,
    signals: ScanSignals,
    artifact: Option<CapturedArtifact>,
    last_detection: Option<Detection>,
    stats: SessionStats,
    running: bool,
}

impl<D: Detector> ScanSession<D> {
    pub fn new(detector: D, config: &AutoCaptureConfig) -> Self {
        Self {
            preprocessor: FramePreprocessor::new(config.detector.input_size),
            detector,
            pipeline: DocumentPipeline::from_config(config),
            signals: ScanSignals::default(),
            artifact: None,
            last_detection: None,
            stats: SessionStats::default(),
            running: false,
        }
    }

    pub fn signals(&self) -> &ScanSignals {
        &self.signals
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn pipeline(&self) -> &DocumentPipeline {
        &self.pipeline
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Best detection of the last processed frame, for overlays.
    pub fn last_detection(&self) -> Option<&Detection> {
        self.last_detection.as_ref()
    }

    pub fn artifact(&self) -> Option<&CapturedArtifact> {
        self.artifact.as_ref()
    }

    /// Hand the captured artifact to the caller.
    pub fn take_artifact(&mut self) -> Option<CapturedArtifact> {
        self.artifact.take()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.signals.status = if self.detector.is_ready() {
            STATUS_READY.to_string()
        } else {
            STATUS_LOADING.to_string()
        };
        log::info!("Scan session started");
    }

    /// Pull one frame from `source` and process it.
    pub fn tick<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<TickOutcome, CaptureError> {
        if !self.running {
            return Ok(TickOutcome::Stopped);
        }
        match source.next_frame() {
            Ok(Some(frame)) => self.process_frame(&frame),
            Ok(None) => {
                self.stats.not_ready += 1;
                Ok(TickOutcome::NotReady)
            }
            Err(e) if e.is_transient() => {
                self.stats.not_ready += 1;
                log::debug!("Frame source not ready: {}", e);
                Ok(TickOutcome::NotReady)
            }
            Err(e) => Err(e),
        }
    }

    /// Run one frame through preprocessing, inference and the pipeline.
    ///
    /// Only [`CaptureError::Acquisition`] escapes; every other failure is
    /// contained in the returned outcome.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<TickOutcome, CaptureError> {
        if !self.running {
            return Ok(TickOutcome::Stopped);
        }
        if self.pipeline.tracker().is_captured() {
            let observation = self
                .pipeline
                .observe_detections(Vec::new(), frame.width, frame.height);
            return Ok(TickOutcome::Observed(observation.update));
        }
        if frame.is_empty() || !self.detector.is_ready() {
            self.stats.not_ready += 1;
            return Ok(TickOutcome::NotReady);
        }

        let observation = match self.observe(frame) {
            Ok(observation) => observation,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_transient() => {
                self.stats.not_ready += 1;
                log::debug!("Frame {} not ready: {}", frame.sequence, e);
                return Ok(TickOutcome::NotReady);
            }
            Err(e) => {
                self.stats.skipped += 1;
                log::warn!("Skipping frame {}: {}", frame.sequence, e);
                return Ok(TickOutcome::Skipped);
            }
        };

        self.stats.processed += 1;
        self.last_detection = observation.best().copied();
        let update = observation.update;
        self.signals.apply_update(&update);

        if !update.capture_ready() {
            return Ok(TickOutcome::Observed(update));
        }

        match self.pipeline.extract(frame) {
            Ok(artifact) => {
                self.stats.captures += 1;
                self.signals.status = artifact.status().to_string();
                self.signals.captured = true;
                log::info!("Captured document {}", artifact.id());
                self.artifact = Some(artifact);
                Ok(TickOutcome::Captured)
            }
            Err(e) => {
                self.stats.crop_failures += 1;
                log::warn!("Document crop failed: {}", e);
                self.pipeline.reset();
                self.signals.capture_ready = false;
                self.signals.consecutive_detections = 0;
                self.signals.status = STATUS_CROP_FAILED.to_string();
                Ok(TickOutcome::CropFailed)
            }
        }
    }

    fn observe(&mut self, frame: &Frame) -> Result<DocumentObservation, CaptureError> {
        let prepared = self.preprocessor.preprocess(frame)?;
        let output = self.detector.predict(&prepared.tensor)?;
        let layout = self.detector.output_layout();
        Ok(self
            .pipeline
            .observe_output(&output, &prepared.geometry, layout))
    }

    /// Halt processing and zero detection and stability state.
    ///
    /// A captured artifact survives so the caller can still take it.
    pub fn stop(&mut self) {
        if self.running {
            log::info!("Scan session stopped");
        }
        self.running = false;
        self.pipeline.reset();
        self.last_detection = None;
        self.signals = ScanSignals {
            status: STATUS_STOPPED.to_string(),
            captured: self.artifact.is_some(),
            ..ScanSignals::default()
        };
    }

    /// Discard the capture and start a new run, e.g. for a retake.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.artifact = None;
        self.last_detection = None;
        self.signals = ScanSignals {
            status: STATUS_READY.to_string(),
            ..ScanSignals::default()
        };
    }
}

impl ScanSignals {
    /// Mirror one tracker update into the outward signals.
    pub fn apply_update(&mut self, update: &StabilityUpdate) {
        self.status = update.status.clone();
        self.invalid_detected = update.invalid_detected;
        self.consecutive_detections = update.consecutive;
        self.capture_ready = update.capture_ready();
    }
}

/// Single-entry gate around frame processing.
#[derive(Debug, Clone, Default)]
pub struct InFlightGate {
    busy: Arc<AtomicBool>,
}

/// Holds the gate until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl InFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a frame is already in flight.
    pub fn try_enter(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Thread-safe handle to a [`ScanSession`] guarded by an [`InFlightGate`].
pub struct SharedScanSession<D: Detector> {
    inner: Arc<Mutex<ScanSession<D>>>,
    gate: InFlightGate,
    dropped: Arc<AtomicU64>,
}

impl<D: Detector> Clone for SharedScanSession<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

impl<D: Detector> SharedScanSession<D> {
    pub fn new(session: ScanSession<D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
            gate: InFlightGate::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanSession<D>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn gate(&self) -> &InFlightGate {
        &self.gate
    }

    /// Count ticks that never reached the session.
    pub fn record_dropped(&self, ticks: u64) {
        self.dropped.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Process `frame` unless another frame is in flight.
    pub fn offer_frame(&self, frame: &Frame) -> Result<TickOutcome, CaptureError> {
        let Some(_guard) = self.gate.try_enter() else {
            self.record_dropped(1);
            return Ok(TickOutcome::Dropped);
        };
        self.lock().process_frame(frame)
    }

    /// Pull and process one frame unless another frame is in flight.
    pub fn tick<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<TickOutcome, CaptureError> {
        let Some(_guard) = self.gate.try_enter() else {
            self.record_dropped(1);
            return Ok(TickOutcome::Dropped);
        };
        self.lock().tick(source)
    }

    pub fn start(&self) {
        self.lock().start();
    }

    pub fn stop(&self) {
        self.lock().stop();
    }

    /// Stop without waiting for an in-flight frame; `false` if one was.
    pub fn try_stop(&self) -> bool {
        match self.inner.try_lock() {
            Ok(mut session) => {
                session.stop();
                true
            }
            Err(_) => false,
        }
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn signals(&self) -> ScanSignals {
        self.lock().signals().clone()
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = self.lock().stats();
        stats.dropped += self.dropped.load(Ordering::Relaxed);
        stats
    }

    pub fn take_artifact(&self) -> Option<CapturedArtifact> {
        self.lock().take_artifact()
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut ScanSession<D>) -> R) -> R {
        f(&mut self.lock())
    }
}
