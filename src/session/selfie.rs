//! Selfie session: face guidance plus a delayed single-frame capture.

use crate::artifact::CapturedArtifact;
use crate::config::SelfieConfig;
use crate::errors::CaptureError;
use crate::inference::FaceDetector;
use crate::quality::{SelfieQualityTracker, SelfieUpdate};
use crate::types::Frame;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum SelfieTick {
    NotReady,
    Observed(SelfieUpdate),
    /// Capture scheduled, waiting for the delay to elapse
    Waiting,
    Captured,
    AlreadyCaptured,
}

pub struct SelfieSession<F: FaceDetector> {
    detector: F,
    tracker: SelfieQualityTracker,
    capture_at: Option<Instant>,
    artifact: Option<CapturedArtifact>,
    status: String,
}

impl<F: FaceDetector> SelfieSession<F> {
    pub fn new(detector: F, config: SelfieConfig) -> Self {
        Self {
            detector,
            tracker: SelfieQualityTracker::new(config),
            capture_at: None,
            artifact: None,
            status: "Initializing...".to_string(),
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_capture_pending(&self) -> bool {
        self.capture_at.is_some()
    }

    pub fn artifact(&self) -> Option<&CapturedArtifact> {
        self.artifact.as_ref()
    }

    pub fn take_artifact(&mut self) -> Option<CapturedArtifact> {
        self.artifact.take()
    }

    pub fn process_frame(&mut self, frame: &Frame) -> Result<SelfieTick, CaptureError> {
        self.process_frame_at(frame, Instant::now())
    }

    /// Process `frame` as if observed at `now`.
    ///
    /// Once a capture is scheduled, the first frame at or after the deadline
    /// becomes the artifact.
    pub fn process_frame_at(
        &mut self,
        frame: &Frame,
        now: Instant,
    ) -> Result<SelfieTick, CaptureError> {
        if self.artifact.is_some() {
            return Ok(SelfieTick::AlreadyCaptured);
        }
        if frame.is_empty() {
            return Ok(SelfieTick::NotReady);
        }

        if let Some(deadline) = self.capture_at {
            if now < deadline {
                return Ok(SelfieTick::Waiting);
            }
            let artifact = match CapturedArtifact::selfie(frame) {
                Ok(artifact) => artifact,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::debug!("Selfie frame {} unusable: {}", frame.sequence, e);
                    return Ok(SelfieTick::NotReady);
                }
            };
            log::info!("Captured selfie {}", artifact.id());
            self.status = artifact.status().to_string();
            self.artifact = Some(artifact);
            self.capture_at = None;
            return Ok(SelfieTick::Captured);
        }

        if !self.detector.is_ready() {
            return Ok(SelfieTick::NotReady);
        }
        let faces = match self.detector.detect_faces(frame) {
            Ok(faces) => faces,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::debug!("Face detection skipped: {}", e);
                return Ok(SelfieTick::NotReady);
            }
        };

        let update = self
            .tracker
            .observe(faces.first().map(|f| &f.bbox), frame.width, frame.height);
        if let Some(delay) = update.capture_after {
            self.capture_at = Some(now + delay);
        }
        self.status = update.status.clone();
        Ok(SelfieTick::Observed(update))
    }

    /// Retake: discard the artifact and any pending capture.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.capture_at = None;
        self.artifact = None;
        self.status = "No face detected. Please center your face".to_string();
    }
}
