//! Document pipeline without inference
//!
//! Decoding, stabilization and cropping bundled for callers that run the
//! detector themselves, such as the plugin command layer.

use crate::artifact::CapturedArtifact;
use crate::config::AutoCaptureConfig;
use crate::crop::CropExtractor;
use crate::detection::{DetectionDecoder, OutputLayout};
use crate::errors::CaptureError;
use crate::inference::ModelOutput;
use crate::quality::{AlignmentScorer, CaptureStabilityTracker, StabilityUpdate};
use crate::types::{Detection, Frame, GeometryContext};
use serde::{Deserialize, Serialize};

/// Result of feeding one frame's detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentObservation {
    /// All candidates above the decoder floor, best first
    pub detections: Vec<Detection>,
    pub update: StabilityUpdate,
}

impl DocumentObservation {
    pub fn best(&self) -> Option<&Detection> {
        self.detections.first()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    decoder: DetectionDecoder,
    tracker: CaptureStabilityTracker,
    crop: CropExtractor,
    ready_detection: Option<Detection>,
}

impl Default for DocumentPipeline {
    fn default() -> Self {
        Self::from_config(&AutoCaptureConfig::default())
    }
}

impl DocumentPipeline {
    pub fn new(
        decoder: DetectionDecoder,
        tracker: CaptureStabilityTracker,
        crop: CropExtractor,
    ) -> Self {
        Self {
            decoder,
            tracker,
            crop,
            ready_detection: None,
        }
    }

    pub fn from_config(config: &AutoCaptureConfig) -> Self {
        let scorer = AlignmentScorer::new(
            config.document.ideal_aspect_ratio,
            config.document.aspect_ratio_tolerance,
        );
        Self::new(
            DetectionDecoder::new(config.detector.confidence_floor, scorer),
            CaptureStabilityTracker::new(config.document.clone()),
            CropExtractor::new(config.crop.clone()),
        )
    }

    pub fn decoder(&self) -> &DetectionDecoder {
        &self.decoder
    }

    pub fn tracker(&self) -> &CaptureStabilityTracker {
        &self.tracker
    }

    pub fn crop_extractor(&self) -> &CropExtractor {
        &self.crop
    }

    /// Detection that completed the last stable run, if not yet consumed.
    pub fn ready_detection(&self) -> Option<&Detection> {
        self.ready_detection.as_ref()
    }

    /// Decode raw output and advance the tracker with the best candidate.
    ///
    /// An undecodable output counts as a frame with no detection.
    pub fn observe_output(
        &mut self,
        output: &ModelOutput,
        geometry: &GeometryContext,
        layout: Option<OutputLayout>,
    ) -> DocumentObservation {
        let detections = self.decoder.decode_or_skip(output, geometry, layout);
        self.observe_detections(detections, geometry.original_width, geometry.original_height)
    }

    /// Advance the tracker with already decoded detections.
    pub fn observe_detections(
        &mut self,
        detections: Vec<Detection>,
        frame_width: u32,
        frame_height: u32,
    ) -> DocumentObservation {
        let best = detections.first();
        let update = self.tracker.observe(best, frame_width, frame_height);
        if update.capture_ready() {
            self.ready_detection = best.copied();
        }
        DocumentObservation { detections, update }
    }

    /// Crop the ready detection out of `frame`.
    ///
    /// The ready detection is kept on failure so the caller may retry with
    /// the next frame.
    pub fn extract(&mut self, frame: &Frame) -> Result<CapturedArtifact, CaptureError> {
        let detection = self
            .ready_detection
            .ok_or_else(|| CaptureError::Crop("no stable detection to crop".to_string()))?;
        let artifact = self.crop.extract(&detection, frame)?;
        self.ready_detection = None;
        Ok(artifact)
    }

    /// Hand the ready detection to a caller that crops elsewhere.
    ///
    /// The tracker keeps its state, so observations made while the crop
    /// runs are not lost.
    pub fn take_ready_detection(&mut self) -> Option<Detection> {
        self.ready_detection.take()
    }

    /// Forget the current run and any pending capture.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.ready_detection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::FrameVerdict;
    use crate::testing::synthetic_data::{card_frame, row_major_output};
    use crate::types::BoundingBox;

    #[test]
    fn test_three_frames_then_extract() {
        let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
        let geometry = GeometryContext::letterbox(640, 1280, 720);
        let output = row_major_output(&[(card, 0.9)], &geometry, 8);
        let mut pipeline = DocumentPipeline::default();

        let mut verdicts = Vec::new();
        for _ in 0..3 {
            verdicts.push(pipeline.observe_output(&output, &geometry, None).update.verdict);
        }
        assert_eq!(
            verdicts,
            vec![FrameVerdict::Holding, FrameVerdict::Holding, FrameVerdict::Ready]
        );
        assert!(pipeline.ready_detection().is_some());

        let frame = card_frame(1280, 720, &card);
        let artifact = pipeline.extract(&frame).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (640, 404));
        assert!(pipeline.ready_detection().is_none());
    }

    #[test]
    fn test_extract_without_ready_detection_fails() {
        let mut pipeline = DocumentPipeline::default();
        let frame = Frame::new(8, 8, vec![0; 192]);
        assert!(matches!(pipeline.extract(&frame), Err(CaptureError::Crop(_))));
    }

    #[test]
    fn test_bad_output_counts_as_no_detection() {
        let geometry = GeometryContext::letterbox(640, 1280, 720);
        let empty = ModelOutput::Many(Vec::new());
        let mut pipeline = DocumentPipeline::default();
        let observation = pipeline.observe_output(&empty, &geometry, None);
        assert!(observation.detections.is_empty());
        assert_eq!(observation.update.verdict, FrameVerdict::NoDetection);
    }

    #[test]
    fn test_take_ready_detection_leaves_tracker_running() {
        let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
        let geometry = GeometryContext::letterbox(640, 1280, 720);
        let output = row_major_output(&[(card, 0.9)], &geometry, 8);
        let mut pipeline = DocumentPipeline::default();
        assert!(pipeline.take_ready_detection().is_none());

        for _ in 0..3 {
            pipeline.observe_output(&output, &geometry, None);
        }
        let detection = pipeline.take_ready_detection().unwrap();
        assert!((detection.bbox.x - 300.0).abs() < 0.05);
        assert!(pipeline.ready_detection().is_none());

        // a frame observed while the crop runs elsewhere still lands
        let later = pipeline.observe_output(&output, &geometry, None);
        assert_eq!(later.update.verdict, FrameVerdict::AlreadyCaptured);
        assert!(pipeline.tracker().is_captured());

        let frame = card_frame(1280, 720, &card);
        let artifact = pipeline.crop_extractor().extract(&detection, &frame).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (640, 404));
    }
}
