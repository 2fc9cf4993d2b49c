/// Debounced capture decision for the document flow
///
/// One observation per processed frame. A capture fires only after a run of
/// `min_consecutive_detections` qualifying frames: an invalid frame (or no
/// detection) resets the run, a valid but poorly aligned frame decays it by
/// one.
use crate::assert_invariant;
use crate::config::DocumentConfig;
use crate::invariant_ppt::messages;
use crate::types::Detection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityPhase {
    Idle,
    Accumulating,
    Captured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    LowConfidence,
    AspectRatio,
    TooSmall,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameVerdict {
    NoDetection,
    Invalid(InvalidReason),
    /// Valid and well aligned, counted toward the run
    Holding,
    /// Valid but below the quality trigger, run decays
    Regressing,
    /// Run completed on this frame
    Ready,
    /// Tracker already fired and awaits a reset
    AlreadyCaptured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityState {
    pub consecutive_good_count: u32,
    pub threshold: u32,
}

impl StabilityState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_good_count: 0,
            threshold: threshold.max(1),
        }
    }
}

/// Validity checks and distance-adjusted quality for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateAssessment {
    pub area_ratio: f32,
    pub quality_score: f32,
    pub invalid_reason: Option<InvalidReason>,
}

impl CandidateAssessment {
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityUpdate {
    pub verdict: FrameVerdict,
    pub status: String,
    pub consecutive: u32,
    pub quality_score: f32,
    pub invalid_detected: bool,
}

impl StabilityUpdate {
    pub fn capture_ready(&self) -> bool {
        self.verdict == FrameVerdict::Ready
    }
}

/// Alignment scaled so that cards held farther away than the ideal occupancy
/// are not penalized as hard as the raw score suggests.
pub fn distance_adjusted_quality(
    alignment_score: f32,
    area_ratio: f32,
    ideal_area_ratio: f32,
) -> f32 {
    let factor = (0.5 + 0.5 * (area_ratio / ideal_area_ratio)).min(1.0);
    alignment_score * factor
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStabilityTracker {
    config: DocumentConfig,
    state: StabilityState,
    phase: StabilityPhase,
}

impl Default for CaptureStabilityTracker {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}

impl CaptureStabilityTracker {
    pub fn new(config: DocumentConfig) -> Self {
        let state = StabilityState::new(config.min_consecutive_detections);
        Self {
            config,
            state,
            phase: StabilityPhase::Idle,
        }
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    pub fn phase(&self) -> StabilityPhase {
        self.phase
    }

    pub fn is_captured(&self) -> bool {
        self.phase == StabilityPhase::Captured
    }

    /// Back to the initial state so the tracker can fire again.
    pub fn reset(&mut self) {
        self.state = StabilityState::new(self.config.min_consecutive_detections);
        self.phase = StabilityPhase::Idle;
    }

    pub fn assess(
        &self,
        detection: &Detection,
        frame_width: u32,
        frame_height: u32,
    ) -> CandidateAssessment {
        let cfg = &self.config;
        let area_ratio = detection.bbox.area_ratio(frame_width, frame_height);
        let quality_score =
            distance_adjusted_quality(detection.alignment_score, area_ratio, cfg.ideal_area_ratio);

        let invalid_reason = if detection.confidence.is_nan()
            || detection.confidence <= cfg.session_confidence_threshold
        {
            Some(InvalidReason::LowConfidence)
        } else if detection.aspect_ratio < cfg.aspect_ratio_range[0]
            || detection.aspect_ratio > cfg.aspect_ratio_range[1]
        {
            Some(InvalidReason::AspectRatio)
        } else if area_ratio < cfg.area_ratio_range[0] {
            Some(InvalidReason::TooSmall)
        } else if area_ratio > cfg.area_ratio_range[1] {
            Some(InvalidReason::TooLarge)
        } else {
            None
        };

        CandidateAssessment {
            area_ratio,
            quality_score,
            invalid_reason,
        }
    }

    /// Feed the best candidate of one frame, or `None` when nothing was found.
    pub fn observe(
        &mut self,
        best: Option<&Detection>,
        frame_width: u32,
        frame_height: u32,
    ) -> StabilityUpdate {
        if self.phase == StabilityPhase::Captured {
            return self.update(FrameVerdict::AlreadyCaptured, 0.0);
        }
        self.phase = StabilityPhase::Accumulating;

        let Some(detection) = best else {
            self.state.consecutive_good_count = 0;
            return self.update(FrameVerdict::NoDetection, 0.0);
        };

        let assessment = self.assess(detection, frame_width, frame_height);
        let quality = assessment.quality_score;

        let verdict = match assessment.invalid_reason {
            Some(reason) => {
                self.state.consecutive_good_count = 0;
                FrameVerdict::Invalid(reason)
            }
            None if quality > self.config.quality_trigger_threshold => {
                self.state.consecutive_good_count += 1;
                if self.state.consecutive_good_count >= self.state.threshold {
                    self.state.consecutive_good_count = 0;
                    self.phase = StabilityPhase::Captured;
                    FrameVerdict::Ready
                } else {
                    FrameVerdict::Holding
                }
            }
            None => {
                self.state.consecutive_good_count =
                    self.state.consecutive_good_count.saturating_sub(1);
                FrameVerdict::Regressing
            }
        };

        assert_invariant!(
            self.state.consecutive_good_count < self.state.threshold,
            messages::COUNTER_BELOW_THRESHOLD,
            "CaptureStabilityTracker::observe"
        );

        log::debug!(
            "Stability {:?}: run {}/{} (confidence {:.2}, quality {:.2}, area {:.3})",
            verdict,
            self.state.consecutive_good_count,
            self.state.threshold,
            detection.confidence,
            quality,
            assessment.area_ratio
        );

        self.update(verdict, quality)
    }

    fn update(&self, verdict: FrameVerdict, quality_score: f32) -> StabilityUpdate {
        let threshold = self.state.threshold;
        let consecutive = self.state.consecutive_good_count;
        let status = match verdict {
            FrameVerdict::NoDetection => "Position an ID card in the frame".to_string(),
            FrameVerdict::Invalid(InvalidReason::LowConfidence)
            | FrameVerdict::Invalid(InvalidReason::AspectRatio) => {
                "Invalid card detected - please use a valid ID card".to_string()
            }
            FrameVerdict::Invalid(InvalidReason::TooSmall) => {
                "Card too far away - move it closer to the camera".to_string()
            }
            FrameVerdict::Invalid(InvalidReason::TooLarge) => {
                "Card too close - move it back from the camera".to_string()
            }
            FrameVerdict::Holding => {
                format!("ID card detected - holding steady: {}/{}", consecutive, threshold)
            }
            FrameVerdict::Regressing => "Position the ID card properly in the frame".to_string(),
            FrameVerdict::Ready => "ID card captured successfully".to_string(),
            FrameVerdict::AlreadyCaptured => "ID card already captured".to_string(),
        };

        StabilityUpdate {
            verdict,
            status,
            consecutive,
            quality_score,
            invalid_detected: matches!(verdict, FrameVerdict::Invalid(_)),
        }
    }
}
