/// Face-proximity guidance for the selfie flow
///
/// Unlike the document path there is no multi-frame run: one frame at or
/// above the capture quality schedules a capture after a short delay.
use crate::config::SelfieConfig;
use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfieGuidance {
    NoFace,
    MoveCloser,
    MoveBack,
    /// In range but not yet close enough to trigger
    AlmostThere,
    Capture,
    AlreadyCaptured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfieUpdate {
    pub guidance: SelfieGuidance,
    pub status: String,
    /// 0-100
    pub quality: u8,
    pub face_ratio: f32,
    pub face_detected: bool,
    /// Set on the frame that triggers a capture
    pub capture_after: Option<Duration>,
}

/// Face area ratio mapped to a 0-100 quality.
pub fn face_quality(face_ratio: f32, multiplier: f32) -> u8 {
    if !face_ratio.is_finite() || face_ratio <= 0.0 {
        return 0;
    }
    (face_ratio * multiplier).round().min(100.0) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfieQualityTracker {
    config: SelfieConfig,
    captured: bool,
}

impl Default for SelfieQualityTracker {
    fn default() -> Self {
        Self::new(SelfieConfig::default())
    }
}

impl SelfieQualityTracker {
    pub fn new(config: SelfieConfig) -> Self {
        Self {
            config,
            captured: false,
        }
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Allow another capture, e.g. when the user retakes the photo.
    pub fn reset(&mut self) {
        self.captured = false;
    }

    pub fn observe(
        &mut self,
        face: Option<&BoundingBox>,
        frame_width: u32,
        frame_height: u32,
    ) -> SelfieUpdate {
        if self.captured {
            return update(SelfieGuidance::AlreadyCaptured, 0, 0.0);
        }

        let Some(face) = face else {
            return update(SelfieGuidance::NoFace, 0, 0.0);
        };

        let face_ratio = face.area_ratio(frame_width, frame_height);
        let quality = face_quality(face_ratio, self.config.quality_multiplier);

        let guidance = if face_ratio < self.config.min_face_ratio {
            SelfieGuidance::MoveCloser
        } else if face_ratio > self.config.max_face_ratio {
            SelfieGuidance::MoveBack
        } else if quality >= self.config.capture_quality {
            self.captured = true;
            SelfieGuidance::Capture
        } else {
            SelfieGuidance::AlmostThere
        };

        log::debug!(
            "Selfie {:?}: face ratio {:.3}, quality {}",
            guidance,
            face_ratio,
            quality
        );

        let mut result = update(guidance, quality, face_ratio);
        if guidance == SelfieGuidance::Capture {
            result.capture_after = Some(Duration::from_millis(self.config.capture_delay_ms));
        }
        result
    }
}

fn update(guidance: SelfieGuidance, quality: u8, face_ratio: f32) -> SelfieUpdate {
    let status = match guidance {
        SelfieGuidance::NoFace => "No face detected. Please center your face".to_string(),
        SelfieGuidance::MoveCloser => "Move closer to the camera".to_string(),
        SelfieGuidance::MoveBack => "Move back from the camera".to_string(),
        SelfieGuidance::AlmostThere => format!("Move closer ({}% ideal)", quality),
        SelfieGuidance::Capture => "Perfect! Capturing...".to_string(),
        SelfieGuidance::AlreadyCaptured => "Selfie already captured".to_string(),
    };

    SelfieUpdate {
        guidance,
        status,
        quality,
        face_ratio,
        face_detected: matches!(
            guidance,
            SelfieGuidance::AlmostThere | SelfieGuidance::Capture
        ),
        capture_after: None,
    }
}
