/// Alignment scoring for detected documents
///
/// Scores how close a box is to an ID-1 card held at a comfortable distance:
/// 60% aspect-ratio fit, 40% frame-occupancy fit.
use serde::{Deserialize, Serialize};

/// Occupancy band that earns the full area score (exclusive bounds)
const IDEAL_AREA_BAND: (f32, f32) = (0.08, 0.7);
/// Occupancy band that earns a partial area score
const ACCEPTABLE_AREA_BAND: (f32, f32) = (0.03, 0.9);
const PARTIAL_AREA_SCORE: f32 = 0.7;

const ASPECT_WEIGHT: f32 = 0.6;
const AREA_WEIGHT: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentScorer {
    pub ideal_aspect_ratio: f32,
    pub aspect_tolerance: f32,
}

impl Default for AlignmentScorer {
    fn default() -> Self {
        Self {
            ideal_aspect_ratio: 1.585,
            aspect_tolerance: 0.2,
        }
    }
}

impl AlignmentScorer {
    pub fn new(ideal_aspect_ratio: f32, aspect_tolerance: f32) -> Self {
        Self {
            ideal_aspect_ratio,
            aspect_tolerance,
        }
    }

    /// Combined score in `[0, 1]`; 0 for non-positive or non-finite input.
    pub fn score(&self, aspect_ratio: f32, area: f32, frame_width: f32, frame_height: f32) -> f32 {
        if !(aspect_ratio.is_finite() && area.is_finite()) || aspect_ratio <= 0.0 || area <= 0.0
        {
            return 0.0;
        }
        let frame_area = frame_width * frame_height;
        if !frame_area.is_finite() || frame_area <= 0.0 {
            return 0.0;
        }

        ASPECT_WEIGHT * self.aspect_score(aspect_ratio)
            + AREA_WEIGHT * area_score(area / frame_area)
    }

    pub fn aspect_score(&self, aspect_ratio: f32) -> f32 {
        let error = (aspect_ratio - self.ideal_aspect_ratio).abs() / self.ideal_aspect_ratio;
        (1.0 - error / self.aspect_tolerance).max(0.0)
    }
}

/// Frame-occupancy component of the alignment score.
pub fn area_score(area_ratio: f32) -> f32 {
    if area_ratio > IDEAL_AREA_BAND.0 && area_ratio < IDEAL_AREA_BAND.1 {
        1.0
    } else if area_ratio > ACCEPTABLE_AREA_BAND.0 && area_ratio <= ACCEPTABLE_AREA_BAND.1 {
        PARTIAL_AREA_SCORE
    } else {
        0.0
    }
}

/// Score with the default ID-card parameters.
pub fn alignment_score(aspect_ratio: f32, area: f32, frame_width: f32, frame_height: f32) -> f32 {
    AlignmentScorer::default().score(aspect_ratio, area, frame_width, frame_height)
}
