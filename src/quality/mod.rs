/// Capture quality assessment
///
/// Alignment scoring of detected documents, the debounced stability tracker
/// that turns per-frame verdicts into one capture, and the face-proximity
/// tracker used for selfies.
pub mod alignment;
pub mod selfie;
pub mod stability;

pub use alignment::{alignment_score, area_score, AlignmentScorer};
pub use selfie::{face_quality, SelfieGuidance, SelfieQualityTracker, SelfieUpdate};
pub use stability::{
    distance_adjusted_quality, CandidateAssessment, CaptureStabilityTracker, FrameVerdict,
    InvalidReason, StabilityPhase, StabilityState, StabilityUpdate,
};
