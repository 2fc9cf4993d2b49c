//! Testing utilities for autocapture
//!
//! Synthetic frames, detector outputs and replaying detectors so the
//! pipeline can be exercised without a camera or a model.

pub mod synthetic_data;

pub use synthetic_data::{
    card_frame, column_major_output, face_box_with_ratio, row_major_output,
    synthetic_video_frame, ReplayDetector, ScriptedFaceDetector,
};
