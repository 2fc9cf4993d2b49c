//! autocapture: real-time ID document and selfie auto-capture
//!
//! Turns a stream of camera frames plus an external object detector into a
//! single high-quality capture: the frame is letterboxed into the detector
//! input, the raw output is decoded back into frame space, each candidate
//! is scored for card shape and distance, a debounced tracker decides when
//! the card has been held steady long enough, and a card-shaped crop is
//! produced. A simpler face-proximity flow covers selfies.
//!
//! # Features
//! - Letterbox preprocessing with exact inverse geometry
//! - Row-major and column-major detector output decoding
//! - Debounced capture with user guidance strings
//! - Fixed-size ID-1 crop and JPEG persistence
//! - Scheduler loop with single-frame in-flight gating
//! - Optional native camera source (`camera`) and Tauri plugin (`plugin`)
//!
//! # Usage
//! ```rust,ignore
//! use autocapture::{AutoCaptureConfig, ScanLoop, ScanSession, SharedScanSession};
//!
//! let config = AutoCaptureConfig::load_or_default();
//! let session = SharedScanSession::new(ScanSession::new(my_detector, &config));
//! let mut scan = ScanLoop::spawn(session.clone(), || Ok(my_source), &config.session)?;
//! ```
pub mod artifact;
pub mod config;
pub mod crop;
pub mod detection;
pub mod errors;
pub mod inference;
pub mod invariant_ppt;
pub mod overlay;
pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod session;
pub mod source;
pub mod types;

#[cfg(feature = "camera")]
pub mod platform;

#[cfg(feature = "plugin")]
pub mod commands;

// Testing utilities - synthetic data for offline testing
pub mod testing;

pub use artifact::{ArtifactInfo, ArtifactKind, CapturedArtifact};
pub use config::AutoCaptureConfig;
pub use crop::{CropExtractor, CropRegion};
pub use detection::{classify_layout, DetectionDecoder, OutputLayout};
pub use errors::CaptureError;
pub use inference::{Detector, FaceDetection, FaceDetector, ModelOutput};
pub use pipeline::{DocumentObservation, DocumentPipeline};
pub use preprocess::{FramePreprocessor, PreprocessedFrame, Tensor};
pub use quality::{
    AlignmentScorer, CaptureStabilityTracker, FrameVerdict, SelfieQualityTracker, StabilityUpdate,
};
pub use session::{
    InFlightGate, ScanLoop, ScanSession, SelfieSession, SessionStats, SharedScanSession,
    TickOutcome,
};
pub use source::{FrameSource, ImageSequenceSource, VecSource};
pub use types::{BoundingBox, Detection, Frame, GeometryContext, ScanSignals};

#[cfg(feature = "plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the autocapture plugin with all commands
#[cfg(feature = "plugin")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("autocapture")
        .invoke_handler(tauri::generate_handler![
            // Document scan commands
            commands::scan::preprocess_frame,
            commands::scan::observe_detector_output,
            commands::scan::get_scan_signals,
            commands::scan::extract_card,
            commands::scan::reset_document_scan,
            // Selfie commands
            commands::scan::observe_face,
            commands::scan::capture_selfie,
            commands::scan::reset_selfie,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
            commands::config::get_document_config,
            commands::config::get_selfie_config,
            commands::config::get_storage_config,
        ])
        .build()
}

/// Initialize logging for the capture pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "autocapture=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_support: cfg!(feature = "camera"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub camera_support: bool,
}
