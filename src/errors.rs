use thiserror::Error;

/// Errors produced by the capture pipeline.
///
/// Only [`CaptureError::Acquisition`] is fatal to a session. Every other
/// variant is contained within the frame that produced it.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera acquisition error: {0}")]
    Acquisition(String),
    #[error("Not ready: {0}")]
    NotReady(String),
    #[error("Invalid frame {width}x{height}: {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Degenerate box geometry: {width}x{height}")]
    DegenerateGeometry { width: f32, height: f32 },
    #[error("Crop error: {0}")]
    Crop(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl CaptureError {
    pub fn invalid_frame(width: u32, height: u32, reason: impl Into<String>) -> Self {
        CaptureError::InvalidFrame {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Errors that end the session and must be shown to the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::Acquisition(_))
    }

    /// Errors that simply mean "try again next tick".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CaptureError::NotReady(_) | CaptureError::InvalidFrame { .. }
        )
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Encoding(err.to_string())
    }
}
