//! Captured artifacts and their persistence.

use crate::errors::CaptureError;
use crate::types::Frame;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Document,
    Selfie,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Document => "document",
            ArtifactKind::Selfie => "selfie",
        }
    }
}

/// Final image handed to the caller after a successful capture.
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    id: Uuid,
    kind: ArtifactKind,
    image: RgbImage,
    status: String,
    captured_at: DateTime<Utc>,
}

/// Serializable summary, without pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub id: String,
    pub kind: ArtifactKind,
    pub width: u32,
    pub height: u32,
    pub status: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedArtifact {
    pub fn new(kind: ArtifactKind, image: RgbImage, status: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            image,
            status: status.into(),
            captured_at: Utc::now(),
        }
    }

    /// Full copy of a selfie frame.
    pub fn selfie(frame: &Frame) -> Result<Self, CaptureError> {
        let image = frame.as_image()?;
        let owned = RgbImage::from_raw(image.width(), image.height(), image.as_raw().to_vec())
            .ok_or_else(|| {
                CaptureError::invalid_frame(frame.width, frame.height, "pixel buffer too small")
            })?;
        Ok(Self::new(
            ArtifactKind::Selfie,
            owned,
            "Selfie captured successfully!",
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            id: self.id.to_string(),
            kind: self.kind,
            width: self.width(),
            height: self.height(),
            status: self.status.clone(),
            captured_at: self.captured_at,
        }
    }

    /// Encode as JPEG with the given quality (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder.encode(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    /// File name derived from kind, capture time and id.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.jpg",
            self.kind.as_str(),
            self.captured_at.format("%Y%m%d_%H%M%S"),
            self.id.simple()
        )
    }

    /// Write the JPEG into `directory`, creating it if needed.
    pub fn save_to_dir<P: AsRef<Path>>(
        &self,
        directory: P,
        quality: u8,
    ) -> Result<PathBuf, CaptureError> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;
        let path = directory.join(self.file_name());
        fs::write(&path, self.encode_jpeg(quality)?)?;
        log::info!(
            "Saved {} artifact {}x{} to {:?}",
            self.kind.as_str(),
            self.width(),
            self.height(),
            path
        );
        Ok(path)
    }
}
