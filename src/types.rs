//! Core data types shared across the capture pipeline.

use crate::errors::CaptureError;
use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// One camera tick worth of RGB8 pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB, row-major, `width * height * 3` bytes
    pub data: Vec<u8>,
    pub sequence: u64,
    pub timestamp_us: u64,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            sequence: 0,
            timestamp_us: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64, timestamp_us: u64) -> Self {
        self.sequence = sequence;
        self.timestamp_us = timestamp_us;
        self
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// A `0x0` frame means the camera is still warming up.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }

    /// Check the dimensions and buffer size before any pixel access.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.is_empty() {
            return Err(CaptureError::invalid_frame(
                self.width,
                self.height,
                "frame dimensions must be positive",
            ));
        }
        if self.data.len() != self.expected_len() {
            return Err(CaptureError::invalid_frame(
                self.width,
                self.height,
                format!(
                    "expected {} bytes of RGB data, got {}",
                    self.expected_len(),
                    self.data.len()
                ),
            ));
        }
        Ok(())
    }

    /// Borrow the pixels as an image view without copying.
    pub fn as_image(&self) -> Result<ImageBuffer<Rgb<u8>, &[u8]>, CaptureError> {
        self.validate()?;
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or_else(|| {
            CaptureError::invalid_frame(self.width, self.height, "pixel buffer too small")
        })
    }
}

/// Axis-aligned box in frame-space pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn aspect_ratio(&self) -> Result<f32, CaptureError> {
        if self.height <= 0.0 || !self.height.is_finite() || !self.width.is_finite() {
            return Err(CaptureError::DegenerateGeometry {
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.width / self.height)
    }

    /// Fraction of the frame covered by this box.
    pub fn area_ratio(&self, frame_width: u32, frame_height: u32) -> f32 {
        let frame_area = frame_width as f32 * frame_height as f32;
        if frame_area <= 0.0 {
            return 0.0;
        }
        self.area() / frame_area
    }
}

/// Inverse-mapping record produced once per letterboxed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryContext {
    pub input_size: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub scale: f32,
    pub top_padding: u32,
    pub left_padding: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl GeometryContext {
    /// Letterbox geometry for a `width x height` frame into an `input_size` square.
    ///
    /// Callers must ensure both dimensions are positive.
    pub fn letterbox(input_size: u32, width: u32, height: u32) -> Self {
        let size = input_size as f32;
        let scale = (size / width as f32).min(size / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        let pad_w = input_size - scaled_width;
        let pad_h = input_size - scaled_height;

        Self {
            input_size,
            original_width: width,
            original_height: height,
            scale,
            top_padding: pad_h / 2,
            left_padding: pad_w / 2,
            scaled_width,
            scaled_height,
        }
    }

    pub fn bottom_padding(&self) -> u32 {
        self.input_size - self.scaled_height - self.top_padding
    }

    pub fn right_padding(&self) -> u32 {
        self.input_size - self.scaled_width - self.left_padding
    }

    /// Map a normalized center-form box from model space to frame space.
    pub fn to_frame_space(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let size = self.input_size as f32;
        let box_x = (cx - w / 2.0) * size;
        let box_y = (cy - h / 2.0) * size;
        let box_w = w * size;
        let box_h = h * size;

        BoundingBox {
            x: (box_x - self.left_padding as f32) / self.scale,
            y: (box_y - self.top_padding as f32) / self.scale,
            width: box_w / self.scale,
            height: box_h / self.scale,
        }
    }

    /// Forward mapping, frame space to normalized center form `[cx, cy, w, h]`.
    pub fn to_model_space(&self, bbox: &BoundingBox) -> [f32; 4] {
        let size = self.input_size as f32;
        let x = bbox.x * self.scale + self.left_padding as f32;
        let y = bbox.y * self.scale + self.top_padding as f32;
        let w = bbox.width * self.scale;
        let h = bbox.height * self.scale;
        [
            (x + w / 2.0) / size,
            (y + h / 2.0) / size,
            w / size,
            h / size,
        ]
    }
}

/// A decoded candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub aspect_ratio: f32,
    pub alignment_score: f32,
}

/// Values the surrounding application observes after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSignals {
    pub status: String,
    pub capture_ready: bool,
    pub invalid_detected: bool,
    pub consecutive_detections: u32,
    pub captured: bool,
}

impl Default for ScanSignals {
    fn default() -> Self {
        Self {
            status: "Initializing...".to_string(),
            capture_ready: false,
            invalid_detected: false,
            consecutive_detections: 0,
            captured: false,
        }
    }
}
