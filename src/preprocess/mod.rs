/// Letterbox preprocessing for the document detector
///
/// Converts an RGB frame into a normalized square NHWC tensor using an
/// aspect-preserving bilinear resize and black padding, and records the
/// geometry needed to map detections back into frame space.
pub mod tensor;

pub use tensor::Tensor;

use crate::assert_invariant;
use crate::errors::CaptureError;
use crate::invariant_ppt::messages;
use crate::types::{Frame, GeometryContext};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

/// Tensor plus the inverse mapping for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessedFrame {
    pub tensor: Tensor,
    pub geometry: GeometryContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramePreprocessor {
    input_size: u32,
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self::new(640)
    }
}

impl FramePreprocessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size: input_size.max(1),
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Letterbox `frame` into a `[1, S, S, 3]` tensor with values in `[0, 1]`.
    ///
    /// Fails with [`CaptureError::InvalidFrame`] for zero-sized frames or
    /// pixel buffers that do not match the frame dimensions.
    pub fn preprocess(&self, frame: &Frame) -> Result<PreprocessedFrame, CaptureError> {
        let source = frame.as_image()?;
        let geometry = GeometryContext::letterbox(self.input_size, frame.width, frame.height);

        assert_invariant!(
            geometry.top_padding + geometry.scaled_height + geometry.bottom_padding()
                == self.input_size,
            messages::LETTERBOX_ROWS,
            "preprocess"
        );
        assert_invariant!(
            geometry.left_padding + geometry.scaled_width + geometry.right_padding()
                == self.input_size,
            messages::LETTERBOX_COLUMNS,
            "preprocess"
        );

        let resized = imageops::resize(
            &source,
            geometry.scaled_width,
            geometry.scaled_height,
            FilterType::Triangle,
        );

        let size = self.input_size as usize;
        let mut data = vec![0.0f32; size * size * 3];
        let top = geometry.top_padding as usize;
        let left = geometry.left_padding as usize;
        let row_len = geometry.scaled_width as usize * 3;

        for (y, row) in resized.as_raw().chunks_exact(row_len).enumerate() {
            let start = ((top + y) * size + left) * 3;
            for (dst, &src) in data[start..start + row_len].iter_mut().zip(row) {
                *dst = src as f32 / 255.0;
            }
        }

        log::trace!(
            "Letterboxed frame #{} {}x{} -> {}x{} (scale {:.4}, pad top {} left {})",
            frame.sequence,
            frame.width,
            frame.height,
            geometry.scaled_width,
            geometry.scaled_height,
            geometry.scale,
            geometry.top_padding,
            geometry.left_padding
        );

        let tensor = Tensor::new(vec![1, size, size, 3], data)?;
        Ok(PreprocessedFrame { tensor, geometry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(width, height, vec![value; (width * height * 3) as usize])
    }

    #[test]
    fn test_output_shape_is_square_batch() {
        let pre = FramePreprocessor::new(64);
        let out = pre.preprocess(&solid_frame(128, 72, 200)).unwrap();
        assert_eq!(out.tensor.shape(), &[1, 64, 64, 3]);
        assert_eq!(out.tensor.data().len(), 64 * 64 * 3);
    }

    #[test]
    fn test_padding_is_black_and_content_is_normalized() {
        let pre = FramePreprocessor::new(64);
        let out = pre.preprocess(&solid_frame(128, 64, 255)).unwrap();
        let g = out.geometry;
        assert_eq!(g.scaled_height, 32);
        assert_eq!(g.top_padding, 16);

        // first row is padding
        assert_eq!(out.tensor.pixel(0, 0, 0), Some(0.0));
        // center row is content
        let v = out.tensor.pixel(32, 32, 1).unwrap();
        assert!((v - 1.0).abs() < 1e-6);
        // last row is padding again
        assert_eq!(out.tensor.pixel(63, 10, 2), Some(0.0));
    }

    #[test]
    fn test_zero_sized_frame_is_rejected() {
        let pre = FramePreprocessor::default();
        let err = pre.preprocess(&Frame::new(0, 0, Vec::new())).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidFrame { .. }));
    }

    #[test]
    fn test_portrait_frame_pads_columns() {
        let pre = FramePreprocessor::new(640);
        let out = pre.preprocess(&solid_frame(360, 640, 10)).unwrap();
        let g = out.geometry;
        assert_eq!(g.scaled_height, 640);
        assert_eq!(g.scaled_width, 360);
        assert_eq!(g.left_padding, 140);
        assert_eq!(g.left_padding + g.scaled_width + g.right_padding(), 640);
    }
}
