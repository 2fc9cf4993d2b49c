//! Card-shaped crop extraction
//!
//! The detector box is reshaped to the ID-1 aspect ratio around its
//! vertical center, widened by a small margin and stretched into a fixed
//! output buffer.

use crate::artifact::{ArtifactKind, CapturedArtifact};
use crate::assert_invariant;
use crate::config::CropConfig;
use crate::errors::CaptureError;
use crate::invariant_ppt::messages;
use crate::types::{BoundingBox, Detection, Frame};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

/// Integer pixel region inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropExtractor {
    config: CropConfig,
}

impl Default for CropExtractor {
    fn default() -> Self {
        Self::new(CropConfig::default())
    }
}

impl CropExtractor {
    pub fn new(config: CropConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    /// `output_width x round(output_width / target_aspect_ratio)`
    pub fn output_dimensions(&self) -> (u32, u32) {
        let height = (self.config.output_width as f32 / self.config.target_aspect_ratio).round();
        (self.config.output_width, height.max(1.0) as u32)
    }

    /// Source region for `bbox`, clamped to a `frame_width x frame_height` frame.
    pub fn compute_crop_region(
        &self,
        bbox: &BoundingBox,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<CropRegion, CaptureError> {
        let values = [bbox.x, bbox.y, bbox.width, bbox.height];
        if !values.iter().all(|v| v.is_finite()) || bbox.width <= 0.0 {
            return Err(CaptureError::Crop(format!(
                "cannot crop degenerate box {:?}",
                bbox
            )));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(CaptureError::Crop("frame has no pixels".to_string()));
        }

        let fw = frame_width as f32;
        let fh = frame_height as f32;

        let adjusted_height = bbox.width / self.config.target_aspect_ratio;
        let adjusted_y = bbox.y + (bbox.height - adjusted_height) / 2.0;
        let adjusted_y = adjusted_y.min(fh - adjusted_height).max(0.0);

        let margin_x = bbox.width * self.config.margin;
        let margin_y = adjusted_height * self.config.margin;

        let crop_x = (bbox.x - margin_x).max(0.0);
        let crop_y = (adjusted_y - margin_y).max(0.0);
        let crop_w = (bbox.width + 2.0 * margin_x).min(fw - crop_x);
        let crop_h = (adjusted_height + 2.0 * margin_y).min(fh - crop_y);

        let x0 = crop_x.floor().min(fw);
        let y0 = crop_y.floor().min(fh);
        let x1 = (crop_x + crop_w).round().min(fw);
        let y1 = (crop_y + crop_h).round().min(fh);

        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return Err(CaptureError::Crop(format!(
                "crop region for {:?} is empty inside {}x{}",
                bbox, frame_width, frame_height
            )));
        }

        let region = CropRegion {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        };

        assert_invariant!(
            region.fits_within(frame_width, frame_height),
            messages::CROP_INSIDE_FRAME,
            "CropExtractor::compute_crop_region"
        );

        Ok(region)
    }

    /// Crop `detection` out of `frame` and stretch it to the output size.
    pub fn extract(
        &self,
        detection: &Detection,
        frame: &Frame,
    ) -> Result<CapturedArtifact, CaptureError> {
        let source = frame
            .as_image()
            .map_err(|e| CaptureError::Crop(format!("source frame unusable: {}", e)))?;
        let region = self.compute_crop_region(&detection.bbox, frame.width, frame.height)?;

        let cropped = imageops::crop_imm(&source, region.x, region.y, region.width, region.height);
        let (out_w, out_h) = self.output_dimensions();
        let output = imageops::resize(&*cropped, out_w, out_h, FilterType::Triangle);

        log::info!(
            "Cropped document {}x{} at ({}, {}) into {}x{}",
            region.width,
            region.height,
            region.x,
            region.y,
            out_w,
            out_h
        );

        Ok(CapturedArtifact::new(
            ArtifactKind::Document,
            output,
            "ID card captured successfully",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dimensions() {
        assert_eq!(CropExtractor::default().output_dimensions(), (640, 404));
    }

    #[test]
    fn test_region_for_centered_card() {
        let extractor = CropExtractor::default();
        let bbox = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
        let region = extractor.compute_crop_region(&bbox, 1280, 720).unwrap();

        // 400 wide plus 20 px margin each side
        assert_eq!(region.x, 280);
        assert_eq!(region.width, 440);
        assert!(region.fits_within(1280, 720));
        let aspect = region.width as f32 / region.height as f32;
        assert!((aspect - 1.585).abs() < 0.02);
    }

    #[test]
    fn test_region_clamped_at_edges() {
        let extractor = CropExtractor::default();
        let bbox = BoundingBox::new(-20.0, 650.0, 300.0, 190.0);
        let region = extractor.compute_crop_region(&bbox, 640, 720).unwrap();
        assert_eq!(region.x, 0);
        assert!(region.fits_within(640, 720));
    }

    #[test]
    fn test_degenerate_box_is_crop_error() {
        let extractor = CropExtractor::default();
        let bbox = BoundingBox::new(10.0, 10.0, 0.0, 50.0);
        assert!(matches!(
            extractor.compute_crop_region(&bbox, 640, 480),
            Err(CaptureError::Crop(_))
        ));

        let outside = BoundingBox::new(900.0, 10.0, 100.0, 60.0);
        assert!(extractor.compute_crop_region(&outside, 640, 480).is_err());
    }

    #[test]
    fn test_extract_produces_fixed_size_document() {
        let frame = Frame::new(1280, 720, vec![128; 1280 * 720 * 3]);
        let detection = Detection {
            bbox: BoundingBox::new(300.0, 150.0, 400.0, 252.0),
            confidence: 0.9,
            aspect_ratio: 400.0 / 252.0,
            alignment_score: 1.0,
        };
        let artifact = CropExtractor::default().extract(&detection, &frame).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (640, 404));
        assert_eq!(artifact.kind(), ArtifactKind::Document);
    }

    #[test]
    fn test_extract_reads_the_card_region() {
        let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
        let frame = crate::testing::synthetic_data::card_frame(1280, 720, &card);
        let detection = Detection {
            bbox: card,
            confidence: 0.9,
            aspect_ratio: 400.0 / 252.0,
            alignment_score: 1.0,
        };
        let artifact = CropExtractor::default().extract(&detection, &frame).unwrap();
        let image = artifact.image();

        // card in the middle, margin background at the corner
        assert_eq!(image.get_pixel(320, 202).0, [220, 210, 190]);
        assert_eq!(image.get_pixel(0, 0).0, [40, 40, 40]);
        // the source frame is untouched
        assert_eq!(frame.data.len(), 1280 * 720 * 3);
    }
}
