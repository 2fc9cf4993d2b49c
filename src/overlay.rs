//! Preview overlay for the best detection
//!
//! Text rendering is left to the host UI; this module picks the box colour
//! and label and draws the box outline into an RGB image.

use crate::types::{BoundingBox, Detection};
use image::{Rgb, RgbImage};

pub const BOX_THICKNESS: u32 = 4;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const LIME: Rgb<u8> = Rgb([0, 255, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
pub const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);

/// Red for invalid cards, otherwise graded by alignment.
pub fn box_color(alignment_score: f32, is_valid: bool) -> Rgb<u8> {
    if !is_valid {
        RED
    } else if alignment_score > 0.8 {
        LIME
    } else if alignment_score > 0.5 {
        YELLOW
    } else {
        ORANGE
    }
}

pub fn box_label(detection: &Detection, is_valid: bool) -> String {
    if !is_valid {
        return "Invalid Card".to_string();
    }
    format!(
        "ID card: {}% (Align: {}%)",
        (detection.confidence * 100.0).round() as i32,
        (detection.alignment_score * 100.0).round() as i32
    )
}

/// Clamp a frame-space box to pixel corners `[x0, y0, x1, y1]`, inclusive.
pub fn pixel_corners(bbox: &BoundingBox, dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let values = [bbox.x, bbox.y, bbox.width, bbox.height];
    if !values.iter().all(|v| v.is_finite()) {
        return None;
    }
    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let x0 = clamp(bbox.x, w);
    let y0 = clamp(bbox.y, h);
    let x1 = clamp(bbox.x + bbox.width, w);
    let y1 = clamp(bbox.y + bbox.height, h);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some([x0, y0, x1, y1])
}

/// Draw a rectangle border with given thickness.
pub fn draw_rect(img: &mut RgbImage, corners: [u32; 4], color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let [x0, y0, x1, y1] = corners;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 >= w || yy0 >= h || xx1 >= w || yy1 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

/// Outline `detection` and return its label, or `None` if it is off-frame.
pub fn draw_detection(img: &mut RgbImage, detection: &Detection, is_valid: bool) -> Option<String> {
    let corners = pixel_corners(&detection.bbox, img.dimensions())?;
    draw_rect(
        img,
        corners,
        box_color(detection.alignment_score, is_valid),
        BOX_THICKNESS,
    );
    Some(box_label(detection, is_valid))
}
