//! Synthetic frames and detector outputs
//!
//! Lets the whole pipeline run offline: frames with a drawn card, raw
//! detector tensors built from frame-space boxes in either layout, and
//! replaying detectors.

use crate::errors::CaptureError;
use crate::inference::{Detector, FaceDetection, FaceDetector, ModelOutput};
use crate::detection::OutputLayout;
use crate::preprocess::Tensor;
use crate::types::{BoundingBox, Frame, GeometryContext};

/// `[cx, cy, w, h, confidence]`
pub const OUTPUT_FIELDS: usize = 5;

/// Gradient frame whose content changes with `frame_number`.
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; width as usize * height as usize * 3];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize * width as usize + x as usize) * 3;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    Frame::new(width, height, data).with_sequence(frame_number, frame_number * 33_333)
}

/// Dark frame with a light card filling `card`.
pub fn card_frame(width: u32, height: u32, card: &BoundingBox) -> Frame {
    let mut data = vec![40u8; width as usize * height as usize * 3];

    let x0 = card.x.max(0.0) as u32;
    let y0 = card.y.max(0.0) as u32;
    let x1 = ((card.x + card.width).max(0.0) as u32).min(width);
    let y1 = ((card.y + card.height).max(0.0) as u32).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = (y as usize * width as usize + x as usize) * 3;
            data[idx] = 220;
            data[idx + 1] = 210;
            data[idx + 2] = 190;
        }
    }

    Frame::new(width, height, data)
}

fn candidate_rows(
    candidates: &[(BoundingBox, f32)],
    geometry: &GeometryContext,
    predictions: usize,
) -> Vec<[f32; OUTPUT_FIELDS]> {
    let mut rows = vec![[0.0; OUTPUT_FIELDS]; predictions];
    for (row, (bbox, confidence)) in rows.iter_mut().zip(candidates) {
        let [cx, cy, w, h] = geometry.to_model_space(bbox);
        *row = [cx, cy, w, h, *confidence];
    }
    rows
}

/// `[1, N, 5]` output holding `candidates`; remaining rows have confidence 0.
///
/// `N` is raised above the field count so the shape reads as row-major.
pub fn row_major_output(
    candidates: &[(BoundingBox, f32)],
    geometry: &GeometryContext,
    predictions: usize,
) -> ModelOutput {
    let n = predictions.max(candidates.len()).max(OUTPUT_FIELDS + 1);
    let data: Vec<f32> = candidate_rows(candidates, geometry, n)
        .into_iter()
        .flatten()
        .collect();
    match Tensor::new(vec![1, n, OUTPUT_FIELDS], data) {
        Ok(tensor) => ModelOutput::Single(tensor),
        Err(_) => ModelOutput::Many(Vec::new()),
    }
}

/// `[1, 5, N]` output holding the same values as [`row_major_output`].
pub fn column_major_output(
    candidates: &[(BoundingBox, f32)],
    geometry: &GeometryContext,
    predictions: usize,
) -> ModelOutput {
    let n = predictions.max(candidates.len()).max(OUTPUT_FIELDS);
    let rows = candidate_rows(candidates, geometry, n);
    let mut data = vec![0.0; n * OUTPUT_FIELDS];
    for (i, row) in rows.iter().enumerate() {
        for (f, value) in row.iter().enumerate() {
            data[f * n + i] = *value;
        }
    }
    match Tensor::new(vec![1, OUTPUT_FIELDS, n], data) {
        Ok(tensor) => ModelOutput::Single(tensor),
        Err(_) => ModelOutput::Many(Vec::new()),
    }
}

/// Detector that replays canned outputs, repeating the last one.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    outputs: Vec<ModelOutput>,
    cursor: usize,
    ready: bool,
    layout: Option<OutputLayout>,
    calls: usize,
}

impl ReplayDetector {
    pub fn new(outputs: Vec<ModelOutput>) -> Self {
        Self {
            outputs,
            cursor: 0,
            ready: true,
            layout: None,
            calls: 0,
        }
    }

    pub fn repeating(output: ModelOutput) -> Self {
        Self::new(vec![output])
    }

    /// Models still loading.
    pub fn not_ready() -> Self {
        let mut detector = Self::new(Vec::new());
        detector.ready = false;
        detector
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Detector for ReplayDetector {
    fn predict(&mut self, _input: &Tensor) -> Result<ModelOutput, CaptureError> {
        self.calls += 1;
        if !self.ready {
            return Err(CaptureError::NotReady("replay detector disabled".to_string()));
        }
        let output = self
            .outputs
            .get(self.cursor)
            .or_else(|| self.outputs.last())
            .cloned()
            .ok_or_else(|| CaptureError::Decode("no canned output".to_string()))?;
        if self.cursor + 1 < self.outputs.len() {
            self.cursor += 1;
        }
        Ok(output)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn output_layout(&self) -> Option<OutputLayout> {
        self.layout
    }
}

/// Face detector that replays one optional face per call, repeating the last.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFaceDetector {
    faces: Vec<Option<BoundingBox>>,
    cursor: usize,
}

impl ScriptedFaceDetector {
    pub fn new(faces: Vec<Option<BoundingBox>>) -> Self {
        Self { faces, cursor: 0 }
    }
}

impl FaceDetector for ScriptedFaceDetector {
    fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceDetection>, CaptureError> {
        let face = self
            .faces
            .get(self.cursor)
            .or_else(|| self.faces.last())
            .copied()
            .flatten();
        if self.cursor + 1 < self.faces.len() {
            self.cursor += 1;
        }
        Ok(face
            .map(|bbox| vec![FaceDetection { bbox, score: 0.95 }])
            .unwrap_or_default())
    }
}

/// Face box covering `ratio` of a `width x height` frame, centered.
pub fn face_box_with_ratio(width: u32, height: u32, ratio: f32) -> BoundingBox {
    let side = (ratio * width as f32 * height as f32).sqrt();
    BoundingBox::new(
        (width as f32 - side) / 2.0,
        (height as f32 - side) / 2.0,
        side,
        side,
    )
}
