use super::layout::{classify_layout, grid_dims, OutputLayout};
use crate::errors::CaptureError;
use crate::inference::ModelOutput;
use crate::preprocess::Tensor;
use crate::quality::AlignmentScorer;
use crate::types::{Detection, GeometryContext};
use std::cmp::Ordering;

/// `[cx, cy, w, h, confidence]`; anything after is ignored.
const MIN_FIELDS: usize = 5;

/// Turns raw detector output into frame-space detections.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionDecoder {
    confidence_floor: f32,
    scorer: AlignmentScorer,
}

impl Default for DetectionDecoder {
    fn default() -> Self {
        Self::new(0.85, AlignmentScorer::default())
    }
}

impl DetectionDecoder {
    pub fn new(confidence_floor: f32, scorer: AlignmentScorer) -> Self {
        Self {
            confidence_floor,
            scorer,
        }
    }

    pub fn confidence_floor(&self) -> f32 {
        self.confidence_floor
    }

    pub fn scorer(&self) -> &AlignmentScorer {
        &self.scorer
    }

    /// Decode with the layout inferred from the tensor shape.
    pub fn decode(
        &self,
        output: &ModelOutput,
        geometry: &GeometryContext,
    ) -> Result<Vec<Detection>, CaptureError> {
        self.decode_with_layout(output, geometry, None)
    }

    /// Decode, optionally overriding the shape heuristic.
    ///
    /// The result is sorted by descending confidence; ties keep model order.
    pub fn decode_with_layout(
        &self,
        output: &ModelOutput,
        geometry: &GeometryContext,
        layout: Option<OutputLayout>,
    ) -> Result<Vec<Detection>, CaptureError> {
        let tensor = output
            .primary()
            .ok_or_else(|| CaptureError::Decode("detector returned no outputs".to_string()))?;
        let grid = CandidateGrid::new(tensor, layout)?;

        let mut detections = Vec::new();
        for i in 0..grid.predictions {
            let [cx, cy, w, h, confidence] = grid.candidate(i);
            if confidence.is_nan() || confidence <= self.confidence_floor {
                continue;
            }
            if ![cx, cy, w, h, confidence].iter().all(|v| v.is_finite()) {
                continue;
            }
            detections.push(self.to_detection(cx, cy, w, h, confidence, geometry));
        }

        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        log::trace!(
            "Decoded {} of {} candidates ({:?})",
            detections.len(),
            grid.predictions,
            grid.layout
        );
        Ok(detections)
    }

    /// Decode and swallow failures; a bad frame yields no detections.
    pub fn decode_or_skip(
        &self,
        output: &ModelOutput,
        geometry: &GeometryContext,
        layout: Option<OutputLayout>,
    ) -> Vec<Detection> {
        match self.decode_with_layout(output, geometry, layout) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Skipping frame, detector output not decodable: {}", e);
                Vec::new()
            }
        }
    }

    fn to_detection(
        &self,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        confidence: f32,
        geometry: &GeometryContext,
    ) -> Detection {
        let bbox = geometry.to_frame_space(cx, cy, w, h);
        let aspect_ratio = bbox.aspect_ratio().unwrap_or_else(|e| {
            log::trace!("{}; scoring as 0", e);
            0.0
        });
        let alignment_score = self.scorer.score(
            aspect_ratio,
            bbox.area(),
            geometry.original_width as f32,
            geometry.original_height as f32,
        );

        Detection {
            bbox,
            confidence,
            aspect_ratio,
            alignment_score,
        }
    }
}

/// Layout-aware view over the first batch of an output tensor.
struct CandidateGrid<'a> {
    data: &'a [f32],
    layout: OutputLayout,
    predictions: usize,
    fields: usize,
}

impl<'a> CandidateGrid<'a> {
    fn new(tensor: &'a Tensor, layout: Option<OutputLayout>) -> Result<Self, CaptureError> {
        let shape = tensor.shape();
        let layout = match layout {
            Some(layout) => {
                if shape.len() < 2 {
                    return Err(CaptureError::Decode(format!(
                        "detector output must have at least 2 dimensions, got shape {:?}",
                        shape
                    )));
                }
                layout
            }
            None => classify_layout(shape)?,
        };

        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if expected != Some(tensor.data().len()) {
            return Err(CaptureError::Decode(format!(
                "output shape {:?} does not match {} values",
                shape,
                tensor.data().len()
            )));
        }

        let (predictions, fields) = grid_dims(shape, layout);
        if fields < MIN_FIELDS {
            return Err(CaptureError::Decode(format!(
                "expected at least {} fields per candidate, got {} (shape {:?}, {:?})",
                MIN_FIELDS, fields, shape, layout
            )));
        }

        let used = predictions.checked_mul(fields).unwrap_or(usize::MAX);
        if used > tensor.data().len() {
            return Err(CaptureError::Decode(format!(
                "output shape {:?} holds {} values, {} candidates of {} fields need {}",
                shape,
                tensor.data().len(),
                predictions,
                fields,
                used
            )));
        }

        Ok(Self {
            data: &tensor.data()[..used],
            layout,
            predictions,
            fields,
        })
    }

    fn field(&self, candidate: usize, field: usize) -> f32 {
        match self.layout {
            OutputLayout::RowMajor => self.data[candidate * self.fields + field],
            OutputLayout::ColumnMajor => self.data[field * self.predictions + candidate],
        }
    }

    fn candidate(&self, i: usize) -> [f32; MIN_FIELDS] {
        [
            self.field(i, 0),
            self.field(i, 1),
            self.field(i, 2),
            self.field(i, 3),
            self.field(i, 4),
        ]
    }
}
