use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};

/// Memory layout of the detector output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputLayout {
    /// `[1, predictions, fields]`, one row per candidate
    RowMajor,
    /// `[1, fields, predictions]`, one row per field
    ColumnMajor,
}

/// Guess the layout from the two innermost dimensions.
///
/// Row-major when the prediction axis is longer than the field axis,
/// column-major otherwise. A prediction grid no longer than the field count
/// is classified column-major even if it was written row-major; pass an
/// explicit layout to the decoder when the runtime knows better.
pub fn classify_layout(shape: &[usize]) -> Result<OutputLayout, CaptureError> {
    if shape.len() < 2 {
        return Err(CaptureError::Decode(format!(
            "detector output must have at least 2 dimensions, got shape {:?}",
            shape
        )));
    }
    let outer = shape[shape.len() - 2];
    let inner = shape[shape.len() - 1];
    Ok(if outer > inner {
        OutputLayout::RowMajor
    } else {
        OutputLayout::ColumnMajor
    })
}

/// Predictions and fields for a shape in the given layout.
pub(crate) fn grid_dims(shape: &[usize], layout: OutputLayout) -> (usize, usize) {
    let outer = shape[shape.len() - 2];
    let inner = shape[shape.len() - 1];
    match layout {
        OutputLayout::RowMajor => (outer, inner),
        OutputLayout::ColumnMajor => (inner, outer),
    }
}
