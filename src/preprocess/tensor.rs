use crate::assert_invariant;
use crate::errors::CaptureError;
use crate::invariant_ppt::messages;
use serde::{Deserialize, Serialize};

/// Dense row-major `f32` tensor.
///
/// Used both for the letterboxed model input (NHWC) and for raw detector
/// output handed back across the inference boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, CaptureError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CaptureError::Decode(format!(
                "tensor shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        assert_invariant!(
            shape.iter().product::<usize>() == data.len(),
            messages::TENSOR_LEN,
            "Tensor::new"
        );
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Channel value of an NHWC image tensor at batch 0.
    pub fn pixel(&self, y: usize, x: usize, channel: usize) -> Option<f32> {
        if self.rank() != 4 {
            return None;
        }
        let (h, w, c) = (self.shape[1], self.shape[2], self.shape[3]);
        if y >= h || x >= w || channel >= c {
            return None;
        }
        self.data.get((y * w + x) * c + channel).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_is_decode_error() {
        let err = Tensor::new(vec![1, 5, 3], vec![0.0; 14]).unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
    }

    #[test]
    fn test_pixel_out_of_bounds() {
        let t = Tensor::new(vec![1, 2, 2, 3], vec![0.5; 12]).unwrap();
        assert_eq!(t.pixel(1, 1, 2), Some(0.5));
        assert_eq!(t.pixel(2, 0, 0), None);
    }
}
