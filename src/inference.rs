//! Inference boundary
//!
//! Model loading and execution live outside this crate. The pipeline only
//! needs a `predict`-like capability for documents and a face detector for
//! selfies.

use crate::detection::OutputLayout;
use crate::errors::CaptureError;
use crate::preprocess::Tensor;
use crate::types::{BoundingBox, Frame};
use serde::{Deserialize, Serialize};

/// Raw detector output: some runtimes return one tensor, others a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOutput {
    Single(Tensor),
    Many(Vec<Tensor>),
}

impl ModelOutput {
    /// The tensor the decoder reads; the first one when several are returned.
    pub fn primary(&self) -> Option<&Tensor> {
        match self {
            ModelOutput::Single(tensor) => Some(tensor),
            ModelOutput::Many(tensors) => tensors.first(),
        }
    }
}

impl From<Tensor> for ModelOutput {
    fn from(tensor: Tensor) -> Self {
        ModelOutput::Single(tensor)
    }
}

/// Document detector consumed as a black box.
pub trait Detector {
    /// Run the model on a letterboxed `[1, S, S, 3]` tensor.
    fn predict(&mut self, input: &Tensor) -> Result<ModelOutput, CaptureError>;

    /// `false` while the model is still loading.
    fn is_ready(&self) -> bool {
        true
    }

    /// Explicit output layout, when the runtime knows it.
    fn output_layout(&self) -> Option<OutputLayout> {
        None
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn predict(&mut self, input: &Tensor) -> Result<ModelOutput, CaptureError> {
        (**self).predict(input)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn output_layout(&self) -> Option<OutputLayout> {
        (**self).output_layout()
    }
}

/// A face found in a selfie frame, in frame-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Face detector consumed as a black box.
pub trait FaceDetector {
    /// Faces in `frame`, best first.
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, CaptureError>;

    fn is_ready(&self) -> bool {
        true
    }
}

impl<F: FaceDetector + ?Sized> FaceDetector for Box<F> {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, CaptureError> {
        (**self).detect_faces(frame)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_uses_first_of_many() {
        let a = Tensor::new(vec![1, 1, 5], vec![0.1; 5]).unwrap();
        let b = Tensor::new(vec![1, 1, 5], vec![0.9; 5]).unwrap();
        let output = ModelOutput::Many(vec![a.clone(), b]);
        assert_eq!(output.primary(), Some(&a));
        assert_eq!(ModelOutput::Many(Vec::new()).primary(), None);
    }

    #[test]
    fn test_model_output_from_json() {
        let json = r#"{"shape":[1,5,1],"data":[0.5,0.5,0.2,0.1,0.9]}"#;
        let output: ModelOutput = serde_json::from_str(json).unwrap();
        assert!(matches!(output, ModelOutput::Single(_)));

        let json = format!("[{}]", json);
        let output: ModelOutput = serde_json::from_str(&json).unwrap();
        assert!(matches!(output, ModelOutput::Many(ref v) if v.len() == 1));
    }
}
