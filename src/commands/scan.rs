//! Scan commands for hosts that run the detector themselves
//!
//! The webview preprocesses a frame, runs its model, then feeds the raw
//! output back here. Decoding, stabilization, cropping and selfie guidance
//! stay in Rust.

use super::config::current_config;
use crate::artifact::{ArtifactInfo, CapturedArtifact};
use crate::detection::OutputLayout;
use crate::inference::ModelOutput;
use crate::pipeline::{DocumentObservation, DocumentPipeline};
use crate::preprocess::{FramePreprocessor, PreprocessedFrame};
use crate::quality::{SelfieQualityTracker, SelfieUpdate};
use crate::types::{BoundingBox, Frame, GeometryContext, ScanSignals};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tauri::command;

lazy_static::lazy_static! {
    static ref DOCUMENT_PIPELINE: Arc<Mutex<Option<DocumentPipeline>>> = Arc::new(Mutex::new(None));
    static ref SCAN_SIGNALS: Arc<Mutex<ScanSignals>> = Arc::new(Mutex::new(ScanSignals::default()));
    static ref SELFIE_TRACKER: Arc<Mutex<Option<SelfieQualityTracker>>> = Arc::new(Mutex::new(None));
}

/// A captured artifact as returned to the webview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub info: ArtifactInfo,
    /// Set when the artifact was written to the storage directory
    pub path: Option<String>,
}

fn with_pipeline<R>(f: impl FnOnce(&mut DocumentPipeline) -> R) -> Result<R, String> {
    let mut guard = DOCUMENT_PIPELINE.lock().map_err(|e| e.to_string())?;
    if guard.is_none() {
        *guard = Some(DocumentPipeline::from_config(&current_config()?));
    }
    match guard.as_mut() {
        Some(pipeline) => Ok(f(pipeline)),
        None => Err("document pipeline unavailable".to_string()),
    }
}

fn with_selfie_tracker<R>(f: impl FnOnce(&mut SelfieQualityTracker) -> R) -> Result<R, String> {
    let mut guard = SELFIE_TRACKER.lock().map_err(|e| e.to_string())?;
    if guard.is_none() {
        *guard = Some(SelfieQualityTracker::new(current_config()?.selfie));
    }
    match guard.as_mut() {
        Some(tracker) => Ok(f(tracker)),
        None => Err("selfie tracker unavailable".to_string()),
    }
}

fn store(artifact: CapturedArtifact, save: bool) -> Result<CaptureResult, String> {
    let path = if save {
        let storage = current_config()?.storage;
        let path = artifact
            .save_to_dir(&storage.output_directory, storage.jpeg_quality)
            .map_err(|e| e.to_string())?;
        Some(path.to_string_lossy().into_owned())
    } else {
        None
    };
    Ok(CaptureResult {
        info: artifact.info(),
        path,
    })
}

/// Letterbox a frame into the detector input tensor
#[command]
pub async fn preprocess_frame(frame: Frame) -> Result<PreprocessedFrame, String> {
    let input_size = current_config()?.detector.input_size;
    tokio::task::spawn_blocking(move || FramePreprocessor::new(input_size).preprocess(&frame))
        .await
        .map_err(|e| format!("Preprocessing task failed: {}", e))?
        .map_err(|e| e.to_string())
}

/// Feed one frame's raw detector output
#[command]
pub async fn observe_detector_output(
    output: ModelOutput,
    geometry: GeometryContext,
    layout: Option<OutputLayout>,
) -> Result<DocumentObservation, String> {
    let observation =
        with_pipeline(|pipeline| pipeline.observe_output(&output, &geometry, layout))?;

    let mut signals = SCAN_SIGNALS.lock().map_err(|e| e.to_string())?;
    signals.apply_update(&observation.update);
    Ok(observation)
}

#[command]
pub async fn get_scan_signals() -> Result<ScanSignals, String> {
    let signals = SCAN_SIGNALS.lock().map_err(|e| e.to_string())?;
    Ok(signals.clone())
}

/// Crop the card that completed the stable run out of `frame`
///
/// Only the ready detection leaves the shared pipeline, so detector output
/// observed while the crop runs is kept.
#[command]
pub async fn extract_card(frame: Frame, save: Option<bool>) -> Result<CaptureResult, String> {
    let (detection, extractor) = with_pipeline(|pipeline| {
        pipeline
            .take_ready_detection()
            .map(|detection| (detection, pipeline.crop_extractor().clone()))
    })?
    .ok_or_else(|| "No stable card detection to extract".to_string())?;

    let result = tokio::task::spawn_blocking(move || extractor.extract(&detection, &frame))
        .await
        .map_err(|e| format!("Crop task failed: {}", e))?;

    let mut signals = SCAN_SIGNALS.lock().map_err(|e| e.to_string())?;
    match result {
        Ok(artifact) => {
            signals.captured = true;
            signals.status = artifact.status().to_string();
            store(artifact, save.unwrap_or(false))
        }
        Err(e) => {
            log::warn!("Card extraction failed: {}", e);
            with_pipeline(|shared| shared.reset())?;
            signals.capture_ready = false;
            signals.consecutive_detections = 0;
            Err(format!("Failed to extract card: {}", e))
        }
    }
}

/// Start a new document scan
#[command]
pub async fn reset_document_scan() -> Result<(), String> {
    let config = current_config()?;
    {
        let mut guard = DOCUMENT_PIPELINE.lock().map_err(|e| e.to_string())?;
        *guard = Some(DocumentPipeline::from_config(&config));
    }
    let mut signals = SCAN_SIGNALS.lock().map_err(|e| e.to_string())?;
    *signals = ScanSignals::default();
    log::info!("Document scan reset");
    Ok(())
}

/// Guidance for the best face the host found in a selfie frame
#[command]
pub async fn observe_face(
    face: Option<BoundingBox>,
    frame_width: u32,
    frame_height: u32,
) -> Result<SelfieUpdate, String> {
    with_selfie_tracker(|tracker| tracker.observe(face.as_ref(), frame_width, frame_height))
}

/// Store the frame that was current when the selfie delay elapsed
#[command]
pub async fn capture_selfie(frame: Frame, save: Option<bool>) -> Result<CaptureResult, String> {
    let artifact = tokio::task::spawn_blocking(move || CapturedArtifact::selfie(&frame))
        .await
        .map_err(|e| format!("Selfie task failed: {}", e))?
        .map_err(|e| e.to_string())?;
    store(artifact, save.unwrap_or(false))
}

#[command]
pub async fn reset_selfie() -> Result<(), String> {
    let config = current_config()?;
    let mut guard = SELFIE_TRACKER.lock().map_err(|e| e.to_string())?;
    *guard = Some(SelfieQualityTracker::new(config.selfie));
    Ok(())
}
