//! Configuration management for autocapture
//!
//! Provides loading, saving and validation of the detector, document,
//! crop, selfie, session and storage tunables.

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCaptureConfig {
    pub detector: DetectorConfig,
    pub document: DocumentConfig,
    pub crop: CropConfig,
    pub selfie: SelfieConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
}

/// Detector input and decoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Square model input size in pixels
    pub input_size: u32,
    /// Candidates at or below this confidence are discarded while decoding
    pub confidence_floor: f32,
}

/// Document validity and stabilization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Session confidence threshold, applied after the decoder floor
    pub session_confidence_threshold: f32,
    /// Consecutive qualifying frames required before capture
    pub min_consecutive_detections: u32,
    /// Accepted width/height range [min, max]
    pub aspect_ratio_range: [f32; 2],
    /// Accepted box area / frame area range [min, max]
    pub area_ratio_range: [f32; 2],
    /// Distance-adjusted quality a frame must exceed to count
    pub quality_trigger_threshold: f32,
    /// ID-1 card width/height
    pub ideal_aspect_ratio: f32,
    /// Relative aspect error at which the aspect score reaches zero
    pub aspect_ratio_tolerance: f32,
    /// Frame occupancy at which distance adjustment stops boosting
    pub ideal_area_ratio: f32,
}

/// Final crop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    /// Margin added on each side, as a fraction of the adjusted box
    pub margin: f32,
    /// Output width in pixels; height follows the target aspect ratio
    pub output_width: u32,
    /// Aspect ratio forced onto the crop
    pub target_aspect_ratio: f32,
}

/// Selfie guidance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfieConfig {
    /// Face area ratio below which the user is asked to move closer
    pub min_face_ratio: f32,
    /// Face area ratio above which the user is asked to move back
    pub max_face_ratio: f32,
    /// Multiplier from face area ratio to a 0-100 quality
    pub quality_multiplier: f32,
    /// Quality that triggers a capture
    pub capture_quality: u8,
    /// Delay between trigger and capture in milliseconds
    pub capture_delay_ms: u64,
}

/// Scheduling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Interval between scheduler ticks in milliseconds
    pub tick_interval_ms: u64,
    /// How long stop waits for the loop thread to exit
    pub stop_timeout_ms: u64,
}

/// Artifact storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Default output directory for captured artifacts
    pub output_directory: String,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for AutoCaptureConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            document: DocumentConfig::default(),
            crop: CropConfig::default(),
            selfie: SelfieConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_floor: 0.85,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            session_confidence_threshold: 0.5,
            min_consecutive_detections: 3,
            aspect_ratio_range: [1.3, 1.9],
            area_ratio_range: [0.02, 0.8],
            quality_trigger_threshold: 0.4,
            ideal_aspect_ratio: 1.585,
            aspect_ratio_tolerance: 0.2,
            ideal_area_ratio: 0.3,
        }
    }
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            margin: 0.05,
            output_width: 640,
            target_aspect_ratio: 1.585,
        }
    }
}

impl Default for SelfieConfig {
    fn default() -> Self {
        Self {
            min_face_ratio: 0.15,
            max_face_ratio: 0.65,
            quality_multiplier: 300.0,
            capture_quality: 90,
            capture_delay_ms: 500,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            stop_timeout_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./captures".to_string(),
            jpeg_quality: 95,
        }
    }
}

impl AutoCaptureConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AutoCaptureConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CaptureError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CaptureError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CaptureError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("autocapture.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.detector.input_size == 0 || self.detector.input_size > 4096 {
            return Err("Detector input size must be between 1 and 4096".to_string());
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_floor) {
            return Err("Decoder confidence floor must be between 0.0 and 1.0".to_string());
        }

        let doc = &self.document;
        if !(0.0..=1.0).contains(&doc.session_confidence_threshold) {
            return Err("Session confidence threshold must be between 0.0 and 1.0".to_string());
        }
        if doc.min_consecutive_detections == 0 {
            return Err("At least one consecutive detection is required".to_string());
        }
        if !is_ordered_range(doc.aspect_ratio_range) || doc.aspect_ratio_range[0] <= 0.0 {
            return Err("Aspect ratio range must be positive and ordered".to_string());
        }
        if !is_ordered_range(doc.area_ratio_range)
            || doc.area_ratio_range[0] < 0.0
            || doc.area_ratio_range[1] > 1.0
        {
            return Err("Area ratio range must be ordered within 0.0 and 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&doc.quality_trigger_threshold) {
            return Err("Quality trigger threshold must be between 0.0 and 1.0".to_string());
        }
        if doc.ideal_aspect_ratio <= 0.0 || doc.aspect_ratio_tolerance <= 0.0 {
            return Err("Ideal aspect ratio and tolerance must be positive".to_string());
        }
        if doc.ideal_area_ratio <= 0.0 || doc.ideal_area_ratio > 1.0 {
            return Err("Ideal area ratio must be in (0.0, 1.0]".to_string());
        }

        if !(0.0..0.5).contains(&self.crop.margin) {
            return Err("Crop margin must be in [0.0, 0.5)".to_string());
        }
        if self.crop.output_width == 0 || self.crop.target_aspect_ratio <= 0.0 {
            return Err("Crop output width and aspect ratio must be positive".to_string());
        }

        let selfie = &self.selfie;
        if !(0.0..=1.0).contains(&selfie.min_face_ratio)
            || !(0.0..=1.0).contains(&selfie.max_face_ratio)
            || selfie.min_face_ratio >= selfie.max_face_ratio
        {
            return Err("Selfie face ratio bounds must be ordered within 0.0 and 1.0".to_string());
        }
        if selfie.capture_quality == 0 || selfie.capture_quality > 100 {
            return Err("Selfie capture quality must be between 1 and 100".to_string());
        }

        if self.session.tick_interval_ms == 0 {
            return Err("Tick interval must be at least 1ms".to_string());
        }

        if self.storage.jpeg_quality == 0 || self.storage.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Height of the document crop output buffer
    pub fn crop_output_height(&self) -> u32 {
        (self.crop.output_width as f32 / self.crop.target_aspect_ratio).round() as u32
    }
}

fn is_ordered_range(range: [f32; 2]) -> bool {
    range[0].is_finite() && range[1].is_finite() && range[0] <= range[1]
}
