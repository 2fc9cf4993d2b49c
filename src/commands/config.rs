use crate::config::{AutoCaptureConfig, DocumentConfig, SelfieConfig, StorageConfig};
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<AutoCaptureConfig>> = Arc::new(RwLock::new(AutoCaptureConfig::load_or_default()));
}

/// Snapshot of the active configuration for other command modules.
pub(crate) fn current_config() -> Result<AutoCaptureConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<AutoCaptureConfig, String> {
    current_config()
}

/// Validate, apply and persist a new configuration
///
/// Pipelines pick it up on their next reset.
#[command]
pub async fn update_config(new_config: AutoCaptureConfig) -> Result<(), String> {
    new_config.validate()?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    new_config
        .save_to_file(AutoCaptureConfig::default_path())
        .map_err(|e| e.to_string())?;

    log::info!("Configuration updated");
    Ok(())
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<AutoCaptureConfig, String> {
    let default_config = AutoCaptureConfig::default();

    {
        let mut config = GLOBAL_CONFIG
            .write()
            .map_err(|e| format!("Failed to write config: {}", e))?;
        *config = default_config.clone();
    }

    default_config
        .save_to_file(AutoCaptureConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(default_config)
}

#[command]
pub async fn get_document_config() -> Result<DocumentConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.document.clone())
}

#[command]
pub async fn get_selfie_config() -> Result<SelfieConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.selfie.clone())
}

#[command]
pub async fn get_storage_config() -> Result<StorageConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.storage.clone())
}
