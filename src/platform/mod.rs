//! Native camera frame source via nokhwa

use crate::errors::CaptureError;
use crate::source::{FrameClock, FrameSource};
use crate::types::Frame;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

/// List camera indices and names reported by the OS.
pub fn list_cameras() -> Result<Vec<(u32, String)>, CaptureError> {
    let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
        .map_err(|e| CaptureError::Acquisition(format!("Failed to query cameras: {}", e)))?;

    Ok(cameras
        .into_iter()
        .filter_map(|info| match info.index() {
            CameraIndex::Index(i) => Some((*i, info.human_name())),
            CameraIndex::String(_) => None,
        })
        .collect())
}

pub struct CameraSource {
    index: u32,
    camera: Option<CallbackCamera>,
    dimensions: (u32, u32),
    sequence: u64,
    clock: FrameClock,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
            dimensions: (0, 0),
            sequence: 0,
            clock: FrameClock::new(),
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.camera.is_some() {
            return Ok(());
        }
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera =
            CallbackCamera::new(CameraIndex::Index(self.index), requested_format, |_| {})
                .map_err(|e| {
                    CaptureError::Acquisition(format!("Failed to initialize camera: {}", e))
                })?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::Acquisition(format!("Failed to start stream: {}", e)))?;

        log::info!("Opened camera {}", self.index);
        self.camera = Some(camera);
        self.clock = FrameClock::new();
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CaptureError::Acquisition("camera is not open".to_string()))?;

        let buffer = camera
            .poll_frame()
            .map_err(|e| CaptureError::NotReady(format!("Failed to capture frame: {}", e)))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::NotReady(format!("Failed to decode frame: {}", e)))?;

        self.dimensions = image.dimensions();
        let frame = Frame::from_image(image).with_sequence(self.sequence, self.clock.now_us());
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera {}: {}", self.index, e);
            }
            log::info!("Released camera {}", self.index);
        }
        self.dimensions = (0, 0);
    }

    fn is_open(&self) -> bool {
        self.camera.is_some()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
