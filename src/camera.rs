// Camera module for webcam capture

use crate::error::{ExpressionDetectorError, Result};
use crate::models::Frame;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{error, info, warn};

/// Anything that can hand the detection loop its next frame
pub trait FrameSource {
    /// Blocks until the next frame is available
    fn next_frame(&mut self) -> Result<Frame>;
}

/// Owns the webcam stream
pub struct CameraManager {
    camera: Camera,
    is_streaming: bool,
}

impl CameraManager {
    /// Opens the camera at `index`, falling back to `index + 1`, and checks
    /// that the stream delivers frames.
    pub fn open(index: u32) -> Result<Self> {
        // 640x480 is plenty for a detector that downsizes to its input size anyway
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            nokhwa::utils::CameraFormat::new(
                nokhwa::utils::Resolution::new(640, 480),
                nokhwa::utils::FrameFormat::YUYV,
                30,
            ),
        ));

        // Some systems number their first camera 1
        let camera = Self::try_open_camera(index, requested_format)
            .or_else(|_| Self::try_open_camera(index + 1, requested_format))
            .map_err(|e| {
                error!("Failed to open camera {} or {}: {}", index, index + 1, e);
                match e {
                    ExpressionDetectorError::CameraAccessDenied => e,
                    _ => ExpressionDetectorError::CameraInit(format!(
                        "Could not open camera. Make sure a camera is connected, \
                        no other app is using it and camera permissions are granted. \
                        Error: {e}"
                    )),
                }
            })?;

        let mut manager = Self {
            camera,
            is_streaming: false,
        };
        manager.ensure_stream_open()?;

        info!(
            "Camera '{}' streaming at {}x{}",
            manager.camera_info(),
            manager.resolution().0,
            manager.resolution().1
        );
        Ok(manager)
    }

    fn try_open_camera(index: u32, requested_format: RequestedFormat) -> Result<Camera> {
        Ok(Camera::new(CameraIndex::Index(index), requested_format)?)
    }

    /// Lists available camera devices
    pub fn list_devices() -> Result<Vec<String>> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto).map_err(|e| {
            ExpressionDetectorError::CameraInit(format!("Failed to query cameras: {e}"))
        })?;

        Ok(devices
            .iter()
            .map(|info| format!("{}: {}", info.index(), info.human_name()))
            .collect())
    }

    /// Returns the current camera resolution
    pub fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }

    /// Returns the camera's human-readable name
    pub fn camera_info(&self) -> String {
        self.camera.info().human_name().to_string()
    }

    /// Opens the stream and verifies that a first frame can be read
    fn ensure_stream_open(&mut self) -> Result<()> {
        if !self.is_streaming {
            self.camera.open_stream()?;
            self.is_streaming = true;
        }

        // Give the device a moment to warm up
        std::thread::sleep(std::time::Duration::from_millis(200));

        match self.camera.frame() {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Camera stream not working: {}", e);
                Err(ExpressionDetectorError::CameraInit(format!(
                    "Camera stream not working: {e}. Make sure camera permissions are granted."
                )))
            }
        }
    }

    /// Stops the camera stream
    pub fn stop(&mut self) {
        if !self.is_streaming {
            return;
        }
        self.is_streaming = false;

        if let Err(e) = self.camera.stop_stream() {
            warn!("Error stopping camera stream: {}", e);
        }
    }
}

impl FrameSource for CameraManager {
    fn next_frame(&mut self) -> Result<Frame> {
        let frame_data = self.camera.frame().map_err(|e| {
            ExpressionDetectorError::FrameProcessing(format!("Failed to capture frame: {e}"))
        })?;

        let buffer = frame_data.decode_image::<RgbFormat>().map_err(|e| {
            ExpressionDetectorError::FrameProcessing(format!("Failed to decode frame: {e}"))
        })?;

        let (width, height) = (buffer.width(), buffer.height());
        Ok(Frame::new(buffer.into_raw(), width, height))
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop();
    }
}
