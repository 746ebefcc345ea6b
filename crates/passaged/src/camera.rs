//! V4L2 camera capture via the `v4l` crate.
//!
//! The gate camera is an ordinary RGB webcam; we negotiate YUYV and
//! convert to RGB on dequeue.

use passage_pipeline::{yuyv_to_rgb, CaptureError, Frame, FrameSource};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        if negotiated.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV)",
                negotiated.fourcc
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
        })
    }

    /// Start streaming. The session borrows the camera for its lifetime.
    pub fn start(&mut self) -> Result<CaptureSession<'_>, CameraError> {
        let stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        Ok(CaptureSession {
            stream,
            width: self.width,
            height: self.height,
        })
    }
}

/// An active mmap capture stream, dequeuing frames on demand.
pub struct CaptureSession<'a> {
    stream: MmapStream<'a>,
    width: u32,
    height: u32,
}

impl FrameSource for CaptureSession<'_> {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::SourceLost(format!("failed to dequeue buffer: {e}")))?;

        let data = yuyv_to_rgb(buf, self.width, self.height)
            .map_err(|e| CaptureError::SourceLost(format!("YUYV conversion failed: {e}")))?;

        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
        })
    }
}
