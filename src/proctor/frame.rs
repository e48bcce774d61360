//! Camera frames and the two collaborators the monitor pulls from.
//!
//! [`FrameSource`] yields grayscale frames from whatever camera the host
//! owns; [`FaceDetector`] returns the face boxes found in one frame.  Both are
//! traits so the monitor can be driven by a real camera pipeline or by a
//! scripted sequence in tests.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ProctorError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProctorError {
    /// The camera was denied, unplugged or never existed.
    #[error("camera unavailable: {0}")]
    Device(String),

    /// The frame buffer does not match its declared dimensions.
    #[error("malformed frame: expected {expected} luma bytes, got {got}")]
    MalformedFrame { expected: usize, got: usize },

    /// The face detector failed on a frame.
    #[error("face detection failed: {0}")]
    Detection(String),
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A single 8-bit grayscale (luma) camera frame, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    /// Wrap a luma plane, checking that it matches `width × height`.
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Result<Self, ProctorError> {
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(ProctorError::MalformedFrame {
                expected,
                got: luma.len(),
            });
        }
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    /// A frame filled with a single brightness value.
    pub fn uniform(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            luma: vec![value; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.luma[y as usize * self.width as usize + x as usize]
    }
}

/// Bounding box of one detected face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Lazy sequence of camera frames.
///
/// `Ok(None)` means the camera stream ended; an `Err` means the device is
/// gone.  Either way the monitor stops and proctoring is disabled for the
/// rest of the session.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ProctorError>;
}

/// Face detection over a single frame.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceBox>, ProctorError>;
}
