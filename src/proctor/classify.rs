//! Per-frame integrity classification.
//!
//! [`FrameClassifier`] turns a face count plus the frame itself into one of
//! four outcomes:
//!
//! | Faces | Luminance           | Outcome      |
//! |-------|---------------------|--------------|
//! | 0     | —                   | `NoFace`     |
//! | ≥ 2   | —                   | `MultiFace`  |
//! | 1     | below threshold     | `LowLight`   |
//! | 1     | at/above threshold  | clear        |
//!
//! Luminance is the mean luma over a fixed square centred on the frame, so a
//! bright window behind the candidate does not mask a dark face.
//!
//! # Example
//!
//! ```rust
//! use mock_interview::proctor::{Classification, Frame, FrameClassifier, WarningKind};
//!
//! let classifier = FrameClassifier::new(50, 64);
//! let dark = Frame::uniform(320, 240, 10);
//! assert_eq!(
//!     classifier.classify(1, &dark),
//!     Classification::Violation(WarningKind::LowLight)
//! );
//! assert_eq!(classifier.classify(1, &Frame::uniform(320, 240, 140)), Classification::Clear);
//! ```

use serde::{Deserialize, Serialize};

use super::frame::Frame;

// ---------------------------------------------------------------------------
// WarningKind
// ---------------------------------------------------------------------------

/// Category of integrity violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    NoFace,
    MultiFace,
    LowLight,
}

impl WarningKind {
    /// Notice shown to the candidate while the warning is displayed.
    pub fn message(&self) -> &'static str {
        match self {
            WarningKind::NoFace => "No face detected. Please stay in front of the camera.",
            WarningKind::MultiFace => "Multiple people detected. Only the candidate may be present.",
            WarningKind::LowLight => "Your face is too dark. Please improve the lighting.",
        }
    }
}

/// Result of analysing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Clear,
    Violation(WarningKind),
}

// ---------------------------------------------------------------------------
// FrameClassifier
// ---------------------------------------------------------------------------

pub struct FrameClassifier {
    /// Mean luma below which a single-face frame counts as too dark.
    pub luminance_threshold: u8,
    /// Side of the centred sampling square, clamped to the frame size.
    pub sample_region: u32,
}

impl Default for FrameClassifier {
    fn default() -> Self {
        Self {
            luminance_threshold: 50,
            sample_region: 64,
        }
    }
}

impl FrameClassifier {
    pub fn new(luminance_threshold: u8, sample_region: u32) -> Self {
        Self {
            luminance_threshold,
            sample_region,
        }
    }

    /// Classify a frame given how many faces the detector found in it.
    ///
    /// Checks run in this order:
    /// 1. Face count (none → many)
    /// 2. Lighting, only when exactly one face is present
    pub fn classify(&self, faces: usize, frame: &Frame) -> Classification {
        match faces {
            0 => Classification::Violation(WarningKind::NoFace),
            1 => {
                let mean = average_luminance(frame, self.sample_region);
                if mean < f32::from(self.luminance_threshold) {
                    Classification::Violation(WarningKind::LowLight)
                } else {
                    Classification::Clear
                }
            }
            _ => Classification::Violation(WarningKind::MultiFace),
        }
    }
}

/// Mean luma over the `region × region` square centred on `frame`.
///
/// The square is clamped to the frame; an empty frame reads as black.
pub fn average_luminance(frame: &Frame, region: u32) -> f32 {
    let w = region.min(frame.width);
    let h = region.min(frame.height);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let x0 = (frame.width - w) / 2;
    let y0 = (frame.height - h) / 2;

    let mut sum: u64 = 0;
    for y in y0..y0 + h {
        let row = y as usize * frame.width as usize;
        let start = row + x0 as usize;
        sum += frame.luma[start..start + w as usize]
            .iter()
            .map(|&p| u64::from(p))
            .sum::<u64>();
    }

    sum as f32 / (w as u64 * h as u64) as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
