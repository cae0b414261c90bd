//! Plate recognition core: detect plate regions, read each crop, normalize the
//! text and pick the result according to a [`SelectionPolicy`].

pub mod detector;
pub mod onnx;
pub mod pipeline;
pub mod reader;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub use detector::{OnnxPlateDetector, PlateDetector};
pub use pipeline::{PipelineConfig, PlatePipeline};
pub use reader::{OnnxTextReader, TextReader};
pub use selector::{CandidateSelector, PlateShape};

/// Axis-aligned plate region in image pixel coordinates (corner form).
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[i32; 4]", from = "[i32; 4]")]
pub struct PlateBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PlateBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Clip the box to a `width × height` image. Returns `None` when nothing of
    /// positive area is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PlateBox> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);

        let clamped = PlateBox {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        };

        (clamped.x2 > clamped.x1 && clamped.y2 > clamped.y1).then_some(clamped)
    }

    /// Intersection over union of two boxes
    pub fn iou(&self, other: &PlateBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = if ix2 > ix1 && iy2 > iy1 {
            (ix2 - ix1) as f32 * (iy2 - iy1) as f32
        } else {
            0.0
        };

        let union = self.area() as f32 + other.area() as f32 - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl From<PlateBox> for [i32; 4] {
    fn from(b: PlateBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl From<[i32; 4]> for PlateBox {
    fn from(v: [i32; 4]) -> Self {
        PlateBox::new(v[0], v[1], v[2], v[3])
    }
}

/// Raw text read from one crop.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub text: String,
    /// Model-reported probability in `[0, 1]`
    pub confidence: f32,
    pub source: PlateBox,
}

impl Reading {
    pub fn new(text: impl Into<String>, confidence: f32, source: PlateBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            source,
        }
    }
}

/// A reading after normalization; `text` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
    pub source: PlateBox,
}

impl Candidate {
    /// Normalize a reading, dropping it when no alphanumeric text survives
    pub fn from_reading(reading: &Reading) -> Option<Self> {
        let text = common::plates::normalize(&reading.text);
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text,
            confidence: reading.confidence,
            source: reading.source,
        })
    }
}

/// How the per-box readings are turned into a result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Every box with readable text contributes its joined text (recall)
    #[default]
    Concatenate,
    /// Single highest-confidence plate-shaped candidate (precision)
    BestMatch,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::Concatenate => "concatenate",
            SelectionPolicy::BestMatch => "best_match",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "concatenate" | "concat" => Ok(SelectionPolicy::Concatenate),
            "best_match" | "best" => Ok(SelectionPolicy::BestMatch),
            _ => Err(format!("unknown selection policy '{s}'")),
        }
    }
}

/// Best-match outcome. `plate: None` means no plate-shaped text was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMatch {
    pub plate: Option<String>,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: Option<PlateBox>,
}

impl BestMatch {
    pub fn none() -> Self {
        Self {
            plate: None,
            confidence: 0.0,
            bbox: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.plate.is_some()
    }
}

impl From<Candidate> for BestMatch {
    fn from(c: Candidate) -> Self {
        Self {
            plate: Some(c.text),
            confidence: c.confidence,
            bbox: Some(c.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recognition {
    Plates { plates: Vec<String> },
    Best(BestMatch),
}

impl Recognition {
    /// Result for an image in which nothing was detected
    pub fn empty(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::Concatenate => Recognition::Plates { plates: Vec::new() },
            SelectionPolicy::BestMatch => Recognition::Best(BestMatch::none()),
        }
    }

    /// Number of plate strings in the result
    pub fn plate_count(&self) -> usize {
        match self {
            Recognition::Plates { plates } => plates.len(),
            Recognition::Best(best) => usize::from(best.is_found()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    Read,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Read => "read",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognitionError {
    /// Bytes could not be decoded, or the image has no pixels
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("{stage} stage timed out after {after_ms} ms")]
    Timeout { stage: Stage, after_ms: u64 },
}

impl RecognitionError {
    pub fn model(err: impl fmt::Display) -> Self {
        Self::Model(err.to_string())
    }
}
