use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{session::Session, value::Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::{
    onnx::{self, ExecutionProvider, RuntimeConfig},
    PlateBox, RecognitionError,
};

/// Locates licence plates in a full image.
#[async_trait]
pub trait PlateDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Boxes in the detector's output order. Boxes may overhang the image;
    /// callers clip them.
    async fn detect(&self, image: Arc<DynamicImage>) -> Result<Vec<PlateBox>, RecognitionError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub model_path: String,

    /// Confidence threshold for plate detections (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// IoU threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    #[serde(default = "default_max_detections")]
    pub max_detections: usize,

    /// Square model input side in pixels
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_confidence() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_max_detections() -> usize {
    10
}

fn default_input_size() -> u32 {
    640
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/plate_detector.onnx".to_string(),
            confidence_threshold: default_confidence(),
            iou_threshold: default_iou_threshold(),
            max_detections: default_max_detections(),
            input_size: default_input_size(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// YOLOv8 single-class plate detector running on ONNX Runtime.
pub struct OnnxPlateDetector {
    inner: Arc<DetectorInner>,
}

struct DetectorInner {
    config: DetectorConfig,
    session: Mutex<Session>,
}

impl OnnxPlateDetector {
    pub fn load(config: DetectorConfig) -> Result<Self> {
        let (session, provider) = onnx::load_session(&config.model_path, &config.runtime)
            .context("Failed to load plate detector")?;
        tracing::info!(
            model = %config.model_path,
            provider = %provider,
            input_size = config.input_size,
            "plate detector ready"
        );
        Ok(Self {
            inner: Arc::new(DetectorInner {
                config,
                session: Mutex::new(session),
            }),
        })
    }

    pub fn provider(&self) -> ExecutionProvider {
        self.inner.config.runtime.execution_provider
    }
}

impl DetectorInner {
    fn run(&self, image: &DynamicImage) -> Result<Vec<PlateBox>> {
        let input = preprocess(image, self.config.input_size);
        let input_tensor = Value::from_array(input)?;

        let output = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to lock detector session: {}", e))?;
            let outputs = session.run(ort::inputs![input_tensor])?;
            let value = outputs
                .get("output0")
                .or_else(|| outputs.get("output"))
                .context("No detector output tensor found (tried: output0, output)")?;
            onnx::to_array(value)?
        };

        postprocess(&output, image.width(), image.height(), &self.config)
    }
}

#[async_trait]
impl PlateDetector for OnnxPlateDetector {
    fn name(&self) -> &'static str {
        "onnx-yolov8"
    }

    async fn detect(&self, image: Arc<DynamicImage>) -> Result<Vec<PlateBox>, RecognitionError> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.run(&image))
            .await
            .map_err(RecognitionError::model)?
            .map_err(|e| RecognitionError::Model(format!("{e:#}")))
    }
}

/// Resize to the square model input and lay out as normalized NCHW RGB
fn preprocess(image: &DynamicImage, size: u32) -> Array<f32, IxDyn> {
    let resized = image.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Decode a `[1, 5, N]` YOLOv8 head (cx, cy, w, h, score), rescale to the
/// original image, suppress overlaps and cap the count.
fn postprocess(
    output: &Array<f32, IxDyn>,
    original_width: u32,
    original_height: u32,
    config: &DetectorConfig,
) -> Result<Vec<PlateBox>> {
    let shape = output.shape();
    anyhow::ensure!(
        shape.len() == 3 && shape[1] >= 5,
        "unexpected detector output shape {:?}",
        shape
    );

    let scale_x = original_width as f32 / config.input_size as f32;
    let scale_y = original_height as f32 / config.input_size as f32;

    let mut scored = Vec::new();
    for i in 0..shape[2] {
        let score = output[[0, 4, i]];
        if score < config.confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let plate = PlateBox::new(
            ((cx - w / 2.0) * scale_x).floor() as i32,
            ((cy - h / 2.0) * scale_y).floor() as i32,
            ((cx + w / 2.0) * scale_x).ceil() as i32,
            ((cy + h / 2.0) * scale_y).ceil() as i32,
        );
        scored.push((plate, score));
    }

    Ok(nms(scored, config.iou_threshold)
        .into_iter()
        .take(config.max_detections)
        .map(|(plate, _)| plate)
        .collect())
}

/// Greedy non-maximum suppression; output is ordered by descending score
fn nms(mut boxes: Vec<(PlateBox, f32)>, iou_threshold: f32) -> Vec<(PlateBox, f32)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<(PlateBox, f32)> = Vec::new();
    for candidate in boxes {
        if keep
            .iter()
            .all(|(kept, _)| kept.iou(&candidate.0) < iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}
