use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{session::Session, value::Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::{
    onnx::{self, RuntimeConfig},
    PlateBox, Reading, RecognitionError,
};

pub const DEFAULT_CONCURRENT_READS: usize = 16;

/// Reads text from a cropped plate image.
#[async_trait]
pub trait TextReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// How many `read` calls may run at once. The pipeline queues the rest
    /// and only starts a box's read timeout once it is admitted.
    fn max_concurrent_reads(&self) -> usize {
        DEFAULT_CONCURRENT_READS
    }

    /// Zero or more readings for the crop, each tagged with `source`
    async fn read(&self, crop: DynamicImage, source: PlateBox) -> Result<Vec<Reading>, RecognitionError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub model_path: String,

    #[serde(default = "default_input_width")]
    pub input_width: u32,

    #[serde(default = "default_input_height")]
    pub input_height: u32,

    /// Output classes after the CTC blank at index 0
    #[serde(default = "default_char_vocab")]
    pub char_vocab: String,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_input_width() -> u32 {
    200
}

fn default_input_height() -> u32 {
    64
}

fn default_char_vocab() -> String {
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-".to_string()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            model_path: "models/plate_ocr.onnx".to_string(),
            input_width: default_input_width(),
            input_height: default_input_height(),
            char_vocab: default_char_vocab(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// CRNN text recognizer with greedy CTC decoding.
pub struct OnnxTextReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    config: ReaderConfig,
    vocab: Vec<char>,
    session: Mutex<Session>,
}

impl OnnxTextReader {
    pub fn load(config: ReaderConfig) -> Result<Self> {
        let (session, provider) = onnx::load_session(&config.model_path, &config.runtime)
            .context("Failed to load plate text reader")?;
        tracing::info!(
            model = %config.model_path,
            provider = %provider,
            vocab_size = config.char_vocab.chars().count(),
            "plate text reader ready"
        );
        Ok(Self {
            inner: Arc::new(ReaderInner {
                vocab: config.char_vocab.chars().collect(),
                config,
                session: Mutex::new(session),
            }),
        })
    }
}

impl ReaderInner {
    fn run(&self, crop: &DynamicImage) -> Result<(String, f32)> {
        let input = preprocess(crop, self.config.input_width, self.config.input_height);
        let input_tensor = Value::from_array(input)?;

        let output = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to lock OCR session: {}", e))?;
            let outputs = session.run(ort::inputs![input_tensor])?;
            let value = outputs
                .get("output")
                .or_else(|| outputs.get("output0"))
                .or_else(|| outputs.get("logits"))
                .context("No OCR output tensor found (tried: output, output0, logits)")?;
            onnx::to_array(value)?
        };

        ctc_greedy_decode(&output, &self.vocab)
    }
}

#[async_trait]
impl TextReader for OnnxTextReader {
    fn name(&self) -> &'static str {
        "onnx-crnn"
    }

    /// One session behind one lock
    fn max_concurrent_reads(&self) -> usize {
        1
    }

    async fn read(&self, crop: DynamicImage, source: PlateBox) -> Result<Vec<Reading>, RecognitionError> {
        let inner = self.inner.clone();
        let (text, confidence) = tokio::task::spawn_blocking(move || inner.run(&crop))
            .await
            .map_err(RecognitionError::model)?
            .map_err(|e| RecognitionError::Model(format!("{e:#}")))?;

        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Reading::new(text, confidence, source)])
    }
}

/// Grayscale NCHW input at the model's fixed size
fn preprocess(crop: &DynamicImage, width: u32, height: u32) -> Array<f32, IxDyn> {
    let resized = crop.resize_exact(width, height, image::imageops::FilterType::Triangle);
    let gray = resized.to_luma8();

    let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
    for (x, y, pixel) in gray.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
    }
    input
}

/// Greedy CTC over a `[1, T, C]` probability tensor. Blank is class 0, so
/// class `k` maps to `vocab[k - 1]`.
///
/// Confidence is the mean of the per-step maxima for emitted characters.
fn ctc_greedy_decode(output: &Array<f32, IxDyn>, vocab: &[char]) -> Result<(String, f32)> {
    let shape = output.shape();
    anyhow::ensure!(
        shape.len() == 3 && shape[2] > 0,
        "unexpected OCR output shape {:?}",
        shape
    );
    let (steps, classes) = (shape[1], shape[2]);

    let mut text = String::new();
    let mut probs = Vec::new();
    let mut prev = 0usize;

    for t in 0..steps {
        let mut best = 0usize;
        let mut best_prob = output[[0, t, 0]];
        for c in 1..classes {
            let p = output[[0, t, c]];
            if p > best_prob {
                best_prob = p;
                best = c;
            }
        }

        if best != 0 && best != prev {
            if let Some(ch) = vocab.get(best - 1) {
                text.push(*ch);
                probs.push(best_prob);
            }
        }
        prev = best;
    }

    let confidence = if probs.is_empty() {
        0.0
    } else {
        (probs.iter().sum::<f32>() / probs.len() as f32).clamp(0.0, 1.0)
    };

    Ok((text, confidence))
}
