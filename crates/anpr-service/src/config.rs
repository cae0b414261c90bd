use anyhow::{Context, Result};
use std::{env, str::FromStr, time::Duration};

use crate::recognition::{
    detector::DetectorConfig,
    onnx::{ExecutionProvider, RuntimeConfig},
    reader::ReaderConfig,
    PipelineConfig, PlateShape,
};

#[derive(Debug, Clone)]
pub struct AnprConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Instance name used in logs and health responses
    pub node_id: String,

    pub detector: DetectorConfig,
    pub reader: ReaderConfig,

    /// Regex a best-match candidate must match from its first character
    pub plate_pattern: String,

    /// Joins the fragments read from one box under the concatenate policy
    pub plate_separator: String,

    pub pipeline: PipelineConfig,

    pub max_upload_bytes: usize,
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
        _ => Ok(None),
    }
}

impl AnprConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("ANPR_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let node_id = env::var("NODE_ID").unwrap_or_else(|_| {
            format!(
                "anpr-service-{}",
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
            )
        });

        let runtime = RuntimeConfig {
            execution_provider: parse_var::<ExecutionProvider>("ANPR_EXECUTION_PROVIDER")?
                .unwrap_or_default(),
            device_id: parse_var("ANPR_DEVICE_ID")?.unwrap_or(0),
            ..RuntimeConfig::default()
        };

        let mut detector = DetectorConfig {
            runtime: runtime.clone(),
            ..DetectorConfig::default()
        };
        if let Ok(path) = env::var("ANPR_DETECTOR_MODEL") {
            detector.model_path = path;
        }
        if let Some(threshold) = parse_var::<f32>("ANPR_DETECTION_CONFIDENCE")? {
            anyhow::ensure!(
                (0.0..=1.0).contains(&threshold),
                "ANPR_DETECTION_CONFIDENCE must be within 0.0..=1.0"
            );
            detector.confidence_threshold = threshold;
        }

        let mut reader = ReaderConfig {
            runtime,
            ..ReaderConfig::default()
        };
        if let Ok(path) = env::var("ANPR_OCR_MODEL") {
            reader.model_path = path;
        }
        if let Ok(vocab) = env::var("ANPR_OCR_VOCAB") {
            reader.char_vocab = vocab;
        }

        let plate_pattern = env::var("ANPR_PLATE_PATTERN")
            .unwrap_or_else(|_| PlateShape::DEFAULT_PATTERN.to_string());
        PlateShape::new(&plate_pattern).context("invalid ANPR_PLATE_PATTERN")?;

        let plate_separator = env::var("ANPR_PLATE_SEPARATOR").unwrap_or_default();

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            detect_timeout: parse_var::<u64>("ANPR_DETECT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.detect_timeout),
            read_timeout: parse_var::<u64>("ANPR_READ_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
        };

        let max_upload_bytes = parse_var("ANPR_MAX_UPLOAD_BYTES")?.unwrap_or(10 * 1024 * 1024);

        Ok(Self {
            bind_addr,
            node_id,
            detector,
            reader,
            plate_pattern,
            plate_separator,
            pipeline,
            max_upload_bytes,
        })
    }
}
