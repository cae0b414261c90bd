pub mod api;
pub mod config;
pub mod error;
pub mod recognition;
pub mod state;

pub use config::AnprConfig;
pub use error::ApiError;
pub use state::AnprState;

use anyhow::Result;
use recognition::{
    CandidateSelector, OnnxPlateDetector, OnnxTextReader, PlatePipeline, PlateShape,
};
use std::sync::Arc;

/// Load both ONNX models and assemble the pipeline described by `config`
pub fn build_onnx_pipeline(config: &AnprConfig) -> Result<PlatePipeline> {
    let detector = OnnxPlateDetector::load(config.detector.clone())?;
    let reader = OnnxTextReader::load(config.reader.clone())?;
    let selector = CandidateSelector::new(
        PlateShape::new(&config.plate_pattern)?,
        config.plate_separator.clone(),
    );

    Ok(PlatePipeline::new(
        Arc::new(detector),
        Arc::new(reader),
        selector,
        config.pipeline,
    ))
}
