//! ONNX Runtime plumbing shared by the detector and the text reader.

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
        TensorRTExecutionProvider,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::DynValue,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
    TensorRt,
}

impl ExecutionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "CPU",
            ExecutionProvider::Cuda => "CUDA",
            ExecutionProvider::TensorRt => "TensorRT",
        }
    }

    /// Providers to try, most preferred first. Each step down drops the head.
    fn fallback_chain(self) -> &'static [ExecutionProvider] {
        match self {
            ExecutionProvider::TensorRt => &[
                ExecutionProvider::TensorRt,
                ExecutionProvider::Cuda,
                ExecutionProvider::Cpu,
            ],
            ExecutionProvider::Cuda => &[ExecutionProvider::Cuda, ExecutionProvider::Cpu],
            ExecutionProvider::Cpu => &[ExecutionProvider::Cpu],
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CPU" => Ok(ExecutionProvider::Cpu),
            "CUDA" | "GPU" => Ok(ExecutionProvider::Cuda),
            "TENSORRT" | "TRT" => Ok(ExecutionProvider::TensorRt),
            other => Err(format!("unknown execution provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub execution_provider: ExecutionProvider,

    /// GPU device ID (0, 1, 2, etc.)
    #[serde(default)]
    pub device_id: i32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::default(),
            device_id: 0,
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

fn dispatch_list(providers: &[ExecutionProvider], device_id: i32) -> Vec<ExecutionProviderDispatch> {
    providers
        .iter()
        .map(|p| match p {
            ExecutionProvider::TensorRt => TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            ExecutionProvider::Cuda => CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            ExecutionProvider::Cpu => CPUExecutionProvider::default().build(),
        })
        .collect()
}

fn build_session(model_path: &str, config: &RuntimeConfig, providers: &[ExecutionProvider]) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(config.intra_threads)
        .context("Failed to set intra threads")?
        .with_inter_threads(config.inter_threads)
        .context("Failed to set inter threads")?
        .with_execution_providers(dispatch_list(providers, config.device_id))
        .context("Failed to set execution providers")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {model_path}"))
}

/// Load a model, stepping down the provider chain until one succeeds.
/// Returns the session and the provider that was used.
pub fn load_session(model_path: &str, config: &RuntimeConfig) -> Result<(Session, ExecutionProvider)> {
    let chain = config.execution_provider.fallback_chain();
    let mut last_err = None;

    for (idx, provider) in chain.iter().enumerate() {
        tracing::info!(model = model_path, provider = %provider, "loading ONNX model");
        match build_session(model_path, config, &chain[idx..]) {
            Ok(session) => {
                tracing::info!(model = model_path, provider = %provider, "ONNX model loaded");
                return Ok((session, *provider));
            }
            Err(e) => {
                tracing::warn!(model = model_path, provider = %provider, error = %e, "provider failed, falling back");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no execution provider available")))
}

/// Copy an f32 output tensor into an owned array
pub fn to_array(value: &DynValue) -> Result<Array<f32, IxDyn>> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;

    let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d as usize).collect();
    Ok(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("cuda".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert_eq!("TensorRT".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::TensorRt);
        assert_eq!(" cpu ".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cpu);
        assert!("metal".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_fallback_chain_ends_on_cpu() {
        for provider in [ExecutionProvider::TensorRt, ExecutionProvider::Cuda, ExecutionProvider::Cpu] {
            let chain = provider.fallback_chain();
            assert_eq!(chain.first(), Some(&provider));
            assert_eq!(chain.last(), Some(&ExecutionProvider::Cpu));
        }
    }
}
