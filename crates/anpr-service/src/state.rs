use std::{sync::Arc, time::Instant};
use telemetry::metrics::{ANPR_MODELS_LOADED, ANPR_RECOGNITIONS, ANPR_RECOGNITION_LATENCY};
use tracing::{info, warn};

use crate::{
    error::{ApiError, MODELS_NOT_LOADED},
    recognition::{PlatePipeline, Recognition, SelectionPolicy},
};

/// Shared handler state. `pipeline` is `None` when the models failed to load;
/// the service still starts and answers recognition requests with 500.
#[derive(Clone)]
pub struct AnprState {
    node_id: Arc<str>,
    pipeline: Option<Arc<PlatePipeline>>,
}

impl AnprState {
    pub fn new(node_id: impl Into<String>, pipeline: PlatePipeline) -> Self {
        ANPR_MODELS_LOADED.set(1);
        Self {
            node_id: Arc::from(node_id.into()),
            pipeline: Some(Arc::new(pipeline)),
        }
    }

    pub fn without_models(node_id: impl Into<String>) -> Self {
        ANPR_MODELS_LOADED.set(0);
        Self {
            node_id: Arc::from(node_id.into()),
            pipeline: None,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn models_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&PlatePipeline> {
        self.pipeline.as_deref()
    }

    /// Run one upload through the pipeline, recording metrics
    pub async fn recognize(&self, bytes: &[u8], policy: SelectionPolicy) -> Result<Recognition, ApiError> {
        let Some(pipeline) = self.pipeline() else {
            warn!("recognition requested but models are not loaded");
            ANPR_RECOGNITIONS
                .with_label_values(&[policy.as_str(), "unavailable"])
                .inc();
            return Err(ApiError::internal(MODELS_NOT_LOADED));
        };

        let started = Instant::now();
        let result = pipeline.recognize(bytes, policy).await;
        ANPR_RECOGNITION_LATENCY
            .with_label_values(&[policy.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(recognition) => {
                ANPR_RECOGNITIONS
                    .with_label_values(&[policy.as_str(), "success"])
                    .inc();
                info!(
                    policy = %policy,
                    plates = recognition.plate_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "recognition finished"
                );
                Ok(recognition)
            }
            Err(e) => {
                ANPR_RECOGNITIONS
                    .with_label_values(&[policy.as_str(), "error"])
                    .inc();
                warn!(policy = %policy, error = %e, "recognition failed");
                Err(e.into())
            }
        }
    }
}
