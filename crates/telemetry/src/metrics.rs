use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== ANPR Service Metrics ====
    pub static ref ANPR_RECOGNITIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "anpr_recognitions_total",
                "Total number of recognition requests",
            ),
            &["policy", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANPR_RECOGNITION_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "anpr_recognition_latency_seconds",
                "End-to-end recognition latency per request",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["policy"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANPR_BOXES_DETECTED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "anpr_boxes_total",
                "Plate boxes returned by the detector, by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANPR_ADAPTER_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "anpr_adapter_latency_seconds",
                "Model adapter call latency",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["stage"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANPR_MODELS_LOADED: IntGauge = {
        let metric = IntGauge::new("anpr_models_loaded", "1 when detector and reader are loaded")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Auth Service Metrics ====
    pub static ref AUTH_LOGINS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("auth_logins_total", "Total number of login attempts"),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref AUTH_USER_OPERATIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "auth_user_operations_total",
                "Total number of user administration operations",
            ),
            &["operation", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Registry Service Metrics ====
    pub static ref REGISTRY_LOOKUPS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "registry_lookups_total",
                "Total number of vehicle lookups",
            ),
            &["by", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref REGISTRY_MUTATIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "registry_mutations_total",
                "Total number of vehicle registry mutations",
            ),
            &["operation", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anpr_metrics_accessible() {
        ANPR_MODELS_LOADED.set(1);
        assert_eq!(ANPR_MODELS_LOADED.get(), 1);

        let before = ANPR_RECOGNITIONS
            .with_label_values(&["best_match", "success"])
            .get();
        ANPR_RECOGNITIONS
            .with_label_values(&["best_match", "success"])
            .inc();
        assert_eq!(
            ANPR_RECOGNITIONS
                .with_label_values(&["best_match", "success"])
                .get(),
            before + 1
        );
    }

    #[test]
    fn test_registry_metrics_accessible() {
        REGISTRY_LOOKUPS
            .with_label_values(&["plate", "found"])
            .inc();
        assert!(
            REGISTRY_LOOKUPS
                .with_label_values(&["plate", "found"])
                .get()
                >= 1
        );
    }

    #[test]
    fn test_encode_metrics_succeeds() {
        AUTH_LOGINS.with_label_values(&["success"]).inc();
        let encoded = encode_metrics().expect("metrics should encode");
        assert!(encoded.contains("auth_logins_total"));
    }
}
