//! Offline recognition of a single image file.
//!
//! Uses the same environment configuration as the service; model paths can be
//! overridden on the command line. Prints the JSON result to stdout; logs go
//! to stderr so the output can be piped.

use anpr_service::{build_onnx_pipeline, recognition::SelectionPolicy, AnprConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use telemetry::{LogConfig, LogOutput};

#[derive(Parser, Debug)]
#[command(name = "recognize")]
#[command(about = "Recognize licence plates in an image file", long_about = None)]
struct Args {
    /// Image to read
    image: PathBuf,

    /// concatenate or best_match
    #[arg(long, default_value = "concatenate")]
    policy: SelectionPolicy,

    #[arg(long, env = "ANPR_DETECTOR_MODEL")]
    detector_model: Option<String>,

    #[arg(long, env = "ANPR_OCR_MODEL")]
    ocr_model: Option<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_structured_logging(log_config());
    let args = Args::parse();

    let mut config = AnprConfig::from_env()?;
    if let Some(path) = args.detector_model {
        config.detector.model_path = path;
    }
    if let Some(path) = args.ocr_model {
        config.reader.model_path = path;
    }

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("failed to read {}", args.image.display()))?;

    let pipeline = tokio::task::spawn_blocking(move || build_onnx_pipeline(&config)).await??;
    let recognition = pipeline.recognize(&bytes, args.policy).await?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&recognition)?
    } else {
        serde_json::to_string(&recognition)?
    };
    println!("{output}");

    Ok(())
}

fn log_config() -> LogConfig {
    LogConfig::new("anpr-recognize").with_output(LogOutput::Stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_stay_off_stdout() {
        assert_eq!(log_config().output, LogOutput::Stderr);
    }

    #[test]
    fn test_parses_policy_flag() {
        let args = Args::try_parse_from(["recognize", "car.jpg", "--policy", "best_match", "--pretty"]).unwrap();
        assert_eq!(args.policy, SelectionPolicy::BestMatch);
        assert!(args.pretty);
        assert_eq!(args.image, PathBuf::from("car.jpg"));
    }
}
