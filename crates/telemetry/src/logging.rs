use serde::{Deserialize, Serialize};
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line, for log shippers
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }

    /// Read `LOG_FORMAT`, falling back to pretty output
    pub fn from_env() -> Self {
        Self::parse(&env::var("LOG_FORMAT").unwrap_or_default())
    }
}

/// Where console logs go. Command-line tools that print results on stdout
/// log to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    pub service_name: String,
    pub environment: String,
    /// When set, a daily-rolling JSON copy of the log is written here
    pub log_dir: Option<String>,
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            format: LogFormat::from_env(),
            output: LogOutput::default(),
            service_name: service_name.into(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_dir: env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<String>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    fn file_prefix(&self) -> String {
        format!("{}.log", self.service_name)
    }
}

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    ["hyper=warn", "tokio=warn", "sqlx=warn", "ort=warn"]
        .into_iter()
        .filter_map(|d| d.parse().ok())
        .fold(filter, |f, d| f.add_directive(d))
}

fn console_layer<W>(format: LogFormat, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_target(true)
            .with_line_number(true)
            .boxed(),
    }
}

/// Initialize structured logging.
///
/// The returned guard flushes the file writer on drop and must be held for the
/// lifetime of the process when file logging is enabled.
pub fn init_structured_logging(config: LogConfig) -> Option<WorkerGuard> {
    let console = match config.output {
        LogOutput::Stdout => console_layer(config.format, std::io::stdout),
        LogOutput::Stderr => console_layer(config.format, std::io::stderr),
    };
    let mut layers = vec![console];

    let guard = config.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, config.file_prefix());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_writer(writer).boxed());
        guard
    });

    let result = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter())
        .try_init();

    if result.is_ok() {
        tracing::info!(
            service.name = %config.service_name,
            environment = %config.environment,
            format = ?config.format,
            file_logging = config.log_dir.is_some(),
            "structured logging initialized"
        );
    }

    guard
}

/// Initialize logging for a named service using environment defaults
pub fn init_with_service(service_name: impl Into<String>) -> Option<WorkerGuard> {
    init_structured_logging(LogConfig::new(service_name))
}
