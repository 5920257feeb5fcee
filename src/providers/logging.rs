use chrono::{Local, Utc};
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::Level;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

use crate::config::LoggerConfig;
use crate::utils::error::{AppError, Result};

pub struct StructuredLogger;

static LOCAL_TIME: OnceLock<bool> = OnceLock::new();

impl StructuredLogger {
    /// Installs the global JSON subscriber.
    ///
    /// Everything goes to stdout; with a logger config, warnings and errors
    /// are also appended to a daily-rolling `<file_name>.<date>.error.log`.
    pub fn init(level: &str, logger_config: Option<LoggerConfig>) -> Result<()> {
        let filter = match level.to_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "info" => "info",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

        let _ = LOCAL_TIME.set(logger_config.as_ref().map(|c| c.local_time).unwrap_or(false));

        let installed = if let Some(config) = logger_config {
            std::fs::create_dir_all(&config.dir)?;

            let file_appender = Builder::new()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.file_name)
                .filename_suffix("error.log")
                .max_log_files(config.max_backups.max(1))
                .build(&config.dir)?;
            let alert_writer = file_appender.with_max_level(Level::WARN);

            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stdout.and(alert_writer))
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .try_init()
        };

        installed.map_err(|e| AppError::Generic(anyhow::anyhow!("{}", e)))
    }

    pub fn log_error(error: &str, request_id: Option<&str>) {
        let entry = Self::entry("error", error, request_id, None);
        tracing::error!(target: "tdx_feedback", "{}", entry);
    }

    pub fn log_info(message: &str, request_id: Option<&str>, additional_data: Option<Value>) {
        let entry = Self::entry("info", message, request_id, additional_data);
        tracing::info!(target: "tdx_feedback", "{}", entry);
    }

    pub fn log_warning(message: &str, request_id: Option<&str>, additional_data: Option<Value>) {
        let entry = Self::entry("warning", message, request_id, additional_data);
        tracing::warn!(target: "tdx_feedback", "{}", entry);
    }

    fn entry(kind: &str, message: &str, request_id: Option<&str>, additional_data: Option<Value>) -> Value {
        let timestamp = if LOCAL_TIME.get().copied().unwrap_or(false) {
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        } else {
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        };

        let mut body = serde_json::Map::new();
        body.insert(kind.to_string(), Value::String(message.to_string()));

        let mut log_entry = json!({
            "message": body,
            "timestamp": timestamp,
            "requestId": request_id.unwrap_or("MAIN"),
        });

        if let (Value::Object(map), Some(Value::Object(data_map))) = (&mut log_entry, additional_data) {
            for (key, value) in data_map {
                map.insert(key, value);
            }
        }

        log_entry
    }
}
