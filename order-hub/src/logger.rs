//! Logging Infrastructure
//!
//! - Console output: pretty in development, JSON in production
//! - Optional daily rotating application logs (kept 14 days)
//! - Optional audit log (`target: "audit"`, never pruned) for order mutations

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, fmt, prelude::*};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Application log files kept on disk
const APP_LOG_RETENTION_DAYS: usize = 14;

/// Initialize the logging system
///
/// # Arguments
/// * `level` - default level (e.g. "info"), `RUST_LOG` takes precedence
/// * `json_format` - JSON console output (production)
/// * `log_dir` - optional directory for rolling file logs
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(json_format)];
    if let Some(dir) = log_dir {
        layers.extend(file_layers(Path::new(dir), json_format)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

fn console_layer(json_format: bool) -> BoxedLayer {
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    }
}

/// `<dir>/app/app.YYYY-MM-DD.log` + `<dir>/audit/audit.YYYY-MM-DD.log`
fn file_layers(log_dir: &Path, json_format: bool) -> anyhow::Result<Vec<BoxedLayer>> {
    let app_dir = log_dir.join("app");
    let audit_dir = log_dir.join("audit");
    fs::create_dir_all(&app_dir)?;
    fs::create_dir_all(&audit_dir)?;

    let app_log = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("app")
        .filename_suffix("log")
        .max_log_files(APP_LOG_RETENTION_DAYS)
        .build(&app_dir)?;
    let audit_log = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("audit")
        .filename_suffix("log")
        .build(&audit_dir)?;

    let not_audit = filter::filter_fn(|meta| meta.target() != "audit");
    let only_audit = filter::filter_fn(|meta| meta.target() == "audit");

    let layers = if json_format {
        vec![
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(not_audit)
                .boxed(),
            fmt::layer()
                .json()
                .with_writer(std::sync::Mutex::new(audit_log))
                .with_filter(only_audit)
                .boxed(),
        ]
    } else {
        vec![
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(not_audit)
                .boxed(),
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(audit_log))
                .with_filter(only_audit)
                .boxed(),
        ]
    };

    Ok(layers)
}

/// Audit log helper - order mutations that must stay traceable
///
/// ```ignore
/// audit_log!("order.create", order_id = %order.id, restaurant_id = %order.restaurant_id);
/// ```
#[macro_export]
macro_rules! audit_log {
    ($action:expr, $($arg:tt)*) => {
        tracing::info!(
            target: "audit",
            action = $action,
            $($arg)*
        );
    };
}
