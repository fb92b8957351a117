use std::{fs, io, path::Path};

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "sg_core=info,sg_daemon=info,sg_hiwater=info";

const LOG_FILE_NAME: &str = "subscription-guard.log";

/// Sets up stdout logging, plus a daily rotated file in `log_dir` when given.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Colors are only used when
/// running in the console.
pub fn init(console: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
	let file_layer = log_dir
		.map(|logs_dir| -> anyhow::Result<_> {
			fs::create_dir_all(logs_dir).with_context(|| {
				format!("Failed to create logs directory: <path='{}'>", logs_dir.display())
			})?;

			Ok(fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(false)
				.with_writer(RollingFileAppender::new(
					Rotation::DAILY,
					logs_dir,
					LOG_FILE_NAME,
				)))
		})
		.transpose()?;

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(console)
				.with_writer(io::stdout),
		)
		.with(file_layer)
		.try_init()
		.context("Failed to initialize tracing")
}
