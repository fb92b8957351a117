use sg_core::SubscriptionGuard;

use std::{path::PathBuf, process};

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod logging;

#[derive(Parser, Debug)]
#[command(
	name = "subscription-guard",
	about = "Keeps forbidden mail folders unsubscribed and unmirrored"
)]
struct Args {
	/// Run in the foreground with colored output instead of as a service
	#[arg(long)]
	console: bool,

	/// Path to the settings file, defaults to `<executable name>.json` next to the executable
	#[arg(long, env = "SUBSCRIPTION_GUARD_CONFIG")]
	config: Option<PathBuf>,

	/// Also write daily rotated log files to this directory
	#[arg(long)]
	log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	logging::init(args.console, args.log_dir.as_deref())?;

	let policy = match config::load_policy(args.config.as_deref()) {
		Ok(policy) => policy,
		Err(e) => {
			error!(%e, "Unable to load settings;");
			println!(
				"{}\n{e}",
				config::missing_configuration_message(args.config.as_deref())
			);
			process::exit(1);
		}
	};

	let mut guard = SubscriptionGuard::new(policy).context("Failed to set up mailbox watcher")?;

	guard
		.start_guarding()
		.await
		.context("Failed to start guarding mailbox")?;

	if args.console {
		info!("Guarding mailbox, press Ctrl+C to exit");
	} else {
		info!("Subscription guard service started");
	}

	wait_for_shutdown().await;

	if let Err(e) = guard.stop_guarding() {
		warn!(%e, "Failed to stop guarding mailbox;");
	}
	guard.dispose().await;

	info!("Subscription guard stopped");

	Ok(())
}

async fn wait_for_shutdown() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(%e, "Failed to listen for Ctrl+C;");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut terminate) => {
				terminate.recv().await;
			}
			Err(e) => {
				error!(%e, "Failed to install SIGTERM handler;");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
		() = terminate => info!("Received SIGTERM, shutting down gracefully..."),
	}
}
