use std::{future::Future, time::Duration};

use async_channel as chan;
use tokio::{spawn, task::JoinHandle, time::timeout};
use tracing::{error, trace, Instrument};

/// Quiet period required after the last trigger before the action runs.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Coalesces bursts of [`trigger`](Debouncer::trigger) calls into a single
/// run of an async action.
///
/// Every trigger restarts the window; the action runs once the window passes
/// without another trigger. The action is awaited on the debouncer's own task,
/// so two runs never overlap: triggers arriving while it runs open a new
/// window that starts after it finishes. Runs happen inside the span that was
/// current when the debouncer was created.
#[derive(Debug)]
pub struct Debouncer {
	trigger_tx: chan::Sender<()>,
	handle: Option<JoinHandle<()>>,
}

impl Debouncer {
	pub fn new<F, Fut>(window: Duration, action: F) -> Self
	where
		F: Fn() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let (trigger_tx, trigger_rx) = chan::unbounded();

		Self {
			trigger_tx,
			handle: Some(spawn(
				Self::run(window, action, trigger_rx).in_current_span(),
			)),
		}
	}

	/// (Re)schedules the action. Never blocks, callable from any thread.
	pub fn trigger(&self) {
		if self.trigger_tx.try_send(()).is_err() {
			error!("Tried to trigger a debouncer that was already shut down;");
		}
	}

	async fn run<F, Fut>(window: Duration, action: F, trigger_rx: chan::Receiver<()>)
	where
		F: Fn() -> Fut,
		Fut: Future<Output = ()>,
	{
		while trigger_rx.recv().await.is_ok() {
			loop {
				match timeout(window, trigger_rx.recv()).await {
					Ok(Ok(())) => continue,
					Ok(Err(_)) => {
						trace!("Debouncer closed with a pending run, dropping it");
						return;
					}
					Err(_) => break,
				}
			}

			let pass = action();
			pass.await;
		}

		trace!("Debouncer shutdown");
	}

	/// Stops accepting triggers and waits for a running action to finish.
	/// A run still waiting for its window is discarded.
	pub async fn shutdown(mut self) {
		self.trigger_tx.close();

		if let Some(handle) = self.handle.take() {
			if let Err(e) = handle.await {
				error!(?e, "Failed to join debouncer task;");
			}
		}
	}
}

impl Drop for Debouncer {
	fn drop(&mut self) {
		self.trigger_tx.close();
	}
}
