use crate::{
	debouncer::{Debouncer, DEFAULT_DEBOUNCE_WINDOW},
	error::GuardError,
	policy::GuardPolicy,
	reconciler::{PassReport, Reconciler},
	watcher::{classify, MailboxWatcher},
};

use std::{pin::pin, sync::Arc, time::Duration};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use notify::Event;
use tokio::{
	spawn,
	task::{spawn_blocking, JoinHandle},
};
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Keeps one mailbox in line with its [`GuardPolicy`].
///
/// Lifecycle: [`new`](Self::new) wires everything up without touching the
/// disk, [`start_guarding`](Self::start_guarding) runs a first pass and starts
/// watching, [`stop_guarding`](Self::stop_guarding) stops watching and
/// [`dispose`](Self::dispose) tears the event loop down.
///
/// Watcher events are consumed by a single task, so they are never handled
/// concurrently, and every relevant one goes through the [`Debouncer`].
#[derive(Debug)]
pub struct SubscriptionGuard {
	reconciler: Arc<Reconciler>,
	watcher: MailboxWatcher,
	handle: Option<JoinHandle<()>>,
	stop_tx: chan::Sender<()>,
}

impl SubscriptionGuard {
	/// Must be called from within a tokio runtime.
	pub fn new(policy: GuardPolicy) -> Result<Self, GuardError> {
		Self::with_debounce_window(policy, DEFAULT_DEBOUNCE_WINDOW)
	}

	#[instrument(
		name = "subscription_guard",
		skip(policy),
		fields(mailbox = %policy.mailbox_directory().display()),
	)]
	pub fn with_debounce_window(
		policy: GuardPolicy,
		debounce_window: Duration,
	) -> Result<Self, GuardError> {
		let reconciler = Arc::new(Reconciler::new(Arc::new(policy)));

		let (events_tx, events_rx) = chan::unbounded();
		let (stop_tx, stop_rx) = chan::bounded(1);

		let watcher = MailboxWatcher::new(reconciler.policy().mailbox_directory(), events_tx)?;

		let debouncer = Debouncer::new(debounce_window, {
			let reconciler = Arc::clone(&reconciler);
			move || {
				let reconciler = Arc::clone(&reconciler);
				async move {
					info!(
						path = %reconciler.policy().subscription_file_path().display(),
						"Change detected",
					);
					run_pass(reconciler).await;
				}
			}
		});

		let handle = spawn(handle_watch_events(events_rx, stop_rx, debouncer).in_current_span());

		Ok(Self {
			reconciler,
			watcher,
			handle: Some(handle),
			stop_tx,
		})
	}

	pub fn policy(&self) -> &GuardPolicy {
		self.reconciler.policy()
	}

	pub fn is_guarding(&self) -> bool {
		self.watcher.is_watching()
	}

	/// Corrects whatever drifted while we weren't running, then starts
	/// reacting to changes in the mailbox directory.
	///
	/// A failing first pass is logged and doesn't prevent watching: the next
	/// relevant change gets another chance.
	#[instrument(skip(self), fields(mailbox = %self.policy().mailbox_directory().display()))]
	pub async fn start_guarding(&mut self) -> Result<(), GuardError> {
		if self.is_guarding() {
			return Err(GuardError::AlreadyGuarding);
		}

		run_pass(Arc::clone(&self.reconciler)).await;

		self.watcher.watch()?;

		info!(
			path = %self.policy().subscription_file_path().display(),
			"Waiting for subscription changes",
		);

		Ok(())
	}

	/// Stops watching. A pass that is already running or scheduled still completes.
	#[instrument(skip(self), fields(mailbox = %self.policy().mailbox_directory().display()))]
	pub fn stop_guarding(&mut self) -> Result<(), GuardError> {
		if !self.is_guarding() {
			return Err(GuardError::NotGuarding);
		}

		self.watcher.unwatch()?;

		debug!("Stopped guarding mailbox");
		Ok(())
	}

	/// Releases the watch and waits for the event loop, including any pass
	/// it is running, to finish.
	pub async fn dispose(mut self) {
		if self.is_guarding() {
			if let Err(e) = self.watcher.unwatch() {
				warn!(?e, "Failed to unwatch mailbox while disposing;");
			}
		}

		if let Some(handle) = self.handle.take() {
			if self.stop_tx.send(()).await.is_err() {
				trace!("Mailbox event loop already gone");
			}

			if let Err(e) = handle.await {
				error!(?e, "Failed to join mailbox event loop;");
			}
		}
	}
}

impl Drop for SubscriptionGuard {
	fn drop(&mut self) {
		if self.handle.is_some() {
			// Best effort, `dispose` is the way to wait for the loop to finish
			let _ = self.stop_tx.try_send(());
		}
	}
}

async fn handle_watch_events(
	events_rx: chan::Receiver<notify::Result<Event>>,
	stop_rx: chan::Receiver<()>,
	debouncer: Debouncer,
) {
	enum StreamMessage {
		NewEvent(notify::Result<Event>),
		Stop,
	}

	let mut msg_stream = pin!((
		events_rx.map(StreamMessage::NewEvent),
		stop_rx.map(|()| StreamMessage::Stop),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::NewEvent(Ok(event)) => match classify(&event) {
				Some(change) => {
					debug!(?change, "Scheduling reconciliation pass;");
					debouncer.trigger();
				}
				None => trace!(?event, "Ignoring mailbox event;"),
			},

			StreamMessage::NewEvent(Err(e)) => error!(?e, "Watcher error;"),

			StreamMessage::Stop => {
				debug!("Stopping mailbox event loop");
				break;
			}
		}
	}

	debouncer.shutdown().await;
}

/// Runs one pass on the blocking pool and logs its outcome.
async fn run_pass(reconciler: Arc<Reconciler>) {
	match spawn_blocking(move || reconciler.fix_subscriptions()).await {
		Ok(Ok(PassReport {
			unsubscribed,
			deleted_mirrors,
			mirror_errors,
		})) => {
			debug!(
				?unsubscribed,
				deleted_mirrors = deleted_mirrors.len(),
				mirror_errors = mirror_errors.len(),
				"Reconciliation pass finished;",
			);
		}
		Ok(Err(e)) => error!(%e, "Reconciliation pass failed;"),
		Err(e) => error!(?e, "Reconciliation pass panicked;"),
	}
}
