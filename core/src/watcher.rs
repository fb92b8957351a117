//! Filesystem event source for a mailbox directory.
//!
//! Only the mailbox directory itself is watched, never its subtree. Raw
//! `notify` events are forwarded untouched into a channel; [`classify`] then
//! decides which of them are worth a reconciliation pass:
//! - writes to `HIWATER.MRK` (including it being created or renamed into place);
//! - `*.IMAP` directories being created or renamed into place.

use crate::policy::MIRROR_DIRECTORY_SUFFIX;

use sg_hiwater::SUBSCRIPTION_FILE_NAME;

use std::path::{Path, PathBuf};

use async_channel as chan;
use notify::{
	event::{AccessKind, AccessMode, CreateKind, MetadataKind, ModifyKind, RenameMode},
	Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tracing::{error, instrument, trace};

/// A filesystem change that calls for a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxChange {
	SubscriptionFileWritten(PathBuf),
	MirrorDirectoryAppeared(PathBuf),
}

/// Sorts a raw event into the changes we react to, `None` for everything else.
pub fn classify(event: &Event) -> Option<MailboxChange> {
	let path = target_path(event)?;
	let name = path.file_name()?.to_string_lossy();

	if name.eq_ignore_ascii_case(SUBSCRIPTION_FILE_NAME) && is_file_write(&event.kind) {
		return Some(MailboxChange::SubscriptionFileWritten(path.to_path_buf()));
	}

	if has_mirror_suffix(&name) && is_directory_appearance(&event.kind) {
		return Some(MailboxChange::MirrorDirectoryAppeared(path.to_path_buf()));
	}

	None
}

/// The path an event leaves behind: the destination for two-sided renames.
fn target_path(event: &Event) -> Option<&Path> {
	let path = match event.kind {
		EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last(),
		_ => event.paths.first(),
	};

	path.map(PathBuf::as_path)
}

fn has_mirror_suffix(name: &str) -> bool {
	let suffix_len = MIRROR_DIRECTORY_SUFFIX.len();

	name.len() > suffix_len
		&& name.is_char_boundary(name.len() - suffix_len)
		&& name[name.len() - suffix_len..].eq_ignore_ascii_case(MIRROR_DIRECTORY_SUFFIX)
}

fn is_file_write(kind: &EventKind) -> bool {
	matches!(
		kind,
		EventKind::Create(_)
			| EventKind::Modify(
				ModifyKind::Any
					| ModifyKind::Data(_)
					| ModifyKind::Metadata(MetadataKind::Any | MetadataKind::WriteTime)
					| ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)
			) | EventKind::Access(AccessKind::Close(AccessMode::Write))
	)
}

fn is_directory_appearance(kind: &EventKind) -> bool {
	matches!(
		kind,
		EventKind::Create(CreateKind::Folder | CreateKind::Any)
			| EventKind::Modify(ModifyKind::Name(
				RenameMode::To | RenameMode::Both | RenameMode::Any
			))
	)
}

/// Non-recursive `notify` watch over a mailbox directory.
///
/// Created idle; events only start flowing into the channel after
/// [`watch`](MailboxWatcher::watch).
#[derive(Debug)]
pub struct MailboxWatcher {
	mailbox_directory: PathBuf,
	watcher: RecommendedWatcher,
	watching: bool,
}

impl MailboxWatcher {
	pub fn new(
		mailbox_directory: impl Into<PathBuf>,
		events_tx: chan::Sender<notify::Result<Event>>,
	) -> Result<Self, notify::Error> {
		let mailbox_directory = mailbox_directory.into();

		let watcher = RecommendedWatcher::new(
			move |result| {
				if !events_tx.is_closed() {
					// The channel is unbounded, this never actually blocks
					if events_tx.send_blocking(result).is_err() {
						error!("Unable to send watcher event to mailbox guard;");
					}
				} else {
					error!("Tried to send file system events to a closed channel;");
				}
			},
			Config::default(),
		)?;

		Ok(Self {
			mailbox_directory,
			watcher,
			watching: false,
		})
	}

	pub fn is_watching(&self) -> bool {
		self.watching
	}

	#[instrument(skip(self), fields(mailbox = %self.mailbox_directory.display()))]
	pub fn watch(&mut self) -> Result<(), notify::Error> {
		self.watcher
			.watch(&self.mailbox_directory, RecursiveMode::NonRecursive)?;
		self.watching = true;

		trace!("Now watching mailbox");
		Ok(())
	}

	#[instrument(skip(self), fields(mailbox = %self.mailbox_directory.display()))]
	pub fn unwatch(&mut self) -> Result<(), notify::Error> {
		self.watcher.unwatch(&self.mailbox_directory)?;
		self.watching = false;

		trace!("Stopped watching mailbox");
		Ok(())
	}
}
