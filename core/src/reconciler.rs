//! Brings the mailbox back in line with the [`GuardPolicy`].
//!
//! A pass has two steps, always in this order:
//! 1. remove every forbidden folder from the `IMAPSubscribed` section of
//!    `HIWATER.MRK`, writing the file back only if something was removed;
//! 2. delete the `<folder>.IMAP` mirror directory of every forbidden folder.
//!
//! Unsubscribing first means an interrupted pass never leaves the mail client
//! looking at a subscribed folder whose mirror is gone. Both steps are
//! idempotent, so re-running a partial pass is always safe.

use crate::policy::GuardPolicy;

use sg_hiwater::{ConfigReadError, ConfigWriteError, SubscriptionDocument, SUBSCRIBED_SECTION};

use std::{
	fs, io,
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, instrument, trace, warn};

#[derive(Error, Debug)]
pub enum ReconcileError {
	#[error(transparent)]
	Read(#[from] ConfigReadError),
	#[error(transparent)]
	Write(#[from] ConfigWriteError),
}

/// A mirror directory that exists but couldn't be removed.
#[derive(Error, Debug)]
#[error("unable to delete mirror directory: <path='{}'>; {source}", .path.display())]
pub struct MirrorDeleteError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
}

#[derive(Debug, Default)]
pub struct MirrorReport {
	pub deleted: Vec<PathBuf>,
	pub errors: Vec<MirrorDeleteError>,
}

/// Outcome of one [`Reconciler::fix_subscriptions`] pass.
#[derive(Debug, Default)]
pub struct PassReport {
	/// Folders whose subscription entry was removed.
	pub unsubscribed: Vec<String>,
	pub deleted_mirrors: Vec<PathBuf>,
	pub mirror_errors: Vec<MirrorDeleteError>,
}

impl PassReport {
	/// Whether the subscription file was rewritten.
	pub fn changed(&self) -> bool {
		!self.unsubscribed.is_empty()
	}
}

/// Removes the forbidden folders from the subscribed section of `doc`.
///
/// Returns the names that were actually removed; a document without the
/// section is left alone.
pub fn reconcile(doc: &mut SubscriptionDocument, policy: &GuardPolicy) -> Vec<String> {
	let Some(subscribed) = doc.section_mut(SUBSCRIBED_SECTION) else {
		trace!("No subscribed section in subscription file;");
		return Vec::new();
	};

	policy
		.forbidden_folders()
		.filter(|folder| subscribed.remove_key(folder))
		.inspect(|folder| info!(%folder, "Unsubscribing from folder"))
		.map(ToString::to_string)
		.collect()
}

/// Deletes the mirror directory of every forbidden folder.
///
/// Each folder is handled on its own: a failure is recorded and the next
/// folder is still processed. A mirror that is already gone counts as done.
pub fn delete_mirrors(policy: &GuardPolicy) -> MirrorReport {
	let mut report = MirrorReport::default();

	for folder in policy.forbidden_folders() {
		let path = policy.mirror_directory_path(folder);

		match fs::remove_dir_all(&path) {
			Ok(()) => {
				info!(path = %path.display(), "Deleted directory");
				report.deleted.push(path);
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				trace!(path = %path.display(), "Mirror directory already absent;");
			}
			Err(e) => {
				let e = MirrorDeleteError {
					path: path.into_boxed_path(),
					source: e,
				};
				warn!(%e, "Failed to delete mirror directory, skipping;");
				report.errors.push(e);
			}
		}
	}

	report
}

/// Runs reconciliation passes for one mailbox.
///
/// The read-modify-write of the subscription file happens under a lock, so
/// passes started from different places never interleave their edits.
#[derive(Debug)]
pub struct Reconciler {
	policy: Arc<GuardPolicy>,
	subscription_lock: Mutex<()>,
}

impl Reconciler {
	pub fn new(policy: Arc<GuardPolicy>) -> Self {
		Self {
			policy,
			subscription_lock: Mutex::new(()),
		}
	}

	pub fn policy(&self) -> &GuardPolicy {
		&self.policy
	}

	/// Unsubscribes from the forbidden folders, then deletes their mirrors.
	///
	/// When the subscription file can't be read or written the pass stops
	/// there and mirrors are left in place for the next pass.
	#[instrument(skip(self), fields(mailbox = %self.policy.mailbox_directory().display()))]
	pub fn fix_subscriptions(&self) -> Result<PassReport, ReconcileError> {
		let unsubscribed = self.unsubscribe_from_folders()?;

		let MirrorReport { deleted, errors } = delete_mirrors(&self.policy);

		Ok(PassReport {
			unsubscribed,
			deleted_mirrors: deleted,
			mirror_errors: errors,
		})
	}

	fn unsubscribe_from_folders(&self) -> Result<Vec<String>, ReconcileError> {
		let _guard = self.subscription_lock.lock();

		let path = self.policy.subscription_file_path();
		let mut doc = sg_hiwater::read(&path)?;

		let removed = reconcile(&mut doc, &self.policy);

		if !removed.is_empty() {
			sg_hiwater::write(&path, &doc)?;
			info!(path = %path.display(), "Saved");
		}

		Ok(removed)
	}
}
