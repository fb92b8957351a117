//! Keeps a mail client's folder subscriptions in line with an administrator
//! policy.
//!
//! Some folders must never be subscribed and must not be mirrored on disk. The
//! [`SubscriptionGuard`] watches the mailbox directory and, after each burst of
//! relevant changes, runs an idempotent pass that removes those folders from
//! `HIWATER.MRK` and deletes their `<folder>.IMAP` mirror directories.

pub mod debouncer;
mod error;
pub mod guard;
pub mod policy;
pub mod reconciler;
pub mod watcher;

pub use debouncer::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use error::GuardError;
pub use guard::SubscriptionGuard;
pub use policy::{GuardPolicy, PolicyError, MIRROR_DIRECTORY_SUFFIX};
pub use reconciler::{
	delete_mirrors, reconcile, MirrorDeleteError, MirrorReport, PassReport, ReconcileError,
	Reconciler,
};
pub use watcher::{classify, MailboxChange, MailboxWatcher};
