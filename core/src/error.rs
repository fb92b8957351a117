use crate::policy::PolicyError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
	#[error("Tried to start guarding a mailbox that is already being guarded")]
	AlreadyGuarding,
	#[error("Tried to stop guarding a mailbox that isn't being guarded")]
	NotGuarding,

	#[error("Invalid guard policy: {0}")]
	Policy(#[from] PolicyError),
	#[error("Watcher error: (error: {0})")]
	Watcher(#[from] notify::Error),
}
