use sg_hiwater::SUBSCRIPTION_FILE_NAME;

use std::{
	collections::BTreeSet,
	path::{Path, PathBuf},
};

use thiserror::Error;

/// Suffix the mail client gives to the directory mirroring a subscribed folder.
pub const MIRROR_DIRECTORY_SUFFIX: &str = ".IMAP";

#[derive(Error, Debug)]
pub enum PolicyError {
	#[error("no mailbox directory configured")]
	MissingMailboxDirectory,
	#[error("mailbox directory doesn't exist or isn't a directory: <path='{}'>", .0.display())]
	MailboxDirectoryNotFound(Box<Path>),
	#[error("no folders to unsubscribe from configured")]
	NoForbiddenFolders,
	#[error("folder name would place its mirror directory outside the mailbox: '{0}'")]
	InvalidFolderName(String),
}

/// Which mailbox to guard and which folders must stay unsubscribed.
///
/// Folder names are matched exactly as configured, surrounding whitespace
/// included. Blank names are ignored, names holding a path separator or made
/// of dots only are rejected.
///
/// Immutable once built; [`GuardPolicy::new`] is the only way to get one, so
/// holding a policy means the startup checks passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
	mailbox_directory: PathBuf,
	forbidden_folders: BTreeSet<String>,
}

impl GuardPolicy {
	pub fn new(
		mailbox_directory: impl Into<PathBuf>,
		forbidden_folders: impl IntoIterator<Item = impl AsRef<str>>,
	) -> Result<Self, PolicyError> {
		let mailbox_directory = mailbox_directory.into();

		if mailbox_directory.as_os_str().is_empty()
			|| mailbox_directory.to_string_lossy().trim().is_empty()
		{
			return Err(PolicyError::MissingMailboxDirectory);
		}

		let mut names = BTreeSet::new();
		for name in forbidden_folders {
			let name = name.as_ref();
			if name.trim().is_empty() {
				continue;
			}
			if !is_plain_folder_name(name) {
				return Err(PolicyError::InvalidFolderName(name.to_string()));
			}
			names.insert(name.to_string());
		}

		if names.is_empty() {
			return Err(PolicyError::NoForbiddenFolders);
		}

		if !mailbox_directory.is_dir() {
			return Err(PolicyError::MailboxDirectoryNotFound(
				mailbox_directory.into_boxed_path(),
			));
		}

		Ok(Self {
			mailbox_directory,
			forbidden_folders: names,
		})
	}

	pub fn mailbox_directory(&self) -> &Path {
		&self.mailbox_directory
	}

	pub fn forbidden_folders(&self) -> impl Iterator<Item = &str> {
		self.forbidden_folders.iter().map(String::as_str)
	}

	pub fn subscription_file_path(&self) -> PathBuf {
		self.mailbox_directory.join(SUBSCRIPTION_FILE_NAME)
	}

	pub fn mirror_directory_path(&self, folder: &str) -> PathBuf {
		self.mailbox_directory
			.join(format!("{folder}{MIRROR_DIRECTORY_SUFFIX}"))
	}
}

/// A name that stays a single entry once joined onto the mailbox directory.
fn is_plain_folder_name(name: &str) -> bool {
	!name.contains(['/', '\\']) && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
	use super::*;

	use tempfile::tempdir;

	#[test]
	fn builds_paths_inside_mailbox() {
		let dir = tempdir().unwrap();
		let policy = GuardPolicy::new(dir.path(), ["Spam"]).unwrap();

		assert_eq!(
			policy.subscription_file_path(),
			dir.path().join("HIWATER.MRK")
		);
		assert_eq!(
			policy.mirror_directory_path("Spam"),
			dir.path().join("Spam.IMAP")
		);
	}

	#[test]
	fn folder_names_are_kept_exactly_and_deduplicated() {
		let dir = tempdir().unwrap();
		let policy = GuardPolicy::new(dir.path(), ["Spam ", "Trash", "Trash", "  ", "[Junk]"]).unwrap();

		assert_eq!(
			policy.forbidden_folders().collect::<Vec<_>>(),
			["Spam ", "Trash", "[Junk]"]
		);
		assert_eq!(
			policy.mirror_directory_path("[Junk]"),
			dir.path().join("[Junk].IMAP")
		);
	}

	#[test]
	fn folder_names_escaping_the_mailbox_are_rejected() {
		let dir = tempdir().unwrap();

		for name in ["Archive/2019", "/x", "..", ".", "..\\x", "[Gmail]/Spam"] {
			assert!(
				matches!(
					GuardPolicy::new(dir.path(), ["Spam", name]),
					Err(PolicyError::InvalidFolderName(ref rejected)) if rejected == name
				),
				"{name:?}"
			);
		}
	}

	#[test]
	fn empty_folder_list_is_rejected() {
		let dir = tempdir().unwrap();

		assert!(matches!(
			GuardPolicy::new(dir.path(), Vec::<String>::new()),
			Err(PolicyError::NoForbiddenFolders)
		));
		assert!(matches!(
			GuardPolicy::new(dir.path(), ["", " "]),
			Err(PolicyError::NoForbiddenFolders)
		));
	}

	#[test]
	fn blank_mailbox_directory_is_rejected() {
		assert!(matches!(
			GuardPolicy::new("", ["Spam"]),
			Err(PolicyError::MissingMailboxDirectory)
		));
		assert!(matches!(
			GuardPolicy::new("   ", ["Spam"]),
			Err(PolicyError::MissingMailboxDirectory)
		));
	}

	#[test]
	fn nonexistent_mailbox_directory_is_rejected() {
		let dir = tempdir().unwrap();

		assert!(matches!(
			GuardPolicy::new(dir.path().join("missing"), ["Spam"]),
			Err(PolicyError::MailboxDirectoryNotFound(_))
		));
	}
}
