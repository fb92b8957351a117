//! Codec for `HIWATER.MRK`, the INI-style file where the mail client keeps
//! its folder subscriptions.
//!
//! The file is shared with the mail client, so [`write`] only ever changes the
//! lines that were modified through [`SubscriptionDocument`]: everything else
//! (ordering, comments, `key=value` spacing, line endings) goes back to disk
//! byte for byte. The text is read and written with a fixed single-byte
//! encoding, see [`encoding`].

use std::{fs, path::Path};

use tracing::trace;

mod document;
pub mod encoding;
mod error;

pub use document::{MalformedLine, ParseError, Section, SubscriptionDocument};
pub use error::{ConfigReadError, ConfigWriteError};

/// Name of the subscription state file inside a mailbox directory.
pub const SUBSCRIPTION_FILE_NAME: &str = "HIWATER.MRK";

/// Section listing the currently subscribed folders.
pub const SUBSCRIBED_SECTION: &str = "IMAPSubscribed";

/// Loads and parses the subscription file at `path`.
pub fn read(path: impl AsRef<Path>) -> Result<SubscriptionDocument, ConfigReadError> {
	let path = path.as_ref();

	let bytes = fs::read(path).map_err(|source| ConfigReadError::Io {
		path: path.into(),
		source,
	})?;

	trace!(path = %path.display(), len = bytes.len(), "Read subscription file;");

	SubscriptionDocument::parse(&bytes).map_err(|source| ConfigReadError::Malformed {
		path: path.into(),
		source,
	})
}

/// Overwrites the file at `path` with the serialized document.
pub fn write(path: impl AsRef<Path>, doc: &SubscriptionDocument) -> Result<(), ConfigWriteError> {
	let path = path.as_ref();

	let bytes = doc.to_bytes().map_err(|source| ConfigWriteError::Unencodable {
		path: path.into(),
		source,
	})?;

	fs::write(path, &bytes).map_err(|source| ConfigWriteError::Io {
		path: path.into(),
		source,
	})?;

	trace!(path = %path.display(), len = bytes.len(), "Wrote subscription file;");

	Ok(())
}
