use std::{io, path::Path};

use thiserror::Error;

use crate::{document::ParseError, encoding::UnencodableChar};

#[derive(Error, Debug)]
pub enum ConfigReadError {
	#[error("unable to read subscription file: <path='{}'>; {source}", .path.display())]
	Io {
		path: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error("malformed subscription file: <path='{}'>; {source}", .path.display())]
	Malformed {
		path: Box<Path>,
		#[source]
		source: ParseError,
	},
}

impl ConfigReadError {
	/// The file simply isn't there (yet).
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
	}
}

#[derive(Error, Debug)]
pub enum ConfigWriteError {
	#[error("unable to write subscription file: <path='{}'>; {source}", .path.display())]
	Io {
		path: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error("subscription file content can't be encoded: <path='{}'>; {source}", .path.display())]
	Unencodable {
		path: Box<Path>,
		#[source]
		source: UnencodableChar,
	},
}
