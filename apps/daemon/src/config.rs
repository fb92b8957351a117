use sg_core::{GuardPolicy, PolicyError};

use std::{
	env, fs, io,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const FALLBACK_NAME: &str = "subscription-guard";

/// Settings file contents.
///
/// Folder names are compared with subscription keys exactly, whitespace
/// included; blank entries are skipped.
///
/// ```json
/// {
///   "mailbox_directory": "C:\\Users\\me\\AppData\\Roaming\\Mail\\Accounts\\me",
///   "unsubscribe_from_folders": ["Spam", "Junk"]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardSettings {
	#[serde(default)]
	pub mailbox_directory: Option<PathBuf>,
	#[serde(default)]
	pub unsubscribe_from_folders: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("unable to locate the running executable: {0}")]
	CurrentExe(#[source] io::Error),
	#[error("unable to read settings file: <path='{}'>; {source}", .path.display())]
	Read {
		path: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error("unable to parse settings file: <path='{}'>; {source}", .path.display())]
	Parse {
		path: Box<Path>,
		#[source]
		source: serde_json::Error,
	},
	#[error(transparent)]
	Policy(#[from] PolicyError),
}

impl GuardSettings {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		let data = fs::read(path).map_err(|source| ConfigError::Read {
			path: path.into(),
			source,
		})?;

		let settings = serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
			path: path.into(),
			source,
		})?;

		debug!(path = %path.display(), "Loaded settings");

		Ok(settings)
	}

	pub fn into_policy(self) -> Result<GuardPolicy, PolicyError> {
		let mailbox_directory = self
			.mailbox_directory
			.filter(|dir| !dir.as_os_str().is_empty())
			.ok_or(PolicyError::MissingMailboxDirectory)?;

		GuardPolicy::new(mailbox_directory, self.unsubscribe_from_folders)
	}
}

/// `<exe dir>/<exe name>.json`
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
	let exe = env::current_exe().map_err(ConfigError::CurrentExe)?;

	Ok(exe.with_file_name(settings_file_name(&exe)))
}

fn settings_file_name(exe: &Path) -> String {
	let stem = exe
		.file_stem()
		.and_then(|stem| stem.to_str())
		.unwrap_or(FALLBACK_NAME);

	format!("{stem}.json")
}

/// Loads the settings at `path`, or next to the executable, and turns them
/// into a policy.
pub fn load_policy(path: Option<&Path>) -> Result<GuardPolicy, ConfigError> {
	let path = match path {
		Some(path) => path.to_path_buf(),
		None => default_settings_path()?,
	};

	Ok(GuardSettings::load(path)?.into_policy()?)
}

/// Message shown to the operator when the guard can't be configured.
pub fn missing_configuration_message(explicit_path: Option<&Path>) -> String {
	match explicit_path {
		Some(path) => format!("Configuration missing, ensure {} exists.", path.display()),
		None => {
			let name = env::current_exe()
				.map(|exe| settings_file_name(&exe))
				.unwrap_or_else(|_| format!("{FALLBACK_NAME}.json"));

			format!(
				"Configuration missing, ensure {name} exists in the same directory as this executable."
			)
		}
	}
}
