use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn settings_without_folders_exit_with_diagnostic() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("subscription-guard.json");
	let settings = serde_json::json!({
		"mailbox_directory": dir.path(),
		"unsubscribe_from_folders": [],
	});
	fs::write(&path, settings.to_string()).unwrap();

	cargo_bin_cmd!("subscription-guard")
		.arg("--config")
		.arg(&path)
		.env_remove("SUBSCRIPTION_GUARD_CONFIG")
		.assert()
		.code(1)
		.stdout(contains("Configuration missing"))
		.stdout(contains("no folders to unsubscribe from configured"));
}

#[test]
fn missing_settings_file_exits_with_diagnostic() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("absent.json");

	cargo_bin_cmd!("subscription-guard")
		.arg("--config")
		.arg(&path)
		.env_remove("SUBSCRIPTION_GUARD_CONFIG")
		.assert()
		.code(1)
		.stdout(contains(format!(
			"Configuration missing, ensure {} exists.",
			path.display()
		)));
}
