use std::net::TcpListener;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn run_promptcast(workdir: &Path, args: &[&str]) -> (bool, String, String) {
	let output = Command::new(env!("CARGO_BIN_EXE_promptcast"))
		.current_dir(workdir)
		.env_remove("PROMPTCAST_PROVIDERS")
		.env_remove("RUST_LOG")
		.args(args)
		.output()
		.expect("failed to execute promptcast");

	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	(output.status.success(), stdout, stderr)
}

fn write_providers(dir: &Path, json: &str) -> String {
	let path = dir.join("providers.json");
	std::fs::write(&path, json).unwrap();
	path.display().to_string()
}

/// A local port with nothing listening on it.
fn closed_port() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	drop(listener);
	port.to_string()
}

#[test]
fn providers_lists_file_entries_as_json() {
	let tmp = TempDir::new().unwrap();
	let file = write_providers(
		tmp.path(),
		r#"[
			{"id": "chat", "name": "Chat", "url": "https://chat.test", "icon": "💬"},
			{"id": "mirror", "name": "Mirror", "url": "https://mirror.test", "enabled": false}
		]"#,
	);

	let (success, stdout, stderr) = run_promptcast(tmp.path(), &["-f", "json", "providers", "--providers", &file]);

	assert!(success, "providers failed: {stderr}");
	let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
	assert_eq!(json["ok"], true);
	assert_eq!(json["command"], "providers");
	assert_eq!(json["data"][0]["id"], "chat");
	assert_eq!(json["data"][0]["icon"], "💬");
	assert_eq!(json["data"][1]["enabled"], false);
}

#[test]
fn providers_text_marks_enabled_entries() {
	let tmp = TempDir::new().unwrap();
	let file = write_providers(tmp.path(), r#"[{"id": "chat", "name": "Chat", "url": "https://chat.test"}]"#);

	let (success, stdout, stderr) = run_promptcast(tmp.path(), &["providers", "--providers", &file]);

	assert!(success, "providers failed: {stderr}");
	assert!(stdout.contains("chat"), "unexpected output: {stdout}");
	assert!(stdout.contains("1 providers"), "unexpected output: {stdout}");
}

#[test]
fn duplicate_provider_ids_fail_with_config_error() {
	let tmp = TempDir::new().unwrap();
	let file = write_providers(
		tmp.path(),
		r#"[
			{"id": "chat", "name": "Chat", "url": "https://a.test"},
			{"id": "chat", "name": "Chat again", "url": "https://b.test"}
		]"#,
	);

	let (success, stdout, _) = run_promptcast(tmp.path(), &["-f", "json", "providers", "--providers", &file]);

	assert!(!success);
	let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn send_without_relay_reports_relay_unavailable() {
	let tmp = TempDir::new().unwrap();
	let port = closed_port();

	let (success, stdout, _) = run_promptcast(tmp.path(), &["-f", "json", "send", "--port", &port, "hello"]);

	assert!(!success);
	let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
	assert_eq!(json["error"]["code"], "RELAY_UNAVAILABLE");
}

#[test]
fn send_blank_prompt_is_invalid_input() {
	let tmp = TempDir::new().unwrap();

	let (success, _, stderr) = run_promptcast(tmp.path(), &["send", "--port", &closed_port(), "   "]);

	assert!(!success);
	assert!(stderr.contains("INVALID_INPUT"), "unexpected stderr: {stderr}");
}
