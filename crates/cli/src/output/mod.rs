//! Result envelope and printing for CLI commands.
//!
//! With `-f json` every command writes one envelope to stdout:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "send",
//!   "data": { "results": [ { "provider": "claude", "status": "sent" } ] },
//!   "timings": { "durationMs": 1234 }
//! }
//! ```
//!
//! Text output is meant for humans and carries no stability guarantees.


use std::fmt::Write as _;
use std::time::{Duration, Instant};

use promptcast_protocol::{DeliveryResult, DispatchOutcome, ProviderDescriptor};
use serde::{Deserialize, Serialize};

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope
	Json,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// The envelope printed by every command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,

	/// Command name (e.g., "send", "providers")
	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Provider configuration is missing or invalid
	ConfigError,
	/// The relay could not be reached or answered garbage
	RelayUnavailable,
	/// The relay rejected the request
	DispatchRejected,
	/// One or more providers did not receive the prompt
	DeliveryFailed,
	/// Invalid input provided
	InvalidInput,
	/// File I/O error
	IoError,
	/// Unknown/internal error
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::RelayUnavailable => "RELAY_UNAVAILABLE",
			ErrorCode::DispatchRejected => "DISPATCH_REJECTED",
			ErrorCode::DeliveryFailed => "DELIVERY_FAILED",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	/// Success requires data and no error.
	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Print a command result to stdout. Text output uses `render_text` for the data.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat, render_text: impl FnOnce(&T) -> String) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			if let Some(data) = result.data.as_ref() {
				print!("{}", render_text(data));
			}
			if let Some(error) = result.error.as_ref() {
				print_error_stderr(error);
			}
		}
	}
}

/// Print error to stderr (always, for human visibility)
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

/// One line per provider: marker, id, name, URL.
pub fn render_providers(providers: &[ProviderDescriptor]) -> String {
	let mut out = String::new();
	for provider in providers {
		let marker = if provider.enabled { "*" } else { " " };
		let icon = provider.icon.as_deref().unwrap_or(" ");
		let _ = writeln!(
			out,
			"{marker} {icon} {:<12} {:<12} {}",
			provider.id.as_str(),
			provider.display_name,
			provider.endpoint
		);
	}
	out
}

pub fn render_delivery(result: &DeliveryResult) -> String {
	if result.is_sent() {
		format!("✓ {} sent\n", result.provider_id)
	} else {
		let code = result.code.map(|c| format!(" [{}]", serde_code(c))).unwrap_or_default();
		let message = result.error.as_deref().unwrap_or("unknown error");
		format!("✗ {}{code}: {message}\n", result.provider_id)
	}
}

/// Results sorted by provider id, followed by a summary line.
pub fn render_outcome(outcome: &DispatchOutcome) -> String {
	let mut results: Vec<_> = outcome.results.iter().collect();
	results.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));

	let mut out: String = results.into_iter().map(render_delivery).collect();
	let _ = writeln!(out, "{}/{} providers received the prompt", outcome.sent_count(), outcome.results.len());
	out
}

fn serde_code(code: promptcast_protocol::ErrorCode) -> String {
	serde_json::to_value(code)
		.ok()
		.and_then(|v| v.as_str().map(str::to_owned))
		.unwrap_or_else(|| format!("{code:?}"))
}
