
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};
use promptcast::DispatchOptions;
use promptcast_protocol::{RELAY_HOST, RELAY_PORT};

use crate::output::OutputFormat;

/// Root CLI for promptcast.
#[derive(Parser, Debug)]
#[command(name = "promptcast")]
#[command(about = "Send one prompt to many AI chat providers through the browser extension")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the relay the browser extension connects to.
	Serve(ServeArgs),
	/// List the configured providers.
	Providers(ProvidersArgs),
	/// Dispatch a prompt through a running relay.
	Send(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RelayAddr {
	/// Relay host
	#[arg(long, default_value = RELAY_HOST)]
	pub host: String,

	/// Relay port
	#[arg(short, long, default_value_t = RELAY_PORT)]
	pub port: u16,
}

impl RelayAddr {
	pub fn http_base(&self) -> String {
		format!("http://{}:{}", self.host, self.port)
	}
}

#[derive(Args, Debug, Clone)]
pub struct TimingArgs {
	/// Interval between readiness probes, in milliseconds
	#[arg(long, value_name = "MS", default_value_t = 100)]
	pub poll_interval_ms: u64,

	/// How long a provider tab may take to become ready, in milliseconds
	#[arg(long, value_name = "MS", default_value_t = 10_000)]
	pub ready_timeout_ms: u64,

	/// How long a single send may wait for the tab's acknowledgment, in milliseconds
	#[arg(long, value_name = "MS", default_value_t = 30_000)]
	pub send_timeout_ms: u64,
}

impl TimingArgs {
	pub fn options(&self) -> DispatchOptions {
		DispatchOptions::default()
			.with_poll_interval(Duration::from_millis(self.poll_interval_ms))
			.with_ready_timeout(Duration::from_millis(self.ready_timeout_ms))
			.with_send_timeout(Duration::from_millis(self.send_timeout_ms))
	}
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
	#[command(flatten)]
	pub addr: RelayAddr,

	/// Provider configuration file (JSON array)
	#[arg(long, value_name = "FILE")]
	pub providers: Option<PathBuf>,

	#[command(flatten)]
	pub timing: TimingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProvidersArgs {
	/// Provider configuration file (JSON array)
	#[arg(long, value_name = "FILE")]
	pub providers: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
	/// Prompt text
	#[arg(value_name = "PROMPT", required = true, num_args = 1..)]
	pub prompt: Vec<String>,

	/// Send to a single provider instead of all enabled ones
	#[arg(long, value_name = "ID", conflicts_with = "all")]
	pub provider: Option<String>,

	/// Send to every enabled provider (default)
	#[arg(long)]
	pub all: bool,

	/// URL of the page the prompt refers to
	#[arg(long, value_name = "URL")]
	pub url: Option<String>,

	/// Title of the page the prompt refers to
	#[arg(long, value_name = "TITLE")]
	pub title: Option<String>,

	/// Selected text to include as context
	#[arg(long, value_name = "TEXT")]
	pub selection: Option<String>,

	#[command(flatten)]
	pub addr: RelayAddr,
}

impl SendArgs {
	/// Prompt words joined with single spaces, so quoting is optional.
	pub fn prompt_text(&self) -> String {
		self.prompt.join(" ")
	}
}

fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Blue.on_default().bold())
		.usage(AnsiColor::Blue.on_default().bold())
		.literal(AnsiColor::Magenta.on_default())
		.placeholder(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default().bold())
}
