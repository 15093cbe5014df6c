use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	/// Command failed but output has already been printed (e.g. partial delivery).
	/// Used to signal exit code 1 without additional output.
	#[error("")]
	OutputAlreadyPrinted,

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("relay at {url} is not reachable: {source}")]
	RelayUnreachable {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("relay rejected the request [{code:?}]: {message}")]
	Rejected {
		code: promptcast_protocol::ErrorCode,
		message: String,
	},

	#[error(transparent)]
	Dispatch(#[from] promptcast::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// When true, the caller should exit with code 1 without printing anything else.
	pub fn is_output_already_printed(&self) -> bool {
		matches!(self, CliError::OutputAlreadyPrinted)
	}

	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let code = match self {
			CliError::OutputAlreadyPrinted => ErrorCode::InternalError,
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::RelayUnreachable { .. } | CliError::Http(_) => ErrorCode::RelayUnavailable,
			CliError::Rejected { .. } => ErrorCode::DispatchRejected,
			CliError::Dispatch(promptcast::Error::Config(_)) => ErrorCode::ConfigError,
			CliError::Dispatch(promptcast::Error::InvalidRequest(_)) => ErrorCode::InvalidInput,
			CliError::Dispatch(_) => ErrorCode::DispatchRejected,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) | CliError::Anyhow(_) => ErrorCode::InternalError,
		};

		CommandError {
			code,
			message: self.to_string(),
		}
	}
}
