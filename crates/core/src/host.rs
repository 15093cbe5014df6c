//! Session host capability: the boundary to whatever actually owns sessions.
//!
//! The browser extension implements this with `chrome.tabs` (reached through
//! the relay); tests use [`MockHost`](crate::testing::MockHost).

use async_trait::async_trait;
use promptcast_protocol::{AdapterMessage, HostFailure, LoadState, SessionId};
use thiserror::Error;

/// Failure reported by a [`SessionHost`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	/// The session does not exist (closed, or never existed).
	#[error("No session with id {0}")]
	NotFound(SessionId),

	/// The host could not perform the call (disconnected, unreachable locator, exhausted).
	#[error("Host unavailable: {0}")]
	Unavailable(String),

	/// The call reached the session but was refused.
	#[error("Rejected: {0}")]
	Rejected(String),

	/// The host did not answer in time.
	#[error("Host timed out: {0}")]
	Timeout(String),
}

impl HostError {
	/// Builds a host error from a bridge failure frame.
	pub fn from_failure(failure: HostFailure, session_id: Option<SessionId>, message: String) -> Self {
		match (failure, session_id) {
			(HostFailure::NotFound, Some(id)) => HostError::NotFound(id),
			(HostFailure::NotFound, None) | (HostFailure::Unavailable, _) => HostError::Unavailable(message),
			(HostFailure::Rejected, _) => HostError::Rejected(message),
		}
	}
}

/// Capabilities the dispatch core consumes from its environment.
#[async_trait]
pub trait SessionHost: Send + Sync {
	/// Opens a new session for `locator` without taking focus from the user.
	async fn open_session(&self, locator: &str) -> Result<SessionId, HostError>;

	/// Non-blocking status probe. [`HostError::NotFound`] means the session is gone.
	async fn query_status(&self, session_id: SessionId) -> Result<LoadState, HostError>;

	/// Delivers `message` to the adapter inside the session.
	async fn send_to_session(&self, session_id: SessionId, message: &AdapterMessage) -> Result<(), HostError>;

	/// Host name for logs.
	fn name(&self) -> &str {
		"host"
	}
}
