//! Error types for dispatch operations.

use promptcast_protocol::{ErrorCode, ProviderId, SessionId};
use thiserror::Error;

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while provisioning, waiting on, or delivering to a session.
///
/// Per-provider variants never escape a delivery: the delivery unit turns
/// them into a [`DeliveryResult`](promptcast_protocol::DeliveryResult).
/// [`Error::NoProviders`], [`Error::InvalidRequest`] and [`Error::Config`]
/// are the only variants surfaced to callers as failures.
#[derive(Debug, Error)]
pub enum Error {
	/// The requested provider id is not configured.
	#[error("Unknown provider: {0}")]
	UnknownProvider(ProviderId),

	/// Opening a session for the provider failed.
	#[error("Endpoint unreachable for {provider}: {reason}")]
	EndpointUnreachable { provider: ProviderId, reason: String },

	/// A previously valid session no longer resolves.
	#[error("Session {session_id} lost: {reason}")]
	SessionLost { session_id: SessionId, reason: String },

	/// The host could not answer for a session that may still be alive.
	///
	/// Unlike [`Error::SessionLost`] this never evicts the registry entry.
	#[error("Host could not check session {session_id}: {reason}")]
	HostUnavailable { session_id: SessionId, reason: String },

	/// The session never reported ready within the bound.
	#[error("Session {session_id} not ready after {duration_ms}ms")]
	ReadinessTimeout { session_id: SessionId, duration_ms: u64 },

	/// The ready session did not accept the message.
	#[error("Send to session {session_id} failed: {reason}")]
	SendFailed { session_id: SessionId, reason: String },

	/// The session did not acknowledge the message in time.
	#[error("Send to session {session_id} timed out after {duration_ms}ms")]
	SendTimeout { session_id: SessionId, duration_ms: u64 },

	/// The request is malformed.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	/// All-target dispatch has nothing to dispatch to.
	#[error("No enabled providers configured")]
	NoProviders,

	/// Provider configuration could not be loaded or is inconsistent.
	#[error("Configuration error: {0}")]
	Config(String),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Wire classification of this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			Error::UnknownProvider(_) => ErrorCode::UnknownProvider,
			Error::EndpointUnreachable { .. } => ErrorCode::EndpointUnreachable,
			Error::SessionLost { .. } => ErrorCode::SessionLost,
			Error::HostUnavailable { .. } => ErrorCode::HostUnavailable,
			Error::ReadinessTimeout { .. } => ErrorCode::ReadinessTimeout,
			Error::SendFailed { .. } => ErrorCode::SendFailed,
			Error::SendTimeout { .. } => ErrorCode::SendTimeout,
			Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
			Error::NoProviders => ErrorCode::NoProviders,
			Error::Config(_) | Error::Json(_) => ErrorCode::Internal,
		}
	}

	/// Returns `true` for either timeout flavor.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::ReadinessTimeout { .. } | Error::SendTimeout { .. })
	}
}
