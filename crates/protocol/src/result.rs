//! Per-provider delivery outcomes.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
	/// The provider's session could not be opened.
	EndpointUnreachable,
	/// A previously valid session no longer resolves.
	SessionLost,
	/// The host did not answer a status probe; the session was kept.
	HostUnavailable,
	/// The session never reached the ready state in time.
	ReadinessTimeout,
	/// The ready session rejected the message.
	SendFailed,
	/// The session did not acknowledge the message in time.
	SendTimeout,
	/// The provider id is not configured.
	UnknownProvider,
	/// The request itself is malformed (e.g. blank prompt).
	InvalidRequest,
	/// All-target dispatch found no enabled providers.
	NoProviders,
	/// The inbound action is not recognized.
	UnknownAction,
	/// Anything else.
	Internal,
}

/// Whether a delivery reached its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
	Sent,
	Error,
}

/// Outcome of delivering one request to one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
	#[serde(rename = "provider")]
	pub provider_id: ProviderId,
	pub status: DeliveryStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<ErrorCode>,
}

impl DeliveryResult {
	pub fn sent(provider_id: ProviderId) -> Self {
		Self {
			provider_id,
			status: DeliveryStatus::Sent,
			error: None,
			code: None,
		}
	}

	pub fn failed(provider_id: ProviderId, code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			provider_id,
			status: DeliveryStatus::Error,
			error: Some(message.into()),
			code: Some(code),
		}
	}

	pub fn is_sent(&self) -> bool {
		self.status == DeliveryStatus::Sent
	}
}

/// Results of one all-target dispatch, one entry per enabled provider.
///
/// Order carries no meaning; correlate by [`DeliveryResult::provider_id`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
	pub results: Vec<DeliveryResult>,
}

impl DispatchOutcome {
	pub fn result_for(&self, provider_id: &str) -> Option<&DeliveryResult> {
		self.results.iter().find(|r| r.provider_id.as_str() == provider_id)
	}

	pub fn sent_count(&self) -> usize {
		self.results.iter().filter(|r| r.is_sent()).count()
	}

	pub fn failures(&self) -> impl Iterator<Item = &DeliveryResult> {
		self.results.iter().filter(|r| !r.is_sent())
	}

	pub fn all_sent(&self) -> bool {
		self.results.iter().all(DeliveryResult::is_sent)
	}
}
