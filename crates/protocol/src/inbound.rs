//! Request envelope used by UIs and the CLI to drive dispatch.
//!
//! One request is one logical action. Requests are tagged by `action`
//! (matching the extension's `chrome.runtime` messages), responses by `type`.

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::provider::{ProviderDescriptor, ProviderId};
use crate::result::{DeliveryResult, DispatchOutcome, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundRequest {
	/// List the configured providers.
	GetProviders,
	/// Deliver to a single provider.
	SendPrompt { provider: ProviderId, context: RequestContext },
	/// Deliver to every enabled provider concurrently.
	SendToAll { context: RequestContext },
}

impl InboundRequest {
	/// Short action name for logging.
	pub fn action(&self) -> &'static str {
		match self {
			InboundRequest::GetProviders => "getProviders",
			InboundRequest::SendPrompt { .. } => "sendPrompt",
			InboundRequest::SendToAll { .. } => "sendToAll",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundResponse {
	Providers { providers: Vec<ProviderDescriptor> },
	Delivery(DeliveryResult),
	Outcome(DispatchOutcome),
	Error { code: ErrorCode, message: String },
}

impl InboundResponse {
	pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
		Self::Error {
			code,
			message: message.into(),
		}
	}
}
