//! Inbound router: one UI request in, one response out.
//!
//! Requests come from the extension popup (forwarded over the relay socket)
//! or from `promptcast send` via `POST /dispatch`.

use std::sync::Arc;

use promptcast::DispatchCoordinator;
use promptcast_protocol::{ErrorCode, InboundRequest, InboundResponse};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct InboundRouter {
	coordinator: Arc<DispatchCoordinator>,
}

impl InboundRouter {
	pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
		Self { coordinator }
	}

	/// Routes a raw JSON request, answering unknown or malformed actions with an error response.
	pub async fn handle_value(&self, raw: Value) -> InboundResponse {
		let action = raw.get("action").and_then(Value::as_str).map(str::to_owned);
		match serde_json::from_value::<InboundRequest>(raw) {
			Ok(request) => self.handle(request).await,
			Err(err) => match action.as_deref() {
				Some("getProviders" | "sendPrompt" | "sendToAll") => {
					InboundResponse::error(ErrorCode::InvalidRequest, format!("malformed request: {err}"))
				}
				Some(other) => {
					warn!(target = "promptcast.relay", action = other, "unknown inbound action");
					InboundResponse::error(ErrorCode::UnknownAction, format!("Unknown action: {other}"))
				}
				None => InboundResponse::error(ErrorCode::InvalidRequest, "request has no action"),
			},
		}
	}

	pub async fn handle(&self, request: InboundRequest) -> InboundResponse {
		debug!(target = "promptcast.relay", action = request.action(), "inbound request");
		match request {
			InboundRequest::GetProviders => InboundResponse::Providers {
				providers: self.coordinator.providers().to_vec(),
			},
			InboundRequest::SendPrompt { provider, context } => {
				InboundResponse::Delivery(self.coordinator.dispatch_one(provider.as_str(), &context).await)
			}
			InboundRequest::SendToAll { context } => match self.coordinator.dispatch_all(&context).await {
				Ok(outcome) => InboundResponse::Outcome(outcome),
				Err(err) => InboundResponse::error(err.code(), err.to_string()),
			},
		}
	}
}
