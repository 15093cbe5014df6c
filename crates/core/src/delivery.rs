//! Delivery of one request to one provider.

use std::sync::Arc;
use std::time::Duration;

use promptcast_protocol::{AdapterMessage, DeliveryResult, RequestContext};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::SessionHost;
use crate::provisioner::SessionProvisioner;
use crate::readiness::ReadinessWaiter;
use crate::registry::{SessionHandle, SessionRegistry};

/// Acquire -> await ready -> send, with every failure folded into the result.
pub struct DeliveryUnit {
	host: Arc<dyn SessionHost>,
	registry: Arc<SessionRegistry>,
	provisioner: SessionProvisioner,
	waiter: ReadinessWaiter,
	send_timeout: Duration,
}

impl DeliveryUnit {
	pub fn new(
		host: Arc<dyn SessionHost>,
		registry: Arc<SessionRegistry>,
		provisioner: SessionProvisioner,
		waiter: ReadinessWaiter,
		send_timeout: Duration,
	) -> Self {
		Self {
			host,
			registry,
			provisioner,
			waiter,
			send_timeout,
		}
	}

	/// Delivers `context` to `provider_id`. Never fails; errors become
	/// [`DeliveryStatus::Error`](promptcast_protocol::DeliveryStatus::Error) results.
	pub async fn deliver(&self, provider_id: &str, context: &RequestContext) -> DeliveryResult {
		match self.try_deliver(provider_id, context).await {
			Ok(handle) => {
				debug!(
					target = "promptcast.dispatch",
					provider = provider_id,
					session = %handle.session_id,
					"prompt sent"
				);
				DeliveryResult::sent(handle.provider_id)
			}
			Err(err) => {
				warn!(
					target = "promptcast.dispatch",
					provider = provider_id,
					code = ?err.code(),
					error = %err,
					"delivery failed"
				);
				DeliveryResult::failed(provider_id.into(), err.code(), err.to_string())
			}
		}
	}

	async fn try_deliver(&self, provider_id: &str, context: &RequestContext) -> Result<SessionHandle> {
		if !context.has_prompt() {
			return Err(Error::InvalidRequest("prompt must not be empty".to_string()));
		}

		let handle = self.provisioner.acquire(provider_id).await?;

		let ready = match self.waiter.await_ready(self.host.as_ref(), &handle).await {
			Ok(ready) => ready,
			Err(err) => {
				// Only a session the host reports gone is evicted.
				if matches!(err, Error::SessionLost { .. }) {
					self.registry.remove_if_session(provider_id, handle.session_id);
				}
				return Err(err);
			}
		};
		self.registry.set_load_state(provider_id, ready.session_id, ready.load_state);

		let message = AdapterMessage::send_prompt(context);
		match tokio::time::timeout(self.send_timeout, self.host.send_to_session(ready.session_id, &message)).await {
			Ok(Ok(())) => Ok(ready),
			Ok(Err(err)) => Err(Error::SendFailed {
				session_id: ready.session_id,
				reason: err.to_string(),
			}),
			Err(_) => Err(Error::SendTimeout {
				session_id: ready.session_id,
				duration_ms: self.send_timeout.as_millis() as u64,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use promptcast_protocol::{DeliveryStatus, ErrorCode, LoadState, ProviderDescriptor};

	use super::*;
	use crate::config::ProviderSet;
	use crate::host::HostError;
	use crate::testing::MockHost;

	fn unit(host: &Arc<MockHost>) -> (DeliveryUnit, Arc<SessionRegistry>) {
		let providers = Arc::new(ProviderSet::new(vec![ProviderDescriptor::new("chat", "Chat", "https://chat.test")]).unwrap());
		let registry = Arc::new(SessionRegistry::new());
		let provisioner = SessionProvisioner::new(host.clone(), registry.clone(), providers);
		let unit = DeliveryUnit::new(
			host.clone(),
			registry.clone(),
			provisioner,
			ReadinessWaiter::new(Duration::from_millis(100), Duration::from_secs(10)),
			Duration::from_secs(30),
		);
		(unit, registry)
	}

	#[tokio::test(start_paused = true)]
	async fn ready_session_receives_send_prompt_message() {
		let host = Arc::new(MockHost::new());
		let (unit, registry) = unit(&host);
		let ctx = RequestContext::new("explain lifetimes").with_page("https://doc.rust-lang.org", "Docs");

		let result = unit.deliver("chat", &ctx).await;

		assert_eq!(result, DeliveryResult::sent("chat".into()));
		let sent = host.sent_messages();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].1, AdapterMessage::send_prompt(&ctx));
		assert_eq!(registry.get("chat").unwrap().load_state, LoadState::Ready);
	}

	#[tokio::test(start_paused = true)]
	async fn readiness_timeout_becomes_error_result() {
		let host = Arc::new(MockHost::new().with_open_state(LoadState::Loading));
		let (unit, _) = unit(&host);

		let result = unit.deliver("chat", &RequestContext::new("hi")).await;

		assert_eq!(result.status, DeliveryStatus::Error);
		assert_eq!(result.code, Some(ErrorCode::ReadinessTimeout));
		assert!(host.sent_messages().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn send_failure_becomes_error_result() {
		let host = Arc::new(MockHost::new());
		host.fail_sends_to("https://chat.test", HostError::Rejected("Could not establish connection".into()));
		let (unit, _) = unit(&host);

		let result = unit.deliver("chat", &RequestContext::new("hi")).await;

		assert_eq!(result.code, Some(ErrorCode::SendFailed));
		assert!(result.error.unwrap().contains("Could not establish connection"));
	}

	#[tokio::test(start_paused = true)]
	async fn hung_send_is_bounded_by_send_timeout() {
		let host = Arc::new(MockHost::new());
		host.hang_sends_to("https://chat.test");
		let (unit, _) = unit(&host);

		let started = tokio::time::Instant::now();
		let result = unit.deliver("chat", &RequestContext::new("hi")).await;

		assert_eq!(result.code, Some(ErrorCode::SendTimeout));
		assert_eq!(started.elapsed(), Duration::from_secs(30));
	}

	#[tokio::test(start_paused = true)]
	async fn lost_session_is_evicted_from_registry() {
		let host = Arc::new(MockHost::new().with_open_state(LoadState::Loading));
		host.close_after_queries("https://chat.test", 2);
		let (unit, registry) = unit(&host);

		let result = unit.deliver("chat", &RequestContext::new("hi")).await;

		assert_eq!(result.code, Some(ErrorCode::SessionLost));
		assert!(registry.get("chat").is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn host_timeout_during_wait_keeps_registry_entry() {
		let host = Arc::new(MockHost::new());
		let (unit, registry) = unit(&host);
		assert!(unit.deliver("chat", &RequestContext::new("first")).await.is_sent());
		let session_id = registry.get("chat").unwrap().session_id;

		// Query 2 is the provisioner's reuse check, query 3 the readiness probe.
		host.fail_queries_after(session_id, 2, HostError::Timeout("no answer from extension".into()));
		let result = unit.deliver("chat", &RequestContext::new("second")).await;

		assert_eq!(result.code, Some(ErrorCode::HostUnavailable));
		assert_eq!(registry.get("chat").unwrap().session_id, session_id);
		assert_eq!(host.open_calls(), 1);
	}

	#[tokio::test]
	async fn blank_prompt_is_invalid_without_touching_host() {
		let host = Arc::new(MockHost::new());
		let (unit, _) = unit(&host);

		let result = unit.deliver("chat", &RequestContext::new("  ")).await;

		assert_eq!(result.code, Some(ErrorCode::InvalidRequest));
		assert_eq!(host.open_calls(), 0);
	}

	#[tokio::test]
	async fn unknown_provider_becomes_error_result() {
		let host = Arc::new(MockHost::new());
		let (unit, _) = unit(&host);

		let result = unit.deliver("nope", &RequestContext::new("hi")).await;

		assert_eq!(result.provider_id.as_str(), "nope");
		assert_eq!(result.code, Some(ErrorCode::UnknownProvider));
	}
}
