//! Single- and all-target dispatch.
//!
//! A dispatch moves `Started -> AwaitingSessions -> AllCompleted` and is
//! terminal once every delivery has reported. All-target dispatch runs one
//! delivery future per enabled provider and joins them; each future yields its
//! own result slot, so one provider's failure never reaches its siblings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use promptcast_protocol::{DeliveryResult, DispatchOutcome, ProviderDescriptor, RequestContext};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{DispatchOptions, ProviderSet};
use crate::delivery::DeliveryUnit;
use crate::error::{Error, Result};
use crate::host::SessionHost;
use crate::monitor::LifecycleMonitor;
use crate::provisioner::SessionProvisioner;
use crate::readiness::ReadinessWaiter;
use crate::registry::SessionRegistry;

/// Entry point for dispatching prompts to providers.
///
/// Owns its [`SessionRegistry`]; build one coordinator per process (or per
/// test) and share it behind an [`Arc`].
pub struct DispatchCoordinator {
	providers: Arc<ProviderSet>,
	registry: Arc<SessionRegistry>,
	delivery: DeliveryUnit,
	next_dispatch: AtomicU64,
}

impl DispatchCoordinator {
	pub fn new(providers: ProviderSet, host: Arc<dyn SessionHost>, options: DispatchOptions) -> Self {
		let providers = Arc::new(providers);
		let registry = Arc::new(SessionRegistry::new());
		let provisioner = SessionProvisioner::new(host.clone(), registry.clone(), providers.clone());
		let waiter = ReadinessWaiter::new(options.poll_interval, options.ready_timeout);
		let delivery = DeliveryUnit::new(host, registry.clone(), provisioner, waiter, options.send_timeout);

		Self {
			providers,
			registry,
			delivery,
			next_dispatch: AtomicU64::new(1),
		}
	}

	/// All configured providers, enabled or not.
	pub fn providers(&self) -> &[ProviderDescriptor] {
		self.providers.all()
	}

	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	/// A lifecycle monitor bound to this coordinator's registry.
	pub fn monitor(&self) -> LifecycleMonitor {
		LifecycleMonitor::new(self.registry.clone())
	}

	/// Delivers to one provider. Always yields a result.
	pub async fn dispatch_one(&self, provider_id: &str, context: &RequestContext) -> DeliveryResult {
		let dispatch = self.next_id();
		let context = context.clone().normalized();
		debug!(target = "promptcast.dispatch", dispatch, provider = provider_id, phase = "started");

		let result = self.delivery.deliver(provider_id, &context).await;

		info!(
			target = "promptcast.dispatch",
			dispatch,
			provider = provider_id,
			status = ?result.status,
			phase = "all_completed",
			"single-target dispatch finished"
		);
		result
	}

	/// Delivers to every enabled provider concurrently.
	///
	/// Returns exactly one result per enabled provider, in no particular order.
	///
	/// # Errors
	///
	/// - [`Error::InvalidRequest`] if the prompt is blank
	/// - [`Error::NoProviders`] if no provider is enabled; a dispatch with
	///   nothing to deliver to is a configuration fault, not an empty outcome
	pub async fn dispatch_all(&self, context: &RequestContext) -> Result<DispatchOutcome> {
		if !context.has_prompt() {
			return Err(Error::InvalidRequest("prompt must not be empty".to_string()));
		}
		let targets: Vec<_> = self.providers.enabled().map(|p| p.id.clone()).collect();
		if targets.is_empty() {
			return Err(Error::NoProviders);
		}

		let dispatch = self.next_id();
		let started = Instant::now();
		let context = context.clone().normalized();
		debug!(target = "promptcast.dispatch", dispatch, targets = targets.len(), phase = "started");

		let deliveries = targets.iter().map(|id| self.delivery.deliver(id.as_str(), &context));
		debug!(target = "promptcast.dispatch", dispatch, phase = "awaiting_sessions");
		let results = join_all(deliveries).await;

		let outcome = DispatchOutcome { results };
		info!(
			target = "promptcast.dispatch",
			dispatch,
			sent = outcome.sent_count(),
			failed = outcome.results.len() - outcome.sent_count(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			phase = "all_completed",
			"dispatch finished"
		);
		Ok(outcome)
	}

	fn next_id(&self) -> u64 {
		self.next_dispatch.fetch_add(1, Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use promptcast_protocol::{DeliveryStatus, ErrorCode, LoadState, MAX_PAGE_TEXT_CHARS};

	use super::*;
	use crate::host::HostError;
	use crate::testing::MockHost;

	const CHAT: &str = "https://chat.test";
	const MIRROR: &str = "https://mirror.test";

	fn chat_and_mirror() -> ProviderSet {
		ProviderSet::new(vec![
			ProviderDescriptor::new("chat", "Chat", CHAT),
			ProviderDescriptor::new("mirror", "Mirror", MIRROR),
		])
		.unwrap()
	}

	fn coordinator(host: &Arc<MockHost>, providers: ProviderSet) -> DispatchCoordinator {
		DispatchCoordinator::new(providers, host.clone(), DispatchOptions::default())
	}

	fn sorted(outcome: &DispatchOutcome) -> Vec<(String, DeliveryStatus)> {
		let mut pairs: Vec<_> = outcome
			.results
			.iter()
			.map(|r| (r.provider_id.to_string(), r.status))
			.collect();
		pairs.sort_by(|a, b| a.0.cmp(&b.0));
		pairs
	}

	#[tokio::test(start_paused = true)]
	async fn both_ready_providers_receive_the_prompt() {
		let host = Arc::new(MockHost::new());
		let coordinator = coordinator(&host, chat_and_mirror());

		let outcome = coordinator.dispatch_all(&RequestContext::new("summarize")).await.unwrap();

		assert_eq!(
			sorted(&outcome),
			vec![
				("chat".to_string(), DeliveryStatus::Sent),
				("mirror".to_string(), DeliveryStatus::Sent),
			]
		);
		assert_eq!(host.sent_messages().len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn unreachable_mirror_does_not_block_live_chat() {
		let host = Arc::new(MockHost::new());
		let chat_session = host.add_session(CHAT, LoadState::Ready);
		host.fail_open(MIRROR, HostError::Unavailable("net::ERR_CONNECTION_REFUSED".into()));
		let coordinator = coordinator(&host, chat_and_mirror());
		coordinator
			.registry()
			.put(crate::registry::SessionHandle::new("chat".into(), chat_session));

		let outcome = coordinator.dispatch_all(&RequestContext::new("summarize")).await.unwrap();

		assert_eq!(outcome.results.len(), 2);
		assert!(outcome.result_for("chat").unwrap().is_sent());
		let mirror = outcome.result_for("mirror").unwrap();
		assert_eq!(mirror.status, DeliveryStatus::Error);
		assert_eq!(mirror.code, Some(ErrorCode::EndpointUnreachable));
		assert_eq!(host.opened_locators(), vec![MIRROR.to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn stale_chat_session_is_replaced_without_surfacing() {
		let host = Arc::new(MockHost::new());
		let coordinator = coordinator(&host, chat_and_mirror());

		let first = coordinator.dispatch_one("chat", &RequestContext::new("one")).await;
		assert!(first.is_sent());
		let stale = coordinator.registry().get("chat").unwrap().session_id;
		host.close_session_silently(stale);

		let second = coordinator.dispatch_one("chat", &RequestContext::new("two")).await;

		assert!(second.is_sent(), "{second:?}");
		let fresh = coordinator.registry().get("chat").unwrap().session_id;
		assert_ne!(fresh, stale);
		assert_eq!(host.open_calls(), 2);
		assert_eq!(host.sent_messages().last().unwrap().0, fresh);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_provider_times_out_while_others_complete() {
		let host = Arc::new(MockHost::new());
		host.open_as(MIRROR, LoadState::Loading);
		let coordinator = coordinator(&host, chat_and_mirror());

		let started = Instant::now();
		let outcome = coordinator.dispatch_all(&RequestContext::new("hi")).await.unwrap();

		assert!(outcome.result_for("chat").unwrap().is_sent());
		assert_eq!(outcome.result_for("mirror").unwrap().code, Some(ErrorCode::ReadinessTimeout));
		// Concurrent: the whole dispatch costs one readiness bound, not the sum.
		assert!(started.elapsed() < Duration::from_millis(10_100));
	}

	#[tokio::test(start_paused = true)]
	async fn every_enabled_provider_gets_exactly_one_result() {
		let host = Arc::new(MockHost::new());
		let providers = ProviderSet::new(
			(0..6)
				.map(|i| ProviderDescriptor::new(format!("p{i}"), format!("P{i}"), format!("https://p{i}.test")))
				.collect(),
		)
		.unwrap();
		host.fail_open("https://p1.test", HostError::Unavailable("down".into()));
		host.fail_sends_to("https://p3.test", HostError::Rejected("no adapter".into()));
		host.hang_sends_to("https://p4.test");
		host.ready_after_opening("https://p5.test", 5);
		let coordinator = coordinator(&host, providers);

		let outcome = coordinator.dispatch_all(&RequestContext::new("hi")).await.unwrap();

		let mut ids: Vec<_> = outcome.results.iter().map(|r| r.provider_id.to_string()).collect();
		ids.sort();
		assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5"]);
		assert_eq!(outcome.sent_count(), 3);
		assert_eq!(outcome.result_for("p1").unwrap().code, Some(ErrorCode::EndpointUnreachable));
		assert_eq!(outcome.result_for("p3").unwrap().code, Some(ErrorCode::SendFailed));
		assert_eq!(outcome.result_for("p4").unwrap().code, Some(ErrorCode::SendTimeout));
	}

	#[tokio::test]
	async fn disabled_providers_are_skipped() {
		let host = Arc::new(MockHost::new());
		let providers = ProviderSet::new(vec![
			ProviderDescriptor::new("chat", "Chat", CHAT),
			ProviderDescriptor::new("mirror", "Mirror", MIRROR).with_enabled(false),
		])
		.unwrap();
		let coordinator = coordinator(&host, providers);

		let outcome = coordinator.dispatch_all(&RequestContext::new("hi")).await.unwrap();

		assert_eq!(outcome.results.len(), 1);
		assert_eq!(host.opened_locators(), vec![CHAT.to_string()]);
		assert_eq!(coordinator.providers().len(), 2);
	}

	#[tokio::test]
	async fn no_enabled_providers_is_fatal() {
		let host = Arc::new(MockHost::new());
		let providers = ProviderSet::new(vec![ProviderDescriptor::new("chat", "Chat", CHAT).with_enabled(false)]).unwrap();
		let coordinator = coordinator(&host, providers);

		let err = coordinator.dispatch_all(&RequestContext::new("hi")).await.unwrap_err();

		assert!(matches!(err, Error::NoProviders));
		assert_eq!(host.open_calls(), 0);
	}

	#[tokio::test]
	async fn blank_prompt_is_rejected_before_fan_out() {
		let host = Arc::new(MockHost::new());
		let coordinator = coordinator(&host, chat_and_mirror());

		let err = coordinator.dispatch_all(&RequestContext::new("")).await.unwrap_err();

		assert!(matches!(err, Error::InvalidRequest(_)));
		assert_eq!(host.open_calls(), 0);
	}

	#[tokio::test]
	async fn page_content_is_capped_before_sending() {
		let host = Arc::new(MockHost::new());
		let coordinator = coordinator(&host, chat_and_mirror());
		let ctx = RequestContext::new("hi").with_content("x".repeat(MAX_PAGE_TEXT_CHARS + 50));

		assert!(coordinator.dispatch_one("chat", &ctx).await.is_sent());

		let (_, message) = host.sent_messages().pop().unwrap();
		let promptcast_protocol::AdapterMessage::SendPrompt { context, .. } = message;
		assert_eq!(context.content.unwrap().chars().count(), MAX_PAGE_TEXT_CHARS);
	}

	#[tokio::test]
	async fn monitor_eviction_forces_fresh_session() {
		let host = Arc::new(MockHost::new());
		let coordinator = coordinator(&host, chat_and_mirror());
		let monitor = coordinator.monitor().spawn(host.subscribe_closed());

		coordinator.dispatch_one("chat", &RequestContext::new("one")).await;
		let first = coordinator.registry().get("chat").unwrap().session_id;
		host.close_session(first);
		tokio::task::yield_now().await;

		coordinator.dispatch_one("chat", &RequestContext::new("two")).await;
		assert_ne!(coordinator.registry().get("chat").unwrap().session_id, first);
		assert_eq!(host.open_calls(), 2);
		monitor.abort();
	}
}
