//! Bounded polling until a session reports ready.
//!
//! Provider pages load in a short, roughly fixed window, so this is a plain
//! fixed-interval loop rather than backoff. Time comes from `tokio::time`, so
//! tests drive it deterministically with a paused clock.

use std::time::Duration;

use promptcast_protocol::LoadState;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT};
use crate::error::{Error, Result};
use crate::host::{HostError, SessionHost};
use crate::registry::SessionHandle;

/// Polls [`SessionHost::query_status`] at a fixed interval until ready.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessWaiter {
	poll_interval: Duration,
	timeout: Duration,
}

impl Default for ReadinessWaiter {
	fn default() -> Self {
		Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT)
	}
}

impl ReadinessWaiter {
	pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
		Self { poll_interval, timeout }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Waits for `handle`'s session to reach [`LoadState::Ready`].
	///
	/// Always probes once before sleeping, so an already-ready session costs a
	/// single status query. Each probe is bounded by the time left, so a slow
	/// host cannot stretch the wait past the timeout.
	///
	/// # Errors
	///
	/// - [`Error::SessionLost`] as soon as the host reports the session gone
	/// - [`Error::HostUnavailable`] if the host fails to answer a probe
	/// - [`Error::ReadinessTimeout`] once the timeout has elapsed without a ready probe
	pub async fn await_ready(&self, host: &dyn SessionHost, handle: &SessionHandle) -> Result<SessionHandle> {
		let started = Instant::now();
		let session_id = handle.session_id;

		loop {
			let remaining = self.timeout.saturating_sub(started.elapsed());
			let state = match tokio::time::timeout(remaining, host.query_status(session_id)).await {
				Ok(Ok(state)) => state,
				Ok(Err(err @ HostError::NotFound(_))) => {
					return Err(Error::SessionLost {
						session_id,
						reason: err.to_string(),
					});
				}
				Ok(Err(err)) => {
					return Err(Error::HostUnavailable {
						session_id,
						reason: err.to_string(),
					});
				}
				Err(_) => {
					return Err(Error::ReadinessTimeout {
						session_id,
						duration_ms: started.elapsed().as_millis() as u64,
					});
				}
			};

			if state == LoadState::Ready {
				debug!(
					target = "promptcast.session",
					provider = %handle.provider_id,
					session = %session_id,
					waited_ms = started.elapsed().as_millis() as u64,
					"session ready"
				);
				return Ok(SessionHandle {
					load_state: LoadState::Ready,
					..handle.clone()
				});
			}

			let elapsed = started.elapsed();
			if elapsed >= self.timeout {
				return Err(Error::ReadinessTimeout {
					session_id,
					duration_ms: elapsed.as_millis() as u64,
				});
			}

			trace!(target = "promptcast.session", session = %session_id, %state, "session not ready");
			let remaining = self.timeout - elapsed;
			tokio::time::sleep(self.poll_interval.min(remaining)).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use promptcast_protocol::SessionId;

	use super::*;
	use crate::testing::MockHost;

	fn handle_for(session_id: SessionId) -> SessionHandle {
		SessionHandle::new("chat".into(), session_id)
	}

	#[tokio::test(start_paused = true)]
	async fn ready_session_returns_without_sleeping() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Ready);

		let started = Instant::now();
		let handle = ReadinessWaiter::default().await_ready(host.as_ref(), &handle_for(session_id)).await.unwrap();

		assert_eq!(handle.load_state, LoadState::Ready);
		assert_eq!(started.elapsed(), Duration::ZERO);
		assert_eq!(host.status_queries(session_id), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn loading_session_becomes_ready_after_polls() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Loading);
		host.ready_after(session_id, 3);

		let started = Instant::now();
		ReadinessWaiter::default().await_ready(host.as_ref(), &handle_for(session_id)).await.unwrap();

		assert_eq!(host.status_queries(session_id), 4);
		assert_eq!(started.elapsed(), Duration::from_millis(300));
	}

	#[tokio::test(start_paused = true)]
	async fn stuck_loading_times_out_at_the_bound() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Loading);
		let timeout = Duration::from_millis(10_000);

		let started = Instant::now();
		let err = ReadinessWaiter::new(Duration::from_millis(100), timeout)
			.await_ready(host.as_ref(), &handle_for(session_id))
			.await
			.unwrap_err();

		let elapsed = started.elapsed();
		assert!(matches!(err, Error::ReadinessTimeout { .. }), "got {err:?}");
		assert!(elapsed >= timeout, "timed out early after {elapsed:?}");
		assert!(elapsed < timeout + Duration::from_millis(100), "timed out late after {elapsed:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_not_a_multiple_of_interval_is_not_overshot() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Unknown);

		let started = Instant::now();
		let err = ReadinessWaiter::new(Duration::from_millis(100), Duration::from_millis(250))
			.await_ready(host.as_ref(), &handle_for(session_id))
			.await
			.unwrap_err();

		assert!(err.is_timeout());
		assert_eq!(started.elapsed(), Duration::from_millis(250));
	}

	#[tokio::test(start_paused = true)]
	async fn closed_session_fails_fast_as_lost() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Loading);
		host.close_session(session_id);

		let started = Instant::now();
		let err = ReadinessWaiter::default().await_ready(host.as_ref(), &handle_for(session_id)).await.unwrap_err();

		assert!(matches!(err, Error::SessionLost { session_id: id, .. } if id == session_id));
		assert_eq!(started.elapsed(), Duration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_probe_is_cut_off_at_the_bound() {
		let host = Arc::new(MockHost::new().with_query_delay(Duration::from_secs(30)));
		let session_id = host.add_session("https://chat.test", LoadState::Loading);
		let timeout = Duration::from_secs(10);

		let started = Instant::now();
		let err = ReadinessWaiter::new(Duration::from_millis(100), timeout)
			.await_ready(host.as_ref(), &handle_for(session_id))
			.await
			.unwrap_err();

		assert!(matches!(err, Error::ReadinessTimeout { .. }), "got {err:?}");
		assert_eq!(started.elapsed(), timeout);
	}

	#[tokio::test(start_paused = true)]
	async fn host_failure_mid_wait_is_not_session_lost() {
		let host = Arc::new(MockHost::new());
		let session_id = host.add_session("https://chat.test", LoadState::Loading);
		host.fail_queries_after(session_id, 2, HostError::Timeout("no answer from extension".into()));

		let err = ReadinessWaiter::default().await_ready(host.as_ref(), &handle_for(session_id)).await.unwrap_err();

		assert!(matches!(err, Error::HostUnavailable { session_id: id, .. } if id == session_id), "got {err:?}");
		assert_eq!(host.status_queries(session_id), 3);
		assert!(host.is_open(session_id));
	}
}
