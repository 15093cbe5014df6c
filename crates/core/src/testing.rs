//! In-memory [`SessionHost`] for tests.
//!
//! Sessions live in a map keyed by [`SessionId`]; behavior per endpoint
//! (open failure, slow readiness, failing or hanging sends) is scripted by
//! locator before the session is opened.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use promptcast_protocol::{AdapterMessage, LoadState, SessionId};
use tokio::sync::broadcast;

use crate::host::{HostError, SessionHost};

#[derive(Debug)]
struct MockSession {
	locator: String,
	state: LoadState,
	queries: u32,
	ready_after: Option<u32>,
	close_after: Option<u32>,
	query_failure: Option<(u32, HostError)>,
}

#[derive(Debug, Default, Clone)]
struct Script {
	open_failure: Option<HostError>,
	open_state: Option<LoadState>,
	ready_after: Option<u32>,
	close_after: Option<u32>,
	send_failure: Option<HostError>,
	hang_send: bool,
}

#[derive(Debug, Default)]
struct State {
	next_id: u64,
	sessions: HashMap<SessionId, MockSession>,
	query_counts: HashMap<SessionId, u32>,
	scripts: HashMap<String, Script>,
	opened: Vec<String>,
	sent: Vec<(SessionId, AdapterMessage)>,
}

/// Scriptable session host. Opened sessions are [`LoadState::Ready`] unless configured otherwise.
pub struct MockHost {
	state: Mutex<State>,
	open_state: LoadState,
	open_delay: Duration,
	query_delay: Duration,
	closed_tx: broadcast::Sender<SessionId>,
}

impl Default for MockHost {
	fn default() -> Self {
		Self::new()
	}
}

impl MockHost {
	pub fn new() -> Self {
		let (closed_tx, _) = broadcast::channel(64);
		Self {
			state: Mutex::new(State {
				next_id: 1,
				..State::default()
			}),
			open_state: LoadState::Ready,
			open_delay: Duration::ZERO,
			query_delay: Duration::ZERO,
			closed_tx,
		}
	}

	/// Every `open_session` call sleeps for `delay` before answering.
	pub fn with_open_delay(mut self, delay: Duration) -> Self {
		self.open_delay = delay;
		self
	}

	/// Every `query_status` call sleeps for `delay` before answering.
	pub fn with_query_delay(mut self, delay: Duration) -> Self {
		self.query_delay = delay;
		self
	}

	/// Default state of newly opened sessions.
	pub fn with_open_state(mut self, state: LoadState) -> Self {
		self.open_state = state;
		self
	}

	/// Close notifications fired by [`MockHost::close_session`].
	pub fn subscribe_closed(&self) -> broadcast::Receiver<SessionId> {
		self.closed_tx.subscribe()
	}

	/// Inserts a live session as if it had been opened earlier.
	pub fn add_session(&self, locator: &str, state: LoadState) -> SessionId {
		let mut inner = self.state.lock();
		let id = SessionId(inner.next_id);
		inner.next_id += 1;
		inner.sessions.insert(id, MockSession::new(locator, state));
		id
	}

	pub fn set_status(&self, session_id: SessionId, state: LoadState) {
		if let Some(session) = self.state.lock().sessions.get_mut(&session_id) {
			session.state = state;
		}
	}

	/// The session reports [`LoadState::Ready`] after `polls` non-ready answers.
	pub fn ready_after(&self, session_id: SessionId, polls: u32) {
		if let Some(session) = self.state.lock().sessions.get_mut(&session_id) {
			session.ready_after = Some(session.queries + polls);
		}
	}

	/// Status probes of a still-open session fail with `error` from now on.
	pub fn fail_queries(&self, session_id: SessionId, error: HostError) {
		let queries = self.state.lock().sessions.get(&session_id).map_or(0, |s| s.queries);
		self.fail_queries_after(session_id, queries, error);
	}

	/// Status probes fail with `error` once `queries` of them have been answered.
	pub fn fail_queries_after(&self, session_id: SessionId, queries: u32, error: HostError) {
		if let Some(session) = self.state.lock().sessions.get_mut(&session_id) {
			session.query_failure = Some((queries, error));
		}
	}

	pub fn restore_queries(&self, session_id: SessionId) {
		if let Some(session) = self.state.lock().sessions.get_mut(&session_id) {
			session.query_failure = None;
		}
	}

	/// Closes the session and fires a close notification.
	pub fn close_session(&self, session_id: SessionId) {
		if self.state.lock().sessions.remove(&session_id).is_some() {
			let _ = self.closed_tx.send(session_id);
		}
	}

	/// Closes the session without notifying anyone, leaving registry entries stale.
	pub fn close_session_silently(&self, session_id: SessionId) {
		self.state.lock().sessions.remove(&session_id);
	}

	/// Fires a close notification without touching any session.
	pub fn emit_closed(&self, session_id: SessionId) {
		let _ = self.closed_tx.send(session_id);
	}

	pub fn fail_open(&self, locator: &str, error: HostError) {
		self.script(locator, |script| script.open_failure = Some(error));
	}

	/// Sessions opened for `locator` start in `state`.
	pub fn open_as(&self, locator: &str, state: LoadState) {
		self.script(locator, |script| script.open_state = Some(state));
	}

	/// Sessions opened for `locator` become ready after `polls` non-ready answers.
	pub fn ready_after_opening(&self, locator: &str, polls: u32) {
		self.script(locator, |script| {
			script.open_state = Some(LoadState::Loading);
			script.ready_after = Some(polls);
		});
	}

	/// Sessions opened for `locator` close (with notification) on the
	/// status query after the first `queries`.
	pub fn close_after_queries(&self, locator: &str, queries: u32) {
		self.script(locator, |script| script.close_after = Some(queries));
	}

	pub fn fail_sends_to(&self, locator: &str, error: HostError) {
		self.script(locator, |script| script.send_failure = Some(error));
	}

	/// Sends to sessions for `locator` never complete.
	pub fn hang_sends_to(&self, locator: &str) {
		self.script(locator, |script| script.hang_send = true);
	}

	pub fn open_calls(&self) -> usize {
		self.state.lock().opened.len()
	}

	pub fn opened_locators(&self) -> Vec<String> {
		self.state.lock().opened.clone()
	}

	pub fn status_queries(&self, session_id: SessionId) -> u32 {
		self.state.lock().query_counts.get(&session_id).copied().unwrap_or(0)
	}

	pub fn sent_messages(&self) -> Vec<(SessionId, AdapterMessage)> {
		self.state.lock().sent.clone()
	}

	pub fn is_open(&self, session_id: SessionId) -> bool {
		self.state.lock().sessions.contains_key(&session_id)
	}

	fn script(&self, locator: &str, edit: impl FnOnce(&mut Script)) {
		edit(self.state.lock().scripts.entry(locator.to_string()).or_default());
	}
}

impl MockSession {
	fn new(locator: &str, state: LoadState) -> Self {
		Self {
			locator: locator.to_string(),
			state,
			queries: 0,
			ready_after: None,
			close_after: None,
			query_failure: None,
		}
	}
}

#[async_trait]
impl SessionHost for MockHost {
	async fn open_session(&self, locator: &str) -> Result<SessionId, HostError> {
		self.state.lock().opened.push(locator.to_string());
		if !self.open_delay.is_zero() {
			tokio::time::sleep(self.open_delay).await;
		}

		let mut inner = self.state.lock();
		let script = inner.scripts.get(locator).cloned().unwrap_or_default();
		if let Some(err) = script.open_failure {
			return Err(err);
		}

		let id = SessionId(inner.next_id);
		inner.next_id += 1;
		let mut session = MockSession::new(locator, script.open_state.unwrap_or(self.open_state));
		session.ready_after = script.ready_after;
		session.close_after = script.close_after;
		inner.sessions.insert(id, session);
		Ok(id)
	}

	async fn query_status(&self, session_id: SessionId) -> Result<LoadState, HostError> {
		if !self.query_delay.is_zero() {
			tokio::time::sleep(self.query_delay).await;
		}

		let mut inner = self.state.lock();
		*inner.query_counts.entry(session_id).or_default() += 1;

		let Some(session) = inner.sessions.get_mut(&session_id) else {
			return Err(HostError::NotFound(session_id));
		};
		session.queries += 1;

		if let Some((answered, err)) = &session.query_failure {
			if session.queries > *answered {
				return Err(err.clone());
			}
		}

		if session.close_after.is_some_and(|limit| session.queries > limit) {
			inner.sessions.remove(&session_id);
			drop(inner);
			let _ = self.closed_tx.send(session_id);
			return Err(HostError::NotFound(session_id));
		}
		if session.ready_after.is_some_and(|limit| session.queries > limit) {
			session.state = LoadState::Ready;
		}
		Ok(session.state)
	}

	async fn send_to_session(&self, session_id: SessionId, message: &AdapterMessage) -> Result<(), HostError> {
		let script = {
			let inner = self.state.lock();
			let Some(session) = inner.sessions.get(&session_id) else {
				return Err(HostError::NotFound(session_id));
			};
			inner.scripts.get(&session.locator).cloned().unwrap_or_default()
		};

		if script.hang_send {
			std::future::pending::<()>().await;
		}
		if let Some(err) = script.send_failure {
			return Err(err);
		}
		self.state.lock().sent.push((session_id, message.clone()));
		Ok(())
	}

	fn name(&self) -> &str {
		"mock"
	}
}
