//! Provider -> live session table.
//!
//! Uses [`DashMap`] so the lifecycle monitor can evict entries while
//! deliveries are in flight. Holds at most one handle per provider.
//! Entries may go stale when a session closes; the provisioner re-validates
//! before reuse and evicts with [`SessionRegistry::remove_if_session`] so it
//! never drops a newer replacement by accident.

use dashmap::DashMap;
use promptcast_protocol::{LoadState, ProviderId, SessionId};

/// Live binding between a provider and a host session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
	pub provider_id: ProviderId,
	pub session_id: SessionId,
	pub load_state: LoadState,
}

impl SessionHandle {
	pub fn new(provider_id: ProviderId, session_id: SessionId) -> Self {
		Self {
			provider_id,
			session_id,
			load_state: LoadState::Loading,
		}
	}
}

/// Thread-safe registry of session handles by provider id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: DashMap<ProviderId, SessionHandle>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, provider_id: &str) -> Option<SessionHandle> {
		self.sessions.get(provider_id).map(|entry| entry.value().clone())
	}

	/// Stores `handle`, replacing any prior entry for its provider.
	pub fn put(&self, handle: SessionHandle) -> Option<SessionHandle> {
		self.sessions.insert(handle.provider_id.clone(), handle)
	}

	pub fn remove(&self, provider_id: &str) -> Option<SessionHandle> {
		self.sessions.remove(provider_id).map(|(_, handle)| handle)
	}

	/// Removes the provider's entry only if it still points at `session_id`.
	pub fn remove_if_session(&self, provider_id: &str, session_id: SessionId) -> Option<SessionHandle> {
		self.sessions
			.remove_if(provider_id, |_, handle| handle.session_id == session_id)
			.map(|(_, handle)| handle)
	}

	/// Records the last observed load state of the provider's session.
	pub fn set_load_state(&self, provider_id: &str, session_id: SessionId, state: LoadState) {
		if let Some(mut entry) = self.sessions.get_mut(provider_id) {
			if entry.session_id == session_id {
				entry.load_state = state;
			}
		}
	}

	/// Returns the provider bound to `session_id`, if any.
	pub fn provider_for_session(&self, session_id: SessionId) -> Option<ProviderId> {
		self.sessions
			.iter()
			.find(|entry| entry.value().session_id == session_id)
			.map(|entry| entry.key().clone())
	}

	/// Removes whichever entry is bound to `session_id`. Idempotent.
	pub fn evict_session(&self, session_id: SessionId) -> Option<SessionHandle> {
		// The iterator guard must be released before removing.
		let provider_id = self.provider_for_session(session_id)?;
		self.remove_if_session(provider_id.as_str(), session_id)
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	/// Point-in-time copy of all entries, sorted by provider id.
	pub fn snapshot(&self) -> Vec<SessionHandle> {
		let mut handles: Vec<_> = self.sessions.iter().map(|entry| entry.value().clone()).collect();
		handles.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
		handles
	}
}
