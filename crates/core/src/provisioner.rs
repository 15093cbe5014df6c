//! Session acquisition: reuse a live registry entry or open a new session.
//!
//! The read-check-create-write sequence runs under a per-provider async lock,
//! so concurrent acquisitions for one provider open at most one session while
//! different providers provision in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use promptcast_protocol::ProviderId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ProviderSet;
use crate::error::{Error, Result};
use crate::host::{HostError, SessionHost};
use crate::registry::{SessionHandle, SessionRegistry};

/// Returns a live session for a provider, creating one when needed.
pub struct SessionProvisioner {
	host: Arc<dyn SessionHost>,
	registry: Arc<SessionRegistry>,
	providers: Arc<ProviderSet>,
	locks: DashMap<ProviderId, Arc<Mutex<()>>>,
}

impl SessionProvisioner {
	pub fn new(host: Arc<dyn SessionHost>, registry: Arc<SessionRegistry>, providers: Arc<ProviderSet>) -> Self {
		Self {
			host,
			registry,
			providers,
			locks: DashMap::new(),
		}
	}

	/// Acquires the session bound to `provider_id`.
	///
	/// A registry entry is reused only after the host confirms it still
	/// resolves; a stale entry is evicted and replaced, and the caller never
	/// sees the staleness.
	///
	/// # Errors
	///
	/// - [`Error::UnknownProvider`] if `provider_id` is not configured
	/// - [`Error::EndpointUnreachable`] if a new session cannot be opened
	/// - [`Error::HostUnavailable`] if the host cannot say whether the bound
	///   session still exists; the entry is kept
	pub async fn acquire(&self, provider_id: &str) -> Result<SessionHandle> {
		let provider = self
			.providers
			.get(provider_id)
			.ok_or_else(|| Error::UnknownProvider(provider_id.into()))?;

		let lock = self.lock_for(&provider.id);
		let _guard = lock.lock().await;

		if let Some(existing) = self.registry.get(provider_id) {
			match self.host.query_status(existing.session_id).await {
				Ok(state) => {
					debug!(
						target = "promptcast.session",
						provider = %provider.id,
						session = %existing.session_id,
						%state,
						"reusing session"
					);
					self.registry.set_load_state(provider_id, existing.session_id, state);
					return Ok(SessionHandle {
						load_state: state,
						..existing
					});
				}
				Err(HostError::NotFound(_)) => {
					debug!(
						target = "promptcast.session",
						provider = %provider.id,
						session = %existing.session_id,
						"stale session, replacing"
					);
					self.registry.remove_if_session(provider_id, existing.session_id);
				}
				Err(err) => {
					// The tab may still be alive; opening another would orphan it.
					warn!(
						target = "promptcast.session",
						provider = %provider.id,
						session = %existing.session_id,
						error = %err,
						"could not verify session, keeping it"
					);
					return Err(Error::HostUnavailable {
						session_id: existing.session_id,
						reason: err.to_string(),
					});
				}
			}
		}

		let session_id = self
			.host
			.open_session(&provider.endpoint)
			.await
			.map_err(|err| Error::EndpointUnreachable {
				provider: provider.id.clone(),
				reason: err.to_string(),
			})?;

		let handle = SessionHandle::new(provider.id.clone(), session_id);
		self.registry.put(handle.clone());
		info!(
			target = "promptcast.session",
			provider = %provider.id,
			session = %session_id,
			host = self.host.name(),
			"opened session for {}",
			provider.display_name
		);
		Ok(handle)
	}

	fn lock_for(&self, provider_id: &ProviderId) -> Arc<Mutex<()>> {
		self.locks
			.entry(provider_id.clone())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}
