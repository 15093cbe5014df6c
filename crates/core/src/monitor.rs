//! Evicts registry entries when their sessions close outside our control.

use std::sync::Arc;

use promptcast_protocol::{ProviderId, SessionId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;

/// Subscribes to session-closed notifications and keeps the registry honest.
#[derive(Debug, Clone)]
pub struct LifecycleMonitor {
	registry: Arc<SessionRegistry>,
}

impl LifecycleMonitor {
	pub fn new(registry: Arc<SessionRegistry>) -> Self {
		Self { registry }
	}

	/// Handles one close notification. Duplicate or late notifications are no-ops.
	pub fn on_session_closed(&self, session_id: SessionId) -> Option<ProviderId> {
		match self.registry.evict_session(session_id) {
			Some(handle) => {
				info!(
					target = "promptcast.monitor",
					provider = %handle.provider_id,
					session = %session_id,
					"session closed, evicted"
				);
				Some(handle.provider_id)
			}
			None => {
				debug!(target = "promptcast.monitor", session = %session_id, "close for untracked session");
				None
			}
		}
	}

	/// Drains `closed` until the sender side goes away.
	pub fn spawn(self, mut closed: broadcast::Receiver<SessionId>) -> JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				match closed.recv().await {
					Ok(session_id) => {
						self.on_session_closed(session_id);
					}
					Err(RecvError::Lagged(skipped)) => {
						// Missed evictions are caught by the provisioner's re-validation.
						warn!(target = "promptcast.monitor", skipped, "close notifications dropped");
					}
					Err(RecvError::Closed) => break,
				}
			}
			debug!(target = "promptcast.monitor", "close stream ended");
		})
	}
}
