//! The extension connection seen as a [`SessionHost`].
//!
//! Host calls become [`RelayMessage::Command`] frames with a fresh id; the
//! matching [`ExtensionMessage::CommandResult`] resolves the waiting caller.
//! Only one extension is attached at a time. Replacing or losing it fails
//! every pending call with [`HostError::Unavailable`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use promptcast::{HostError, SessionHost};
use promptcast_protocol::{AdapterMessage, ExtensionMessage, HostCommand, HostReply, LoadState, RelayMessage, SessionId};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

type PendingReply = oneshot::Sender<Result<HostReply, HostError>>;

struct Connection {
	generation: u64,
	tx: mpsc::UnboundedSender<RelayMessage>,
}

#[derive(Default)]
struct HubState {
	extension: Option<Connection>,
	pending: HashMap<u64, PendingReply>,
	next_command_id: u64,
	next_generation: u64,
}

impl HubState {
	fn clear_extension(&mut self, reason: &str) {
		self.extension = None;
		for (_, pending) in self.pending.drain() {
			let _ = pending.send(Err(HostError::Unavailable(reason.to_string())));
		}
	}
}

pub struct RelayHub {
	state: Mutex<HubState>,
	closed_tx: broadcast::Sender<SessionId>,
	call_timeout: Duration,
}

impl RelayHub {
	pub fn new(call_timeout: Duration) -> Self {
		let (closed_tx, _) = broadcast::channel(256);
		Self {
			state: Mutex::new(HubState::default()),
			closed_tx,
			call_timeout,
		}
	}

	/// Session-closed events reported by the extension.
	pub fn subscribe_closed(&self) -> broadcast::Receiver<SessionId> {
		self.closed_tx.subscribe()
	}

	/// Attaches a new extension connection, replacing any existing one.
	/// Returns the connection generation and the frames to write to it.
	pub async fn attach(&self) -> (u64, mpsc::UnboundedReceiver<RelayMessage>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = self.state.lock().await;
		if state.extension.is_some() {
			warn!(target = "promptcast.relay", "Replacing existing extension connection");
			state.clear_extension("extension connection replaced");
		}
		state.next_generation += 1;
		let generation = state.next_generation;
		state.extension = Some(Connection { generation, tx });
		(generation, rx)
	}

	/// Detaches `generation` if it is still the current connection.
	pub async fn detach(&self, generation: u64) {
		let mut state = self.state.lock().await;
		if state.extension.as_ref().is_some_and(|conn| conn.generation == generation) {
			state.clear_extension("extension connection closed");
		}
	}

	pub async fn is_connected(&self) -> bool {
		self.state.lock().await.extension.is_some()
	}

	/// Sends a frame to the current extension without waiting for an answer.
	pub async fn push(&self, message: RelayMessage) -> bool {
		let state = self.state.lock().await;
		state.extension.as_ref().is_some_and(|conn| conn.tx.send(message).is_ok())
	}

	/// Applies an extension frame that is not an inbound request.
	pub async fn handle_frame(&self, message: ExtensionMessage) {
		match message {
			ExtensionMessage::Hello { version } => {
				info!(target = "promptcast.relay", %version, "Extension ready");
			}
			ExtensionMessage::CommandResult { id, reply } => {
				let pending = self.state.lock().await.pending.remove(&id);
				match pending {
					Some(sender) => {
						let _ = sender.send(Ok(reply));
					}
					None => warn!(target = "promptcast.relay", id, "Received result with unknown id from extension"),
				}
			}
			ExtensionMessage::SessionClosed { session_id } => {
				debug!(target = "promptcast.relay", session = %session_id, "Extension reported session closed");
				let _ = self.closed_tx.send(session_id);
			}
			ExtensionMessage::Log { level, message } => match level.as_str() {
				"error" => error!(target = "promptcast.extension", "{message}"),
				"warn" => warn!(target = "promptcast.extension", "{message}"),
				_ => debug!(target = "promptcast.extension", level, "{message}"),
			},
			ExtensionMessage::Inbound { id, .. } => {
				warn!(target = "promptcast.relay", id, "Inbound request reached the hub, ignoring");
			}
		}
	}

	async fn call(&self, command: HostCommand) -> Result<HostReply, HostError> {
		let (id, reply_rx) = {
			let mut state = self.state.lock().await;
			let tx = state
				.extension
				.as_ref()
				.map(|conn| conn.tx.clone())
				.ok_or_else(|| HostError::Unavailable("extension not connected".to_string()))?;
			state.next_command_id += 1;
			let id = state.next_command_id;
			tx.send(RelayMessage::Command { id, command })
				.map_err(|_| HostError::Unavailable("failed to send to extension".to_string()))?;
			let (reply_tx, reply_rx) = oneshot::channel();
			state.pending.insert(id, reply_tx);
			(id, reply_rx)
		};

		match tokio::time::timeout(self.call_timeout, reply_rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(HostError::Unavailable("extension connection closed".to_string())),
			Err(_) => {
				self.state.lock().await.pending.remove(&id);
				Err(HostError::Timeout(format!(
					"no answer from extension after {}ms",
					self.call_timeout.as_millis()
				)))
			}
		}
	}
}

fn unexpected(reply: HostReply) -> HostError {
	HostError::Rejected(format!("unexpected reply from extension: {reply:?}"))
}

#[async_trait]
impl SessionHost for RelayHub {
	async fn open_session(&self, locator: &str) -> Result<SessionId, HostError> {
		match self.call(HostCommand::OpenSession { url: locator.to_string() }).await? {
			HostReply::Opened { session_id } => Ok(session_id),
			HostReply::Failed { failure, message } => Err(HostError::from_failure(failure, None, message)),
			other => Err(unexpected(other)),
		}
	}

	async fn query_status(&self, session_id: SessionId) -> Result<LoadState, HostError> {
		match self.call(HostCommand::QuerySession { session_id }).await? {
			HostReply::Status { state } => Ok(state),
			HostReply::Failed { failure, message } => Err(HostError::from_failure(failure, Some(session_id), message)),
			other => Err(unexpected(other)),
		}
	}

	async fn send_to_session(&self, session_id: SessionId, message: &AdapterMessage) -> Result<(), HostError> {
		let command = HostCommand::SendToSession {
			session_id,
			message: message.clone(),
		};
		match self.call(command).await? {
			HostReply::Delivered => Ok(()),
			HostReply::Failed { failure, message } => Err(HostError::from_failure(failure, Some(session_id), message)),
			other => Err(unexpected(other)),
		}
	}

	fn name(&self) -> &str {
		"extension"
	}
}
