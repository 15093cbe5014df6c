//! Frames exchanged between the relay and the extension background worker.
//!
//! The extension dials the relay's `/extension` WebSocket and then:
//!
//! 1. Sends [`ExtensionMessage::Hello`]
//! 2. Executes each [`RelayMessage::Command`] against `chrome.tabs` and answers
//!    with [`ExtensionMessage::CommandResult`] carrying the same `id`
//! 3. Pushes [`ExtensionMessage::SessionClosed`] whenever a tab is removed
//! 4. Forwards UI requests as [`ExtensionMessage::Inbound`], answered by
//!    [`RelayMessage::InboundReply`]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::AdapterMessage;
use crate::inbound::InboundResponse;
use crate::provider::{LoadState, SessionId};

/// Default relay port the extension connects to.
pub const RELAY_PORT: u16 = 19988;

/// Default relay host.
pub const RELAY_HOST: &str = "127.0.0.1";

/// A host capability the relay asks the extension to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum HostCommand {
	/// Open `url` in a new background tab.
	OpenSession { url: String },
	/// Report the load status of a tab.
	QuerySession {
		#[serde(rename = "sessionId")]
		session_id: SessionId,
	},
	/// Deliver `message` to the adapter in a tab.
	SendToSession {
		#[serde(rename = "sessionId")]
		session_id: SessionId,
		message: AdapterMessage,
	},
}

/// Why a host command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFailure {
	/// The addressed tab does not exist.
	NotFound,
	/// The browser could not carry out the call (e.g. could not open the URL).
	Unavailable,
	/// The call reached the tab but was refused.
	Rejected,
}

/// Result of one [`HostCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum HostReply {
	Opened {
		#[serde(rename = "sessionId")]
		session_id: SessionId,
	},
	Status { state: LoadState },
	Delivered,
	Failed { failure: HostFailure, message: String },
}

/// Message sent from the relay to the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayMessage {
	Command { id: u64, command: HostCommand },
	InboundReply { id: u64, response: InboundResponse },
}

/// Message sent from the extension to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtensionMessage {
	/// First frame after connecting.
	Hello { version: String },
	/// Answer to [`RelayMessage::Command`] with the same `id`.
	CommandResult { id: u64, reply: HostReply },
	/// A tab was closed outside the relay's control.
	SessionClosed {
		#[serde(rename = "sessionId")]
		session_id: SessionId,
	},
	/// A UI request to route; kept raw so unknown actions can be answered.
	Inbound { id: u64, request: Value },
	/// A log line from the extension.
	Log { level: String, message: String },
}
