//! Relay server: the browser extension dials in over WebSocket and becomes
//! the session host; local clients dispatch over plain HTTP.
//!
//! Routes:
//! - `GET /` health check
//! - `GET /extension` WebSocket for the extension background worker
//! - `GET /providers` configured providers
//! - `GET /status` extension connection and live sessions
//! - `POST /dispatch` an inbound request body, answered with an inbound response

mod hub;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use promptcast::DispatchCoordinator;
use promptcast_protocol::{ExtensionMessage, InboundRequest, InboundResponse, RelayMessage};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

pub use hub::RelayHub;

use crate::router::InboundRouter;

#[derive(Clone)]
pub struct AppState {
	hub: Arc<RelayHub>,
	coordinator: Arc<DispatchCoordinator>,
	router: InboundRouter,
}

impl AppState {
	pub fn new(hub: Arc<RelayHub>, coordinator: Arc<DispatchCoordinator>) -> Self {
		let router = InboundRouter::new(coordinator.clone());
		Self {
			hub,
			coordinator,
			router,
		}
	}
}

pub fn app(state: AppState) -> Router {
	Router::new()
		.route("/", get(|| async { "OK" }))
		.route(
			"/extension",
			get(|ws: WebSocketUpgrade, State(state): State<AppState>| async move {
				ws.on_upgrade(|socket| handle_extension_socket(socket, state))
			}),
		)
		.route(
			"/providers",
			get(|State(state): State<AppState>| async move {
				Json(state.router.handle(InboundRequest::GetProviders).await)
			}),
		)
		.route("/status", get(status))
		.route(
			"/dispatch",
			post(|State(state): State<AppState>, Json(request): Json<Value>| async move {
				Json(state.router.handle_value(request).await)
			}),
		)
		.with_state(state)
}

pub async fn run_relay_server(host: &str, port: u16, state: AppState) -> Result<()> {
	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

	info!(target = "promptcast.relay", host, port, "starting relay server");

	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind relay server to {addr}"))?;

	axum::serve(listener, app(state).into_make_service())
		.await
		.context("Relay server error")
}

async fn status(State(state): State<AppState>) -> Json<Value> {
	let sessions: Vec<Value> = state
		.coordinator
		.registry()
		.snapshot()
		.into_iter()
		.map(|handle| {
			json!({
				"provider": handle.provider_id,
				"sessionId": handle.session_id,
				"state": handle.load_state,
			})
		})
		.collect();

	Json(json!({
		"extensionConnected": state.hub.is_connected().await,
		"sessions": sessions,
	}))
}

async fn handle_extension_socket(socket: WebSocket, state: AppState) {
	info!(target = "promptcast.relay", "Extension connected");

	let (generation, rx) = state.hub.attach().await;
	let mut rx_stream = UnboundedReceiverStream::new(rx);
	let (mut ws_tx, mut ws_rx) = socket.split();

	let send_task = tokio::spawn(async move {
		while let Some(frame) = rx_stream.next().await {
			let text = match serde_json::to_string(&frame) {
				Ok(text) => text,
				Err(err) => {
					warn!(target = "promptcast.relay", error = %err, "Failed encoding relay frame");
					continue;
				}
			};
			if ws_tx.send(Message::Text(text.into())).await.is_err() {
				break;
			}
		}
	});

	while let Some(msg) = ws_rx.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				if let Err(err) = handle_extension_text(&state, text.as_str()).await {
					warn!(target = "promptcast.relay", error = %err, "Failed handling extension message");
				}
			}
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(target = "promptcast.relay", error = %err, "Extension websocket error");
				break;
			}
		}
	}

	state.hub.detach(generation).await;
	send_task.abort();
	info!(target = "promptcast.relay", "Extension disconnected");
}

async fn handle_extension_text(state: &AppState, raw: &str) -> Result<()> {
	let message: ExtensionMessage = serde_json::from_str(raw).context("Parsing extension message")?;

	match message {
		ExtensionMessage::Inbound { id, request } => {
			// Dispatch waits on command results read by this same loop.
			let state = state.clone();
			tokio::spawn(async move {
				let response: InboundResponse = state.router.handle_value(request).await;
				if !state.hub.push(RelayMessage::InboundReply { id, response }).await {
					warn!(target = "promptcast.relay", id, "Extension gone before inbound reply");
				}
			});
		}
		other => state.hub.handle_frame(other).await,
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use promptcast::{DispatchOptions, ProviderSet};
	use promptcast_protocol::{HostCommand, HostReply, LoadState, ProviderDescriptor, SessionId};
	use tokio::sync::mpsc;

	use super::*;

	fn state() -> AppState {
		let hub = Arc::new(RelayHub::new(Duration::from_secs(30)));
		let providers = ProviderSet::new(vec![
			ProviderDescriptor::new("chat", "Chat", "https://chat.test"),
			ProviderDescriptor::new("mirror", "Mirror", "https://mirror.test"),
		])
		.unwrap();
		let coordinator = Arc::new(DispatchCoordinator::new(providers, hub.clone(), DispatchOptions::default()));
		AppState::new(hub, coordinator)
	}

	/// Plays the extension: answers commands over the text path and hands
	/// inbound replies back to the test.
	fn browser(state: AppState, mut rx: mpsc::UnboundedReceiver<RelayMessage>) -> mpsc::UnboundedReceiver<(u64, InboundResponse)> {
		let (replies_tx, replies_rx) = mpsc::unbounded_channel();
		tokio::spawn(async move {
			let mut next_tab = 100;
			while let Some(frame) = rx.recv().await {
				match frame {
					RelayMessage::Command { id, command } => {
						let reply = match command {
							HostCommand::OpenSession { url } if url.contains("mirror") => HostReply::Failed {
								failure: promptcast_protocol::HostFailure::Unavailable,
								message: "net::ERR_NAME_NOT_RESOLVED".into(),
							},
							HostCommand::OpenSession { .. } => {
								next_tab += 1;
								HostReply::Opened {
									session_id: SessionId(next_tab),
								}
							}
							HostCommand::QuerySession { .. } => HostReply::Status { state: LoadState::Ready },
							HostCommand::SendToSession { .. } => HostReply::Delivered,
						};
						let frame = serde_json::to_string(&json!({"kind": "command_result", "id": id, "reply": reply})).unwrap();
						handle_extension_text(&state, &frame).await.unwrap();
					}
					RelayMessage::InboundReply { id, response } => {
						let _ = replies_tx.send((id, response));
					}
				}
			}
		});
		replies_rx
	}

	#[tokio::test]
	async fn inbound_get_providers_is_answered_over_the_socket() {
		let state = state();
		let (_, rx) = state.hub.attach().await;
		let mut replies = browser(state.clone(), rx);

		handle_extension_text(&state, r#"{"kind":"inbound","id":1,"request":{"action":"getProviders"}}"#)
			.await
			.unwrap();

		let (id, response) = replies.recv().await.unwrap();
		assert_eq!(id, 1);
		assert!(matches!(response, InboundResponse::Providers { ref providers } if providers.len() == 2));
	}

	#[tokio::test]
	async fn send_to_all_through_relay_isolates_failures() {
		let state = state();
		let (_, rx) = state.hub.attach().await;
		let mut replies = browser(state.clone(), rx);

		let frame = r#"{"kind":"inbound","id":9,"request":{"action":"sendToAll","context":{"prompt":"hi"}}}"#;
		handle_extension_text(&state, frame).await.unwrap();

		let (id, response) = replies.recv().await.unwrap();
		assert_eq!(id, 9);
		let InboundResponse::Outcome(outcome) = response else {
			panic!("Expected Outcome, got {response:?}");
		};
		assert!(outcome.result_for("chat").unwrap().is_sent());
		assert_eq!(
			outcome.result_for("mirror").unwrap().code,
			Some(promptcast_protocol::ErrorCode::EndpointUnreachable)
		);
		assert_eq!(state.coordinator.registry().len(), 1);
	}

	#[tokio::test]
	async fn session_closed_frame_evicts_through_monitor() {
		let state = state();
		let monitor = state.coordinator.monitor().spawn(state.hub.subscribe_closed());
		state
			.coordinator
			.registry()
			.put(promptcast::SessionHandle::new("chat".into(), SessionId(7)));

		handle_extension_text(&state, r#"{"kind":"session_closed","sessionId":7}"#)
			.await
			.unwrap();

		for _ in 0..50 {
			if state.coordinator.registry().is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		assert!(state.coordinator.registry().is_empty());
		monitor.abort();
	}

	#[tokio::test]
	async fn garbage_frames_are_errors_not_panics() {
		let state = state();
		assert!(handle_extension_text(&state, "{not json").await.is_err());
	}
}
