use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::{Function, Reflect};
use promptcast_protocol::{
    ErrorCode, ExtensionMessage, HostCommand, HostFailure, HostReply, InboundResponse, LoadState,
    RelayMessage, SessionId, RELAY_HOST, RELAY_PORT,
};
use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

const LOG_LIMIT: usize = 40;

thread_local! {
    static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static WS: RefCell<Option<Rc<WebSocket>>> = RefCell::new(None);
    // sendResponse callbacks of UI messages waiting on the relay, by inbound id.
    static WAITING: RefCell<HashMap<u64, Function>> = RefCell::new(HashMap::new());
    static NEXT_INBOUND: Cell<u64> = Cell::new(1);
}

fn relay_url() -> String {
    format!("ws://{RELAY_HOST}:{RELAY_PORT}/extension")
}

#[wasm_bindgen(start)]
pub async fn start() {
    console_error_panic_hook::set_once();
    set_status(RelayStatus::Connecting, "promptcast (connecting)");

    install_ui_listener();
    install_tab_listener();

    if let Err(err) = init() {
        let message = stringify_js_error(err);
        set_status(RelayStatus::Error, &message);
        push_log(&format!("init failed: {message}"));
    }
}

fn init() -> Result<(), JsValue> {
    let ws = WebSocket::new(&relay_url())?;
    let ws_rc = Rc::new(ws);
    WS.with(|w| *w.borrow_mut() = Some(ws_rc.clone()));

    // Relay frames
    {
        let ws_inner = ws_rc.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let ws_clone = ws_inner.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = handle_message(event, ws_clone).await {
                    push_log(&format!("relay frame failed: {}", stringify_js_error(err)));
                }
            });
        });
        ws_rc.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    // Connection handlers
    {
        let ws_inner = ws_rc.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || {
            let hello = ExtensionMessage::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            };
            let _ = send_json(&ws_inner, &hello);
            set_status(RelayStatus::Connected, "promptcast relay connected");
            push_log("connected");
        });
        ws_rc.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let onerror = Closure::<dyn FnMut(ErrorEvent)>::new(|e: ErrorEvent| {
            set_status(RelayStatus::Error, &e.message());
        });
        ws_rc.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(|_| {
            set_status(RelayStatus::Disconnected, "relay disconnected");
            WS.with(|w| *w.borrow_mut() = None);
            fail_waiting("relay disconnected");
        });
        ws_rc.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    Ok(())
}

/// Forwards `chrome.tabs.onRemoved` as session-closed events.
fn install_tab_listener() {
    let on_removed = Closure::<dyn FnMut(JsValue, JsValue)>::new(|tab_id: JsValue, _info: JsValue| {
        let Some(tab_id) = tab_id.as_f64() else {
            return;
        };
        let closed = ExtensionMessage::SessionClosed {
            session_id: SessionId(tab_id as u64),
        };
        if let Some(ws) = current_ws() {
            let _ = send_json(&ws, &closed);
        }
    });
    tabs_on_removed_add_listener(&on_removed);
    on_removed.forget();
}

/// Forwards popup/content `chrome.runtime.onMessage` requests to the relay.
///
/// Returns `true` so Chrome keeps `sendResponse` alive until the relay answers.
fn install_ui_listener() {
    let on_message = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>::new(
        |message: JsValue, _sender: JsValue, send_response: JsValue| {
            let Ok(send_response) = send_response.dyn_into::<Function>() else {
                return JsValue::FALSE;
            };
            let request: serde_json::Value = match serde_wasm_bindgen::from_value(message) {
                Ok(request) => request,
                Err(err) => {
                    respond(&send_response, &InboundResponse::error(ErrorCode::InvalidRequest, err.to_string()));
                    return JsValue::FALSE;
                }
            };

            let Some(ws) = current_ws() else {
                respond(&send_response, &InboundResponse::error(ErrorCode::Internal, "relay not connected"));
                return JsValue::FALSE;
            };

            let id = NEXT_INBOUND.with(|next| {
                let id = next.get();
                next.set(id + 1);
                id
            });
            WAITING.with(|w| w.borrow_mut().insert(id, send_response));

            if let Err(err) = send_json(&ws, &ExtensionMessage::Inbound { id, request }) {
                if let Some(callback) = WAITING.with(|w| w.borrow_mut().remove(&id)) {
                    respond(&callback, &InboundResponse::error(ErrorCode::Internal, stringify_js_error(err)));
                }
                return JsValue::FALSE;
            }
            JsValue::TRUE
        },
    );
    runtime_on_message_add_listener(&on_message);
    on_message.forget();
}

async fn handle_message(event: MessageEvent, ws: Rc<WebSocket>) -> Result<(), JsValue> {
    let text = event.data().as_string().ok_or("no text")?;
    let frame: RelayMessage = serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match frame {
        RelayMessage::Command { id, command } => {
            let reply = execute(command).await;
            send_json(&ws, &ExtensionMessage::CommandResult { id, reply })
        }
        RelayMessage::InboundReply { id, response } => {
            if let Some(callback) = WAITING.with(|w| w.borrow_mut().remove(&id)) {
                respond(&callback, &response);
            }
            Ok(())
        }
    }
}

async fn execute(command: HostCommand) -> HostReply {
    match command {
        HostCommand::OpenSession { url } => match open_background_tab(&url).await {
            Ok(tab_id) => {
                push_log(&format!("opened tab {tab_id}: {url}"));
                HostReply::Opened {
                    session_id: SessionId(tab_id as u64),
                }
            }
            Err(err) => failed(HostFailure::Unavailable, err),
        },
        HostCommand::QuerySession { session_id } => match tab_status(session_id).await {
            Ok(state) => HostReply::Status { state },
            Err(err) => failed(HostFailure::NotFound, err),
        },
        HostCommand::SendToSession { session_id, message } => {
            let payload = match to_js(&message) {
                Ok(payload) => payload,
                Err(err) => return failed(HostFailure::Rejected, JsValue::from_str(&err.to_string())),
            };
            match JsFuture::from(tabs_send_message(session_id.0 as f64, &payload)).await {
                Ok(_) => HostReply::Delivered,
                Err(err) => {
                    let message = stringify_js_error(err);
                    push_log(&format!("send to tab {session_id} failed: {message}"));
                    let failure = if message.contains("No tab with id") {
                        HostFailure::NotFound
                    } else {
                        HostFailure::Rejected
                    };
                    HostReply::Failed { failure, message }
                }
            }
        }
    }
}

async fn open_background_tab(url: &str) -> Result<i32, JsValue> {
    // Never steal focus from the page the user is on.
    let props = to_js(&json!({ "url": url, "active": false }))?;
    let tab = JsFuture::from(tabs_create(&props)).await?;
    let id = Reflect::get(&tab, &JsValue::from_str("id"))?
        .as_f64()
        .ok_or("no tab id")?;
    Ok(id as i32)
}

async fn tab_status(session_id: SessionId) -> Result<LoadState, JsValue> {
    let tab = JsFuture::from(tabs_get(session_id.0 as f64)).await?;
    let status = Reflect::get(&tab, &JsValue::from_str("status"))?
        .as_string()
        .unwrap_or_default();
    Ok(LoadState::from_tab_status(&status))
}

fn failed(failure: HostFailure, err: JsValue) -> HostReply {
    HostReply::Failed {
        failure,
        message: stringify_js_error(err),
    }
}

fn respond(callback: &Function, response: &InboundResponse) {
    match to_js(response) {
        Ok(value) => {
            let _ = callback.call1(&JsValue::NULL, &value);
        }
        Err(err) => push_log(&format!("encoding UI response failed: {err}")),
    }
}

fn fail_waiting(reason: &str) {
    let waiting: Vec<Function> = WAITING.with(|w| w.borrow_mut().drain().map(|(_, f)| f).collect());
    for callback in waiting {
        respond(&callback, &InboundResponse::error(ErrorCode::Internal, reason));
    }
}

fn current_ws() -> Option<Rc<WebSocket>> {
    WS.with(|w| w.borrow().clone())
        .filter(|ws| ws.ready_state() == WebSocket::OPEN)
}

fn send_json<T: Serialize>(ws: &WebSocket, value: &T) -> Result<(), JsValue> {
    ws.send_with_str(&serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?)
}

fn stringify_js_error(err: JsValue) -> String {
    err.as_string()
        .or_else(|| {
            Reflect::get(&err, &JsValue::from_str("message"))
                .ok()?
                .as_string()
        })
        .or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

/// Connection state shown on the toolbar badge.
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum RelayStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl RelayStatus {
    fn badge(self) -> (&'static str, [u8; 4]) {
        match self {
            RelayStatus::Connecting => ("...", [160, 160, 160, 255]),
            RelayStatus::Connected => ("ON", [30, 170, 80, 255]),
            RelayStatus::Disconnected => ("OFF", [120, 120, 120, 255]),
            RelayStatus::Error => ("ERR", [200, 40, 40, 255]),
        }
    }
}

fn set_status(status: RelayStatus, title: &str) {
    let (text, color) = status.badge();
    if let Ok(details) = to_js(&json!({ "text": text })) {
        action_set_badge_text(&details);
    }
    if let Ok(details) = to_js(&json!({ "color": color })) {
        action_set_badge_background_color(&details);
    }
    if let Ok(details) = to_js(&json!({ "title": title })) {
        action_set_title(&details);
    }
    store(json!({ "promptcast_state": { "status": status, "message": title } }));
}

/// Keeps the last [`LOG_LIMIT`] lines in storage and mirrors them to the relay.
fn push_log(line: &str) {
    if let Some(ws) = current_ws() {
        let frame = ExtensionMessage::Log {
            level: "info".to_string(),
            message: line.to_string(),
        };
        let _ = send_json(&ws, &frame);
    }
    let lines = LOG.with(|log| {
        let mut lines = log.borrow_mut();
        lines.push(line.to_string());
        let overflow = lines.len().saturating_sub(LOG_LIMIT);
        lines.drain(..overflow);
        lines.clone()
    });
    store(json!({ "promptcast_log": lines }));
}

fn store(items: serde_json::Value) {
    if let Ok(items) = to_js(&items) {
        let _ = storage_local_set(&items);
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(props: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get)]
    fn tabs_get(tab_id: f64) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    fn tabs_send_message(tab_id: f64, message: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onRemoved"], js_name = addListener)]
    fn tabs_on_removed_add_listener(cb: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn runtime_on_message_add_listener(cb: &Closure<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setBadgeText)]
    fn action_set_badge_text(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setBadgeBackgroundColor)]
    fn action_set_badge_background_color(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setTitle)]
    fn action_set_title(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_local_set(items: &JsValue) -> js_sys::Promise;
}
