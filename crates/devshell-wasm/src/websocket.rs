use devshell_mux::{Channel, ChannelEvent, ChannelEvents, Connector, MuxError, Result};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use crate::utils;

/// Opens one browser WebSocket per transport at `/ws/terminal/{id}`
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&mut self, session_id: &str, events: ChannelEvents) -> Result<Box<dyn Channel>> {
        let url = utils::build_ws_url(session_id)
            .map_err(|e| MuxError::Channel(utils::js_error(&e)))?;
        log::info!("Connecting to {}", url);

        let ws = WebSocket::new(&url)
            .map_err(|e| MuxError::Channel(format!("Failed to create WebSocket: {}", utils::js_error(&e))))?;
        Ok(Box::new(WebSocketChannel::attach(ws, events)))
    }
}

/// A WebSocket plus the handlers feeding its events to the multiplexer.
///
/// The handlers live as long as the channel. They are detached from the
/// socket before it is closed or dropped so the browser never calls a freed
/// closure.
pub struct WebSocketChannel {
    ws: WebSocket,
    _onopen: Closure<dyn FnMut(Event)>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
}

impl WebSocketChannel {
    fn attach(ws: WebSocket, events: ChannelEvents) -> Self {
        let on_open = events.clone();
        let onopen = Closure::wrap(Box::new(move |_: Event| {
            log::info!("WebSocket connected for session {}", on_open.session_id());
            on_open.emit(ChannelEvent::Opened);
        }) as Box<dyn FnMut(_)>);

        let on_message = events.clone();
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => on_message.emit(ChannelEvent::Message(text)),
                None => log::warn!(
                    "Ignoring non-text frame on session {}",
                    on_message.session_id()
                ),
            }
        }) as Box<dyn FnMut(_)>);

        let on_close = events.clone();
        let onclose = Closure::wrap(Box::new(move |event: CloseEvent| {
            log::info!(
                "WebSocket closed for session {} (code {})",
                on_close.session_id(),
                event.code()
            );
            on_close.emit(ChannelEvent::Closed);
        }) as Box<dyn FnMut(_)>);

        let on_error = events;
        let onerror = Closure::wrap(Box::new(move |_: Event| {
            log::error!("WebSocket error on session {}", on_error.session_id());
            on_error.emit(ChannelEvent::Errored("WebSocket error".to_string()));
        }) as Box<dyn FnMut(_)>);

        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        Self {
            ws,
            _onopen: onopen,
            _onmessage: onmessage,
            _onclose: onclose,
            _onerror: onerror,
        }
    }

    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
    }
}

impl Channel for WebSocketChannel {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.ws
            .send_with_str(text)
            .map_err(|e| MuxError::Channel(format!("Send failed: {}", utils::js_error(&e))))
    }

    fn close(&mut self) {
        self.detach();
        if let Err(e) = self.ws.close() {
            log::warn!("Failed to close WebSocket: {}", utils::js_error(&e));
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.detach();
    }
}
