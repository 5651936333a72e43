use wasm_bindgen::JsValue;

/// Get the current protocol (ws or wss) based on the page protocol
pub fn get_ws_protocol() -> String {
    let location = web_sys::window()
        .and_then(|w| w.location().protocol().ok())
        .unwrap_or_else(|| "http:".to_string());

    if location == "https:" {
        "wss:".to_string()
    } else {
        "ws:".to_string()
    }
}

/// Get the current host
pub fn get_host() -> Result<String, JsValue> {
    web_sys::window()
        .and_then(|w| w.location().host().ok())
        .ok_or_else(|| JsValue::from_str("Failed to get host"))
}

/// Build the terminal WebSocket URL for a session
pub fn build_ws_url(session_id: &str) -> Result<String, JsValue> {
    let protocol = get_ws_protocol();
    let host = get_host()?;
    Ok(terminal_ws_url(&protocol, &host, session_id))
}

pub fn terminal_ws_url(protocol: &str, host: &str, session_id: &str) -> String {
    format!("{}//{}/ws/terminal/{}", protocol, host, session_id)
}

/// `navigator.platform`, empty when unavailable
pub fn navigator_platform() -> String {
    web_sys::window()
        .and_then(|w| w.navigator().platform().ok())
        .unwrap_or_default()
}

/// Format a JS error value for logs and notices
pub fn js_error(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}
