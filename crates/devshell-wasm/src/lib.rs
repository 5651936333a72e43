use wasm_bindgen::prelude::*;
use web_sys::{Document, Window};

mod api;
mod app;
mod dom;
mod storage;
mod timers;
mod utils;
mod view;
mod websocket;
mod xterm;

/// Initialize the WASM application
/// This sets up panic hooks and logging
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    wasm_logger::init(wasm_logger::Config::default());

    log::info!("devshell WASM initialized");
}

/// Initialize the terminal workspace page
#[wasm_bindgen]
pub async fn init_terminals() -> Result<(), JsValue> {
    log::info!("Initializing terminal workspace");
    app::TerminalApp::new()?.start().await
}

/// Get the window object
fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))
}

/// Get the document object
fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("No document object"))
}
