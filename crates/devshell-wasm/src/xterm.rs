use devshell_mux::types::Geometry;
use devshell_mux::{InputHandler, MuxError, RenderingSurface, Result, SurfaceFactory};
use serde_json::json;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement};

use crate::{dom, utils};

// xterm.js and its fit addon, loaded by the page as globals
#[wasm_bindgen]
extern "C" {
    pub type Terminal;

    #[wasm_bindgen(constructor, catch)]
    fn new(options: &JsValue) -> std::result::Result<Terminal, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn open(this: &Terminal, parent: &HtmlElement) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn write(this: &Terminal, data: &str);

    #[wasm_bindgen(method)]
    fn focus(this: &Terminal);

    #[wasm_bindgen(method)]
    fn dispose(this: &Terminal);

    #[wasm_bindgen(method, js_name = loadAddon)]
    fn load_addon(this: &Terminal, addon: &FitAddon);

    #[wasm_bindgen(method, js_name = onData)]
    fn on_data(this: &Terminal, callback: &Closure<dyn FnMut(String)>) -> Disposable;

    #[wasm_bindgen(method, getter)]
    fn cols(this: &Terminal) -> u16;

    #[wasm_bindgen(method, getter)]
    fn rows(this: &Terminal) -> u16;

    pub type Disposable;

    #[wasm_bindgen(method, js_name = dispose)]
    fn dispose_listener(this: &Disposable);

    #[wasm_bindgen(js_namespace = FitAddon)]
    pub type FitAddon;

    #[wasm_bindgen(method, catch)]
    fn fit(this: &FitAddon) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = proposeDimensions)]
    fn propose_dimensions(this: &FitAddon) -> JsValue;
}

// Kept in its own extern block: wasm-bindgen would otherwise treat the
// `FitAddon` namespace as the `FitAddon` type and nest the constructor impl.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(constructor, catch, js_namespace = FitAddon)]
    fn new() -> std::result::Result<FitAddon, JsValue>;
}

fn terminal_options(compact: bool) -> serde_json::Value {
    json!({
        "cursorBlink": true,
        "convertEol": true,
        "fontSize": if compact { 16 } else { 14 },
        "fontFamily": "'JetBrains Mono', 'Consolas', monospace",
        "theme": {
            "background": "#000000",
            "foreground": "#FAFAF9",
            "cursor": "#FF9B4E",
            "cursorAccent": "#000000",
            "selectionBackground": "rgba(255, 155, 78, 0.3)",
            "red": "#EF4444",
            "green": "#FCD34D",
            "yellow": "#FBBF24",
            "blue": "#00d9ff",
            "magenta": "#ff00a0",
            "cyan": "#00d9ff",
            "white": "#E7E5E4",
            "brightBlack": "#78716C"
        }
    })
}

/// True when the proposed dimensions describe a laid-out container
fn has_layout(dimensions: &JsValue) -> bool {
    if dimensions.is_undefined() || dimensions.is_null() {
        return false;
    }
    ["cols", "rows"].iter().all(|key| {
        js_sys::Reflect::get(dimensions, &JsValue::from_str(key))
            .ok()
            .and_then(|v| v.as_f64())
            .map(|n| n.is_finite() && n >= 1.0)
            .unwrap_or(false)
    })
}

/// An xterm.js terminal mounted in its own panel under `#terminalPanels`
pub struct XtermSurface {
    term: Terminal,
    fit_addon: FitAddon,
    panel: Element,
    input: Option<(Closure<dyn FnMut(String)>, Disposable)>,
}

impl RenderingSurface for XtermSurface {
    fn write(&mut self, data: &str) {
        self.term.write(data);
    }

    fn fit(&mut self) -> Option<Geometry> {
        if !has_layout(&self.fit_addon.propose_dimensions()) {
            return None;
        }
        if let Err(e) = self.fit_addon.fit() {
            log::warn!("Terminal fit failed: {}", utils::js_error(&e));
            return None;
        }
        let geometry = Geometry::new(self.term.cols(), self.term.rows());
        (!geometry.is_empty()).then_some(geometry)
    }

    fn focus(&mut self) {
        self.term.focus();
    }

    fn dispose(&mut self) {
        if let Some((_, listener)) = self.input.take() {
            listener.dispose_listener();
        }
        self.term.dispose();
        self.panel.remove();
    }

    fn on_local_input(&mut self, mut handler: InputHandler) {
        let closure = Closure::wrap(Box::new(move |data: String| handler(data)) as Box<dyn FnMut(String)>);
        let listener = self.term.on_data(&closure);
        if let Some((_, previous)) = self.input.replace((closure, listener)) {
            previous.dispose_listener();
        }
    }
}

/// Creates terminal panels inside the page's panel container
pub struct XtermSurfaces {
    document: Document,
    container: Element,
}

impl XtermSurfaces {
    pub fn new(document: &Document) -> std::result::Result<Self, JsValue> {
        Ok(Self {
            document: document.clone(),
            container: dom::get_element_by_id(document, "terminalPanels")?,
        })
    }

    /// Nothing is attached to the page until the terminal exists, so a
    /// failed mount leaves no orphaned panel behind
    fn mount(&self, session_id: &str) -> std::result::Result<XtermSurface, JsValue> {
        let compact = crate::window()?
            .inner_width()?
            .as_f64()
            .map(|w| w <= 768.0)
            .unwrap_or(false);
        let options = js_sys::JSON::parse(&terminal_options(compact).to_string())?;

        let panel = dom::create_element_with_class(&self.document, "div", "terminal-panel")?;
        panel.set_id(&format!("panel-{}", session_id));
        let inner = dom::create_element_with_class(&self.document, "div", "terminal-container-inner")?;
        inner.set_id(&format!("terminal-{}", session_id));
        panel.append_child(&inner)?;
        let inner = inner.dyn_into::<HtmlElement>()?;

        let term = Terminal::new(&options)?;
        let fit_addon = match FitAddon::new() {
            Ok(fit_addon) => fit_addon,
            Err(e) => {
                term.dispose();
                return Err(e);
            }
        };
        term.load_addon(&fit_addon);

        if let Err(e) = self.container.append_child(&panel) {
            term.dispose();
            return Err(e);
        }
        if let Err(e) = term.open(&inner) {
            term.dispose();
            panel.remove();
            return Err(e);
        }

        Ok(XtermSurface {
            term,
            fit_addon,
            panel,
            input: None,
        })
    }
}

impl SurfaceFactory for XtermSurfaces {
    fn create(&mut self, session_id: &str) -> Result<Box<dyn RenderingSurface>> {
        let surface = self
            .mount(session_id)
            .map_err(|e| MuxError::Surface(utils::js_error(&e)))?;
        Ok(Box::new(surface))
    }
}
