use devshell_mux::types::Session;
use devshell_mux::{MuxView, Notice, Overlays, TabInfo};
use futures::channel::mpsc::UnboundedSender;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::JsValue;
use web_sys::{Document, Element};

use crate::app::Action;
use crate::{dom, utils};

const TOAST_MILLIS: u32 = 5000;

/// Renders multiplexer state into the page.
///
/// Controls created here never call the multiplexer directly; they post an
/// `Action` that the app dispatches once the current event has finished.
pub struct DomView {
    document: Document,
    actions: UnboundedSender<Action>,
}

impl DomView {
    pub fn new(document: Document, actions: UnboundedSender<Action>) -> Self {
        Self { document, actions }
    }

    fn on_click(&self, element: &Element, action: Action) -> Result<(), JsValue> {
        let actions = self.actions.clone();
        dom::add_click_listener(element, move |event| {
            event.stop_propagation();
            let _ = actions.unbounded_send(action.clone());
        })
    }

    fn render_tab(&self, tab: &TabInfo) -> Result<(), JsValue> {
        if let Some(placeholder) = self.document.get_element_by_id("tabPlaceholder") {
            placeholder.remove();
        }

        let element = dom::create_element_with_class(&self.document, "div", "tab")?;
        element.set_attribute("data-session-id", &tab.session_id)?;

        let label = dom::create_text_element(&self.document, "span", "tab-label", &tab.label)?;
        label.set_attribute("title", &tab.title)?;

        let close = dom::create_text_element(&self.document, "button", "tab-close", "×")?;
        close.set_attribute("aria-label", "Close tab")?;
        self.on_click(&close, Action::Close(tab.session_id.clone()))?;
        self.on_click(&element, Action::Focus(tab.session_id.clone()))?;

        element.append_child(&label)?;
        element.append_child(&close)?;
        dom::get_element_by_id(&self.document, "tabsScroll")?.append_child(&element)?;
        Ok(())
    }

    fn mark_active(&self, session_id: &str) -> Result<(), JsValue> {
        for selector in [".tab", ".session-card"] {
            for element in dom::query_all(&self.document, selector)? {
                let matches = element.get_attribute("data-session-id").as_deref() == Some(session_id);
                dom::set_class(&element, "active", matches);
            }
        }

        let panel_id = format!("panel-{}", session_id);
        for panel in dom::query_all(&self.document, ".terminal-panel")? {
            dom::set_class(&panel, "active", panel.id() == panel_id);
        }
        Ok(())
    }

    fn remove_tab(&self, session_id: &str) -> Result<(), JsValue> {
        for tab in dom::query_all(&self.document, ".tab")? {
            if tab.get_attribute("data-session-id").as_deref() == Some(session_id) {
                tab.remove();
            }
        }
        Ok(())
    }

    fn render_placeholder(&self) -> Result<(), JsValue> {
        if self.document.get_element_by_id("tabPlaceholder").is_some() {
            return Ok(());
        }
        let placeholder = dom::create_element_with_class(&self.document, "div", "tab-placeholder")?;
        placeholder.set_id("tabPlaceholder");
        placeholder.append_child(&dom::create_text_element(&self.document, "p", "", "No terminals open")?.into())?;
        placeholder.append_child(&dom::create_text_element(
            &self.document,
            "p",
            "hint",
            "Tap the + button to create a session",
        )?.into())?;
        dom::get_element_by_id(&self.document, "tabsScroll")?.append_child(&placeholder)?;
        Ok(())
    }

    fn render_sessions(&self, sessions: &[Session], active: Option<&str>) -> Result<(), JsValue> {
        let container = dom::get_element_by_id(&self.document, "sessionsList")?;
        dom::clear_element(&container);

        let running: Vec<&Session> = sessions.iter().filter(|s| s.is_running()).collect();
        if running.is_empty() {
            let empty = dom::create_text_element(&self.document, "div", "sessions-empty", "No active sessions")?;
            container.append_child(&empty)?;
            return Ok(());
        }

        for session in running {
            let card = self.session_card(session, active == Some(session.id.as_str()))?;
            container.append_child(&card)?;
        }
        Ok(())
    }

    fn session_card(&self, session: &Session, active: bool) -> Result<Element, JsValue> {
        let card = dom::create_element_with_class(&self.document, "div", "session-card")?;
        card.set_attribute("data-session-id", &session.id)?;
        dom::set_class(&card, "active", active);

        let pid = session
            .pid
            .map(|pid| format!("PID: {}", pid))
            .unwrap_or_else(|| "PID: N/A".to_string());

        let info = dom::create_element_with_class(&self.document, "div", "session-info")?;
        for (class, text) in [
            ("session-id", session.short_id()),
            ("session-details", session.shell_name().to_string()),
            ("session-details", session.cwd.clone().unwrap_or_else(|| "~".to_string())),
            ("session-details", format!("{} • {}", session.status, pid)),
        ] {
            info.append_child(&dom::create_text_element(&self.document, "div", class, &text)?.into())?;
        }

        let actions = dom::create_element_with_class(&self.document, "div", "session-actions")?;
        let open = dom::create_text_element(&self.document, "button", "btn btn-sm btn-primary", "Open")?;
        self.on_click(&open, Action::Open(session.id.clone()))?;

        let kill = dom::create_text_element(&self.document, "button", "btn btn-sm btn-danger", "Kill")?;
        let sender = self.actions.clone();
        let id = session.id.clone();
        let prompt = format!("Kill terminal {}?", session.short_id());
        dom::add_click_listener(&kill, move |event| {
            event.stop_propagation();
            let confirmed = crate::window()
                .and_then(|w| w.confirm_with_message(&prompt))
                .unwrap_or(false);
            if confirmed {
                let _ = sender.unbounded_send(Action::Kill(id.clone()));
            }
        })?;

        actions.append_child(&open)?;
        actions.append_child(&kill)?;
        card.append_child(&info)?;
        card.append_child(&actions)?;
        Ok(card)
    }

    fn render_overlays(&self, overlays: Overlays) -> Result<(), JsValue> {
        if let Some(palette) = self.document.get_element_by_id("commandPalette") {
            dom::set_class(&palette, "active", overlays.command_palette);
            if let Ok(input) = dom::get_input_by_id(&self.document, "commandPaletteInput") {
                if overlays.command_palette {
                    input.focus()?;
                } else {
                    input.set_value("");
                }
            }
        }

        if let Some(modal) = self.document.get_element_by_id("newSessionModal") {
            dom::set_class(&modal, "active", overlays.new_session);
            if overlays.new_session {
                dom::get_html_element_by_id(&self.document, "newSessionCwd")?.focus()?;
            } else {
                for id in ["newSessionCwd", "newSessionShell"] {
                    if let Ok(input) = dom::get_input_by_id(&self.document, id) {
                        input.set_value("");
                    }
                }
            }
        }
        Ok(())
    }

    fn show_toast(&self, notice: &Notice) -> Result<(), JsValue> {
        let Some(container) = self.document.get_element_by_id("toastContainer") else {
            log::debug!("No toast container for {:?}", notice);
            return Ok(());
        };

        let (kind, title, message) = match notice {
            Notice::Info(message) => ("info", "Info", message),
            Notice::Error(message) => ("error", "Error", message),
        };

        let toast = dom::create_element_with_class(&self.document, "div", &format!("toast {}", kind))?;
        let content = dom::create_element_with_class(&self.document, "div", "toast-content")?;
        content.append_child(&dom::create_text_element(&self.document, "div", "toast-title", title)?.into())?;
        content.append_child(&dom::create_text_element(&self.document, "div", "toast-message", message)?.into())?;

        let close = dom::create_text_element(&self.document, "button", "toast-close", "×")?;
        close.set_attribute("aria-label", "Close")?;
        let dismissed = toast.clone();
        dom::add_click_listener(&close, move |_| dismissed.remove())?;

        toast.append_child(&content)?;
        toast.append_child(&close)?;
        container.append_child(&toast)?;

        wasm_bindgen_futures::spawn_local(async move {
            TimeoutFuture::new(TOAST_MILLIS).await;
            toast.remove();
        });
        Ok(())
    }
}

fn report(what: &str, result: Result<(), JsValue>) {
    if let Err(e) = result {
        log::error!("Failed to {}: {}", what, utils::js_error(&e));
    }
}

impl MuxView for DomView {
    fn tab_opened(&self, tab: &TabInfo) {
        report("render tab", self.render_tab(tab));
    }

    fn tab_activated(&self, session_id: &str) {
        report("mark active tab", self.mark_active(session_id));
    }

    fn tab_closed(&self, session_id: &str) {
        report("remove tab", self.remove_tab(session_id));
    }

    fn show_placeholder(&self) {
        report("show placeholder", self.render_placeholder());
    }

    fn sessions_updated(&self, sessions: &[Session], active: Option<&str>) {
        report("render sessions", self.render_sessions(sessions, active));
    }

    fn overlays_changed(&self, overlays: Overlays) {
        report("update overlays", self.render_overlays(overlays));
    }

    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Info(message) => log::info!("{}", message),
            Notice::Error(message) => log::error!("{}", message),
        }
        report("show notification", self.show_toast(&notice));
    }
}

