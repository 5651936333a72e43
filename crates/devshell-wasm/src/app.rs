use std::rc::Rc;

use devshell_mux::types::{AiTool, SessionId};
use devshell_mux::{
    load_preferences, save_tool_commands, KeyChord, Multiplexer, MuxConfig, MuxServices, Notice,
    Platform, VirtualKey,
};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, KeyboardEvent, TouchEvent};

use crate::api::HttpSessionApi;
use crate::storage::LocalStore;
use crate::timers::BrowserScheduler;
use crate::view::DomView;
use crate::websocket::WebSocketConnector;
use crate::xterm::XtermSurfaces;
use crate::{dom, utils};

/// User intent posted by page controls and handled after the originating
/// event returns
#[derive(Debug, Clone)]
pub enum Action {
    Open(SessionId),
    Focus(SessionId),
    Close(SessionId),
    Kill(SessionId),
    Refresh,
    CreateSession {
        cwd: Option<String>,
        shell: Option<String>,
    },
    QuickLaunch {
        path: String,
        tool: Option<AiTool>,
    },
    VirtualKey(VirtualKey),
    NewSessionDialog(bool),
    CommandPalette(bool),
    SaveToolCommands(Vec<(AiTool, String)>),
}

/// Settings inputs holding the AI tool commands
const TOOL_COMMAND_INPUTS: [(AiTool, &str); 3] = [
    (AiTool::Claude, "claudeCommand"),
    (AiTool::Codex, "codexCommand"),
    (AiTool::Gemini, "geminiCommand"),
];

pub struct TerminalApp {
    document: Document,
    mux: Multiplexer,
    store: LocalStore,
    actions: UnboundedSender<Action>,
    inbox: UnboundedReceiver<Action>,
}

impl TerminalApp {
    pub fn new() -> Result<Self, JsValue> {
        let document = crate::document()?;
        let config = read_config(&document)?;
        let store = LocalStore::open()?;
        let (actions, inbox) = mpsc::unbounded();

        let mux = Multiplexer::new(
            config,
            MuxServices {
                api: Rc::new(HttpSessionApi::new()),
                connector: Box::new(WebSocketConnector),
                surfaces: Box::new(XtermSurfaces::new(&document)?),
                scheduler: Rc::new(BrowserScheduler),
                view: Rc::new(DomView::new(document.clone(), actions.clone())),
            },
        );

        Ok(Self {
            document,
            mux,
            store,
            actions,
            inbox,
        })
    }

    pub async fn start(self) -> Result<(), JsValue> {
        self.setup_viewport()?;
        self.setup_gestures()?;
        self.setup_keyboard()?;
        self.setup_virtual_keys()?;
        self.setup_buttons()?;
        self.setup_quick_launch()?;
        self.setup_settings()?;

        let TerminalApp {
            mux, store, inbox, ..
        } = self;
        wasm_bindgen_futures::spawn_local(run_actions(mux.clone(), store, inbox));

        mux.refresh_sessions().await;
        Ok(())
    }

    fn post(&self, action: Action) -> impl FnMut(web_sys::Event) + 'static {
        let actions = self.actions.clone();
        move |_| {
            let _ = actions.unbounded_send(action.clone());
        }
    }

    fn setup_viewport(&self) -> Result<(), JsValue> {
        let mux = self.mux.clone();
        let closure = Closure::wrap(Box::new(move || {
            mux.viewport_changed();
        }) as Box<dyn FnMut()>);

        crate::window()?.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }

    fn setup_gestures(&self) -> Result<(), JsValue> {
        let panels = dom::get_element_by_id(&self.document, "terminalPanels")?;

        let mux = self.mux.clone();
        let touchstart = Closure::wrap(Box::new(move |event: TouchEvent| {
            if let Some(touch) = event.touches().get(0) {
                mux.touch_start(touch.client_x() as f64, touch.client_y() as f64);
            }
        }) as Box<dyn FnMut(_)>);

        let mux = self.mux.clone();
        let touchmove = Closure::wrap(Box::new(move |event: TouchEvent| {
            if let Some(touch) = event.touches().get(0) {
                mux.touch_move(touch.client_x() as f64, touch.client_y() as f64);
            }
        }) as Box<dyn FnMut(_)>);

        let mux = self.mux.clone();
        let touchend = Closure::wrap(Box::new(move |event: TouchEvent| {
            if let Some(touch) = event.changed_touches().get(0) {
                mux.touch_end(touch.client_x() as f64);
            }
        }) as Box<dyn FnMut(_)>);

        panels.add_event_listener_with_callback("touchstart", touchstart.as_ref().unchecked_ref())?;
        panels.add_event_listener_with_callback("touchmove", touchmove.as_ref().unchecked_ref())?;
        panels.add_event_listener_with_callback("touchend", touchend.as_ref().unchecked_ref())?;
        touchstart.forget();
        touchmove.forget();
        touchend.forget();
        Ok(())
    }

    fn setup_keyboard(&self) -> Result<(), JsValue> {
        let mux = self.mux.clone();
        let closure = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            let chord = KeyChord {
                key: event.key(),
                ctrl: event.ctrl_key(),
                meta: event.meta_key(),
                shift: event.shift_key(),
            };
            if mux.handle_key(&chord) {
                event.prevent_default();
            }
        }) as Box<dyn FnMut(_)>);

        self.document
            .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }

    fn setup_virtual_keys(&self) -> Result<(), JsValue> {
        for key in dom::query_all(&self.document, ".vk-key")? {
            let name = key.get_attribute("data-key").unwrap_or_default();
            match VirtualKey::from_name(&name) {
                Some(virtual_key) => {
                    dom::add_click_listener(&key, self.post(Action::VirtualKey(virtual_key)))?
                }
                None => log::warn!("Unknown virtual key: {:?}", name),
            }
        }
        Ok(())
    }

    fn setup_buttons(&self) -> Result<(), JsValue> {
        dom::on_click_if_present(&self.document, "refreshBtn", self.post(Action::Refresh))?;

        for id in ["newTerminalBtn", "fabBtn", "newSessionBtnDrawer"] {
            dom::on_click_if_present(&self.document, id, self.post(Action::NewSessionDialog(true)))?;
        }
        for id in ["closeNewSessionBtn", "cancelNewSessionBtn", "newSessionModalOverlay"] {
            dom::on_click_if_present(&self.document, id, self.post(Action::NewSessionDialog(false)))?;
        }

        dom::on_click_if_present(&self.document, "commandPaletteBtn", self.post(Action::CommandPalette(true)))?;
        dom::on_click_if_present(
            &self.document,
            "commandPaletteOverlay",
            self.post(Action::CommandPalette(false)),
        )?;

        let document = self.document.clone();
        let actions = self.actions.clone();
        dom::on_click_if_present(&self.document, "createNewSessionBtn", move |_| {
            let _ = actions.unbounded_send(Action::CreateSession {
                cwd: dom::input_value(&document, "newSessionCwd"),
                shell: dom::input_value(&document, "newSessionShell"),
            });
        })?;
        Ok(())
    }

    /// Show the stored tool commands and save edits on `#saveSettingsBtn`
    fn setup_settings(&self) -> Result<(), JsValue> {
        let prefs = load_preferences(&self.store);
        for (tool, id) in TOOL_COMMAND_INPUTS {
            if let Ok(input) = dom::get_input_by_id(&self.document, id) {
                input.set_value(prefs.command_for(tool));
            }
        }

        let document = self.document.clone();
        let actions = self.actions.clone();
        dom::on_click_if_present(&self.document, "saveSettingsBtn", move |_| {
            let commands: Vec<(AiTool, String)> = TOOL_COMMAND_INPUTS
                .iter()
                .filter_map(|(tool, id)| {
                    dom::get_input_by_id(&document, id)
                        .ok()
                        .map(|input| (*tool, input.value()))
                })
                .collect();
            if !commands.is_empty() {
                let _ = actions.unbounded_send(Action::SaveToolCommands(commands));
            }
        })
    }

    /// Project cards are rendered after load, so launch buttons are matched
    /// by delegation: any `.launch-btn` with `data-path` and an optional
    /// `data-tool` (claude, codex, gemini; anything else opens a plain shell)
    fn setup_quick_launch(&self) -> Result<(), JsValue> {
        let actions = self.actions.clone();
        let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let Some(button) = event
                .target()
                .and_then(|t| t.dyn_into::<Element>().ok())
                .and_then(|el| el.closest(".launch-btn").ok().flatten())
            else {
                return;
            };
            let Some(path) = button.get_attribute("data-path").filter(|p| !p.is_empty()) else {
                log::warn!("Launch button without a project path");
                return;
            };
            let tool = button
                .get_attribute("data-tool")
                .and_then(|t| AiTool::from_str(&t));
            let _ = actions.unbounded_send(Action::QuickLaunch { path, tool });
        }) as Box<dyn FnMut(_)>);

        self.document
            .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }
}

/// Read `MuxConfig` from `<body data-mux-config='{...}'>`
fn read_config(document: &Document) -> Result<MuxConfig, JsValue> {
    let raw = document
        .body()
        .and_then(|body| body.get_attribute("data-mux-config"));

    let config = parse_config(raw.as_deref(), &utils::navigator_platform())
        .map_err(|e| JsValue::from_str(&format!("Invalid data-mux-config: {}", e)))?;
    log::info!("Multiplexer settings: {:?}", config);
    Ok(config)
}

/// The platform is detected from the browser unless the blob names one
fn parse_config(raw: Option<&str>, navigator_platform: &str) -> devshell_mux::Result<MuxConfig> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty());
    let mut config = match raw {
        Some(raw) => MuxConfig::from_json(raw)?,
        None => MuxConfig::default(),
    };
    if !raw.is_some_and(|raw| raw.contains("\"platform\"")) {
        config.platform = Platform::detect(navigator_platform);
    }
    Ok(config)
}

async fn run_actions(mux: Multiplexer, store: LocalStore, mut inbox: UnboundedReceiver<Action>) {
    while let Some(action) = inbox.next().await {
        log::debug!("Action: {:?}", action);
        dispatch(&mux, &store, action);
    }
}

fn dispatch(mux: &Multiplexer, store: &LocalStore, action: Action) {
    match action {
        Action::Open(id) => {
            if let Err(e) = mux.open_tab(&id, None) {
                log::error!("Failed to open {}: {}", id, e);
            }
        }
        Action::Focus(id) => mux.focus_tab(&id),
        Action::Close(id) => spawn_close(mux.clone(), id, false),
        Action::Kill(id) => spawn_close(mux.clone(), id, true),
        Action::Refresh => {
            let mux = mux.clone();
            wasm_bindgen_futures::spawn_local(async move {
                mux.refresh_sessions().await;
            });
        }
        Action::CreateSession { cwd, shell } => {
            let mux = mux.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let _ = mux.create_session(cwd, shell, None).await;
                mux.set_new_session_dialog(false);
            });
        }
        Action::QuickLaunch { path, tool } => {
            let command = tool.map(|tool| load_preferences(store).command_for(tool).to_string());
            let mux = mux.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let _ = mux.quick_launch(&path, command.as_deref()).await;
            });
        }
        Action::VirtualKey(key) => {
            if !mux.send_virtual_key(key) {
                log::debug!("Virtual key {:?} not delivered", key);
            }
        }
        Action::NewSessionDialog(open) => mux.set_new_session_dialog(open),
        Action::CommandPalette(open) => mux.set_command_palette(open),
        Action::SaveToolCommands(commands) => {
            let commands: Vec<(AiTool, &str)> = commands
                .iter()
                .map(|(tool, command)| (*tool, command.as_str()))
                .collect();
            match save_tool_commands(store, &commands) {
                Ok(_) => mux.notify(Notice::Info("Settings saved".to_string())),
                Err(e) => {
                    log::error!("Failed to save settings: {}", e);
                    mux.notify(Notice::Error(format!("Failed to save settings: {}", e)));
                }
            }
        }
    }
}

fn spawn_close(mux: Multiplexer, session_id: SessionId, kill: bool) {
    wasm_bindgen_futures::spawn_local(async move {
        // Failures are already reported through the view
        let _ = mux.close_tab(&session_id, kill).await;
    });
}
