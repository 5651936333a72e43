/// Tab lifecycle controller
///
/// Owns the session registry and is the only code that mutates it. Every
/// entry point is driven by one discrete event (user action, channel event,
/// timer) and runs to completion before the next, so registry updates need no
/// locking. Remote requests are the only suspension points, and no registry
/// borrow is held across them.
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use devshell_types::{ClientMessage, CreateSessionRequest, Geometry, Session, SessionId};

use crate::api::{launch_command, SessionApi};
use crate::channel::{ChannelEvent, ChannelEvents, Connector, TransportId};
use crate::config::MuxConfig;
use crate::error::Result;
use crate::navigation::{interpret_key, GestureTracker, KeyChord, KeyCommand, Overlays, VirtualKey};
use crate::registry::{Direction, SessionRegistry, Tab};
use crate::resize::ResizeCoordinator;
use crate::scheduler::Scheduler;
use crate::surface::{InputHandler, SurfaceFactory};
use crate::transport::{Transition, Transport, TransportState};
use crate::view::{MuxView, Notice, TabInfo};

/// Collaborators the multiplexer drives
pub struct MuxServices {
    pub api: Rc<dyn SessionApi>,
    pub connector: Box<dyn Connector>,
    pub surfaces: Box<dyn SurfaceFactory>,
    pub scheduler: Rc<dyn Scheduler>,
    pub view: Rc<dyn MuxView>,
}

struct MuxState {
    config: MuxConfig,
    registry: SessionRegistry,
    sessions: Vec<Session>,
    resize: ResizeCoordinator,
    gestures: GestureTracker,
    overlays: Overlays,
    connector: Box<dyn Connector>,
    surfaces: Box<dyn SurfaceFactory>,
    next_transport_id: TransportId,
}

struct Inner {
    state: RefCell<MuxState>,
    api: Rc<dyn SessionApi>,
    scheduler: Rc<dyn Scheduler>,
    view: Rc<dyn MuxView>,
}

/// Cheaply cloneable handle to the multiplexer
#[derive(Clone)]
pub struct Multiplexer {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Multiplexer")
            .field("tabs", &state.registry.ids())
            .field("active", &state.registry.active_id())
            .field("sessions", &state.sessions.len())
            .finish()
    }
}

impl Multiplexer {
    pub fn new(config: MuxConfig, services: MuxServices) -> Self {
        let state = MuxState {
            registry: SessionRegistry::new(),
            sessions: Vec::new(),
            resize: ResizeCoordinator::new(config.resize_debounce, config.default_geometry),
            gestures: GestureTracker::new(
                config.swipe_classify_distance,
                config.swipe_commit_distance,
            ),
            overlays: Overlays::default(),
            connector: services.connector,
            surfaces: services.surfaces,
            next_transport_id: 0,
            config,
        };

        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                api: services.api,
                scheduler: services.scheduler,
                view: services.view,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Tab lifecycle
    // ------------------------------------------------------------------

    /// Open a tab for `session_id`, or focus it if one is already open.
    ///
    /// `initial_command` is typed into the shell once the channel has opened
    /// and the command settle delay has passed.
    pub fn open_tab(&self, session_id: &str, initial_command: Option<String>) -> Result<()> {
        if self.is_open(session_id) {
            log::debug!("Session {} already has a tab, focusing", session_id);
            self.focus_tab(session_id);
            return Ok(());
        }

        let (info, transport_id, open_settle) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;

            state.next_transport_id += 1;
            let transport_id = state.next_transport_id;
            let events = ChannelEvents::new(session_id.to_string(), transport_id, self.event_sink());

            let mut surface = match state.surfaces.create(session_id) {
                Ok(surface) => surface,
                Err(e) => {
                    drop(guard);
                    log::error!("Failed to create surface for {}: {}", session_id, e);
                    self.inner
                        .view
                        .notify(Notice::Error(format!("Failed to open terminal: {}", e)));
                    return Err(e);
                }
            };
            let transport = match Transport::open(state.connector.as_mut(), session_id, events) {
                Ok(transport) => transport,
                Err(e) => {
                    surface.dispose();
                    drop(guard);
                    log::error!("Failed to open transport for {}: {}", session_id, e);
                    self.inner
                        .view
                        .notify(Notice::Error(format!("Failed to connect to {}: {}", session_id, e)));
                    return Err(e);
                }
            };
            surface.on_local_input(self.input_handler(session_id));

            let tab = Tab {
                session_id: session_id.to_string(),
                metadata: state.sessions.iter().find(|s| s.id == session_id).cloned(),
                transport,
                surface,
                pending_command: initial_command.filter(|c| !c.is_empty()),
                last_geometry: None,
            };
            let info = TabInfo {
                session_id: tab.session_id.clone(),
                label: tab.label(),
                title: tab.title(),
            };
            if let Err(mut rejected) = state.registry.insert(tab) {
                rejected.transport.close();
                rejected.surface.dispose();
                return Ok(());
            }
            (info, transport_id, state.config.open_settle_delay)
        };

        log::info!("Opened tab for session {} (transport {})", session_id, transport_id);
        self.inner.view.tab_opened(&info);
        self.focus_tab(session_id);

        let id = session_id.to_string();
        self.schedule(open_settle, move |mux| mux.settle_surface(&id, transport_id));
        Ok(())
    }

    /// Make `session_id` the active tab. Unknown ids are ignored.
    pub fn focus_tab(&self, session_id: &str) {
        let (transport_id, delay) = {
            let mut state = self.inner.state.borrow_mut();
            if !state.registry.set_active(session_id) {
                log::debug!("Ignoring focus of unknown tab {}", session_id);
                return;
            }
            let Some(tab) = state.registry.get(session_id) else {
                return;
            };
            (tab.transport.id(), state.config.focus_settle_delay)
        };

        self.inner.view.tab_activated(session_id);

        let id = session_id.to_string();
        self.schedule(delay, move |mux| mux.settle_surface(&id, transport_id));
    }

    /// Tear down the tab for `session_id` and, if `destroy_remote`, terminate
    /// the remote session afterwards.
    ///
    /// Local teardown always completes first and is never rolled back. A
    /// failed termination is reported and returned, and the session listing is
    /// refreshed either way.
    pub async fn close_tab(&self, session_id: &str, destroy_remote: bool) -> Result<()> {
        self.teardown_tab(session_id);

        if !destroy_remote {
            return Ok(());
        }

        let result = self.inner.api.delete_session(session_id).await;
        if let Err(e) = &result {
            log::error!("Failed to kill session {}: {}", session_id, e);
            self.inner
                .view
                .notify(Notice::Error(format!("Failed to kill session: {}", e)));
        } else {
            log::info!("Killed session {}", session_id);
        }

        self.refresh_sessions().await;
        result
    }

    fn teardown_tab(&self, session_id: &str) -> bool {
        let (removed, next_active) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(removed) = state.registry.remove(session_id) else {
                log::debug!("No tab to close for session {}", session_id);
                return false;
            };
            let next_active = state.registry.active_id().map(str::to_string);
            (removed, next_active)
        };

        let mut tab = removed.tab;
        tab.transport.close();
        tab.surface.dispose();
        log::info!("Closed tab for session {}", session_id);
        self.inner.view.tab_closed(session_id);

        if removed.was_active {
            match next_active {
                Some(next) => self.focus_tab(&next),
                None => self.inner.view.show_placeholder(),
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Remote sessions
    // ------------------------------------------------------------------

    /// Reload the session mirror. A failed listing degrades to no sessions.
    pub async fn refresh_sessions(&self) -> Vec<Session> {
        let sessions = match self.inner.api.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                log::error!("Failed to load sessions: {}", e);
                self.inner
                    .view
                    .notify(Notice::Error(format!("Failed to load sessions: {}", e)));
                Vec::new()
            }
        };

        let active = {
            let mut state = self.inner.state.borrow_mut();
            state.sessions = sessions.clone();
            state.registry.active_id().map(str::to_string)
        };
        log::debug!("Session mirror holds {} sessions", sessions.len());
        self.inner.view.sessions_updated(&sessions, active.as_deref());
        sessions
    }

    /// Create a remote session and open a tab for it
    pub async fn create_session(
        &self,
        cwd: Option<String>,
        shell: Option<String>,
        initial_command: Option<String>,
    ) -> Result<SessionId> {
        let geometry = self.inner.state.borrow().config.default_geometry;
        let request = CreateSessionRequest {
            cwd: cwd.filter(|c| !c.trim().is_empty()),
            shell: shell.filter(|s| !s.trim().is_empty()),
            cols: geometry.cols,
            rows: geometry.rows,
        };

        let created = match self.inner.api.create_session(request).await {
            Ok(created) => created,
            Err(e) => {
                log::error!("Failed to create session: {}", e);
                self.inner
                    .view
                    .notify(Notice::Error(format!("Failed to create session: {}", e)));
                return Err(e);
            }
        };
        log::info!("Created session {}", created.id);

        self.refresh_sessions().await;
        self.open_tab(&created.id, initial_command)?;
        Ok(created.id)
    }

    /// Start a shell in `project_path`, optionally running `command` there
    pub async fn quick_launch(&self, project_path: &str, command: Option<&str>) -> Result<SessionId> {
        let platform = self.inner.state.borrow().config.platform;
        let line = launch_command(project_path, command, platform);
        self.create_session(Some(project_path.to_string()), None, Some(line))
            .await
    }

    // ------------------------------------------------------------------
    // Channel events and input
    // ------------------------------------------------------------------

    /// Deliver a channel event. Events from a transport that no longer backs
    /// the registered tab are dropped.
    pub fn handle_channel_event(&self, session_id: &str, transport_id: TransportId, event: ChannelEvent) {
        let (transition, delays) = {
            let mut state = self.inner.state.borrow_mut();
            let delays = (state.config.open_fit_delay, state.config.command_settle_delay);
            let Some(tab) = state.registry.get_mut(session_id) else {
                log::debug!("Dropping {:?} for closed session {}", event, session_id);
                return;
            };
            if tab.transport.id() != transport_id {
                log::debug!(
                    "Dropping {:?} from stale transport {} of session {}",
                    event,
                    transport_id,
                    session_id
                );
                return;
            }
            let has_command = tab.pending_command.is_some();
            let transition = tab.transport.handle_event(event, tab.surface.as_mut());
            (transition, (delays.0, delays.1, has_command))
        };

        if transition != Transition::Opened {
            return;
        }

        let (fit_delay, command_delay, has_command) = delays;
        let id = session_id.to_string();
        self.schedule(fit_delay, move |mux| mux.send_open_resize(&id, transport_id));

        if has_command {
            let id = session_id.to_string();
            self.schedule(command_delay, move |mux| mux.inject_command(&id, transport_id));
        }
    }

    /// Forward locally typed input. Dropped unless the tab's transport is open.
    pub fn send_input(&self, session_id: &str, data: &str) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let Some(tab) = state.registry.get_mut(session_id) else {
            return false;
        };
        send_logged(tab, &ClientMessage::input(data))
    }

    /// Send an on-screen key to the active tab, if its transport is open
    pub fn send_virtual_key(&self, key: VirtualKey) -> bool {
        let Some(sequence) = key.sequence() else {
            return false;
        };
        let mut state = self.inner.state.borrow_mut();
        let Some(tab) = state.registry.active_mut() else {
            return false;
        };
        send_logged(tab, &ClientMessage::input(sequence))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Focus the neighbour of the active tab; no-op at either end
    pub fn navigate(&self, direction: Direction) -> bool {
        let target = self.inner.state.borrow().registry.neighbor(direction);
        match target {
            Some(id) => {
                self.focus_tab(&id);
                true
            }
            None => false,
        }
    }

    pub fn touch_start(&self, x: f64, y: f64) {
        self.inner.state.borrow_mut().gestures.touch_start(x, y);
    }

    pub fn touch_move(&self, x: f64, y: f64) {
        self.inner.state.borrow_mut().gestures.touch_move(x, y);
    }

    pub fn touch_end(&self, x: f64) -> bool {
        let direction = self.inner.state.borrow_mut().gestures.touch_end(x);
        match direction {
            Some(direction) => self.navigate(direction),
            None => false,
        }
    }

    /// Handle a keydown. Returns true when the browser default must be prevented.
    pub fn handle_key(&self, chord: &KeyChord) -> bool {
        let Some(command) = interpret_key(chord) else {
            return false;
        };

        match command {
            KeyCommand::CycleTab(direction) => {
                self.navigate(direction);
            }
            KeyCommand::ToggleCommandPalette => {
                let overlays = {
                    let mut state = self.inner.state.borrow_mut();
                    state.overlays.command_palette = !state.overlays.command_palette;
                    state.overlays
                };
                self.inner.view.overlays_changed(overlays);
            }
            KeyCommand::CloseOverlays => {
                let (changed, overlays) = {
                    let mut state = self.inner.state.borrow_mut();
                    (state.overlays.close_all(), state.overlays)
                };
                if changed {
                    self.inner.view.overlays_changed(overlays);
                }
            }
        }
        command.prevents_default()
    }

    pub fn set_command_palette(&self, open: bool) {
        let overlays = {
            let mut state = self.inner.state.borrow_mut();
            state.overlays.command_palette = open;
            state.overlays
        };
        self.inner.view.overlays_changed(overlays);
    }

    pub fn set_new_session_dialog(&self, open: bool) {
        let overlays = {
            let mut state = self.inner.state.borrow_mut();
            state.overlays.new_session = open;
            state.overlays
        };
        self.inner.view.overlays_changed(overlays);
    }

    // ------------------------------------------------------------------
    // Resize
    // ------------------------------------------------------------------

    /// Note a viewport or container size change; the active tab is resized
    /// once changes stop arriving for the debounce period
    pub fn viewport_changed(&self) {
        let (ticket, delay) = {
            let mut state = self.inner.state.borrow_mut();
            (state.resize.viewport_changed(), state.resize.debounce())
        };
        self.schedule(delay, move |mux| mux.flush_resize(ticket));
    }

    fn flush_resize(&self, ticket: u64) {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        if !state.resize.is_current(ticket) {
            return;
        }
        let Some(id) = state.registry.active_id().map(str::to_string) else {
            return;
        };
        let Some(tab) = state.registry.get_mut(&id) else {
            return;
        };
        let geometry = state.resize.measure(tab.surface.as_mut());
        send_resize(tab, geometry);
    }

    // ------------------------------------------------------------------
    // Deferred work
    // ------------------------------------------------------------------

    /// Fit and focus a freshly focused or created tab; resend its geometry
    /// if the fit changed it. Background tabs are left alone.
    fn settle_surface(&self, session_id: &str, transport_id: TransportId) {
        self.with_live_tab(session_id, transport_id, |tab, active, resize| {
            if !active {
                return;
            }
            let geometry = resize.measure(tab.surface.as_mut());
            tab.surface.focus();
            if tab.last_geometry != Some(geometry) {
                send_resize(tab, geometry);
            }
        });
    }

    /// First resize after the channel opens. A tab that opened in the
    /// background is resized when it is next focused.
    fn send_open_resize(&self, session_id: &str, transport_id: TransportId) {
        self.with_live_tab(session_id, transport_id, |tab, active, resize| {
            if !active {
                log::debug!("Deferring resize of background tab {}", tab.session_id);
                return;
            }
            let geometry = resize.measure(tab.surface.as_mut());
            send_resize(tab, geometry);
        });
    }

    fn inject_command(&self, session_id: &str, transport_id: TransportId) {
        self.with_live_tab(session_id, transport_id, |tab, _active, _resize| {
            let Some(command) = tab.pending_command.take() else {
                return;
            };
            if !send_logged(tab, &ClientMessage::input(format!("{}\r", command))) {
                log::warn!(
                    "Dropped initial command for session {}: transport {}",
                    tab.session_id,
                    tab.transport.state()
                );
            }
        });
    }

    /// Run `f` against the tab only if it is still registered with the same
    /// transport; deferred work for a closed or reopened tab is a no-op
    fn with_live_tab<F>(&self, session_id: &str, transport_id: TransportId, f: F)
    where
        F: FnOnce(&mut Tab, bool, &ResizeCoordinator),
    {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        let active = state.registry.active_id() == Some(session_id);
        match state.registry.get_mut(session_id) {
            Some(tab) if tab.transport.id() == transport_id => f(tab, active, &state.resize),
            _ => log::debug!("Skipping deferred work for closed tab {}", session_id),
        }
    }

    fn schedule<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce(Multiplexer) + 'static,
    {
        let weak = Rc::downgrade(&self.inner);
        self.inner.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    f(Multiplexer { inner });
                }
            }),
        );
    }

    fn event_sink(&self) -> Rc<dyn Fn(&str, TransportId, ChannelEvent)> {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Rc::new(move |session_id, transport_id, event| {
            if let Some(inner) = weak.upgrade() {
                Multiplexer { inner }.handle_channel_event(session_id, transport_id, event);
            }
        })
    }

    /// Surfaces may report input synchronously from inside a surface call
    /// (focus reports from `focus()`), while the state is still borrowed.
    /// That input is sent once the current event has finished.
    fn input_handler(&self, session_id: &str) -> InputHandler {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let id = session_id.to_string();
        Box::new(move |data| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mux = Multiplexer { inner };
            if mux.inner.state.try_borrow_mut().is_err() {
                let id = id.clone();
                mux.schedule(Duration::ZERO, move |mux| {
                    mux.send_input(&id, &data);
                });
                return;
            }
            mux.send_input(&id, &data);
        })
    }

    /// Show a notification through the view
    pub fn notify(&self, notice: Notice) {
        self.inner.view.notify(notice);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_open(&self, session_id: &str) -> bool {
        self.inner.state.borrow().registry.contains(session_id)
    }

    /// Open session ids in tab strip order
    pub fn tab_ids(&self) -> Vec<SessionId> {
        self.inner.state.borrow().registry.ids()
    }

    pub fn active_tab(&self) -> Option<SessionId> {
        self.inner
            .state
            .borrow()
            .registry
            .active_id()
            .map(str::to_string)
    }

    pub fn transport_state(&self, session_id: &str) -> Option<TransportState> {
        self.inner
            .state
            .borrow()
            .registry
            .get(session_id)
            .map(|tab| tab.transport.state())
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.inner.state.borrow().sessions.clone()
    }

    pub fn overlays(&self) -> Overlays {
        self.inner.state.borrow().overlays
    }

    pub fn config(&self) -> MuxConfig {
        self.inner.state.borrow().config.clone()
    }
}

fn send_resize(tab: &mut Tab, geometry: Geometry) {
    if send_logged(tab, &ClientMessage::resize(geometry)) {
        log::debug!("Resized session {} to {}", tab.session_id, geometry);
        tab.last_geometry = Some(geometry);
    }
}

fn send_logged(tab: &mut Tab, msg: &ClientMessage) -> bool {
    match tab.transport.send(msg) {
        Ok(sent) => sent,
        Err(e) => {
            log::warn!("Failed to send to session {}: {}", tab.session_id, e);
            false
        }
    }
}
