#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use devshell_mux::types::{
    ClientMessage, CreateSessionRequest, Geometry, Session, SessionCreated, SessionStatus,
};
use devshell_mux::{
    Channel, ChannelEvent, ChannelEvents, Connector, InputHandler, Multiplexer, MuxConfig,
    MuxError, MuxServices, MuxView, Notice, Overlays, RenderingSurface, Result, Scheduler,
    SessionApi, SurfaceFactory, TabInfo, Task,
};

// ============================================================================
// Rendering surface
// ============================================================================

/// Everything a fake surface observed
#[derive(Default)]
pub struct SurfaceRecord {
    pub written: String,
    pub geometry: Option<Geometry>,
    pub fits: usize,
    pub focuses: usize,
    pub disposed: bool,
    pub input: Option<InputHandler>,
}

/// Text the surface types into its own input handler whenever it gains
/// focus, the way xterm.js does for programs with focus reporting on
pub type FocusReport = Rc<RefCell<Option<String>>>;

struct FakeSurface(Rc<RefCell<SurfaceRecord>>, FocusReport);

impl RenderingSurface for FakeSurface {
    fn write(&mut self, data: &str) {
        self.0.borrow_mut().written.push_str(data);
    }

    fn fit(&mut self) -> Option<Geometry> {
        let mut record = self.0.borrow_mut();
        record.fits += 1;
        record.geometry
    }

    fn focus(&mut self) {
        self.0.borrow_mut().focuses += 1;
        let Some(report) = self.1.borrow().clone() else {
            return;
        };
        let handler = self.0.borrow_mut().input.take();
        if let Some(mut handler) = handler {
            handler(report);
            self.0.borrow_mut().input = Some(handler);
        }
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().disposed = true;
    }

    fn on_local_input(&mut self, handler: InputHandler) {
        self.0.borrow_mut().input = Some(handler);
    }
}

/// Creates surfaces that measure as `geometry` (None = not laid out)
pub struct FakeSurfaces {
    pub created: Rc<RefCell<Vec<(String, Rc<RefCell<SurfaceRecord>>)>>>,
    pub geometry: Rc<Cell<Option<Geometry>>>,
    pub focus_report: FocusReport,
}

impl SurfaceFactory for FakeSurfaces {
    fn create(&mut self, session_id: &str) -> Result<Box<dyn RenderingSurface>> {
        let record = Rc::new(RefCell::new(SurfaceRecord {
            geometry: self.geometry.get(),
            ..Default::default()
        }));
        self.created
            .borrow_mut()
            .push((session_id.to_string(), record.clone()));
        Ok(Box::new(FakeSurface(record, self.focus_report.clone())))
    }
}

// ============================================================================
// Channels
// ============================================================================

pub struct ChannelRecord {
    pub session_id: String,
    pub events: ChannelEvents,
    pub sent: Vec<String>,
    pub closed: bool,
}

struct FakeChannel(Rc<RefCell<ChannelRecord>>);

impl Channel for FakeChannel {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.0.borrow_mut().sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }
}

pub struct FakeConnector {
    pub opened: Rc<RefCell<Vec<Rc<RefCell<ChannelRecord>>>>>,
    pub fail: Rc<Cell<bool>>,
}

impl Connector for FakeConnector {
    fn connect(&mut self, session_id: &str, events: ChannelEvents) -> Result<Box<dyn Channel>> {
        if self.fail.get() {
            return Err(MuxError::Channel("connection refused".to_string()));
        }
        let record = Rc::new(RefCell::new(ChannelRecord {
            session_id: session_id.to_string(),
            events,
            sent: Vec::new(),
            closed: false,
        }));
        self.opened.borrow_mut().push(record.clone());
        Ok(Box::new(FakeChannel(record)))
    }
}

// ============================================================================
// Scheduler with a manual clock
// ============================================================================

#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    seq: Cell<u64>,
    queue: RefCell<Vec<(Duration, u64, Task)>>,
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);
        self.queue
            .borrow_mut()
            .push((self.now.get() + delay, seq, task));
    }
}

impl ManualScheduler {
    /// Move the clock forward, running every task that falls due in order
    pub fn advance(&self, ms: u64) {
        let target = self.now.get() + Duration::from_millis(ms);
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due = queue
                    .iter()
                    .enumerate()
                    .filter(|(_, (at, _, _))| *at <= target)
                    .min_by_key(|(_, (at, seq, _))| (*at, *seq))
                    .map(|(index, _)| index);
                due.map(|index| queue.remove(index))
            };
            match next {
                Some((at, _, task)) => {
                    self.now.set(at);
                    task();
                }
                None => break,
            }
        }
        self.now.set(target);
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

// ============================================================================
// Process host API
// ============================================================================

#[derive(Default)]
pub struct FakeApi {
    pub sessions: RefCell<Vec<Session>>,
    pub created: RefCell<Vec<CreateSessionRequest>>,
    pub deleted: RefCell<Vec<String>>,
    pub list_calls: Cell<usize>,
    pub fail_list: Cell<bool>,
    pub fail_create: Cell<bool>,
    pub fail_delete: Cell<bool>,
}

impl FakeApi {
    pub fn add_session(&self, id: &str, shell: &str) {
        self.sessions.borrow_mut().push(session(id, shell));
    }
}

pub fn session(id: &str, shell: &str) -> Session {
    Session {
        id: id.to_string(),
        shell: Some(shell.to_string()),
        cwd: Some("/home/dev".to_string()),
        pid: Some(1000),
        status: SessionStatus::Running,
        created_at: Some(1_700_000_000.0),
        last_activity_at: None,
    }
}

#[async_trait(?Send)]
impl SessionApi for FakeApi {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.list_calls.set(self.list_calls.get() + 1);
        if self.fail_list.get() {
            return Err(MuxError::Request("network down".to_string()));
        }
        Ok(self.sessions.borrow().clone())
    }

    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionCreated> {
        if self.fail_create.get() {
            return Err(MuxError::Status {
                status: 429,
                body: "Max sessions reached".to_string(),
            });
        }
        let id = format!("created-{:04}", self.created.borrow().len() + 1);
        let mut record = session(&id, request.shell.as_deref().unwrap_or("/bin/bash"));
        record.cwd = request.cwd.clone();
        self.sessions.borrow_mut().push(record);
        self.created.borrow_mut().push(request);
        Ok(SessionCreated { id })
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.deleted.borrow_mut().push(session_id.to_string());
        if self.fail_delete.get() {
            return Err(MuxError::Status {
                status: 500,
                body: "kill failed".to_string(),
            });
        }
        self.sessions.borrow_mut().retain(|s| s.id != session_id);
        Ok(())
    }
}

// ============================================================================
// View
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Opened(TabInfo),
    Activated(String),
    Closed(String),
    Placeholder,
    Sessions(Vec<String>, Option<String>),
    Overlays(Overlays),
    Notice(Notice),
}

#[derive(Default)]
pub struct RecordingView {
    pub events: RefCell<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn notices(&self) -> Vec<Notice> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn saw(&self, event: &ViewEvent) -> bool {
        self.events.borrow().contains(event)
    }
}

impl MuxView for RecordingView {
    fn tab_opened(&self, tab: &TabInfo) {
        self.events.borrow_mut().push(ViewEvent::Opened(tab.clone()));
    }

    fn tab_activated(&self, session_id: &str) {
        self.events
            .borrow_mut()
            .push(ViewEvent::Activated(session_id.to_string()));
    }

    fn tab_closed(&self, session_id: &str) {
        self.events
            .borrow_mut()
            .push(ViewEvent::Closed(session_id.to_string()));
    }

    fn show_placeholder(&self) {
        self.events.borrow_mut().push(ViewEvent::Placeholder);
    }

    fn sessions_updated(&self, sessions: &[Session], active: Option<&str>) {
        self.events.borrow_mut().push(ViewEvent::Sessions(
            sessions.iter().map(|s| s.id.clone()).collect(),
            active.map(str::to_string),
        ));
    }

    fn overlays_changed(&self, overlays: Overlays) {
        self.events.borrow_mut().push(ViewEvent::Overlays(overlays));
    }

    fn notify(&self, notice: Notice) {
        self.events.borrow_mut().push(ViewEvent::Notice(notice));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub mux: Multiplexer,
    pub api: Rc<FakeApi>,
    pub scheduler: Rc<ManualScheduler>,
    pub view: Rc<RecordingView>,
    pub surfaces: Rc<RefCell<Vec<(String, Rc<RefCell<SurfaceRecord>>)>>>,
    pub channels: Rc<RefCell<Vec<Rc<RefCell<ChannelRecord>>>>>,
    pub geometry: Rc<Cell<Option<Geometry>>>,
    pub connect_fails: Rc<Cell<bool>>,
    pub focus_report: FocusReport,
}

pub fn harness() -> Harness {
    harness_with(MuxConfig::default())
}

pub fn harness_with(config: MuxConfig) -> Harness {
    let api = Rc::new(FakeApi::default());
    let scheduler = Rc::new(ManualScheduler::default());
    let view = Rc::new(RecordingView::default());
    let surfaces = Rc::new(RefCell::new(Vec::new()));
    let channels = Rc::new(RefCell::new(Vec::new()));
    let geometry = Rc::new(Cell::new(Some(Geometry::new(100, 40))));
    let connect_fails = Rc::new(Cell::new(false));
    let focus_report = Rc::new(RefCell::new(None));

    let mux = Multiplexer::new(
        config,
        MuxServices {
            api: api.clone(),
            connector: Box::new(FakeConnector {
                opened: channels.clone(),
                fail: connect_fails.clone(),
            }),
            surfaces: Box::new(FakeSurfaces {
                created: surfaces.clone(),
                geometry: geometry.clone(),
                focus_report: focus_report.clone(),
            }),
            scheduler: scheduler.clone(),
            view: view.clone(),
        },
    );

    Harness {
        mux,
        api,
        scheduler,
        view,
        surfaces,
        channels,
        geometry,
        connect_fails,
        focus_report,
    }
}

impl Harness {
    /// Most recent channel opened for `session_id`
    pub fn channel(&self, session_id: &str) -> Rc<RefCell<ChannelRecord>> {
        self.channels
            .borrow()
            .iter()
            .rev()
            .find(|c| c.borrow().session_id == session_id)
            .cloned()
            .expect("no channel for session")
    }

    /// Most recent surface created for `session_id`
    pub fn surface(&self, session_id: &str) -> Rc<RefCell<SurfaceRecord>> {
        self.surfaces
            .borrow()
            .iter()
            .rev()
            .find(|(id, _)| id == session_id)
            .map(|(_, record)| record.clone())
            .expect("no surface for session")
    }

    pub fn emit(&self, session_id: &str, event: ChannelEvent) {
        let events = self.channel(session_id).borrow().events.clone();
        events.emit(event);
    }

    /// Open a tab and let its channel connect and settle
    pub fn open_connected(&self, session_id: &str) {
        self.mux.open_tab(session_id, None).unwrap();
        self.emit(session_id, ChannelEvent::Opened);
        self.scheduler.advance(1_000);
    }

    /// Messages sent on the latest channel for `session_id`
    pub fn sent(&self, session_id: &str) -> Vec<ClientMessage> {
        self.channel(session_id)
            .borrow()
            .sent
            .iter()
            .map(|text| serde_json::from_str(text).expect("client message"))
            .collect()
    }

    pub fn resizes(&self, session_id: &str) -> Vec<Geometry> {
        self.sent(session_id)
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Resize { cols, rows } => Some(Geometry::new(cols, rows)),
                _ => None,
            })
            .collect()
    }

    pub fn inputs(&self, session_id: &str) -> Vec<String> {
        self.sent(session_id)
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Input { data } => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        for channel in self.channels.borrow().iter() {
            channel.borrow_mut().sent.clear();
        }
    }
}
