/// Presentation callbacks
///
/// The multiplexer reports every state change the page must reflect through
/// this trait. Implementations must not call back into the multiplexer
/// synchronously; user interaction arrives later as separate events.
use devshell_types::{Session, SessionId};

use crate::navigation::Overlays;

/// What the tab strip needs to draw a new tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub session_id: SessionId,
    pub label: String,
    pub title: String,
}

/// User-visible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

pub trait MuxView {
    fn tab_opened(&self, tab: &TabInfo);

    /// `session_id` is now the only active tab
    fn tab_activated(&self, session_id: &str);

    fn tab_closed(&self, session_id: &str);

    /// No tabs remain; show the empty-state placeholder
    fn show_placeholder(&self);

    fn sessions_updated(&self, sessions: &[Session], active: Option<&str>);

    fn overlays_changed(&self, overlays: Overlays);

    fn notify(&self, notice: Notice);
}
