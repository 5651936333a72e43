/// Per-session transport: one channel, one state machine
///
/// Inbound messages are rendered in receipt order with no buffering or
/// reordering. The process host guarantees `replay` precedes any `output` for
/// an attach; the transport trusts that ordering rather than enforcing it.
use devshell_types::{ClientMessage, ServerMessage, SessionId};

use crate::channel::{Channel, ChannelEvent, ChannelEvents, Connector, TransportId};
use crate::error::Result;
use crate::surface::RenderingSurface;

/// Written to the surface when the channel closes
pub const CLOSED_ANNOTATION: &str = "\r\n\x1b[31m[Connection closed]\x1b[0m\r\n";

/// Written to the surface when the channel fails
pub const ERROR_ANNOTATION: &str = "\r\n\x1b[31m[Connection error]\x1b[0m\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl TransportState {
    /// Closed and errored transports never come back; the tab must be reopened
    pub fn is_final(&self) -> bool {
        matches!(self, TransportState::Closed | TransportState::Errored)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Open => write!(f, "open"),
            TransportState::Closed => write!(f, "closed"),
            TransportState::Errored => write!(f, "errored"),
        }
    }
}

/// State change caused by a channel event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Opened,
    Closed,
    Errored,
}

pub struct Transport {
    id: TransportId,
    session_id: SessionId,
    state: TransportState,
    channel: Box<dyn Channel>,
}

impl Transport {
    /// Open a channel for `session_id` through `connector`
    pub fn open(
        connector: &mut dyn Connector,
        session_id: &str,
        events: ChannelEvents,
    ) -> Result<Self> {
        let id = events.transport_id();
        let channel = connector.connect(session_id, events)?;
        log::info!("Transport {} connecting for session {}", id, session_id);
        Ok(Self::new(id, session_id.to_string(), channel))
    }

    pub fn new(id: TransportId, session_id: SessionId, channel: Box<dyn Channel>) -> Self {
        Self {
            id,
            session_id,
            state: TransportState::Connecting,
            channel,
        }
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == TransportState::Open
    }

    /// Send a message if the channel is open.
    ///
    /// Returns `Ok(false)` when the message was dropped because the transport
    /// is not open; nothing is queued for later delivery.
    pub fn send(&mut self, msg: &ClientMessage) -> Result<bool> {
        if !self.is_open() {
            log::debug!(
                "Dropping message for session {} ({})",
                self.session_id,
                self.state
            );
            return Ok(false);
        }

        let json = serde_json::to_string(msg)?;
        self.channel.send_text(&json)?;
        Ok(true)
    }

    /// Apply a channel event, rendering inbound data and annotations to `surface`
    pub fn handle_event(
        &mut self,
        event: ChannelEvent,
        surface: &mut dyn RenderingSurface,
    ) -> Transition {
        if self.state.is_final() {
            log::debug!(
                "Ignoring {:?} on {} transport {}",
                event,
                self.state,
                self.id
            );
            return Transition::None;
        }

        match event {
            ChannelEvent::Opened => {
                if self.state == TransportState::Open {
                    return Transition::None;
                }
                log::info!("Transport {} open for session {}", self.id, self.session_id);
                self.state = TransportState::Open;
                Transition::Opened
            }
            ChannelEvent::Message(text) => {
                self.render(&text, surface);
                Transition::None
            }
            ChannelEvent::Closed => {
                log::info!("Transport {} closed for session {}", self.id, self.session_id);
                surface.write(CLOSED_ANNOTATION);
                self.state = TransportState::Closed;
                Transition::Closed
            }
            ChannelEvent::Errored(reason) => {
                log::error!(
                    "Transport {} error for session {}: {}",
                    self.id,
                    self.session_id,
                    reason
                );
                surface.write(ERROR_ANNOTATION);
                self.state = TransportState::Errored;
                Transition::Errored
            }
        }
    }

    fn render(&self, text: &str, surface: &mut dyn RenderingSurface) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Replay { data }) => {
                log::debug!("Replaying {} bytes for session {}", data.len(), self.session_id);
                surface.write(&data);
            }
            Ok(ServerMessage::Output { data }) => surface.write(&data),
            Ok(ServerMessage::Unknown) => {
                log::warn!("Unhandled message type on session {}: {}", self.session_id, text);
            }
            Err(e) => {
                log::warn!("Failed to parse message on session {}: {}", self.session_id, e);
            }
        }
    }

    /// Close the channel locally; no annotation is written
    pub fn close(&mut self) {
        if !self.state.is_final() {
            self.state = TransportState::Closed;
        }
        self.channel.close();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::InputHandler;
    use devshell_types::Geometry;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Screen {
        written: String,
    }

    impl RenderingSurface for Screen {
        fn write(&mut self, data: &str) {
            self.written.push_str(data);
        }
        fn fit(&mut self) -> Option<Geometry> {
            None
        }
        fn focus(&mut self) {}
        fn dispose(&mut self) {}
        fn on_local_input(&mut self, _handler: InputHandler) {}
    }

    struct Wire {
        sent: Rc<RefCell<Vec<String>>>,
        closed: Rc<RefCell<bool>>,
    }

    impl Channel for Wire {
        fn send_text(&mut self, text: &str) -> Result<()> {
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
        fn close(&mut self) {
            *self.closed.borrow_mut() = true;
        }
    }

    fn transport() -> (Transport, Rc<RefCell<Vec<String>>>, Rc<RefCell<bool>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let closed = Rc::new(RefCell::new(false));
        let wire = Wire {
            sent: sent.clone(),
            closed: closed.clone(),
        };
        (Transport::new(1, "s1".to_string(), Box::new(wire)), sent, closed)
    }

    #[test]
    fn test_replay_rendered_before_output() {
        let (mut t, _, _) = transport();
        let mut screen = Screen::default();

        assert_eq!(t.handle_event(ChannelEvent::Opened, &mut screen), Transition::Opened);
        t.handle_event(
            ChannelEvent::Message(r#"{"type":"replay","data":"abc"}"#.to_string()),
            &mut screen,
        );
        t.handle_event(
            ChannelEvent::Message(r#"{"type":"output","data":"def"}"#.to_string()),
            &mut screen,
        );

        assert_eq!(screen.written, "abcdef");
    }

    #[test]
    fn test_input_dropped_until_open() {
        let (mut t, sent, _) = transport();
        let mut screen = Screen::default();

        assert!(!t.send(&ClientMessage::input("x")).unwrap());
        assert!(sent.borrow().is_empty());

        t.handle_event(ChannelEvent::Opened, &mut screen);
        assert!(t.send(&ClientMessage::input("x")).unwrap());
        assert_eq!(*sent.borrow(), vec![r#"{"type":"input","data":"x"}"#.to_string()]);
    }

    #[test]
    fn test_close_is_fail_stop() {
        let (mut t, sent, _) = transport();
        let mut screen = Screen::default();

        t.handle_event(ChannelEvent::Opened, &mut screen);
        assert_eq!(t.handle_event(ChannelEvent::Closed, &mut screen), Transition::Closed);
        assert_eq!(t.state(), TransportState::Closed);
        assert_eq!(screen.written, CLOSED_ANNOTATION);

        // Nothing revives a closed transport
        assert_eq!(t.handle_event(ChannelEvent::Opened, &mut screen), Transition::None);
        t.handle_event(
            ChannelEvent::Message(r#"{"type":"output","data":"late"}"#.to_string()),
            &mut screen,
        );
        assert_eq!(t.state(), TransportState::Closed);
        assert_eq!(screen.written, CLOSED_ANNOTATION);
        assert!(!t.send(&ClientMessage::input("x")).unwrap());
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_error_annotation_is_distinct() {
        let (mut t, _, _) = transport();
        let mut screen = Screen::default();

        t.handle_event(ChannelEvent::Opened, &mut screen);
        let transition = t.handle_event(ChannelEvent::Errored("reset".to_string()), &mut screen);
        assert_eq!(transition, Transition::Errored);
        assert_eq!(t.state(), TransportState::Errored);

        // The close that follows an error in browsers does not add a second note
        t.handle_event(ChannelEvent::Closed, &mut screen);
        assert_eq!(t.state(), TransportState::Errored);
        assert_eq!(screen.written, ERROR_ANNOTATION);
    }

    #[test]
    fn test_malformed_and_unknown_messages_are_skipped() {
        let (mut t, _, _) = transport();
        let mut screen = Screen::default();

        t.handle_event(ChannelEvent::Opened, &mut screen);
        t.handle_event(ChannelEvent::Message("not json".to_string()), &mut screen);
        t.handle_event(ChannelEvent::Message(r#"{"type":"exit"}"#.to_string()), &mut screen);
        t.handle_event(
            ChannelEvent::Message(r#"{"type":"output","data":"ok"}"#.to_string()),
            &mut screen,
        );

        assert_eq!(t.state(), TransportState::Open);
        assert_eq!(screen.written, "ok");
    }

    #[test]
    fn test_local_close() {
        let (mut t, _, closed) = transport();
        let mut screen = Screen::default();

        t.handle_event(ChannelEvent::Opened, &mut screen);
        t.close();

        assert!(*closed.borrow());
        assert_eq!(t.state(), TransportState::Closed);
        assert!(screen.written.is_empty());
    }
}
