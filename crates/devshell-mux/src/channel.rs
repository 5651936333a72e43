/// Duplex message channel abstraction
///
/// A `Connector` opens one channel per transport. The host reports what
/// happens on the channel by emitting `ChannelEvent`s through the
/// `ChannelEvents` handle it was given at connect time.
use std::rc::Rc;

use devshell_types::SessionId;

use crate::error::Result;

/// Process-unique transport identity, distinguishes a reopened tab's channel
/// from the one it replaced
pub type TransportId = u64;

/// Something that happened on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Message(String),
    Closed,
    Errored(String),
}

type EventSink = Rc<dyn Fn(&str, TransportId, ChannelEvent)>;

/// Handle through which a host delivers channel events to the multiplexer
#[derive(Clone)]
pub struct ChannelEvents {
    session_id: SessionId,
    transport_id: TransportId,
    sink: EventSink,
}

impl ChannelEvents {
    pub fn new(session_id: SessionId, transport_id: TransportId, sink: EventSink) -> Self {
        Self {
            session_id,
            transport_id,
            sink,
        }
    }

    pub fn emit(&self, event: ChannelEvent) {
        (self.sink)(&self.session_id, self.transport_id, event);
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transport_id(&self) -> TransportId {
        self.transport_id
    }
}

impl std::fmt::Debug for ChannelEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEvents")
            .field("session_id", &self.session_id)
            .field("transport_id", &self.transport_id)
            .finish()
    }
}

/// Outbound half of an open channel
pub trait Channel {
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Close the channel. Events the host emits afterwards are ignored.
    fn close(&mut self);
}

/// Opens channels keyed by session id
pub trait Connector {
    fn connect(&mut self, session_id: &str, events: ChannelEvents) -> Result<Box<dyn Channel>>;
}
