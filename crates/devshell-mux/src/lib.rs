// Terminal session multiplexer
//
// Binds each remote shell session to a live message channel and a rendering
// surface, keeps the ordered set of open tabs, and routes navigation, resize
// and input events to the right one. Browser APIs stay behind the capability
// traits so the whole lifecycle can run against fakes.

mod api;
mod channel;
mod config;
mod controller;
mod error;
mod navigation;
mod prefs;
mod registry;
mod resize;
mod scheduler;
mod surface;
mod transport;
mod view;

// Re-export public API
pub use api::{launch_command, SessionApi};
pub use channel::{Channel, ChannelEvent, ChannelEvents, Connector, TransportId};
pub use config::{MuxConfig, Platform};
pub use controller::{Multiplexer, MuxServices};
pub use error::{MuxError, Result};
pub use navigation::{interpret_key, GestureTracker, KeyChord, KeyCommand, Overlays, VirtualKey};
pub use prefs::{load_preferences, save_tool_commands, KeyValueStore};
pub use registry::{Direction, Removed, SessionRegistry, Tab};
pub use resize::ResizeCoordinator;
pub use scheduler::{Scheduler, Task};
pub use surface::{InputHandler, RenderingSurface, SurfaceFactory};
pub use transport::{Transition, Transport, TransportState, CLOSED_ANNOTATION, ERROR_ANNOTATION};
pub use view::{MuxView, Notice, TabInfo};

pub use devshell_types as types;
