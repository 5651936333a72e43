/// Session registry: the ordered set of open tabs and the active pointer
///
/// Insertion order is tab strip order. At most one tab exists per session id,
/// and the active id, when set, always names a registered tab.
use devshell_types::{Geometry, Session, SessionId};

use crate::surface::RenderingSurface;
use crate::transport::Transport;

/// Direction of travel through the tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Client-side binding of one session to one transport and one surface
pub struct Tab {
    pub session_id: SessionId,
    /// Session metadata as known when the tab was opened; may go stale
    pub metadata: Option<Session>,
    pub transport: Transport,
    pub surface: Box<dyn RenderingSurface>,
    /// Command injected once the transport has opened and settled
    pub pending_command: Option<String>,
    /// Geometry most recently sent on this tab's transport
    pub last_geometry: Option<Geometry>,
}

impl Tab {
    /// Tab strip label: short id and shell, or the bare id without metadata
    pub fn label(&self) -> String {
        match &self.metadata {
            Some(session) => format!("{} • {}", session.short_id(), session.shell_name()),
            None => self.session_id.clone(),
        }
    }

    /// Hover text: full id, working directory and shell
    pub fn title(&self) -> String {
        match &self.metadata {
            Some(session) => format!(
                "{}\n{}\n{}",
                session.id,
                session.cwd.as_deref().unwrap_or("~"),
                session.shell_name()
            ),
            None => self.session_id.clone(),
        }
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("session_id", &self.session_id)
            .field("transport", &self.transport)
            .field("pending_command", &self.pending_command)
            .field("last_geometry", &self.last_geometry)
            .finish()
    }
}

/// Result of removing a tab
#[derive(Debug)]
pub struct Removed {
    pub tab: Tab,
    pub was_active: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    tabs: Vec<Tab>,
    active: Option<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.position(session_id).is_some()
    }

    pub fn get(&self, session_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.session_id == session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.session_id == session_id)
    }

    /// Session ids in tab strip order
    pub fn ids(&self) -> Vec<SessionId> {
        self.tabs.iter().map(|t| t.session_id.clone()).collect()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab> {
        let id = self.active.clone()?;
        self.get_mut(&id)
    }

    /// Append a tab. A tab already registered under the same id is kept and
    /// the new one is handed back.
    pub fn insert(&mut self, tab: Tab) -> Result<(), Tab> {
        if self.contains(&tab.session_id) {
            return Err(tab);
        }
        self.tabs.push(tab);
        Ok(())
    }

    /// Mark a registered tab active. Unknown ids leave the pointer untouched.
    pub fn set_active(&mut self, session_id: &str) -> bool {
        if !self.contains(session_id) {
            return false;
        }
        self.active = Some(session_id.to_string());
        true
    }

    /// Remove a tab. If it was active, the first remaining tab becomes active,
    /// or the pointer clears when none remain.
    pub fn remove(&mut self, session_id: &str) -> Option<Removed> {
        let index = self.position(session_id)?;
        let tab = self.tabs.remove(index);
        let was_active = self.active.as_deref() == Some(session_id);
        if was_active {
            self.active = self.tabs.first().map(|t| t.session_id.clone());
        }
        Some(Removed { tab, was_active })
    }

    /// Neighbour of the active tab in `direction`, clamped at both ends
    pub fn neighbor(&self, direction: Direction) -> Option<SessionId> {
        let current = self.position(self.active.as_deref()?)?;
        let target = match direction {
            Direction::Previous => current.checked_sub(1)?,
            Direction::Next => current + 1,
        };
        self.tabs.get(target).map(|t| t.session_id.clone())
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.session_id == session_id)
    }
}
