//! Core types shared by the devshell crates
//!
//! Session records and REST payloads exchanged with the process host, the four
//! message shapes carried by a terminal channel, and the preferences record kept
//! in client-local storage.

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Columns used when the rendering surface cannot report its geometry
pub const DEFAULT_COLS: u16 = 120;

/// Rows used when the rendering surface cannot report its geometry
pub const DEFAULT_ROWS: u16 = 30;

// ============================================================================
// Sessions
// ============================================================================

/// Session ID type (opaque string assigned by the process host)
pub type SessionId = String;

/// Lifecycle status reported by the process host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Exited,
    Killed,
    Stale,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Exited => write!(f, "exited"),
            SessionStatus::Killed => write!(f, "killed"),
            SessionStatus::Stale => write!(f, "stale"),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A remote shell process as mirrored from the listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub last_activity_at: Option<f64>,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// First eight characters of the id followed by an ellipsis
    pub fn short_id(&self) -> String {
        let prefix: String = self.id.chars().take(8).collect();
        format!("{}...", prefix)
    }

    pub fn shell_name(&self) -> &str {
        self.shell.as_deref().filter(|s| !s.is_empty()).unwrap_or("shell")
    }
}

/// Body of `GET /api/sessions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionList {
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// Body of `POST /api/sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub cwd: Option<String>,
    pub shell: Option<String>,
    pub cols: u16,
    pub rows: u16,
}

/// Response of `POST /api/sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: SessionId,
}

// ============================================================================
// Geometry
// ============================================================================

/// Terminal viewport size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A surface that has not been laid out reports zero cells
    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

// ============================================================================
// Terminal channel messages
// ============================================================================

/// Messages sent from client to process host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Raw bytes for the process stdin
    Input { data: String },
    /// Viewport geometry change
    Resize { cols: u16, rows: u16 },
}

impl ClientMessage {
    pub fn input(data: impl Into<String>) -> Self {
        ClientMessage::Input { data: data.into() }
    }

    pub fn resize(geometry: Geometry) -> Self {
        ClientMessage::Resize {
            cols: geometry.cols,
            rows: geometry.rows,
        }
    }
}

/// Messages sent from process host to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Scrollback buffered before this attach, sent once
    Replay { data: String },
    /// Live process output
    Output { data: String },
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Preferences
// ============================================================================

/// A user-defined command preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub name: String,
    pub command: String,
    pub cwd: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// AI command-line tools that can be launched in a project directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTool {
    Claude,
    Codex,
    Gemini,
}

impl AiTool {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "claude" => Some(AiTool::Claude),
            "codex" => Some(AiTool::Codex),
            "gemini" => Some(AiTool::Gemini),
            _ => None,
        }
    }
}

/// Client-local user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub claude_command: String,
    pub codex_command: String,
    pub gemini_command: String,
    pub projects_path: String,
    pub quick_actions: Vec<QuickAction>,
}

impl Preferences {
    pub fn command_for(&self, tool: AiTool) -> &str {
        match tool {
            AiTool::Claude => &self.claude_command,
            AiTool::Codex => &self.codex_command,
            AiTool::Gemini => &self.gemini_command,
        }
    }

    /// Set the command for `tool`; a blank command restores the default
    pub fn set_command(&mut self, tool: AiTool, command: &str) {
        let command = command.trim();
        let command = if command.is_empty() {
            Preferences::default().command_for(tool).to_string()
        } else {
            command.to_string()
        };
        match tool {
            AiTool::Claude => self.claude_command = command,
            AiTool::Codex => self.codex_command = command,
            AiTool::Gemini => self.gemini_command = command,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            claude_command: "claude".to_string(),
            codex_command: "codex".to_string(),
            gemini_command: "gemini".to_string(),
            projects_path: String::new(),
            quick_actions: Vec::new(),
        }
    }
}
