/// Process host REST contract consumed by the multiplexer
use async_trait::async_trait;
use devshell_types::{CreateSessionRequest, Session, SessionCreated};

use crate::config::Platform;
use crate::error::Result;

/// Session endpoints of the process host
///
/// Futures are not `Send`: the multiplexer runs on one logical thread.
#[async_trait(?Send)]
pub trait SessionApi {
    /// `GET /api/sessions`
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// `POST /api/sessions`
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionCreated>;

    /// `DELETE /api/sessions/{id}`, best-effort termination
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

/// Shell line that enters `project_path` and optionally starts `command`
pub fn launch_command(project_path: &str, command: Option<&str>, platform: Platform) -> String {
    let cd = format!("cd \"{}\"", project_path);
    match command.map(str::trim).filter(|c| !c.is_empty()) {
        Some(command) => format!("{}{}{}", cd, platform.command_separator(), command),
        None => cd,
    }
}
