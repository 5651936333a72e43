use async_trait::async_trait;
use devshell_mux::types::{CreateSessionRequest, Session, SessionCreated, SessionList};
use devshell_mux::{MuxError, Result, SessionApi};
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;

/// `SessionApi` over the process host's REST endpoints, same origin
pub struct HttpSessionApi {
    base: String,
}

impl HttpSessionApi {
    pub fn new() -> Self {
        Self {
            base: "/api/sessions".to_string(),
        }
    }
}

impl Default for HttpSessionApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl SessionApi for HttpSessionApi {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let response = Request::get(&self.base)
            .send()
            .await
            .map_err(|e| MuxError::Request(format!("Request failed: {}", e)))?;

        let list: SessionList = read_json(response).await?;
        Ok(list.sessions)
    }

    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionCreated> {
        let response = Request::post(&self.base)
            .json(&request)
            .map_err(|e| MuxError::Request(format!("Failed to encode request: {}", e)))?
            .send()
            .await
            .map_err(|e| MuxError::Request(format!("Request failed: {}", e)))?;

        read_json(response).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = Request::delete(&format!("{}/{}", self.base, session_id))
            .send()
            .await
            .map_err(|e| MuxError::Request(format!("Request failed: {}", e)))?;

        check_status(response).await.map(|_| ())
    }
}

/// Non-2xx responses become `MuxError::Status` carrying the body text
async fn check_status(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MuxError::Status {
        status: response.status(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = check_status(response)
        .await?
        .text()
        .await
        .map_err(|e| MuxError::Request(format!("Failed to read response: {}", e)))?;
    Ok(serde_json::from_str(&text)?)
}
