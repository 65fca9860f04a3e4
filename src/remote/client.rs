//! HTTP client for the remote project backend.
//!
//! Configuration comes from [`Config`](crate::config::Config):
//! - `remote_url` - Base URL (default: `http://localhost:17020/api/v1`)
//! - `api_key` - Bearer token for the signed-in user (optional for local backends)

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{
    ArtifactUpload, CreateRemoteProject, RemoteBackend, RemoteEvent, RemoteProject,
    UpdateRemoteProject, UploadedArtifact,
};

/// Default URL for local development.
pub const DEFAULT_URL: &str = "http://localhost:17020/api/v1";

/// Failures talking to the remote backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: sign-in required or token expired")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

/// HTTP client for the remote project backend.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional auth header.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(error_for(status, response).await)
        }
    }

    /// Handle response that may return empty body (204 No Content).
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(error_for(status, response).await)
        }
    }
}

async fn error_for(status: StatusCode, response: reqwest::Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(body),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        _ => ClientError::Server(format!("{}: {}", status, body)),
    }
}

impl RemoteBackend for RemoteClient {
    async fn create_project(
        &self,
        input: &CreateRemoteProject,
    ) -> Result<RemoteProject, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/projects")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn update_project(&self, input: &UpdateRemoteProject) -> Result<(), ClientError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/projects/{}", input.project_id),
            )
            .json(input)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    async fn upload_artifact(&self, input: &ArtifactUpload) -> Result<UploadedArtifact, ClientError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/projects/{}/artifacts/{}", input.project_id, input.key()),
            )
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn append_event(&self, input: &RemoteEvent) -> Result<(), ClientError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/projects/{}/events", input.project_id),
            )
            .json(input)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    async fn list_projects(&self) -> Result<Vec<RemoteProject>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/projects")
            .send()
            .await?;
        self.handle_response(response).await
    }
}
