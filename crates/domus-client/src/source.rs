use std::path::PathBuf;
use std::time::Duration;

use domus_core::error::AppError;
use domus_core::models::{WorkItem, parse_work_items};
use domus_core::traits::WorkItemSource;
use reqwest::Client;
use reqwest::header::ACCEPT;

/// Work items served as a JSON array by an HTTP endpoint.
#[derive(Clone)]
pub struct HttpWorkItemSource {
    client: Client,
    url: String,
    credentials: Option<(String, String)>,
    timeout_secs: u64,
}

impl HttpWorkItemSource {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            credentials: None,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }
}

impl WorkItemSource for HttpWorkItemSource {
    async fn fetch_items(&self) -> Result<Vec<WorkItem>, AppError> {
        tracing::info!(url = %self.url, "Fetching work items");

        let mut request = self.client.get(&self.url).header(ACCEPT, "application/json");
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(format!(
                "Work-item source rejected credentials (HTTP 401) at {}",
                self.url
            )));
        }
        if !status.is_success() {
            return Err(AppError::SourceError(format!(
                "HTTP {} from work-item source {}",
                status.as_u16(),
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::SourceError(format!("Failed to read work item list: {e}")))?;
        let items = parse_work_items(&body)?;
        tracing::info!(count = items.len(), "Work items received");
        Ok(items)
    }
}

/// Work items read from a local JSON file (same format as the HTTP source).
#[derive(Debug, Clone)]
pub struct FileWorkItemSource {
    path: PathBuf,
}

impl FileWorkItemSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WorkItemSource for FileWorkItemSource {
    async fn fetch_items(&self) -> Result<Vec<WorkItem>, AppError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::SourceError(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        parse_work_items(&body)
    }
}
