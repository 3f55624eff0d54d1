//! REST client for a Meilisearch-compatible search index service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::publisher::PageDocument;
use super::{IndexBackend, IndexError};

/// Delay between task status polls.
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Search index service client.
#[derive(Clone)]
pub struct SearchClient {
    base_url: String,
    api_key: String,
    client: Client,
}

/// Accepted-task acknowledgement returned by write endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    task_uid: u64,
}

/// Task status as reported by the tasks endpoint.
#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    results: Vec<IndexInfo>,
}

#[derive(Debug, Deserialize)]
struct IndexInfo {
    uid: String,
}

impl SearchClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, IndexError> {
        let response = builder
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn send_for_task(&self, builder: RequestBuilder) -> Result<u64, IndexError> {
        let response = self.send(builder).await?;
        let task: TaskInfo = response
            .json()
            .await
            .map_err(|e| IndexError::Parse(e.to_string()))?;
        Ok(task.task_uid)
    }
}

#[async_trait]
impl IndexBackend for SearchClient {
    async fn index_exists(&self, uid: &str) -> Result<bool, IndexError> {
        let builder = self.request(Method::GET, &format!("/indexes/{}", uid));
        let response = builder
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(IndexError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<(), IndexError> {
        debug!("creating index '{}'", uid);
        let task = self
            .send_for_task(self.request(Method::POST, "/indexes").json(&serde_json::json!({
                "uid": uid,
                "primaryKey": primary_key,
            })))
            .await?;
        self.wait_for_task(task).await
    }

    async fn set_filterable_attributes(
        &self,
        uid: &str,
        attributes: &[&str],
    ) -> Result<(), IndexError> {
        let path = format!("/indexes/{}/settings/filterable-attributes", uid);
        let task = self
            .send_for_task(self.request(Method::PUT, &path).json(&attributes))
            .await?;
        self.wait_for_task(task).await
    }

    async fn add_documents(
        &self,
        uid: &str,
        documents: &[PageDocument],
    ) -> Result<u64, IndexError> {
        let path = format!("/indexes/{}/documents?primaryKey=id", uid);
        self.send_for_task(self.request(Method::POST, &path).json(&documents))
            .await
    }

    async fn wait_for_task(&self, task_uid: u64) -> Result<(), IndexError> {
        loop {
            let response = self
                .send(self.request(Method::GET, &format!("/tasks/{}", task_uid)))
                .await?;
            let status: TaskStatus = response
                .json()
                .await
                .map_err(|e| IndexError::Parse(e.to_string()))?;

            match status.status.as_str() {
                "succeeded" => return Ok(()),
                "failed" | "canceled" => {
                    return Err(IndexError::Task {
                        uid: task_uid,
                        message: status
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| status.status.clone()),
                    });
                }
                _ => tokio::time::sleep(TASK_POLL_INTERVAL).await,
            }
        }
    }

    async fn swap_indexes(&self, first: &str, second: &str) -> Result<(), IndexError> {
        debug!("swapping indexes '{}' and '{}'", first, second);
        let payload = serde_json::json!([{ "indexes": [first, second] }]);
        let task = self
            .send_for_task(self.request(Method::POST, "/swap-indexes").json(&payload))
            .await?;
        self.wait_for_task(task).await
    }

    async fn delete_index(&self, uid: &str) -> Result<(), IndexError> {
        debug!("deleting index '{}'", uid);
        let task = self
            .send_for_task(self.request(Method::DELETE, &format!("/indexes/{}", uid)))
            .await?;
        self.wait_for_task(task).await
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexError> {
        let response = self
            .send(self.request(Method::GET, "/indexes?limit=1000"))
            .await?;
        let list: IndexList = response
            .json()
            .await
            .map_err(|e| IndexError::Parse(e.to_string()))?;
        Ok(list.results.into_iter().map(|i| i.uid).collect())
    }
}
