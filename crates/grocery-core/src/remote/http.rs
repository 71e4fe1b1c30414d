//! reqwest implementation of [`RemoteApi`]

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::models::{GroceryItem, GroceryList, ItemId, ListId, SyncSnapshot};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// HTTP client for the grocery backend
#[derive(Clone)]
pub struct HttpRemoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteClient {
    /// Build a client for `base_url` with connect and request timeouts
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::InvalidConfiguration(error.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, request: RequestBuilder) -> RemoteResult<String> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| network_error(&error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| network_error(&error))?;

        if !status.is_success() {
            return Err(RemoteError::Http {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|error| {
            RemoteError::Decode(format!("{error} in {}", compact_text(&body)))
        })
    }
}

impl RemoteApi for HttpRemoteClient {
    async fn fetch_snapshot(&self, user_id: &str) -> RemoteResult<SyncSnapshot> {
        tracing::debug!("Fetching snapshot for {user_id}");
        let request = self
            .client
            .get(self.url("api/sync"))
            .query(&[("userId", user_id)]);
        self.send_json(request).await
    }

    async fn create_list(&self, list: &GroceryList) -> RemoteResult<GroceryList> {
        tracing::debug!("Mirroring list {}", list.id);
        let request = self.client.post(self.url("api/lists")).json(list);
        self.send_json(request).await
    }

    async fn delete_list(&self, id: &ListId) -> RemoteResult<()> {
        tracing::debug!("Deleting remote list {id}");
        let path = format!("api/lists/{}", urlencoding::encode(id.as_str()));
        self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn create_item(&self, item: &GroceryItem) -> RemoteResult<GroceryItem> {
        tracing::debug!("Mirroring item {}", item.id);
        let request = self.client.post(self.url("api/items")).json(item);
        self.send_json(request).await
    }

    async fn delete_item(&self, id: &ItemId) -> RemoteResult<()> {
        tracing::debug!("Deleting remote item {id}");
        let path = format!("api/items/{}", urlencoding::encode(id.as_str()));
        self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn clear_completed(&self, list_id: &ListId) -> RemoteResult<()> {
        tracing::debug!("Clearing completed items of remote list {list_id}");
        let path = format!(
            "api/lists/{}/completed-items",
            urlencoding::encode(list_id.as_str())
        );
        self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn clear_all(&self, user_id: &str, confirm_token: &str) -> RemoteResult<String> {
        tracing::debug!("Clearing all remote data for {user_id}");
        let request = self
            .client
            .delete(self.url("admin/clear-all"))
            .query(&[("userId", user_id), ("confirmToken", confirm_token)]);
        let body = self.send(request).await?;

        // The backend answers with either a JSON string or plain text
        Ok(serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_string()))
    }
}

fn network_error(error: &reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Network(format!("request timed out: {error}"))
    } else {
        RemoteError::Network(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
