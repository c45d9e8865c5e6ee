//! REST transport for the task collection.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Operation | Request              | Success          |
//! |-----------|----------------------|------------------|
//! | fetch     | `GET {base}`         | `200` task array |
//! | create    | `POST {base}`        | `200` task       |
//! | update    | `PUT {base}/{id}`    | `200` task       |
//! | delete    | `DELETE {base}/{id}` | any `2xx`        |
//!
//! Non-success responses become [`RemoteError::Status`], carrying the
//! `message` field of a JSON error body when the server sent one.

use std::time::Duration;

use futures::FutureExt;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{ErrorBody, RemoteError, RemoteFuture, TaskRemote, UpdateRequest};
use crate::domain::{NewTask, Task, TaskId};

/// Task remote backed by a REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpTaskRemote {
    /// HTTP client.
    client: reqwest::Client,
    /// Collection URL without a trailing slash.
    base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    timeout: Option<Duration>,
}

impl HttpTaskRemote {
    /// Creates a remote for the collection at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    /// Creates a remote that reuses an existing client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Returns the collection URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn item_url(&self, id: TaskId) -> String {
        format!("{}/{id}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // Timeout in ms will not exceed u64
fn map_transport_error(error: &reqwest::Error, timeout: Option<Duration>) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(timeout.map_or(0, |timeout| timeout.as_millis() as u64))
    } else if error.is_decode() {
        RemoteError::InvalidResponse(error.to_string())
    } else {
        RemoteError::ConnectionFailed(error.to_string())
    }
}

async fn status_error(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .ok()
        .and_then(|body| ErrorBody::message_from(&body));
    RemoteError::Status { status, message }
}

async fn send(builder: RequestBuilder, timeout: Option<Duration>) -> Result<Response, RemoteError> {
    let response = builder
        .send()
        .await
        .map_err(|error| map_transport_error(&error, timeout))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

async fn send_json<T: DeserializeOwned>(
    builder: RequestBuilder,
    timeout: Option<Duration>,
) -> Result<T, RemoteError> {
    send(builder, timeout)
        .await?
        .json()
        .await
        .map_err(|error| RemoteError::InvalidResponse(error.to_string()))
}

impl TaskRemote for HttpTaskRemote {
    fn fetch_all(&self) -> RemoteFuture<Vec<Task>> {
        let builder = self.request(Method::GET, &self.base_url);
        let timeout = self.timeout;
        async move { send_json(builder, timeout).await }.boxed()
    }

    fn create(&self, task: NewTask) -> RemoteFuture<Task> {
        let builder = self.request(Method::POST, &self.base_url).json(&task);
        let timeout = self.timeout;
        async move { send_json(builder, timeout).await }.boxed()
    }

    fn update(&self, request: UpdateRequest) -> RemoteFuture<Task> {
        let builder = self.request(Method::PUT, &self.item_url(request.id));
        // The update endpoint replaces the stored record, so send the full
        // merged record whenever it is known.
        let builder = match &request.merged {
            Some(merged) => builder.json(merged),
            None => builder.json(&request.patch),
        };
        let timeout = self.timeout;
        async move { send_json(builder, timeout).await }.boxed()
    }

    fn delete(&self, id: TaskId) -> RemoteFuture<()> {
        let builder = self.request(Method::DELETE, &self.item_url(id));
        let timeout = self.timeout;
        async move { send(builder, timeout).await.map(drop) }.boxed()
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
