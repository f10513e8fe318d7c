//! Contains the transport used to send scenario requests to the explorer API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;

/// Failure to obtain a response at all.
///
/// A response with an unexpected status code is *not* a transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed to connect, send, time out, or read the body.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The response status code.
    pub status: StatusCode,
    /// The raw response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response from a status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends JSON requests on behalf of the scenario.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Sends `body` as a JSON `POST` request to `url` and buffers the response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// A [`Transport`] backed by a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a remote whose requests time out after `timeout`.
    ///
    /// Without a timeout, the client's default behavior applies.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("scanload/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpRemote {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }
}
