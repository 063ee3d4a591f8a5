//! REST Chat Transport
//!
//! This module implements [`ChatTransport`] against the REST + streaming
//! delta endpoints. Requests carry a Bearer token when one is configured;
//! non-success responses are surfaced with their status and body. The delta
//! subscription is a long-lived newline-delimited JSON stream, forwarded
//! frame-by-frame into a channel.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    ChatTransport, DeleteReceipt, EditReceipt, HistoryPage, SendReceipt, TransportError,
};

/// Capacity of the delta forwarding channel
const DELTA_CHANNEL_CAPACITY: usize = 64;

/// REST implementation of the chat transport
#[derive(Debug, Clone)]
pub struct RestTransport {
    base_url: String,
    token: Option<String>,
    client: Client,
}

/// Request body for sending a message
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

/// Request body for editing a message
#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    content: &'a str,
}

impl RestTransport {
    /// Create a transport against the given server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            client: Client::new(),
        }
    }

    /// Attach a Bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the full URL for an API endpoint
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Add the auth header when a token is configured
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Map a non-success response to a transport error
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        Err(TransportError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl ChatTransport for RestTransport {
    async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendReceipt, TransportError> {
        let url = self.api_url(&format!("/api/conversations/{}/messages", conversation_id));
        let response = self
            .authorize(self.client.post(&url))
            .json(&SendMessageRequest { content })
            .send()
            .await?;
        let response = Self::check(response).await?;
        response
            .json::<SendReceipt>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn edit_message(
        &self,
        message_id: Uuid,
        content: &str,
    ) -> Result<EditReceipt, TransportError> {
        let url = self.api_url(&format!("/api/messages/{}", message_id));
        let response = self
            .authorize(self.client.patch(&url))
            .json(&EditMessageRequest { content })
            .send()
            .await?;
        let response = Self::check(response).await?;
        response
            .json::<EditReceipt>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn delete_message(&self, message_id: Uuid) -> Result<DeleteReceipt, TransportError> {
        let url = self.api_url(&format!("/api/messages/{}", message_id));
        let response = self.authorize(self.client.delete(&url)).send().await?;
        let response = Self::check(response).await?;
        response
            .json::<DeleteReceipt>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn fetch_history(
        &self,
        conversation_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, TransportError> {
        let url = self.api_url(&format!(
            "/api/conversations/{}/messages?page={}&page_size={}",
            conversation_id, page, page_size
        ));
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check(response).await?;
        response
            .json::<HistoryPage>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn subscribe_deltas(
        &self,
        conversation_id: Uuid,
    ) -> Result<mpsc::Receiver<serde_json::Value>, TransportError> {
        let url = self.api_url(&format!("/api/conversations/{}/deltas", conversation_id));
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check(response).await?;

        let (tx, rx) = mpsc::channel(DELTA_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        tracing::warn!("delta stream for {} ended: {}", conversation_id, err);
                        break;
                    }
                };
                buffer.extend_from_slice(&chunk);
                while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = trim_line(&line);
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<serde_json::Value>(line) {
                        Ok(value) => {
                            if tx.send(value).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!("dropping malformed delta line: {}", err);
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// Strip the trailing newline (and carriage return) from one stream line
fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
