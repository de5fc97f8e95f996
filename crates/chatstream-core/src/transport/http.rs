//! reqwest-backed transport for OpenAI-compatible endpoints

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};

use super::{ChatTransport, ChunkReader};
use crate::error::{Result, TransportError};
use crate::http_client::build_http_client;
use crate::request::ChatRequest;

// Truncate error bodies so large or sensitive responses don't end up in logs.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ChunkReader>> {
        let mut builder = self.client.post(&request.endpoint);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(TransportError::Request)?;

        if !response.status().is_success() {
            return Err(response_to_error(response).await.into());
        }

        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(TransportError::MissingBody.into());
        }

        tracing::debug!(status = response.status().as_u16(), "Response stream opened");
        Ok(Box::new(ResponseReader { response }))
    }
}

/// Reads a response body one chunk at a time.
pub struct ResponseReader {
    response: Response,
}

impl ResponseReader {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkReader for ResponseReader {
    async fn read(&mut self) -> Result<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| TransportError::Read(e.to_string()).into())
    }
}

async fn response_to_error(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };

    TransportError::Status { status, message }
}
