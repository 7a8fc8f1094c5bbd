//! HTTP transport speaking the UI message stream protocol.
//!
//! The request is a single POST of the whole conversation:
//!
//! ```text
//! POST /api/chat
//! { "messages": [ { "id": "...", "role": "user", "parts": [...] }, ... ] }
//! ```
//!
//! The response is a server-sent event stream of JSON chunks, one per
//! `data:` line, terminated by `data: [DONE]`:
//!
//! ```text
//! data: {"type":"text-delta","id":"t1","delta":"Hi"}
//! data: {"type":"reasoning-delta","id":"r1","delta":"..."}
//! data: {"type":"tool-input-available","toolCallId":"c1","toolName":"add","input":{...}}
//! data: {"type":"finish"}
//! data: [DONE]
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc::Sender;

use super::provider::{Transport, TransportError, TransportRequest};
use super::types::StreamEvent;
use crate::core::message::Message;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

/// One JSON chunk of the UI message stream. Unknown chunk types
/// (`start`, `text-start`, `finish-step`, ...) are ignored.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum UiChunk {
    TextDelta {
        delta: String,
    },
    ReasoningDelta {
        delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        #[serde(default)]
        output: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error_text: String,
    },
    Finish,
    #[serde(other)]
    Other,
}

/// What a single `data:` payload means for the stream.
#[derive(Debug, PartialEq)]
enum Parsed {
    Event(StreamEvent),
    Finished,
    Failed(String),
    Skip,
}

// ============================================================================
// Translation Layer
// ============================================================================

fn arguments_from(input: Value) -> Map<String, Value> {
    match input {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    }
}

fn parse_data(data: &str) -> Result<Parsed, TransportError> {
    if data == "[DONE]" {
        return Ok(Parsed::Finished);
    }
    let chunk: UiChunk =
        serde_json::from_str(data).map_err(|e| TransportError::Parse(e.to_string()))?;
    Ok(match chunk {
        UiChunk::TextDelta { delta } if delta.is_empty() => Parsed::Skip,
        UiChunk::TextDelta { delta } => Parsed::Event(StreamEvent::TextDelta(delta)),
        UiChunk::ReasoningDelta { delta } if delta.is_empty() => Parsed::Skip,
        UiChunk::ReasoningDelta { delta } => Parsed::Event(StreamEvent::ReasoningDelta(delta)),
        UiChunk::ToolInputAvailable {
            tool_call_id,
            tool_name,
            input,
        } => Parsed::Event(StreamEvent::ToolCall {
            id: tool_call_id,
            name: tool_name,
            arguments: arguments_from(input),
        }),
        UiChunk::ToolOutputAvailable {
            tool_call_id,
            output,
        } => Parsed::Event(StreamEvent::ToolOutput {
            id: tool_call_id,
            output,
        }),
        UiChunk::ToolOutputError {
            tool_call_id,
            error_text,
        } => Parsed::Event(StreamEvent::ToolError {
            id: tool_call_id,
            error: error_text,
        }),
        UiChunk::Error { error_text } => Parsed::Failed(error_text),
        UiChunk::Finish => Parsed::Finished,
        UiChunk::Other => Parsed::Skip,
    })
}

/// Decodes one complete line (including its `\n`) as UTF-8.
fn decode_line(raw: &[u8]) -> Result<&str, TransportError> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|e| TransportError::Parse(format!("stream line is not UTF-8: {e}")))
}

// ============================================================================
// Transport Implementation
// ============================================================================

pub struct HttpTransport {
    endpoint: String,
    api_key: Option<String>,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            headers,
            client: reqwest::Client::new(),
        }
    }

    async fn send_request(
        &self,
        body: &ChatRequest<'_>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::Config(format!("invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::Config(format!("invalid value for header '{name}': {e}"))
            })?;
            builder = builder.header(header_name, header_value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        debug!("Chat endpoint response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Chat endpoint error: {} - {}", status, err_body);
            return Err(TransportError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn stream(
        &self,
        request: TransportRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), TransportError> {
        let body = ChatRequest {
            messages: request.messages,
        };
        info!(
            "Chat request: endpoint={}, message_count={}",
            self.endpoint,
            request.messages.len()
        );

        let response = self.send_request(&body).await?;

        let mut bytes = response.bytes_stream();
        // Raw bytes: a multi-byte character may be split across chunks
        let mut buffer: Vec<u8> = Vec::new();
        let mut event_count = 0usize;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| TransportError::Network(e.to_string()))?;
            debug!("Raw chunk received: {} bytes", chunk.len());
            buffer.extend_from_slice(&chunk);

            // Process complete lines from buffer
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = decode_line(&raw)?;

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match parse_data(data.trim())? {
                    Parsed::Event(event) => {
                        event_count += 1;
                        debug!("Forwarding {} event", event.label());
                        if sender.send(event).await.is_err() {
                            warn!("Stream event send failed: receiver dropped");
                            return Err(TransportError::ChannelClosed);
                        }
                    }
                    Parsed::Finished => {
                        info!("Stream complete: {} events", event_count);
                        return Ok(());
                    }
                    Parsed::Failed(message) => {
                        warn!("Stream reported error: {}", message);
                        return Err(TransportError::Stream(message));
                    }
                    Parsed::Skip => {}
                }
            }
        }

        info!("Stream ended without finish marker: {} events", event_count);
        Ok(())
    }
}
