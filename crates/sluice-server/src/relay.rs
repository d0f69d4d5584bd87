//! Completion queue relay
//!
//! Workers that cannot reach the HTTP callback drop a message on a storage
//! queue instead. This module polls that queue and relays each message as
//! the completion event for the job it names.
//!
//! Queue messages are the base64-encoded job ID, either raw or wrapped as
//! `{"jobId": "..."}`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use sluice_core::{JobExecutionService, JobId, COMPLETION_EVENT};

use crate::error::{ServerError, ServerResult};

/// Background poller relaying queue messages into the job runtime
pub struct CompletionRelay {
    /// Job execution service events are relayed into
    runtime: Arc<JobExecutionService>,

    /// Queue URL including its SAS query string
    queue_url: String,

    /// Poll interval
    poll_interval: Duration,

    /// HTTP client
    client: Client,
}

impl CompletionRelay {
    /// Create a new completion relay
    pub fn new(runtime: Arc<JobExecutionService>, queue_url: String, poll_interval: Duration) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            runtime,
            queue_url,
            poll_interval,
            client,
        }
    }

    /// Get the URL for reading messages, keeping the SAS query intact
    fn messages_url(&self) -> String {
        match self.queue_url.split_once('?') {
            Some((base, query)) => format!("{}/messages?{}", base.trim_end_matches('/'), query),
            None => format!("{}/messages", self.queue_url.trim_end_matches('/')),
        }
    }

    /// Get the URL for deleting a specific message
    fn delete_url(&self, message_id: &str) -> String {
        match self.queue_url.split_once('?') {
            Some((base, query)) => format!(
                "{}/messages/{}?{}",
                base.trim_end_matches('/'),
                message_id,
                query
            ),
            None => format!(
                "{}/messages/{}",
                self.queue_url.trim_end_matches('/'),
                message_id
            ),
        }
    }

    /// Poll the queue forever
    pub async fn run(self) {
        info!(
            poll_interval_seconds = self.poll_interval.as_secs(),
            "Starting completion queue relay"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.drain_once().await {
                warn!(error = %e, "Completion queue poll failed");
            }
        }
    }

    /// Read the queue once and relay every message it returns
    pub async fn drain_once(&self) -> ServerResult<()> {
        let response = self.client.get(self.messages_url()).send().await?;
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ServerError::QueueError(format!(
                "Failed to read completion queue: {}",
                error_body
            )));
        }

        let body = response.text().await?;
        for message in parse_queue_messages(&body) {
            match self.relay_message(&message).await {
                Ok(job_id) => {
                    debug!(%job_id, message_id = %message.id, "Relayed completion signal");
                }
                // Permanent failures: redelivery cannot help, drop the message
                Err(ServerError::NotFound(resource)) => {
                    warn!(%resource, message_id = %message.id, "Dropping completion message for unknown job");
                }
                Err(ServerError::Conflict(reason)) => {
                    warn!(%reason, message_id = %message.id, "Dropping completion message for finished job");
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Failed to relay completion message");
                    continue;
                }
            }
            self.delete_message(&message).await?;
        }

        Ok(())
    }

    /// Raise the completion event for the job a message names
    async fn relay_message(&self, message: &QueueMessage) -> ServerResult<JobId> {
        let decoded = base64::decode(&message.text).map_err(|e| {
            ServerError::ValidationError(format!("Invalid queue message encoding: {}", e))
        })?;
        let text = String::from_utf8(decoded).map_err(|e| {
            ServerError::ValidationError(format!("Invalid queue message text: {}", e))
        })?;

        let job_id = parse_job_id(&text)?;
        self.runtime
            .raise_event(&job_id, COMPLETION_EVENT, json!({"source": "queue"}))
            .await?;
        Ok(job_id)
    }

    /// Delete a message using its pop receipt
    async fn delete_message(&self, message: &QueueMessage) -> ServerResult<()> {
        let response = self
            .client
            .delete(self.delete_url(&message.id))
            .query(&[("popreceipt", message.pop_receipt.as_str())])
            .send()
            .await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ServerError::QueueError(format!(
                "Failed to delete queue message {}: {}",
                message.id, error_body
            )));
        }

        Ok(())
    }
}

/// One message read from the queue
#[derive(Debug, PartialEq)]
struct QueueMessage {
    id: String,
    pop_receipt: String,
    text: String,
}

/// Read the job ID out of a decoded message body
fn parse_job_id(text: &str) -> ServerResult<JobId> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServerError::ValidationError(
            "Empty queue message".to_string(),
        ));
    }

    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)?;
        let id = value["jobId"].as_str().ok_or_else(|| {
            ServerError::ValidationError("Queue message JSON has no jobId".to_string())
        })?;
        return Ok(JobId(id.to_string()));
    }

    Ok(JobId(trimmed.to_string()))
}

/// Pull every QueueMessage block out of the XML envelope
fn parse_queue_messages(xml: &str) -> Vec<QueueMessage> {
    let mut messages = Vec::new();
    let mut rest = xml;

    while let Some(block) = extract_tag(rest, "QueueMessage") {
        if let (Some(id), Some(pop_receipt), Some(text)) = (
            extract_tag(block.content, "MessageId"),
            extract_tag(block.content, "PopReceipt"),
            extract_tag(block.content, "MessageText"),
        ) {
            messages.push(QueueMessage {
                id: id.content.to_string(),
                pop_receipt: pop_receipt.content.to_string(),
                text: text.content.to_string(),
            });
        }
        rest = &rest[block.end..];
    }

    messages
}

struct TagMatch<'a> {
    content: &'a str,
    end: usize,
}

/// Find the content of the first `<tag>...</tag>` pair in the input
fn extract_tag<'a>(input: &'a str, tag: &str) -> Option<TagMatch<'a>> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = input.find(&open)? + open.len();
    let offset = input[start..].find(&close)?;

    Some(TagMatch {
        content: &input[start..start + offset],
        end: start + offset + close.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tag() {
        let input = "<Outer><Inner>value</Inner></Outer>";

        let inner = extract_tag(input, "Inner").unwrap();
        assert_eq!(inner.content, "value");

        assert!(extract_tag(input, "Missing").is_none());
    }

    #[test]
    fn test_parse_queue_messages() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<QueueMessagesList>
  <QueueMessage>
    <MessageId>msg-1</MessageId>
    <InsertionTime>Fri, 01 Aug 2025 10:00:00 GMT</InsertionTime>
    <PopReceipt>pop-1</PopReceipt>
    <DequeueCount>1</DequeueCount>
    <MessageText>am9iLTE=</MessageText>
  </QueueMessage>
  <QueueMessage>
    <MessageId>msg-2</MessageId>
    <PopReceipt>pop-2</PopReceipt>
    <MessageText>am9iLTI=</MessageText>
  </QueueMessage>
</QueueMessagesList>"#;

        let messages = parse_queue_messages(xml);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg-1");
        assert_eq!(messages[0].pop_receipt, "pop-1");
        assert_eq!(messages[0].text, "am9iLTE=");
        assert_eq!(messages[1].id, "msg-2");
    }

    #[test]
    fn test_parse_queue_messages_empty_list() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?><QueueMessagesList></QueueMessagesList>"#;
        assert!(parse_queue_messages(xml).is_empty());
    }

    #[test]
    fn test_parse_job_id_raw() {
        let job_id = parse_job_id("  job-123 \n").unwrap();
        assert_eq!(job_id.0, "job-123");
    }

    #[test]
    fn test_parse_job_id_json() {
        let job_id = parse_job_id(r#"{"jobId": "job-456"}"#).unwrap();
        assert_eq!(job_id.0, "job-456");

        let missing = parse_job_id(r#"{"instance": "job-456"}"#);
        assert!(matches!(missing, Err(ServerError::ValidationError(_))));
    }

    #[test]
    fn test_parse_job_id_empty() {
        assert!(matches!(
            parse_job_id("   "),
            Err(ServerError::ValidationError(_))
        ));
    }
}
