//! # Request / Reply
//!
//! Synchronous-style calls over the bus. The waiter subscribes for
//! `Response`s carrying the request's id *before* publishing, so a fast
//! responder can never be missed.
//!
//! Broadcast requests can be answered by several agents; callers pick a
//! [`ReplyPolicy`]. Nothing here retries: a timeout is reported and the
//! caller decides.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::bus::{MessageBus, Subscription};
use super::message::{AgentMessage, MessageClass};
use crate::error::{A2aError, A2aResult};

/// How to reconcile multiple responses to one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    /// Resolve with the first correlated response
    #[default]
    FirstWins,
    /// Gather every correlated response until the timeout
    CollectAll,
}

fn subscribe_replies(bus: &MessageBus, request: &AgentMessage) -> A2aResult<Subscription> {
    if !matches!(request, AgentMessage::Request { .. }) {
        return Err(A2aError::UnsupportedType(format!(
            "only requests can be correlated, got {:?}",
            request.class()
        )));
    }
    let request_id = request.id().to_string();
    Ok(bus.subscribe(MessageClass::Response, move |m| {
        m.is_response_to(&request_id)
    })?)
}

/// Publish `request` and wait for the first correlated response
#[tracing::instrument(skip(bus, request), fields(request_id = %request.id()))]
pub async fn request(
    bus: &MessageBus,
    request: AgentMessage,
    timeout: Duration,
) -> A2aResult<AgentMessage> {
    let mut replies = subscribe_replies(bus, &request)?;
    let request_id = request.id().to_string();
    bus.publish(request)?;

    match tokio::time::timeout(timeout, replies.recv()).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(crate::error::BusError::Closed.into()),
        Err(_) => {
            tracing::warn!(request_id = %request_id, timeout_ms = timeout.as_millis() as u64, "Correlation wait timed out");
            Err(A2aError::Timeout {
                request_id,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Publish `request` and gather correlated responses.
///
/// Stops early once `expected` responses arrived; otherwise waits the full
/// timeout. Zero responses is a timeout.
#[tracing::instrument(skip(bus, request), fields(request_id = %request.id()))]
pub async fn collect_responses(
    bus: &MessageBus,
    request: AgentMessage,
    expected: Option<usize>,
    timeout: Duration,
) -> A2aResult<Vec<AgentMessage>> {
    let mut replies = subscribe_replies(bus, &request)?;
    let request_id = request.id().to_string();
    bus.publish(request)?;

    let deadline = Instant::now() + timeout;
    let mut responses = Vec::new();
    loop {
        if expected.is_some_and(|n| responses.len() >= n) {
            break;
        }
        match tokio::time::timeout_at(deadline, replies.recv()).await {
            Ok(Some(response)) => responses.push(response),
            Ok(None) | Err(_) => break,
        }
    }
    replies.cancel();

    if responses.is_empty() {
        return Err(A2aError::Timeout {
            request_id,
            timeout_ms: timeout.as_millis() as u64,
        });
    }
    tracing::debug!(count = responses.len(), "Collected responses");
    Ok(responses)
}

/// Dispatch on `policy`
pub async fn send_request(
    bus: &MessageBus,
    request: AgentMessage,
    policy: ReplyPolicy,
    timeout: Duration,
) -> A2aResult<Vec<AgentMessage>> {
    match policy {
        ReplyPolicy::FirstWins => self::request(bus, request, timeout).await.map(|r| vec![r]),
        ReplyPolicy::CollectAll => collect_responses(bus, request, None, timeout).await,
    }
}
