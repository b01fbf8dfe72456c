//! Push notification dispatch with a consecutive-failure token policy.
//!
//! Tokens are sent in gateway-sized batches. Each ticket either resets the
//! token's failure counter, bumps it, or deletes the token once it reaches
//! the strike limit.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::model::PushToken;
use crate::traits::{PushGateway, PushMessage, PushTicket, Store};

/// Expo accepts at most this many messages per request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Gateway error code for uninstalled apps; such tokens are dropped at once.
pub const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

/// Dispatch tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PushPolicy {
    /// Consecutive failures after which a token is deleted.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Messages per gateway request, capped at [`MAX_BATCH_SIZE`].
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Batches in flight at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_max_failures() -> u32 {
    3
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_parallelism() -> usize {
    4
}

impl Default for PushPolicy {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
        }
    }
}

/// What to show on the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Row change implied by one delivery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// Success with a clean record; no write needed.
    Keep,
    /// Success after earlier failures; counter goes back to zero.
    Reset,
    /// Failure below the limit; store the new count.
    Increment(u32),
    Delete,
}

/// Summary of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total_tokens: usize,
    pub sent: usize,
    pub failed: usize,
    pub deleted: usize,
    /// Tokens skipped because they are not Expo push tokens.
    pub invalid: usize,
    pub batches: usize,
}

/// Returns `true` for `ExponentPushToken[...]` / `ExpoPushToken[...]`.
pub fn is_expo_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["].iter().any(|prefix| {
        token
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(']'))
            .is_some_and(|inner| !inner.is_empty())
    })
}

/// One message per token, in token order.
pub fn build_messages(tokens: &[PushToken], notification: &Notification) -> Vec<PushMessage> {
    tokens
        .iter()
        .map(|t| PushMessage {
            to: t.token.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            data: notification.data.clone(),
            sound: Some("default".into()),
        })
        .collect()
}

/// Decide what happens to `token` given its delivery outcome.
///
/// `None` means the whole batch request failed.
pub fn token_action(token: &PushToken, ticket: Option<&PushTicket>, max_failures: u32) -> TokenAction {
    match ticket {
        Some(PushTicket::Ok { .. }) if token.failure_count == 0 => TokenAction::Keep,
        Some(PushTicket::Ok { .. }) => TokenAction::Reset,
        Some(PushTicket::Error { details, .. })
            if details
                .as_ref()
                .and_then(|d| d.error.as_deref())
                .is_some_and(|e| e == DEVICE_NOT_REGISTERED) =>
        {
            TokenAction::Delete
        }
        Some(PushTicket::Error { .. }) | None => {
            let failures = token.failure_count + 1;
            if failures >= max_failures {
                TokenAction::Delete
            } else {
                TokenAction::Increment(failures)
            }
        }
    }
}

async fn apply_action(store: &dyn Store, token: &PushToken, action: TokenAction) -> Result<()> {
    match action {
        TokenAction::Keep => Ok(()),
        TokenAction::Reset => store.set_push_token_failures(&token.id, 0).await,
        TokenAction::Increment(n) => store.set_push_token_failures(&token.id, n).await,
        TokenAction::Delete => {
            tracing::info!(token_id = %token.id, "deleting push token");
            store.delete_push_token(&token.id).await
        }
    }
}

/// Send `notification` to every stored token and apply the failure policy.
#[instrument(skip_all, fields(store = store.name(), gateway = gateway.name()))]
pub async fn dispatch(
    store: &dyn Store,
    gateway: Arc<dyn PushGateway>,
    notification: &Notification,
    policy: &PushPolicy,
) -> Result<DispatchSummary> {
    let start = Instant::now();
    let all_tokens = store.push_tokens().await?;
    let mut summary = DispatchSummary {
        total_tokens: all_tokens.len(),
        ..Default::default()
    };

    let (tokens, invalid): (Vec<PushToken>, Vec<PushToken>) =
        all_tokens.into_iter().partition(|t| is_expo_token(&t.token));
    summary.invalid = invalid.len();
    for t in &invalid {
        tracing::warn!(token_id = %t.id, "skipping malformed push token");
    }

    let batch_size = policy.batch_size.clamp(1, MAX_BATCH_SIZE);
    let semaphore = Arc::new(Semaphore::new(policy.parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for chunk in tokens.chunks(batch_size) {
        let chunk = chunk.to_vec();
        let messages = build_messages(&chunk, notification);
        let gateway = Arc::clone(&gateway);
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => gateway.send(&messages).await,
                Err(_) => Err(anyhow::anyhow!("semaphore closed")),
            };
            (chunk, outcome)
        });
    }
    summary.batches = futures.len();

    while let Some((chunk, outcome)) = futures.next().await {
        let tickets = match outcome {
            Ok(tickets) if tickets.len() == chunk.len() => Some(tickets),
            Ok(tickets) => {
                tracing::error!(
                    expected = chunk.len(),
                    got = tickets.len(),
                    "gateway returned mismatched ticket count"
                );
                None
            }
            Err(e) => {
                tracing::error!("push batch failed: {e:#}");
                None
            }
        };

        for (i, token) in chunk.iter().enumerate() {
            let ticket = tickets.as_ref().and_then(|t| t.get(i));
            match ticket {
                Some(PushTicket::Ok { .. }) => summary.sent += 1,
                _ => summary.failed += 1,
            }
            let action = token_action(token, ticket, policy.max_failures);
            if action == TokenAction::Delete {
                summary.deleted += 1;
            }
            if let Err(e) = apply_action(store, token, action).await {
                tracing::error!(token_id = %token.id, "failed to update push token: {e:#}");
            }
        }
    }

    tracing::info!(
        sent = summary.sent,
        failed = summary.failed,
        deleted = summary.deleted,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "push dispatch complete"
    );
    Ok(summary)
}

/// Default notification announcing the day's questions.
pub fn daily_reminder(date: chrono::NaiveDate) -> Notification {
    Notification {
        title: "Today's questions are live".into(),
        body: "Your daily Prelims and Mains practice is ready. Keep the streak going!".into(),
        data: serde_json::json!({ "screen": "DailyQuestion", "date": date.to_string() }),
    }
}
