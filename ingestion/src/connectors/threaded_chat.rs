//! Threaded-chat connector: token auth, conversation discovery, per-conversation
//! cursor held as a monotonically increasing float timestamp, permalink
//! resolution for deep links.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::error::AppError;
use corpus_store::DocumentPayload;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;

use super::{CollectedSync, SourceConnector};

pub struct ThreadedChatConnector {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl ThreadedChatConnector {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            token: None,
        }
    }

    fn token(&self) -> Result<String, AppError> {
        self.token
            .clone()
            .or_else(|| env::var("CHAT_A_USER_TOKEN").ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| AppError::Auth("chat-a token missing: set CHAT_A_USER_TOKEN".to_string()))
    }

    async fn request(&self, endpoint: &str, token: &str, params: &[(&str, &str)]) -> Result<Value, AppError> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.api_base))
            .bearer_auth(token)
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    async fn discover_conversations(&self, token: &str) -> Result<Vec<String>, AppError> {
        let payload = self
            .request("users.conversations", token, &[("types", "public_channel,private_channel,im,mpim"), ("limit", "200")])
            .await?;
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(Vec::new());
        }
        Ok(payload
            .get("channels")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|c| c.get("id").and_then(Value::as_str).map(String::from))
            .collect())
    }

    fn configured_conversations() -> Vec<String> {
        env::var("CHAT_A_CONVERSATIONS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl SourceConnector for ThreadedChatConnector {
    fn source(&self) -> &'static str {
        "chat-a"
    }

    async fn connect(&mut self, seed_cursor: Option<Value>) -> Result<(), AppError> {
        if let Some(token) = seed_cursor.as_ref().and_then(|c| c.get("token")).and_then(Value::as_str) {
            self.token = Some(token.to_string());
        }
        let token = self.token()?;
        let payload = self.request("auth.test", &token, &[]).await?;
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(AppError::Auth(format!("chat-a auth failed: {error}")));
        }
        Ok(())
    }

    async fn collect(&mut self, cursor: Option<Value>, full: bool) -> Result<CollectedSync, AppError> {
        let cursor = cursor.unwrap_or_else(|| json!({}));
        let token = self.token()?;
        let mut channel_cursors: HashMap<String, String> = cursor
            .get("channel_cursors")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let configured = Self::configured_conversations();
        let conversations = if configured.is_empty() {
            self.discover_conversations(&token).await?
        } else {
            configured
        };

        let mut documents = Vec::new();

        for channel_id in conversations {
            let oldest = if full {
                "0".to_string()
            } else {
                channel_cursors.get(&channel_id).cloned().unwrap_or_else(|| "0".to_string())
            };
            let history = self
                .request(
                    "conversations.history",
                    &token,
                    &[("channel", channel_id.as_str()), ("limit", "200"), ("oldest", oldest.as_str()), ("inclusive", "false")],
                )
                .await?;
            if !history.get("ok").and_then(Value::as_bool).unwrap_or(false) {
                continue;
            }

            let mut latest_ts: f64 = oldest.parse().unwrap_or(0.0);
            for message in history.get("messages").and_then(Value::as_array).into_iter().flatten() {
                let ts = message.get("ts").and_then(Value::as_str).unwrap_or_default();
                let text = message.get("text").and_then(Value::as_str).unwrap_or_default();
                if ts.is_empty() || text.is_empty() {
                    continue;
                }
                let ts_value: f64 = ts.parse().unwrap_or(0.0);
                if ts_value <= latest_ts {
                    continue;
                }
                latest_ts = latest_ts.max(ts_value);

                let timestamp = Utc.timestamp_opt(ts_value as i64, 0).single().unwrap_or_else(Utc::now);
                let user = message
                    .get("user")
                    .or_else(|| message.get("username"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let thread_ts = message.get("thread_ts").and_then(Value::as_str).unwrap_or(ts).to_string();
                let checksum = format!("{:x}", Sha256::digest(text.as_bytes()));
                let deep_link = self.message_permalink(&token, &channel_id, ts).await.ok().flatten();

                documents.push(DocumentPayload {
                    doc_id: format!("chat-a:{channel_id}:{ts}"),
                    source: "chat-a".to_string(),
                    external_id: ts.to_string(),
                    thread_id: Some(thread_ts),
                    account_id: Some(channel_id.clone()),
                    title: Some(format!("chat-a message in {channel_id}")),
                    body_text: text.to_string(),
                    author: Some(user.clone()),
                    participants: vec![user],
                    timestamp_utc: Some(timestamp),
                    deep_link,
                    metadata: json!({ "channel": channel_id }),
                    checksum,
                });
            }
            channel_cursors.insert(channel_id, format!("{latest_ts:.6}"));
        }

        let next_cursor = json!({
            "channel_cursors": channel_cursors,
            "synced_at": Utc::now().to_rfc3339(),
        });
        Ok(CollectedSync {
            documents,
            cursor: next_cursor,
            message: "chat-a sync completed".to_string(),
        })
    }
}

impl ThreadedChatConnector {
    async fn message_permalink(&self, token: &str, channel: &str, ts: &str) -> Result<Option<String>, AppError> {
        let payload = self
            .request("chat.getPermalink", token, &[("channel", channel), ("message_ts", ts)])
            .await?;
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(None);
        }
        Ok(payload.get("permalink").and_then(Value::as_str).map(String::from))
    }
}
