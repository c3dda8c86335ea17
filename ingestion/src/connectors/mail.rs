//! Mail connector: token-refresh OAuth, paginated history API with a bounded
//! number of pages, body extracted from a MIME-part tree preferring
//! plaintext over HTML-stripped-of-tags.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::error::AppError;
use corpus_store::DocumentPayload;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::env;

use super::{cursor_get_i64, CollectedSync, SourceConnector};

const DEFAULT_MAX_PAGES: usize = 3;
const PAGE_SIZE: u32 = 100;

pub struct MailConnector {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl MailConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: None,
        }
    }

    async fn access_token(&mut self) -> Result<String, AppError> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let provided = env::var("MAIL_ACCESS_TOKEN").unwrap_or_default();
        if !provided.trim().is_empty() {
            self.access_token = Some(provided.clone());
            return Ok(provided);
        }

        let refresh = env::var("MAIL_REFRESH_TOKEN").unwrap_or_default();
        let client_id = env::var("MAIL_CLIENT_ID").unwrap_or_default();
        let client_secret = env::var("MAIL_CLIENT_SECRET").unwrap_or_default();
        if refresh.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            return Err(AppError::Auth(
                "mail credentials missing: set MAIL_ACCESS_TOKEN or MAIL_CLIENT_ID/MAIL_CLIENT_SECRET/MAIL_REFRESH_TOKEN"
                    .to_string(),
            ));
        }

        let response: Value = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = response
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Auth("failed to acquire mail access token".to_string()))?
            .to_string();
        self.access_token = Some(token.clone());
        Ok(token)
    }

    async fn list_message_ids(&self, token: &str, query: &str) -> Result<Vec<String>, AppError> {
        let max_pages: usize = env::var("MAIL_SYNC_MAX_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_PAGES);

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..max_pages {
            let mut request = self
                .http
                .get(format!("{}/messages", self.base_url))
                .bearer_auth(token)
                .query(&[("q", query), ("maxResults", &PAGE_SIZE.to_string())]);
            if let Some(pt) = &page_token {
                request = request.query(&[("pageToken", pt.as_str())]);
            }
            let payload: Value = request.send().await?.error_for_status()?.json().await?;
            for item in payload.get("messages").and_then(Value::as_array).into_iter().flatten() {
                if let Some(id) = item.get("id").and_then(Value::as_str) {
                    ids.push(id.to_string());
                }
            }
            page_token = payload.get("nextPageToken").and_then(Value::as_str).map(String::from);
            if page_token.is_none() {
                break;
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl SourceConnector for MailConnector {
    fn source(&self) -> &'static str {
        "mail"
    }

    async fn connect(&mut self, seed_cursor: Option<Value>) -> Result<(), AppError> {
        if let Some(token) = seed_cursor.as_ref().and_then(|c| c.get("refresh_token")).and_then(Value::as_str) {
            env::set_var("MAIL_REFRESH_TOKEN", token);
        }
        let token = self.access_token().await?;
        self.http
            .get(format!("{}/profile", self.base_url))
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn collect(&mut self, cursor: Option<Value>, full: bool) -> Result<CollectedSync, AppError> {
        let cursor = cursor.unwrap_or_else(|| json!({}));
        let token = self.access_token().await?;
        let last_internal_ts = if full { 0 } else { cursor_get_i64(&cursor, "last_internal_ts") };
        let default_query = env::var("MAIL_SYNC_QUERY").unwrap_or_else(|_| "newer_than:365d".to_string());
        let query = if last_internal_ts <= 0 {
            default_query
        } else {
            format!("after:{}", last_internal_ts / 1000)
        };

        let message_ids = self.list_message_ids(&token, &query).await?;
        let mut documents = Vec::new();
        let mut max_internal_ts = last_internal_ts;

        for message_id in message_ids {
            let raw: Value = self
                .http
                .get(format!("{}/messages/{message_id}", self.base_url))
                .bearer_auth(&token)
                .query(&[("format", "full")])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let internal_date_ms = raw.get("internalDate").and_then(Value::as_str).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
            if internal_date_ms <= last_internal_ts {
                continue;
            }

            let payload = raw.get("payload").cloned().unwrap_or(Value::Null);
            let headers = header_map(&payload);
            let subject = headers.get("subject").cloned();
            let sender = headers.get("from").cloned();
            let participants: Vec<String> = [headers.get("to"), headers.get("cc")]
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            let mut body = extract_body_text(&payload);
            if body.is_empty() {
                body = subject.clone().unwrap_or_else(|| "(empty message)".to_string());
            }

            let timestamp = Utc.timestamp_millis_opt(internal_date_ms).single().unwrap_or_else(Utc::now);
            let thread_id = raw.get("threadId").and_then(Value::as_str).unwrap_or(&message_id).to_string();
            let checksum = format!("{:x}", Sha256::digest(body.as_bytes()));

            documents.push(DocumentPayload {
                doc_id: format!("mail:{message_id}"),
                source: "mail".to_string(),
                external_id: message_id.clone(),
                thread_id: Some(thread_id.clone()),
                account_id: headers.get("delivered-to").cloned().or_else(|| Some("me".to_string())),
                title: subject,
                body_text: body,
                author: sender,
                participants,
                timestamp_utc: Some(timestamp),
                deep_link: Some(format!("mail://thread/{thread_id}")),
                metadata: json!({
                    "label_ids": raw.get("labelIds").cloned().unwrap_or(Value::Null),
                    "snippet": raw.get("snippet").cloned().unwrap_or(Value::Null),
                }),
                checksum,
            });
            max_internal_ts = max_internal_ts.max(internal_date_ms);
        }

        let next_cursor = json!({
            "last_internal_ts": max_internal_ts,
            "synced_at": Utc::now().to_rfc3339(),
        });
        Ok(CollectedSync {
            documents,
            cursor: next_cursor,
            message: "mail sync completed".to_string(),
        })
    }
}

fn header_map(payload: &Value) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    for item in payload.get("headers").and_then(Value::as_array).into_iter().flatten() {
        let name = item.get("name").and_then(Value::as_str).unwrap_or_default().to_lowercase();
        let value = item.get("value").and_then(Value::as_str).unwrap_or_default().to_string();
        if !name.is_empty() {
            map.insert(name, value);
        }
    }
    map
}

fn extract_body_text(payload: &Value) -> String {
    if let Some(data) = payload.get("body").and_then(|b| b.get("data")).and_then(Value::as_str) {
        let text = decode_base64url(data);
        if !text.is_empty() {
            return text;
        }
    }

    for part in payload.get("parts").and_then(Value::as_array).into_iter().flatten() {
        let mime = part.get("mimeType").and_then(Value::as_str).unwrap_or_default().to_lowercase();
        let data = part.get("body").and_then(|b| b.get("data")).and_then(Value::as_str);
        let Some(data) = data else {
            let nested = extract_body_text(part);
            if !nested.is_empty() {
                return nested;
            }
            continue;
        };
        let text = decode_base64url(data);
        if mime == "text/plain" && !text.is_empty() {
            return text;
        }
        if mime == "text/html" && !text.is_empty() {
            return strip_html(&text);
        }
    }
    String::new()
}

fn decode_base64url(value: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE
        .decode(value.as_bytes())
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(value.as_bytes()))
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default()
}

fn strip_html(value: &str) -> String {
    let normalized = value.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");
    normalized
        .replace('<', " ")
        .replace('>', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
