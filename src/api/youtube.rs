//! YouTube Data API v3 live chat transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use super::{ChatTransport, RawFetch};
use crate::engine::message::{Message, MessageKind};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Quota units charged for a `videos.list` call.
pub const VIDEO_LOOKUP_COST: u64 = 1;
/// Quota units charged for a `liveChatMessages.list` call.
pub const MESSAGES_FETCH_COST: u64 = 5;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP request failed with status: {0}")]
    Status(u16),
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing field '{0}' in response")]
    MissingField(&'static str),
    #[error("Invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("Not a live stream: {0}")]
    NotLive(String),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct VideoId(pub String);

impl VideoId {
    /// Accepts a bare id, a `watch?v=` URL or a `/live/` URL.
    pub fn parse(input: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r#"[?&]v=([^"&#?/]+)|/live/([^"&#?/]+)"#).expect("valid video id pattern")
        });

        let id = pattern
            .captures(input)
            .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
            .map(|m| m.as_str())
            .unwrap_or(input);

        Some(Self(id.to_string()))
    }
}

#[derive(Debug, Clone, derive_more::Display)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct LiveChatId(pub String);

/// Running count of API quota units spent this session.
#[derive(Debug, Clone, Default)]
pub struct QuotaCounter(Arc<AtomicU64>);

impl QuotaCounter {
    pub fn add(&self, units: u64) -> u64 {
        self.0.fetch_add(units, Ordering::Relaxed) + units
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// How close the quota usage is to the daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLevel {
    Normal,
    Warning,
    High,
    Critical,
}

impl QuotaLevel {
    pub fn of(units: u64) -> Self {
        match units {
            0..=3499 => QuotaLevel::Normal,
            3500 => QuotaLevel::Warning,
            3501..=9999 => QuotaLevel::High,
            _ => QuotaLevel::Critical,
        }
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();
    if !status.is_success() {
        tracing::error!("❌ HTTP request failed with status: {}", status);
        return Err(TransportError::Status(status.as_u16()));
    }
    Ok(())
}

/// Look up the active live chat id of a video.
pub async fn fetch_live_chat_id(
    http_client: &reqwest::Client,
    api_key: &ApiKey,
    video_id: &VideoId,
) -> Result<LiveChatId, TransportError> {
    let url = format!(
        "{}/videos?part=liveStreamingDetails&id={}&key={}",
        API_BASE,
        urlencoding::encode(&video_id.0),
        api_key
    );

    let response = http_client.get(&url).send().await?;
    check_status(&response)?;
    let json: serde_json::Value = serde_json::from_str(&response.text().await?)?;

    parse_live_chat_id(&json, video_id)
}

fn parse_live_chat_id(json: &serde_json::Value, video_id: &VideoId) -> Result<LiveChatId, TransportError> {
    let items = json
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(TransportError::MissingField("items"))?;

    let item = items.first().ok_or_else(|| {
        TransportError::NotLive(format!("no video found for id {{{}}}, was the correct id used?", video_id))
    })?;

    let details = item
        .get("liveStreamingDetails")
        .ok_or_else(|| TransportError::NotLive("the video is not a live stream".to_string()))?;

    let chat_id = details
        .get("activeLiveChatId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TransportError::NotLive("the live stream is inactive".to_string()))?;

    if chat_id.is_empty() {
        return Err(TransportError::NotLive("active live chat id is empty".to_string()));
    }

    Ok(LiveChatId(chat_id.to_string()))
}

/// Convert a `liveChatMessages.list` response into a [`RawFetch`].
pub fn parse_messages(json: &serde_json::Value) -> Result<RawFetch, TransportError> {
    let items = json
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(TransportError::MissingField("items"))?;

    if items.is_empty() {
        return Ok(RawFetch {
            messages: vec![Message::control(MessageKind::Unsupported)],
            suggested_delay: suggested_delay(json)?,
        });
    }

    let mut messages = Vec::with_capacity(items.len());
    for item in items {
        let Some(snippet) = item.get("snippet") else {
            continue;
        };

        let kind = match snippet.get("type").and_then(|v| v.as_str()) {
            Some("chatEndedEvent") => MessageKind::Exit,
            Some("textMessageEvent") => MessageKind::Text,
            Some("superChatEvent") => MessageKind::SuperChat,
            _ => MessageKind::Unsupported,
        };

        match kind {
            MessageKind::Exit => {
                return Ok(RawFetch {
                    messages: vec![Message::control(MessageKind::Exit)],
                    suggested_delay: Duration::ZERO,
                })
            }
            MessageKind::Unsupported => continue,
            _ => {}
        }

        let author = item
            .get("authorDetails")
            .and_then(|v| v.get("displayName"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let text = snippet
            .get("displayMessage")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let published = snippet
            .get("publishedAt")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if author.is_empty() || text.is_empty() || published.is_empty() {
            continue;
        }

        let timestamp = DateTime::parse_from_rfc3339(published)
            .map_err(|_| TransportError::Timestamp(published.to_string()))?
            .with_timezone(&Utc);

        messages.push(Message::new(author, text, kind, timestamp));
    }

    if messages.is_empty() {
        tracing::warn!("⚠️ {} items fetched but none were usable", items.len());
        return Ok(RawFetch {
            messages: vec![Message::control(MessageKind::Error)],
            suggested_delay: Duration::ZERO,
        });
    }

    Ok(RawFetch {
        messages,
        suggested_delay: suggested_delay(json)?,
    })
}

/// First 200 characters of a response body, for debug logs.
fn response_preview(text: &str) -> String {
    text.chars().take(200).collect()
}

fn suggested_delay(json: &serde_json::Value) -> Result<Duration, TransportError> {
    json.get("pollingIntervalMillis")
        .and_then(|v| v.as_u64())
        .map(Duration::from_millis)
        .ok_or(TransportError::MissingField("pollingIntervalMillis"))
}

/// Live chat transport over the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YoutubeTransport {
    pub video_id: VideoId,
    pub live_chat_id: LiveChatId,
    api_key: ApiKey,
    max_results: usize,
    quota: QuotaCounter,
    http_client: reqwest::Client,
}

impl YoutubeTransport {
    /// Resolve the live chat of `video_id` and build a transport for it.
    pub async fn connect(
        api_key: ApiKey,
        video_id: VideoId,
        max_results: usize,
        quota: QuotaCounter,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::new();
        let live_chat_id = fetch_live_chat_id(&http_client, &api_key, &video_id).await?;
        let cost = quota.add(VIDEO_LOOKUP_COST);
        tracing::info!("💬 Retrieved live chat id: {}, current quota cost: {}", live_chat_id, cost);

        Ok(Self {
            video_id,
            live_chat_id,
            api_key,
            max_results,
            quota,
            http_client,
        })
    }
}

#[async_trait]
impl ChatTransport for YoutubeTransport {
    async fn fetch(&self) -> Result<RawFetch, TransportError> {
        let url = format!(
            "{}/liveChat/messages?liveChatId={}&part=snippet,authorDetails&maxResults={}&key={}",
            API_BASE,
            urlencoding::encode(&self.live_chat_id.0),
            self.max_results,
            self.api_key
        );

        let response = self.http_client.get(&url).send().await?;
        let cost = self.quota.add(MESSAGES_FETCH_COST);
        tracing::debug!("📡 Fetched chat messages, current quota cost: {}", cost);
        check_status(&response)?;

        let text = response.text().await?;
        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            tracing::debug!("🔍 Response text preview: {}", response_preview(&text));
            e
        })?;

        parse_messages(&json)
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}
