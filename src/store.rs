//! Post storage.
//!
//! Two backends share one contract: an in-process list, and a spreadsheet
//! web app reached over HTTP (`GET` lists, `POST` appends,
//! `GET ?action=clear` wipes).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::banding::BandingProfile;
use crate::sentiment::{clamp_score, SentimentResult};

/// A feed post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    #[serde(default = "new_post_id")]
    pub id: String,
    pub user: String,
    pub text: String,
    /// Sentiment score, 0-100
    #[serde(deserialize_with = "lenient_score")]
    pub sentiment: u8,
    pub emotion: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_time")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub color: String,
}

fn new_post_id() -> String {
    Uuid::new_v4().to_string()
}

impl Post {
    pub fn new(user: &str, text: &str, analysis: &SentimentResult, profile: BandingProfile) -> Self {
        Self {
            id: new_post_id(),
            user: user.to_string(),
            text: text.to_string(),
            sentiment: analysis.score,
            emotion: analysis.emotion.clone(),
            reason: analysis.reason.clone(),
            keywords: analysis.keywords.clone(),
            time: Utc::now(),
            color: profile.color_for(analysis.score).to_string(),
        }
    }
}

/// Parse the timestamp formats the spreadsheet hands back. Anything
/// unrecognised becomes "now".
pub fn parse_time(raw: &str) -> DateTime<Utc> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return t.with_timezone(&Utc);
    }
    let naive = raw.trim_end_matches('Z');
    let naive = naive.split('.').next().unwrap_or(naive);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S"))
        .map(|t| t.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn lenient_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_time(&s),
        _ => Utc::now(),
    })
}

/// Spreadsheet cells come back as numbers or numeric strings.
fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|f| f.is_finite())
        .map(|f| clamp_score(f.round() as i64))
        .ok_or_else(|| de::Error::custom(format!("invalid sentiment {}", value)))
}

/// A list, or one comma-separated cell.
fn lenient_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(cell)) => cell
            .split([',', '、'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    })
}

/// Decode a store listing row by row. Rows that do not look like posts are
/// skipped so one bad cell never hides the feed.
pub fn decode_rows(rows: Vec<Value>) -> Vec<Post> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Post>(row) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!("⚠️ Skipping unreadable post row: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, oldest first
    async fn load(&self) -> Result<Vec<Post>>;
    async fn save(&self, post: &Post) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    fn kind(&self) -> &'static str;
}

/// In-process post list
#[derive(Default)]
pub struct MemoryStore {
    posts: RwLock<Vec<Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Post>> {
        Ok(self.posts.read().await.clone())
    }

    async fn save(&self, post: &Post) -> Result<()> {
        self.posts.write().await.push(post.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.posts.write().await.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// Spreadsheet web app store
pub struct SheetStore {
    client: reqwest::Client,
    url: String,
}

impl SheetStore {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building store HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PostStore for SheetStore {
    async fn load(&self) -> Result<Vec<Post>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("loading posts")?;
        if !response.status().is_success() {
            anyhow::bail!("post store returned {}", response.status());
        }
        let rows = response
            .json::<Vec<Value>>()
            .await
            .context("decoding posts")?;
        Ok(decode_rows(rows))
    }

    async fn save(&self, post: &Post) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(post)
            .send()
            .await
            .context("saving post")?;
        if !response.status().is_success() {
            anyhow::bail!("post store rejected post: {}", response.status());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("action", "clear")])
            .send()
            .await
            .context("clearing posts")?;
        if !response.status().is_success() {
            anyhow::bail!("post store refused clear: {}", response.status());
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sheet"
    }
}
