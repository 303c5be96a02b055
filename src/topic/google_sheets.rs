//! Topic lookup in a Google Sheets content plan.
//!
//! The sheet has a header row with `Date` and `Topic` columns. Access uses a
//! service account: a signed RS256 assertion is exchanged for a short-lived
//! bearer token, which is cached until shortly before it expires.

use super::{TopicError, TopicSource, NO_TOPIC_DEFINED, NO_TOPIC_FOUND};
use crate::config::SheetsSettings;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The fields of a service-account JSON key that are needed here.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self, TopicError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TopicError::Credentials(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            TopicError::Credentials(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct GoogleSheetsTopicSource {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    spreadsheet_id: String,
    range: String,
    date_format: String,
    api_base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsTopicSource {
    pub fn new(key: ServiceAccountKey, settings: &SheetsSettings) -> Result<Self, TopicError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| TopicError::Credentials(format!("Invalid private key: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            key,
            encoding_key,
            spreadsheet_id: settings.spreadsheet_id.clone(),
            range: settings.range.clone(),
            date_format: settings.date_format.clone(),
            api_base_url: SHEETS_API.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn from_settings(settings: &SheetsSettings) -> Result<Self, TopicError> {
        let key = ServiceAccountKey::load(&settings.credentials_path)?;
        Self::new(key, settings)
    }

    /// Topic planned for `date`.
    pub async fn topic_for_date(&self, date: NaiveDate) -> Result<String, TopicError> {
        let rows = self.fetch_rows().await?;
        let wanted = date.format(&self.date_format).to_string();
        let topic = find_topic(&rows, &wanted);
        info!(date = %wanted, topic = %topic, "Fetched topic from content plan");
        Ok(topic)
    }

    async fn access_token(&self) -> Result<String, TopicError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.token.clone());
            }
        }

        debug!(client_email = %self.key.client_email, "Requesting Google access token");
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| TopicError::Credentials(format!("Failed to sign assertion: {}", e)))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| TopicError::SourceUnavailable(e.to_string()))?;

        let response = check_status(response, "Token exchange").await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TopicError::SourceUnavailable(format!("Invalid token response: {}", e)))?;

        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, TopicError> {
        let token = self.access_token().await?;

        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| TopicError::SourceUnavailable(format!("Invalid API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| TopicError::SourceUnavailable("Invalid API URL".to_string()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&self.range);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| TopicError::SourceUnavailable(e.to_string()))?;

        let response = check_status(response, "Sheet read").await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| TopicError::SourceUnavailable(format!("Invalid sheet response: {}", e)))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

#[async_trait]
impl TopicSource for GoogleSheetsTopicSource {
    async fn today_topic(&self) -> Result<String, TopicError> {
        self.topic_for_date(Local::now().date_naive()).await
    }
}

async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, TopicError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "{} failed: {}", what, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => Err(
            TopicError::Credentials(format!("{} rejected ({}): {}", what, status, body)),
        ),
        _ => Err(TopicError::SourceUnavailable(format!(
            "{} failed ({}): {}",
            what, status, body
        ))),
    }
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Find the topic of the row whose `Date` cell equals `date`.
///
/// The first row holds the column headers.
pub fn find_topic(rows: &[Vec<String>], date: &str) -> String {
    let Some((headers, records)) = rows.split_first() else {
        return NO_TOPIC_DEFINED.to_string();
    };
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(date_col), topic_col) = (column("Date"), column("Topic")) else {
        return NO_TOPIC_DEFINED.to_string();
    };

    let row = records
        .iter()
        .find(|row| row.get(date_col).map(|d| d.trim()) == Some(date));

    match row {
        None => NO_TOPIC_DEFINED.to_string(),
        Some(row) => topic_col
            .and_then(|col| row.get(col))
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| NO_TOPIC_FOUND.to_string()),
    }
}
