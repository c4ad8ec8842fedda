use std::time::Duration;

use groupsnap_logging::{snap_debug, snap_warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Header carrying the per-request access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("authentication failed (token rejected)")]
    Auth,
    #[error("group {group_id} not found")]
    GroupNotFound { group_id: String },
    #[error("remote api returned http status {status}")]
    Transport { status: u16 },
    #[error("rate limited; gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub page_limit: usize,
    pub max_rate_limit_retries: u32,
    /// First backoff delay; doubled on every further 429.
    pub rate_limit_base_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groupme.com/v3/".to_string(),
            page_limit: 100,
            max_rate_limit_retries: 5,
            rate_limit_base_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    /// Poster display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<RemoteAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<RemoteMessage>,
}

/// Remote group-chat service as seen by the listing builder.
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
    /// Maximum messages per page; a shorter page ends pagination.
    fn page_limit(&self) -> usize;

    async fn group(&self, token: &str, group_id: &str) -> Result<RemoteGroup, ListingError>;

    /// Messages older than `before_id`, newest first. 304 yields an empty page.
    async fn messages(
        &self,
        token: &str,
        group_id: &str,
        before_id: Option<&str>,
    ) -> Result<Vec<RemoteMessage>, ListingError>;

    /// One page (1-based) of the groups the token can see.
    async fn groups(&self, token: &str, page: u32) -> Result<Vec<RemoteGroup>, ListingError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestRemoteApi {
    settings: ApiSettings,
    base_url: Url,
    client: reqwest::Client,
}

impl ReqwestRemoteApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ListingError> {
        let mut raw = settings.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).map_err(|err| ListingError::InvalidBaseUrl(err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ListingError::Network(err.to_string()))?;
        Ok(Self {
            settings,
            base_url,
            client,
        })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<Url, ListingError> {
        self.base_url
            .join(path)
            .map_err(|err| ListingError::InvalidBaseUrl(err.to_string()))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.settings
            .rate_limit_base_delay
            .saturating_mul(1u32 << attempt.min(16))
    }

    /// GET with rate-limit backoff. `Ok(None)` means 304 or an empty envelope.
    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        url: Url,
    ) -> Result<Option<T>, ListingError> {
        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .get(url.clone())
                .header(ACCESS_TOKEN_HEADER, token)
                .send()
                .await
                .map_err(|err| ListingError::Network(err.to_string()))?;

            let status = response.status();
            match status {
                StatusCode::NOT_MODIFIED => {
                    snap_debug!("{} returned 304, treating as empty", url.path());
                    return Ok(None);
                }
                StatusCode::UNAUTHORIZED => return Err(ListingError::Auth),
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.settings.max_rate_limit_retries {
                        return Err(ListingError::RateLimited {
                            attempts: attempt + 1,
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    attempt += 1;
                    snap_warn!(
                        "Rate limited on {}, retry {}/{} in {:?}",
                        url.path(),
                        attempt,
                        self.settings.max_rate_limit_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                _ if status.is_success() => {}
                _ => {
                    return Err(ListingError::Transport {
                        status: status.as_u16(),
                    })
                }
            }

            let body = response
                .bytes()
                .await
                .map_err(|err| ListingError::Network(err.to_string()))?;
            let envelope: Envelope<T> = serde_json::from_slice(&body)
                .map_err(|err| ListingError::InvalidResponse(err.to_string()))?;
            return Ok(envelope.response);
        }
    }
}

fn not_found_as_missing_group(err: ListingError, group_id: &str) -> ListingError {
    match err {
        ListingError::Transport { status: 404 } => ListingError::GroupNotFound {
            group_id: group_id.to_string(),
        },
        other => other,
    }
}

#[async_trait::async_trait]
impl RemoteApi for ReqwestRemoteApi {
    fn page_limit(&self) -> usize {
        self.settings.page_limit
    }

    async fn group(&self, token: &str, group_id: &str) -> Result<RemoteGroup, ListingError> {
        let url = self.endpoint(&format!("groups/{group_id}"))?;
        self.get_json::<RemoteGroup>(token, url)
            .await
            .map_err(|err| not_found_as_missing_group(err, group_id))?
            .ok_or_else(|| ListingError::InvalidResponse("group response was empty".into()))
    }

    async fn messages(
        &self,
        token: &str,
        group_id: &str,
        before_id: Option<&str>,
    ) -> Result<Vec<RemoteMessage>, ListingError> {
        let mut url = self.endpoint(&format!("groups/{group_id}/messages"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.settings.page_limit.to_string());
            if let Some(before_id) = before_id {
                query.append_pair("before_id", before_id);
            }
        }
        let page = self
            .get_json::<MessagesPage>(token, url)
            .await
            .map_err(|err| not_found_as_missing_group(err, group_id))?;
        Ok(page.map(|page| page.messages).unwrap_or_default())
    }

    async fn groups(&self, token: &str, page: u32) -> Result<Vec<RemoteGroup>, ListingError> {
        let mut url = self.endpoint("groups")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.settings.page_limit.to_string());
        Ok(self
            .get_json::<Vec<RemoteGroup>>(token, url)
            .await?
            .unwrap_or_default())
    }
}
