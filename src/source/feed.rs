use super::page::{LogEntry, Page};
use crate::config::types::SourceConfig;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("invalid feed URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("feed returned error status {status}: {message}")]
    FeedStatus { status: u16, message: String },

    #[error("malformed feed response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// A reverse-chronological, cursor-paginated log feed
#[async_trait]
pub trait LogFeed: Send + Sync {
    /// Fetch the page at `cursor` (the newest page when `None`)
    async fn fetch(&self, cursor: Option<&str>) -> Result<Page>;
}

/// HTTP client for the paginated feed
pub struct HttpFeed {
    url: Url,
    client: reqwest::Client,
    api_key_header: String,
    api_key: String,
    page_size: usize,
    collection_key: String,
}

impl HttpFeed {
    pub fn new(config: &SourceConfig, api_key: String) -> Result<Self> {
        let url = Url::parse(&config.url).map_err(|e| FeedError::InvalidUrl {
            url: config.url.clone(),
            message: e.to_string(),
        })?;

        // One client for every page of the run so the connection is reused
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            url,
            client,
            api_key_header: config.api_key_header.clone(),
            api_key,
            page_size: config.page_size,
            collection_key: config.collection_key.clone(),
        })
    }

    /// Build the request URL for one page
    pub fn page_url(&self, cursor: Option<&str>) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &self.page_size.to_string())
                .append_pair("sort", "timestamp:desc");
            if let Some(cursor) = cursor {
                query.append_pair("next", cursor);
            }
        }
        url
    }

    /// Split a decoded response body into a page
    pub fn parse_body(&self, body: &Value) -> Result<Page> {
        let entries = match body
            .get("_embedded")
            .and_then(|embedded| embedded.get(&self.collection_key))
        {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().cloned().map(LogEntry::from).collect(),
            Some(other) => {
                return Err(FeedError::Malformed(format!(
                    "_embedded.{} is not an array: {}",
                    self.collection_key, other
                )))
            }
        };

        let next_cursor = body
            .get("_links")
            .and_then(|links| links.get("next"))
            .and_then(|next| next.get("href"))
            .and_then(Value::as_str)
            .and_then(|href| self.cursor_from_href(href));

        Ok(Page::new(entries, next_cursor))
    }

    /// Extract the `next` query parameter from a next-page link, which may be relative
    fn cursor_from_href(&self, href: &str) -> Option<String> {
        let link = self.url.join(href).ok()?;
        link.query_pairs()
            .find(|(key, _)| key == "next")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

#[async_trait]
impl LogFeed for HttpFeed {
    async fn fetch(&self, cursor: Option<&str>) -> Result<Page> {
        let url = self.page_url(cursor);
        tracing::debug!(url = %redact_cursor(&url), "Fetching feed page");

        let response = self
            .client
            .get(url)
            .header(self.api_key_header.as_str(), &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::FeedStatus {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        let page = self.parse_body(&body)?;

        tracing::debug!(
            entries = page.entries.len(),
            has_next = page.next_cursor.is_some(),
            "Fetched feed page"
        );
        Ok(page)
    }
}

fn redact_cursor(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}
