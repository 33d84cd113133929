use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::app::ports::{Record, RecordStore};
use crate::config::StoreConfig;
use crate::constants::ERROR_BODY_EXCERPT;
use crate::domain::RowFilter;
use crate::error::{PipelineError, Result};

/// `RecordStore` over the Supabase PostgREST gateway (`/rest/v1/<collection>`)
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key,
        })
    }

    fn endpoint(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Turn a non-success response into a `Store` error carrying a body excerpt
    async fn rejection(resp: Response) -> PipelineError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        PipelineError::Store {
            status,
            body: excerpt(&body, ERROR_BODY_EXCERPT),
        }
    }
}

/// First `max` characters of `text`, never splitting a character
fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Total from a `Content-Range` header such as `0-0/14713` or `*/0`
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn probe(&self, collection: &str) -> Result<()> {
        let resp = self
            .authed(self.client.get(self.endpoint(collection)))
            .query(&[("select", "*"), ("limit", "1")])
            .send()
            .await?;
        debug!("Probe {}: {}", collection, resp.status());
        if resp.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(PipelineError::MissingCollection(collection.to_string()))
        }
    }

    async fn insert_batch(&self, collection: &str, records: &[Record]) -> Result<()> {
        let resp = self
            .authed(self.client.post(self.endpoint(collection)))
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => Err(Self::rejection(resp).await),
        }
    }

    async fn count_rows(&self, collection: &str) -> Result<Option<u64>> {
        let resp = self
            .authed(self.client.get(self.endpoint(collection)))
            .query(&[("select", "*")])
            .header("Prefer", "count=exact")
            .header(RANGE, "0-0")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }
        Ok(resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total))
    }

    async fn select(&self, collection: &str, columns: &str, limit: Option<usize>) -> Result<Vec<Record>> {
        let mut request = self
            .authed(self.client.get(self.endpoint(collection)))
            .query(&[("select", columns)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }
        Ok(resp.json::<Vec<Record>>().await?)
    }

    async fn clear(&self, collection: &str, filter: RowFilter) -> Result<()> {
        let resp = self
            .authed(self.client.delete(self.endpoint(collection)))
            .query(&[(filter.column, filter.predicate)])
            .send()
            .await?;
        debug!("Clear {}: {}", collection, resp.status());
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(resp).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range_total("0-0/14713"), Some(14713));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("abcdef", 3), "abc");
        assert_eq!(excerpt("ab", 3), "ab");
        assert_eq!(excerpt("ééé", 2), "éé");
    }
}
