/// trend API（キーワード一覧 / AI facts）クライアント。
///
/// 1回の呼び出しは独立しており、失敗は呼び出し側のステージで空結果に変換される。
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{
    facts::{FactSource, FactsPayload},
    fetch::KeywordSource,
    model::{KeywordRecord, Sentiment, SortKind},
};

/// trend APIクライアントの設定。
#[derive(Debug, Clone)]
pub struct TrendApiConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub keyword_timeout: Duration,
    pub facts_timeout: Duration,
}

/// `/v2/keywords` の応答。
#[derive(Debug, Deserialize)]
struct KeywordsResponse {
    #[serde(default)]
    keywords: Vec<KeywordItem>,
}

/// 統計値は欠落も `null` もあり得るため、すべて `Option` で受けて既定値に寄せる。
#[derive(Debug, Deserialize)]
struct KeywordItem {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    trending: Option<bool>,
    #[serde(default)]
    count: Option<i64>,
    #[serde(default)]
    change_in_count: Option<i64>,
    #[serde(default)]
    engagement: Option<i64>,
    #[serde(default)]
    change_in_engagement: Option<i64>,
    #[serde(default)]
    sentiment: Option<Sentiment>,
}

impl KeywordItem {
    fn into_record(self) -> Option<KeywordRecord> {
        let keyword = self.keyword.filter(|keyword| !keyword.is_empty())?;
        Some(KeywordRecord {
            keyword,
            trending: Some(self.trending.unwrap_or_default()),
            count: Some(self.count.unwrap_or_default()),
            change_in_count: Some(self.change_in_count.unwrap_or_default()),
            engagement: Some(self.engagement.unwrap_or_default()),
            change_in_engagement: Some(self.change_in_engagement.unwrap_or_default()),
            sentiment: Some(self.sentiment.unwrap_or_default()),
            ..KeywordRecord::default()
        })
    }
}

#[derive(Debug, Serialize)]
struct FactsRequest<'a> {
    keywords: &'a str,
    period: &'a str,
}

/// trend APIとの通信を管理するクライアント。
#[derive(Debug, Clone)]
pub struct TrendApiClient {
    client: Client,
    base_url: Url,
    keyword_timeout: Duration,
    facts_timeout: Duration,
}

impl TrendApiClient {
    /// 新しいtrend APIクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: TrendApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("failed to build trend API HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid trend API base URL")?;

        Ok(Self {
            client,
            base_url,
            keyword_timeout: config.keyword_timeout,
            facts_timeout: config.facts_timeout,
        })
    }

    async fn get_keywords(
        &self,
        period: &str,
        category: &str,
        sort: SortKind,
    ) -> Result<Vec<KeywordRecord>> {
        let mut url = self
            .base_url
            .join("v2/keywords")
            .context("failed to build keywords URL")?;
        url.query_pairs_mut()
            .append_pair("period", period)
            .append_pair("category", category)
            .append_pair("sort", sort.as_str())
            .append_pair("slim", "false");

        let response = self
            .client
            .get(url)
            .timeout(self.keyword_timeout)
            .send()
            .await
            .context("trend API keywords request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("trend API returned error status {status}: {error_body}");
        }

        let payload = response
            .json::<KeywordsResponse>()
            .await
            .context("failed to deserialize trend API keywords response")?;

        let records: Vec<KeywordRecord> = payload
            .keywords
            .into_iter()
            .filter_map(KeywordItem::into_record)
            .collect();

        debug!(
            category,
            sort = sort.as_str(),
            period,
            count = records.len(),
            "fetched keywords"
        );

        Ok(records)
    }

    async fn post_facts(&self, keyword: &str, period: &str) -> Result<FactsPayload> {
        let url = self
            .base_url
            .join("v2/ai-keyword-facts")
            .context("failed to build keyword facts URL")?;

        let response = self
            .client
            .post(url)
            .json(&FactsRequest {
                keywords: keyword,
                period,
            })
            .timeout(self.facts_timeout)
            .send()
            .await
            .context("trend API facts request failed")?
            .error_for_status()
            .context("trend API facts endpoint returned error status")?;

        // Some keywords come back as a literal `null` body.
        let payload = response
            .json::<Option<FactsPayload>>()
            .await
            .context("failed to deserialize trend API facts response")?;

        Ok(payload.unwrap_or_default())
    }
}

#[async_trait]
impl KeywordSource for TrendApiClient {
    async fn fetch_keywords(
        &self,
        period: &str,
        category: &str,
        sort: SortKind,
    ) -> Result<Vec<KeywordRecord>> {
        self.get_keywords(period, category, sort).await
    }
}

#[async_trait]
impl FactSource for TrendApiClient {
    async fn fetch_facts(&self, keyword: &str, period: &str) -> Result<FactsPayload> {
        self.post_facts(keyword, period).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::facts::KeywordFacts;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> TrendApiConfig {
        TrendApiConfig {
            base_url,
            connect_timeout: Duration::from_secs(3),
            keyword_timeout: Duration::from_secs(45),
            facts_timeout: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn fetch_keywords_maps_items_and_defaults_stats() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "keywords": [
                {
                    "keyword": "Claude",
                    "trending": true,
                    "count": 120,
                    "change_in_count": 35,
                    "engagement": 900,
                    "change_in_engagement": -4,
                    "sentiment": {"positive": {"count": 70}, "negative": {"count": 10}}
                },
                {"keyword": "Gemini"},
                {"keyword": ""},
                {"count": 4}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/v2/keywords"))
            .and(query_param("period", "weekly"))
            .and(query_param("category", "ai"))
            .and(query_param("sort", "trending"))
            .and(query_param("slim", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let records = client
            .fetch_keywords("weekly", "ai", SortKind::Trending)
            .await
            .expect("fetch should succeed");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keyword, "Claude");
        assert_eq!(records[0].change_in_engagement, Some(-4));
        assert_eq!(
            records[0].sentiment.map(|s| s.positive.count),
            Some(70)
        );
        assert_eq!(records[1].keyword, "Gemini");
        assert_eq!(records[1].trending, Some(false));
        assert_eq!(records[1].count, Some(0));
        assert!(records[1].has_stats());
    }

    #[tokio::test]
    async fn null_stats_keep_the_item_and_its_bucket() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "keywords": [
                {"keyword": "Claude", "trending": true, "count": 12},
                {
                    "keyword": "Gemini",
                    "trending": null,
                    "count": null,
                    "change_in_count": null,
                    "engagement": null,
                    "change_in_engagement": null,
                    "sentiment": null
                }
            ]
        });

        Mock::given(method("GET"))
            .and(path("/v2/keywords"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let records = client
            .fetch_keywords("weekly", "ai", SortKind::Trending)
            .await
            .expect("null stats should not fail the bucket");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].count, Some(12));
        assert_eq!(records[1].keyword, "Gemini");
        assert_eq!(records[1].trending, Some(false));
        assert_eq!(records[1].count, Some(0));
        assert_eq!(records[1].sentiment, Some(Sentiment::default()));
    }

    #[tokio::test]
    async fn fetch_keywords_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/keywords"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let error = client
            .fetch_keywords("weekly", "ai", SortKind::Top)
            .await
            .expect_err("5xx should fail");

        assert!(error.to_string().contains("502"));
    }

    #[tokio::test]
    async fn fetch_facts_posts_keyword_and_period() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "summary": "Claude shipped [1].",
            "interesting": ["Developers like it [2]"],
            "citations": [
                {"n": 1, "url": "https://a.example"},
                {"n": 2, "url": "https://b.example"}
            ]
        });

        Mock::given(method("POST"))
            .and(path("/v2/ai-keyword-facts"))
            .and(body_json(serde_json::json!({"keywords": "Claude", "period": "weekly"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let payload = client
            .fetch_facts("Claude", "weekly")
            .await
            .expect("facts should load");

        assert_eq!(payload.summary, "Claude shipped [1].");
        assert_eq!(payload.citations.len(), 2);
        assert_eq!(payload.citations[1].n, "2");
        assert!(payload.facts.is_empty());
    }

    #[tokio::test]
    async fn fetch_facts_skips_malformed_citations() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "summary": "Claim [1].",
            "citations": [
                {"n": 1, "url": "https://a"},
                {"url": "https://no-id"},
                {"n": 2, "url": null}
            ]
        });

        Mock::given(method("POST"))
            .and(path("/v2/ai-keyword-facts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let payload = client
            .fetch_facts("Claude", "weekly")
            .await
            .expect("malformed citation entries should not fail the payload");

        assert_eq!(payload.summary, "Claim [1].");
        let ids: Vec<&str> = payload.citations.iter().map(|c| c.n.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(payload.citations[1].url, "");

        let facts = KeywordFacts::from_payload(payload);
        assert_eq!(facts.citations.len(), 1);
        assert_eq!(facts.citations[0].url, "https://a");
    }

    #[tokio::test]
    async fn fetch_facts_treats_null_body_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ai-keyword-facts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("null"),
            )
            .mount(&server)
            .await;

        let client = TrendApiClient::new(test_config(server.uri())).expect("client should build");
        let payload = client
            .fetch_facts("Rust", "daily")
            .await
            .expect("null body is not an error");

        assert_eq!(payload, FactsPayload::default());
    }
}
