//! Facts enrichment: summary, bullet points and the citations they reference.
use std::{
    collections::{BTreeSet, HashMap},
    num::NonZeroUsize,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::util::retry::RetryConfig;

use super::markers::referenced_raw_ids;
use super::model::{AssembledDataset, Citation};

/// Number of legacy facts folded into the summary.
const LEGACY_SUMMARY_FACTS: usize = 3;

/// Raw facts payload. Either the `summary`/`interesting` pair or the legacy `facts` list.
///
/// Explicit `null`s read as empty, and citation entries without a usable id are dropped
/// while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FactsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interesting: Vec<String>,
    #[serde(default, deserialize_with = "lenient_citations")]
    pub citations: Vec<Citation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facts: Vec<String>,
}

/// Citation entry as the facts API sends it.
#[derive(Debug, Deserialize)]
struct WireCitation {
    #[serde(default)]
    n: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

impl WireCitation {
    fn into_citation(self) -> Option<Citation> {
        let n = match self.n? {
            Value::Number(number) => number.as_u64()?.to_string(),
            Value::String(text) if !text.trim().is_empty() => text,
            _ => return None,
        };
        Some(Citation::new(n, self.url.unwrap_or_default()))
    }
}

fn lenient_citations<'de, D>(deserializer: D) -> Result<Vec<Citation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<WireCitation>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(WireCitation::into_citation)
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait]
pub trait FactSource: Send + Sync {
    async fn fetch_facts(&self, keyword: &str, period: &str) -> Result<FactsPayload>;
}

/// Facts for one keyword after legacy folding and citation filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFacts {
    pub summary: String,
    pub interesting: Vec<String>,
    pub citations: Vec<Citation>,
}

impl KeywordFacts {
    /// Normalize a payload: fold legacy `facts`, then drop citations no marker points at.
    #[must_use]
    pub fn from_payload(payload: FactsPayload) -> Self {
        let FactsPayload {
            mut summary,
            mut interesting,
            citations,
            facts,
        } = payload;

        if summary.is_empty() && interesting.is_empty() && !facts.is_empty() {
            let split = facts.len().min(LEGACY_SUMMARY_FACTS);
            summary = facts[..split].join(" ");
            interesting = facts[split..].to_vec();
        }

        let referenced = referenced_raw_ids(
            std::iter::once(summary.as_str()).chain(interesting.iter().map(String::as_str)),
        );
        let citations = citations
            .into_iter()
            .filter(|citation| {
                citation
                    .raw_id()
                    .is_some_and(|id| referenced.contains(&id))
            })
            .collect();

        Self {
            summary,
            interesting,
            citations,
        }
    }
}

/// Result of one enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub keywords: usize,
    pub enriched: usize,
    pub failed: usize,
    pub retries: usize,
}

struct FetchAttempt {
    facts: Option<KeywordFacts>,
    retries: usize,
}

/// Fetches facts for every distinct keyword and writes them back into the dataset.
pub struct FactEnricher {
    source: Arc<dyn FactSource>,
    concurrency: NonZeroUsize,
    retry_config: RetryConfig,
}

impl FactEnricher {
    pub fn new(source: Arc<dyn FactSource>, concurrency: NonZeroUsize, retry_config: RetryConfig) -> Self {
        Self {
            source,
            concurrency,
            retry_config,
        }
    }

    /// Enrich `dataset` in place.
    ///
    /// Results are merged only after every fetch task completed; keywords whose fetch
    /// failed keep their record untouched.
    pub async fn enrich(&self, dataset: &mut AssembledDataset, period: &str) -> EnrichmentReport {
        let keywords: BTreeSet<String> = dataset
            .records()
            .filter(|record| record.has_keyword())
            .map(|record| record.keyword.clone())
            .collect();
        let keywords: Vec<String> = keywords.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency.get()));

        info!(
            keywords = keywords.len(),
            concurrency = self.concurrency.get(),
            period,
            "fetching keyword facts"
        );

        let tasks: Vec<_> = keywords
            .iter()
            .map(|keyword| {
                let source = Arc::clone(&self.source);
                let semaphore = Arc::clone(&semaphore);
                let keyword = keyword.clone();
                let period = period.to_string();
                let retry_config = self.retry_config;
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return FetchAttempt {
                            facts: None,
                            retries: 0,
                        };
                    };
                    fetch_with_retry(source.as_ref(), &keyword, &period, retry_config).await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        let mut found: HashMap<&str, KeywordFacts> = HashMap::with_capacity(keywords.len());
        let mut failed = 0;
        let mut retries = 0;

        for (keyword, result) in keywords.iter().zip(results) {
            match result {
                Ok(attempt) => {
                    retries += attempt.retries;
                    match attempt.facts {
                        Some(facts) => {
                            found.insert(keyword.as_str(), facts);
                        }
                        None => failed += 1,
                    }
                }
                Err(join_error) => {
                    failed += 1;
                    error!(keyword = %keyword, error = ?join_error, "facts task aborted");
                }
            }
        }

        let mut enriched = 0;
        for record in dataset.records_mut() {
            let Some(facts) = found.get(record.keyword.as_str()) else {
                continue;
            };
            record.summary.clone_from(&facts.summary);
            record.citations.clone_from(&facts.citations);
            // Listing entries already carry stats; bullets would repeat them.
            if !record.has_stats() {
                record.interesting.clone_from(&facts.interesting);
            }
            enriched += 1;
        }

        let report = EnrichmentReport {
            keywords: keywords.len(),
            enriched,
            failed,
            retries,
        };
        info!(
            keywords = report.keywords,
            enriched = report.enriched,
            failed = report.failed,
            retries = report.retries,
            "keyword facts merged"
        );
        report
    }
}

/// 再試行付きでfactsを取得する。最終試行の失敗のみ `None` として返す。
async fn fetch_with_retry(
    source: &dyn FactSource,
    keyword: &str,
    period: &str,
    retry_config: RetryConfig,
) -> FetchAttempt {
    let mut attempt = 0;

    loop {
        match source.fetch_facts(keyword, period).await {
            Ok(payload) => {
                if attempt > 0 {
                    info!(keyword, attempt, "facts fetch succeeded after retry");
                }
                return FetchAttempt {
                    facts: Some(KeywordFacts::from_payload(payload)),
                    retries: attempt,
                };
            }
            Err(err) => {
                attempt += 1;

                if !retry_config.can_retry(attempt) {
                    warn!(
                        keyword,
                        attempt,
                        max_attempts = retry_config.max_attempts,
                        error = ?err,
                        "facts fetch failed after all retries"
                    );
                    return FetchAttempt {
                        facts: None,
                        retries: attempt - 1,
                    };
                }

                let delay = retry_config.delay_for_attempt(attempt);
                warn!(
                    keyword,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "facts fetch failed, retrying after delay"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
