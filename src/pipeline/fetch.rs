use std::{num::NonZeroUsize, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::category::NormalizedCategories;
use super::model::{AssembledDataset, CategoryType, KeywordRecord, SortKind};

/// Trend listing source for one `(period, category, sort)` triple.
#[async_trait]
pub trait KeywordSource: Send + Sync {
    async fn fetch_keywords(
        &self,
        period: &str,
        category: &str,
        sort: SortKind,
    ) -> Result<Vec<KeywordRecord>>;
}

/// Per-type truncation caps for fetched buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketLimits {
    pub major: usize,
    pub minor: usize,
}

impl Default for BucketLimits {
    fn default() -> Self {
        Self { major: 3, minor: 2 }
    }
}

impl BucketLimits {
    fn for_type(self, category_type: CategoryType) -> usize {
        match category_type {
            CategoryType::Major => self.major,
            CategoryType::Minor | CategoryType::Keywords => self.minor,
        }
    }
}

/// Outcome of one fetch fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFetchOutcome {
    pub dataset: AssembledDataset,
    pub requested: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BucketRequest {
    category_type: CategoryType,
    category: String,
    sort: SortKind,
}

/// Fans out trend listing calls for every `(category, sort)` pair and merges them.
pub struct KeywordFetcher {
    source: Arc<dyn KeywordSource>,
    concurrency: NonZeroUsize,
    limits: BucketLimits,
}

impl KeywordFetcher {
    pub fn new(source: Arc<dyn KeywordSource>, concurrency: NonZeroUsize, limits: BucketLimits) -> Self {
        Self {
            source,
            concurrency,
            limits,
        }
    }

    /// Fetch `top` + `trending` for each major category and `trending` for each minor one.
    ///
    /// Failed calls leave an empty bucket behind; they never fail the whole fetch.
    pub async fn fetch(&self, categories: &NormalizedCategories) -> KeywordFetchOutcome {
        let requests = plan_requests(categories);
        let requested = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency.get()));

        info!(
            requested,
            concurrency = self.concurrency.get(),
            period = %categories.period,
            "fetching keyword buckets"
        );

        let tasks: Vec<_> = requests
            .iter()
            .map(|request| {
                let source = Arc::clone(&self.source);
                let semaphore = Arc::clone(&semaphore);
                let period = categories.period.clone();
                let request = request.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        anyhow::bail!("keyword fetch semaphore closed");
                    };
                    source
                        .fetch_keywords(&period, &request.category, request.sort)
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        let mut dataset = AssembledDataset::new();
        let mut failed = 0;

        for (request, result) in requests.iter().zip(results) {
            let records = match result {
                Ok(Ok(mut records)) => {
                    records.truncate(self.limits.for_type(request.category_type));
                    debug!(
                        category = %request.category,
                        sort = request.sort.as_str(),
                        kept = records.len(),
                        "keyword bucket fetched"
                    );
                    records
                }
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(
                        category = %request.category,
                        sort = request.sort.as_str(),
                        error = ?err,
                        "keyword fetch failed"
                    );
                    Vec::new()
                }
                Err(join_error) => {
                    failed += 1;
                    error!(
                        category = %request.category,
                        sort = request.sort.as_str(),
                        error = ?join_error,
                        "keyword fetch task aborted"
                    );
                    Vec::new()
                }
            };
            dataset.insert_bucket(request.category_type, &request.category, request.sort, records);
        }

        info!(requested, failed, "keyword fetch completed");

        KeywordFetchOutcome {
            dataset,
            requested,
            failed,
        }
    }
}

fn plan_requests(categories: &NormalizedCategories) -> Vec<BucketRequest> {
    let major = categories.major.iter().flat_map(|category| {
        [SortKind::Top, SortKind::Trending].map(|sort| BucketRequest {
            category_type: CategoryType::Major,
            category: category.clone(),
            sort,
        })
    });
    let minor = categories.minor.iter().map(|category| BucketRequest {
        category_type: CategoryType::Minor,
        category: category.clone(),
        sort: SortKind::Trending,
    });
    major.chain(minor).collect()
}
