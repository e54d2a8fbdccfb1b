/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry, register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub keyword_fetch_requests: Counter,
    pub keyword_fetch_failures: Counter,
    pub fact_fetch_failures: Counter,
    pub fact_fetch_retries: Counter,
    pub duplicates_removed: Counter,
    pub unresolved_citation_groups: Counter,
    pub digests_assembled: Counter,
    pub narratives_failed: Counter,

    // ヒストグラム
    pub assemble_duration: Histogram,
    pub narrative_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            keyword_fetch_requests: register_counter_with_registry!(
                "digest_keyword_fetch_requests_total",
                "Total number of trend listing requests issued",
                registry
            )?,
            keyword_fetch_failures: register_counter_with_registry!(
                "digest_keyword_fetch_failures_total",
                "Trend listing requests that failed and left an empty bucket",
                registry
            )?,
            fact_fetch_failures: register_counter_with_registry!(
                "digest_fact_fetch_failures_total",
                "Keywords whose facts could not be fetched after all retries",
                registry
            )?,
            fact_fetch_retries: register_counter_with_registry!(
                "digest_fact_fetch_retries_total",
                "Retried facts requests",
                registry
            )?,
            duplicates_removed: register_counter_with_registry!(
                "digest_duplicates_removed_total",
                "Keyword records dropped by cross-bucket deduplication",
                registry
            )?,
            unresolved_citation_groups: register_counter_with_registry!(
                "digest_unresolved_citation_groups_total",
                "Narrative footnotes whose markers resolved to no source URL",
                registry
            )?,
            digests_assembled: register_counter_with_registry!(
                "digest_assembled_total",
                "Total number of digests assembled",
                registry
            )?,
            narratives_failed: register_counter_with_registry!(
                "digest_narratives_failed_total",
                "Narrative generation calls that failed",
                registry
            )?,
            assemble_duration: register_histogram_with_registry!(
                "digest_assemble_duration_seconds",
                "Duration of digest assembly (fetch through formatting)",
                registry
            )?,
            narrative_duration: register_histogram_with_registry!(
                "digest_narrative_duration_seconds",
                "Duration of narrative generation calls",
                registry
            )?,
        })
    }
}
