//! Digest pipeline orchestrator and builder.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::observability::metrics::Metrics;
use crate::util::retry::RetryConfig;

use super::category::{Profile, normalize_profile};
use super::citations::{
    DEFAULT_SOURCES_PER_MESSAGE, GroupedNarrative, group_summaries, render_source_messages,
};
use super::dedup::deduplicate;
use super::facts::{FactEnricher, FactSource};
use super::fetch::{BucketLimits, KeywordFetcher, KeywordSource};
use super::format::format_dataset;
use super::model::AssembledDataset;
use super::narrative::{Narrative, NarrativeError, NarrativeGenerator, NarrativeRequest};
use super::progress::{LogProgressSink, ProgressReporter, ProgressSink};
use super::renumber::renumber;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub keyword_concurrency: NonZeroUsize,
    pub fact_concurrency: NonZeroUsize,
    pub fact_retry: RetryConfig,
    pub limits: BucketLimits,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            keyword_concurrency: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            fact_concurrency: NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
            fact_retry: RetryConfig::default(),
            limits: BucketLimits::default(),
        }
    }
}

/// Per-run counters reported alongside the digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub keyword_requests: usize,
    pub keyword_failures: usize,
    pub fact_keywords: usize,
    pub fact_failures: usize,
    pub fact_retries: usize,
    pub duplicates_removed: usize,
}

/// Numbered dataset plus its prompt rendering, ready for narrative generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledDigest {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub period: String,
    pub major: Vec<String>,
    pub minor: Vec<String>,
    pub dataset: AssembledDataset,
    pub formatted: String,
    pub keyword_count: usize,
    pub citation_count: usize,
    pub stats: AssemblyStats,
}

/// Final user-facing output of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestReport {
    pub run_id: Uuid,
    pub title: String,
    pub concise: GroupedNarrative,
    pub long: GroupedNarrative,
    pub sources: Vec<String>,
    pub citation_count: usize,
}

/// Coordinates fetch, enrichment, dedup, renumbering, formatting and citation grouping.
pub struct DigestPipeline {
    fetcher: KeywordFetcher,
    enricher: FactEnricher,
    progress: Option<Arc<dyn ProgressSink>>,
    metrics: Option<Arc<Metrics>>,
}

impl DigestPipeline {
    #[must_use]
    pub fn builder(settings: PipelineSettings) -> DigestPipelineBuilder {
        DigestPipelineBuilder::new(settings)
    }

    /// Fetch, enrich, dedup and number the dataset for `profile`.
    ///
    /// Upstream failures degrade to empty buckets or unenriched records; this never fails.
    pub async fn assemble(&self, profile: &Profile, period_override: Option<&str>) -> AssembledDigest {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let categories = normalize_profile(profile, period_override);

        info!(
            %run_id,
            period = %categories.period,
            major = categories.major.len(),
            minor = categories.minor.len(),
            tracked = profile.keywords.len(),
            "digest assembly started"
        );

        let fetched = self.fetcher.fetch(&categories).await;
        let mut dataset = fetched.dataset;
        dataset.add_profile_keywords(&profile.keywords);

        let reporter = self
            .progress
            .as_ref()
            .map(|sink| ProgressReporter::spawn(Arc::clone(sink)));
        let enrichment = self.enricher.enrich(&mut dataset, &categories.period).await;
        if let Some(reporter) = reporter {
            reporter.finish().await;
        }

        let duplicates_removed = deduplicate(&mut dataset);
        let keyword_count = renumber(&mut dataset) as usize;
        let citation_count = dataset.total_citations();
        let formatted = format_dataset(&dataset);

        let stats = AssemblyStats {
            keyword_requests: fetched.requested,
            keyword_failures: fetched.failed,
            fact_keywords: enrichment.keywords,
            fact_failures: enrichment.failed,
            fact_retries: enrichment.retries,
            duplicates_removed,
        };

        if let Some(metrics) = &self.metrics {
            metrics.keyword_fetch_requests.inc_by(stats.keyword_requests as f64);
            metrics.keyword_fetch_failures.inc_by(stats.keyword_failures as f64);
            metrics.fact_fetch_failures.inc_by(stats.fact_failures as f64);
            metrics.fact_fetch_retries.inc_by(stats.fact_retries as f64);
            metrics.duplicates_removed.inc_by(stats.duplicates_removed as f64);
            metrics.digests_assembled.inc();
            metrics.assemble_duration.observe(started.elapsed().as_secs_f64());
        }

        info!(
            %run_id,
            keyword_count,
            citation_count,
            keyword_failures = stats.keyword_failures,
            fact_failures = stats.fact_failures,
            duplicates_removed,
            elapsed_ms = started.elapsed().as_millis(),
            "digest assembly completed"
        );

        AssembledDigest {
            run_id,
            generated_at: Utc::now(),
            period: categories.period,
            major: categories.major,
            minor: categories.minor,
            dataset,
            formatted,
            keyword_count,
            citation_count,
            stats,
        }
    }

    /// Group the narrative's citation markers against the numbered dataset.
    #[must_use]
    pub fn finalize(&self, digest: &AssembledDigest, narrative: Narrative) -> DigestReport {
        let (concise, long) = group_summaries(
            &narrative.concise_summary,
            &narrative.long_summary,
            &digest.dataset,
        );

        let unresolved = concise.unresolved() + long.unresolved();
        if unresolved > 0 {
            warn!(run_id = %digest.run_id, unresolved, "narrative cites unknown sources");
        }
        if let Some(metrics) = &self.metrics {
            metrics.unresolved_citation_groups.inc_by(unresolved as f64);
        }

        let sources = render_source_messages(&long.citations, DEFAULT_SOURCES_PER_MESSAGE);

        DigestReport {
            run_id: digest.run_id,
            title: narrative.title,
            concise,
            long,
            sources,
            citation_count: digest.citation_count,
        }
    }

    /// Assemble, generate the narrative once, then finalize.
    ///
    /// # Errors
    /// Only a narrative generation failure is returned.
    pub async fn run(
        &self,
        profile: &Profile,
        period_override: Option<&str>,
        generator: &dyn NarrativeGenerator,
    ) -> Result<DigestReport, NarrativeError> {
        let digest = self.assemble(profile, period_override).await;

        let started = Instant::now();
        let request = NarrativeRequest {
            formatted: &digest.formatted,
            profile,
            period: &digest.period,
        };
        let narrative = match generator.generate(&request).await {
            Ok(narrative) => narrative,
            Err(err) => {
                warn!(run_id = %digest.run_id, error = %err, "narrative generation failed");
                if let Some(metrics) = &self.metrics {
                    metrics.narratives_failed.inc();
                }
                return Err(err);
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.narrative_duration.observe(started.elapsed().as_secs_f64());
        }

        Ok(self.finalize(&digest, narrative))
    }
}

/// Builder pattern for constructing `DigestPipeline`.
pub struct DigestPipelineBuilder {
    settings: PipelineSettings,
    keyword_source: Option<Arc<dyn KeywordSource>>,
    fact_source: Option<Arc<dyn FactSource>>,
    progress: Option<Arc<dyn ProgressSink>>,
    metrics: Option<Arc<Metrics>>,
}

impl DigestPipelineBuilder {
    fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            keyword_source: None,
            fact_source: None,
            progress: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_keyword_source(mut self, source: Arc<dyn KeywordSource>) -> Self {
        self.keyword_source = Some(source);
        self
    }

    #[must_use]
    pub fn with_fact_source(mut self, source: Arc<dyn FactSource>) -> Self {
        self.fact_source = Some(source);
        self
    }

    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Report progress through the log.
    #[must_use]
    pub fn with_log_progress(self) -> Self {
        self.with_progress_sink(Arc::new(LogProgressSink))
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    /// Fails when either upstream source is missing.
    pub fn build(self) -> Result<DigestPipeline> {
        let keyword_source = self
            .keyword_source
            .context("keyword source must be configured before build")?;
        let fact_source = self
            .fact_source
            .context("fact source must be configured before build")?;

        Ok(DigestPipeline {
            fetcher: KeywordFetcher::new(
                keyword_source,
                self.settings.keyword_concurrency,
                self.settings.limits,
            ),
            enricher: FactEnricher::new(
                fact_source,
                self.settings.fact_concurrency,
                self.settings.fact_retry,
            ),
            progress: self.progress,
            metrics: self.metrics,
        })
    }
}
