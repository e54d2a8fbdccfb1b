use std::collections::HashSet;

use tracing::debug;

use super::model::{AssembledDataset, CategoryType, SortKind};

/// Bucket precedence: the first appearance of a keyword in this order is kept.
pub const DEDUP_PRIORITY: [(CategoryType, SortKind); 4] = [
    (CategoryType::Major, SortKind::Trending),
    (CategoryType::Major, SortKind::Top),
    (CategoryType::Minor, SortKind::Trending),
    (CategoryType::Keywords, SortKind::Profile),
];

/// Drop records whose lower-cased keyword already appeared in a higher-priority bucket.
///
/// Records with an empty keyword are dropped as well. Returns the number of removed records.
pub fn deduplicate(dataset: &mut AssembledDataset) -> usize {
    let mut seen = HashSet::new();
    let mut removed = 0;

    for (category_type, sort) in DEDUP_PRIORITY {
        for records in dataset.sort_buckets_mut(category_type, sort) {
            let before = records.len();
            records.retain(|record| {
                let fingerprint = normalize_keyword(&record.keyword);
                !fingerprint.is_empty() && seen.insert(fingerprint)
            });
            removed += before - records.len();
        }
    }

    debug!(removed, kept = seen.len(), "deduplicated keyword records");
    removed
}

fn normalize_keyword(keyword: &str) -> String {
    keyword.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::{KeywordRecord, fixtures::stat_record};

    fn keywords(records: &[KeywordRecord]) -> Vec<&str> {
        records.iter().map(|r| r.keyword.as_str()).collect()
    }

    #[test]
    fn trending_major_wins_over_top_and_profile() {
        let mut dataset = AssembledDataset::new();
        dataset.insert_bucket(
            CategoryType::Major,
            "subjects",
            SortKind::Top,
            vec![stat_record("ai", false), stat_record("Privacy", false)],
        );
        dataset.insert_bucket(
            CategoryType::Major,
            "subjects",
            SortKind::Trending,
            vec![stat_record("AI", true)],
        );
        dataset.add_profile_keywords(&["Ai", "Rust"]);

        let removed = deduplicate(&mut dataset);

        assert_eq!(removed, 2);
        let subjects = &dataset.major["subjects"];
        assert_eq!(keywords(&subjects[&SortKind::Trending]), vec!["AI"]);
        assert_eq!(keywords(&subjects[&SortKind::Top]), vec!["Privacy"]);
        assert_eq!(keywords(&dataset.keywords[&SortKind::Profile]), vec!["Rust"]);
    }

    #[test]
    fn seen_set_spans_categories_and_types() {
        let mut dataset = AssembledDataset::new();
        dataset.insert_bucket(
            CategoryType::Major,
            "ai",
            SortKind::Top,
            vec![stat_record("Claude", false)],
        );
        dataset.insert_bucket(
            CategoryType::Major,
            "companies",
            SortKind::Trending,
            vec![stat_record("claude", true), stat_record("OpenAI", true)],
        );
        dataset.insert_bucket(
            CategoryType::Minor,
            "tools",
            SortKind::Trending,
            vec![stat_record("OPENAI", false), stat_record("Cursor", false)],
        );

        deduplicate(&mut dataset);

        // Any major trending bucket outranks every major top bucket.
        assert_eq!(
            keywords(&dataset.major["companies"][&SortKind::Trending]),
            vec!["claude", "OpenAI"]
        );
        assert!(dataset.major["ai"][&SortKind::Top].is_empty());
        assert_eq!(
            keywords(&dataset.minor["tools"][&SortKind::Trending]),
            vec!["Cursor"]
        );
    }

    #[test]
    fn duplicates_within_one_bucket_keep_first() {
        let mut dataset = AssembledDataset::new();
        dataset.add_profile_keywords(&["Rust", "rust", "Go"]);
        dataset
            .keywords
            .get_mut(&SortKind::Profile)
            .unwrap()
            .push(KeywordRecord::default());

        let removed = deduplicate(&mut dataset);

        assert_eq!(removed, 2);
        assert_eq!(
            keywords(&dataset.keywords[&SortKind::Profile]),
            vec!["Rust", "Go"]
        );
    }
}
