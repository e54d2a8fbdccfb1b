//! Plain-text rendering of the assembled dataset for the narrative prompt.
use std::fmt::Write as _;

use super::category::display_name;
use super::model::{AssembledDataset, CategoryBuckets, KeywordRecord, SortBuckets, SortKind};

/// Sorts rendered inside a category, in order.
const CATEGORY_SORTS: [SortKind; 2] = [SortKind::Trending, SortKind::Top];

/// Render `dataset` as the sectioned text block the narrative service consumes.
#[must_use]
pub fn format_dataset(dataset: &AssembledDataset) -> String {
    let mut sections = Vec::new();

    if !dataset.keywords.is_empty() {
        sections.push("\n=== KEYWORDS ===".to_string());
        for (sort, records) in &dataset.keywords {
            sections.push(format!("\n--- {} ---", sort.as_str().to_uppercase()));
            push_records(&mut sections, records);
        }
    }

    push_category_section(&mut sections, "MAJOR", &dataset.major);
    push_category_section(&mut sections, "MINOR", &dataset.minor);

    sections.join("\n")
}

fn push_category_section(sections: &mut Vec<String>, title: &str, categories: &CategoryBuckets) {
    sections.push(format!("\n=== {title} ==="));
    for (category, sorts) in categories {
        let display = display_name(category).unwrap_or(category.as_str());
        sections.push(format!("\n--- {} ---", display.to_uppercase()));
        push_sorts(sections, sorts);
    }
}

fn push_sorts(sections: &mut Vec<String>, sorts: &SortBuckets) {
    for sort in CATEGORY_SORTS {
        let Some(records) = sorts.get(&sort) else {
            continue;
        };
        if records.is_empty() {
            continue;
        }
        sections.push(format!("\n{}:", sort.as_str().to_uppercase()));
        push_records(sections, records);
    }
}

fn push_records(sections: &mut Vec<String>, records: &[KeywordRecord]) {
    let trending = records.iter().filter(|r| r.is_trending());
    let rest = records.iter().filter(|r| !r.is_trending());
    for (i, record) in trending.chain(rest).enumerate() {
        sections.push(format_record(record, i + 1));
    }
}

fn format_record(record: &KeywordRecord, index: usize) -> String {
    let mut header = format!("{index}. {}", record.keyword);
    if let Some(number) = record.keyword_number {
        let _ = write!(header, " (#{number})");
    }

    let stats = stats(record);
    if !stats.is_empty() {
        let _ = write!(header, " [{}]", stats.join(", "));
    }

    let mut lines = vec![format!("\n{header}")];
    if !record.summary.is_empty() {
        lines.push(format!("Summary: {}", record.summary));
    }
    if !record.interesting.is_empty() {
        lines.push("Interesting points:".to_string());
        lines.extend(record.interesting.iter().map(|point| format!("  • {point}")));
    }
    lines.join("\n")
}

fn stats(record: &KeywordRecord) -> Vec<String> {
    let mut stats = Vec::new();
    if record.is_trending() {
        stats.push("🔥 TRENDING".to_string());
    }
    if let Some(count) = record.count {
        stats.push(format!("Count: {count}"));
    }
    stats.extend(record.change_in_count.and_then(change));
    if let Some(engagement) = record.engagement {
        stats.push(format!("Engagement: {engagement}"));
    }
    stats.extend(record.change_in_engagement.and_then(change));
    stats.extend(sentiment_majority(record).map(str::to_string));
    stats
}

fn change(value: i64) -> Option<String> {
    match value {
        v if v > 0 => Some(format!("↗️ +{v}%")),
        v if v < 0 => Some(format!("↘️ {v}%")),
        _ => None,
    }
}

fn sentiment_majority(record: &KeywordRecord) -> Option<&'static str> {
    let sentiment = record.sentiment?;
    let total = record.count.filter(|count| *count > 0)?;
    // share > 0.5 without going through floats; widened so upstream values cannot overflow
    let majority = |count: i64| i128::from(count) * 2 > i128::from(total);
    if majority(sentiment.positive.count) {
        Some("😊 Majority Positive")
    } else if majority(sentiment.negative.count) {
        Some("😞 Majority Negative")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::{CategoryType, Sentiment, SentimentCount, fixtures::stat_record};

    #[test]
    fn record_header_lists_stats() {
        let record = KeywordRecord {
            trending: Some(true),
            count: Some(10),
            change_in_count: Some(25),
            engagement: Some(400),
            change_in_engagement: Some(-5),
            sentiment: Some(Sentiment {
                positive: SentimentCount { count: 6 },
                negative: SentimentCount { count: 1 },
            }),
            keyword_number: Some(3),
            summary: "Launch week [3:1].".to_string(),
            interesting: vec!["Benchmarks [3:1]".to_string()],
            ..KeywordRecord::tracked("Claude")
        };

        assert_eq!(
            format_record(&record, 2),
            "\n2. Claude (#3) [🔥 TRENDING, Count: 10, ↗️ +25%, Engagement: 400, ↘️ -5%, 😊 Majority Positive]\n\
             Summary: Launch week [3:1].\n\
             Interesting points:\n  • Benchmarks [3:1]"
        );
    }

    #[test]
    fn split_sentiment_and_zero_change_are_omitted() {
        let record = KeywordRecord {
            count: Some(10),
            change_in_count: Some(0),
            sentiment: Some(Sentiment {
                positive: SentimentCount { count: 5 },
                negative: SentimentCount { count: 5 },
            }),
            ..KeywordRecord::tracked("Go")
        };
        assert_eq!(format_record(&record, 1), "\n1. Go [Count: 10]");
    }

    #[test]
    fn negative_majority_is_reported() {
        let record = KeywordRecord {
            count: Some(4),
            sentiment: Some(Sentiment {
                positive: SentimentCount { count: 0 },
                negative: SentimentCount { count: 3 },
            }),
            ..KeywordRecord::tracked("Outage")
        };
        assert_eq!(sentiment_majority(&record), Some("😞 Majority Negative"));
    }

    #[test]
    fn extreme_sentiment_counts_do_not_overflow() {
        let record = KeywordRecord {
            count: Some(i64::MAX),
            sentiment: Some(Sentiment {
                positive: SentimentCount { count: i64::MAX },
                negative: SentimentCount { count: i64::MIN },
            }),
            ..KeywordRecord::tracked("Overflow")
        };
        assert_eq!(sentiment_majority(&record), Some("😊 Majority Positive"));

        let split = KeywordRecord {
            count: Some(i64::MAX),
            sentiment: Some(Sentiment {
                positive: SentimentCount { count: i64::MAX / 2 },
                negative: SentimentCount { count: i64::MAX / 2 },
            }),
            ..KeywordRecord::tracked("Split")
        };
        assert_eq!(sentiment_majority(&split), None);
    }

    #[test]
    fn dataset_sections_follow_canonical_layout() {
        let mut dataset = AssembledDataset::new();
        dataset.insert_bucket(
            CategoryType::Major,
            "ai",
            SortKind::Top,
            vec![stat_record("Gemini", false), stat_record("Claude", true)],
        );
        dataset.insert_bucket(
            CategoryType::Major,
            "ai",
            SortKind::Trending,
            vec![stat_record("Qwen", true)],
        );
        dataset.insert_bucket(CategoryType::Minor, "tools", SortKind::Trending, Vec::new());
        dataset.add_profile_keywords(&["Rust"]);

        let text = format_dataset(&dataset);

        let order = [
            "=== KEYWORDS ===",
            "--- PROFILE ---",
            "1. Rust",
            "=== MAJOR ===",
            "--- AI MODELS & ASSISTANTS ---",
            "TRENDING:",
            "1. Qwen",
            "TOP:",
            "1. Claude",
            "2. Gemini",
            "=== MINOR ===",
            "--- TOOLS & SERVICES ---",
        ];
        let mut cursor = 0;
        for needle in order {
            let found = text[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle} missing after offset {cursor}"));
            cursor += found + needle.len();
        }
        // empty buckets render no sort heading
        assert_eq!(text.matches("TRENDING:").count(), 1);
    }

    #[test]
    fn unknown_category_falls_back_to_key() {
        let mut dataset = AssembledDataset::new();
        dataset.insert_bucket(
            CategoryType::Minor,
            "retro",
            SortKind::Trending,
            vec![stat_record("Amiga", false)],
        );
        assert!(format_dataset(&dataset).contains("--- RETRO ---"));
    }
}
