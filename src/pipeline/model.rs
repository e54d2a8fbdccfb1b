//! Keyword dataset model shared by every pipeline stage.
//!
//! `AssembledDataset` は `major -> category -> sort -> records` の入れ子構造。
//! 走査順は [`AssembledDataset::buckets`] が唯一の定義で、全ステージがこれを使う。
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// データセットのトップレベル区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Major,
    Minor,
    Keywords,
}

impl CategoryType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Keywords => "keywords",
        }
    }
}

/// Sort bucket. Variant order is the traversal order inside a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKind {
    Trending,
    Top,
    Profile,
}

impl SortKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Top => "top",
            Self::Profile => "profile",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCount {
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(default)]
    pub positive: SentimentCount,
    #[serde(default)]
    pub negative: SentimentCount,
}

/// 出典。`n` は取得直後は整数文字列、採番後は `"{keyword_number}:{index}"`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(deserialize_with = "deserialize_citation_id")]
    pub n: String,
    #[serde(default)]
    pub url: String,
}

impl Citation {
    pub fn new(n: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            n: n.into(),
            url: url.into(),
        }
    }

    /// Raw integer id as sent by the facts API, if the id is still in that form.
    #[must_use]
    pub fn raw_id(&self) -> Option<u64> {
        self.n.trim().parse().ok()
    }
}

/// The facts API sends `n` as a JSON number; stored datasets carry strings.
fn deserialize_citation_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(value) => value.to_string(),
        RawId::Text(value) => value,
    })
}

/// One tracked topic inside one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRecord {
    #[serde(default)]
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_in_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_in_engagement: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interesting: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_number: Option<u32>,
}

impl KeywordRecord {
    /// Record for a user-tracked keyword: text only, no stats.
    pub fn tracked(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Self::default()
        }
    }

    /// Top/trending list entries carry numeric stats; tracked keywords do not.
    #[must_use]
    pub fn has_stats(&self) -> bool {
        self.trending.is_some()
            || self.count.is_some()
            || self.change_in_count.is_some()
            || self.engagement.is_some()
    }

    #[must_use]
    pub fn is_trending(&self) -> bool {
        self.trending.unwrap_or(false)
    }

    #[must_use]
    pub fn has_keyword(&self) -> bool {
        !self.keyword.is_empty()
    }
}

pub type SortBuckets = BTreeMap<SortKind, Vec<KeywordRecord>>;
pub type CategoryBuckets = BTreeMap<String, SortBuckets>;

/// Location of one bucket inside the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPath<'a> {
    pub category_type: CategoryType,
    /// `None` for the flat `keywords.profile` bucket.
    pub category_name: Option<&'a str>,
    pub sort: SortKind,
}

/// Keyword records grouped as `category_type -> category_name -> sort -> records`.
///
/// Canonical traversal: `major` (category ascending, trending before top),
/// `minor` (category ascending), then `keywords.profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDataset {
    #[serde(default)]
    pub major: CategoryBuckets,
    #[serde(default)]
    pub minor: CategoryBuckets,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keywords: SortBuckets,
}

impl AssembledDataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) one `(category, sort)` bucket of `major`/`minor`.
    pub fn insert_bucket(
        &mut self,
        category_type: CategoryType,
        category_name: &str,
        sort: SortKind,
        records: Vec<KeywordRecord>,
    ) {
        let categories = match category_type {
            CategoryType::Major => &mut self.major,
            CategoryType::Minor => &mut self.minor,
            CategoryType::Keywords => {
                self.keywords.insert(sort, records);
                return;
            }
        };
        categories
            .entry(category_name.to_string())
            .or_default()
            .insert(sort, records);
    }

    /// Append the user's tracked keywords as `keywords.profile`, skipping blanks.
    pub fn add_profile_keywords<S: AsRef<str>>(&mut self, keywords: &[S]) {
        let records: Vec<KeywordRecord> = keywords
            .iter()
            .map(AsRef::as_ref)
            .filter(|keyword| !keyword.is_empty())
            .map(KeywordRecord::tracked)
            .collect();
        if records.is_empty() {
            return;
        }
        self.keywords
            .entry(SortKind::Profile)
            .or_default()
            .extend(records);
    }

    pub fn buckets(&self) -> impl Iterator<Item = (BucketPath<'_>, &Vec<KeywordRecord>)> {
        nested(CategoryType::Major, &self.major)
            .chain(nested(CategoryType::Minor, &self.minor))
            .chain(self.keywords.iter().map(|(sort, records)| {
                (
                    BucketPath {
                        category_type: CategoryType::Keywords,
                        category_name: None,
                        sort: *sort,
                    },
                    records,
                )
            }))
    }

    pub fn buckets_mut(
        &mut self,
    ) -> impl Iterator<Item = (BucketPath<'_>, &mut Vec<KeywordRecord>)> {
        nested_mut(CategoryType::Major, &mut self.major)
            .chain(nested_mut(CategoryType::Minor, &mut self.minor))
            .chain(self.keywords.iter_mut().map(|(sort, records)| {
                (
                    BucketPath {
                        category_type: CategoryType::Keywords,
                        category_name: None,
                        sort: *sort,
                    },
                    records,
                )
            }))
    }

    pub fn records(&self) -> impl Iterator<Item = &KeywordRecord> {
        self.buckets().flat_map(|(_, records)| records.iter())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut KeywordRecord> {
        self.buckets_mut().flat_map(|(_, records)| records.iter_mut())
    }

    /// Bucket lists of one `(category_type, sort)` pair, in canonical category order.
    pub(crate) fn sort_buckets_mut(
        &mut self,
        category_type: CategoryType,
        sort: SortKind,
    ) -> Vec<&mut Vec<KeywordRecord>> {
        match category_type {
            CategoryType::Major => collect_sort(&mut self.major, sort),
            CategoryType::Minor => collect_sort(&mut self.minor, sort),
            CategoryType::Keywords => self.keywords.get_mut(&sort).into_iter().collect(),
        }
    }

    /// Records carrying a non-empty keyword.
    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.records().filter(|record| record.has_keyword()).count()
    }

    /// Number of citations kept across all records.
    #[must_use]
    pub fn total_citations(&self) -> usize {
        self.records().map(|record| record.citations.len()).sum()
    }

    #[must_use]
    pub fn find_by_number(&self, keyword_number: u32) -> Option<&KeywordRecord> {
        self.records()
            .find(|record| record.keyword_number == Some(keyword_number))
    }
}

fn nested(
    category_type: CategoryType,
    categories: &CategoryBuckets,
) -> impl Iterator<Item = (BucketPath<'_>, &Vec<KeywordRecord>)> {
    categories.iter().flat_map(move |(name, sorts)| {
        sorts.iter().map(move |(sort, records)| {
            (
                BucketPath {
                    category_type,
                    category_name: Some(name.as_str()),
                    sort: *sort,
                },
                records,
            )
        })
    })
}

fn nested_mut(
    category_type: CategoryType,
    categories: &mut CategoryBuckets,
) -> impl Iterator<Item = (BucketPath<'_>, &mut Vec<KeywordRecord>)> {
    categories.iter_mut().flat_map(move |(name, sorts)| {
        sorts.iter_mut().map(move |(sort, records)| {
            (
                BucketPath {
                    category_type,
                    category_name: Some(name.as_str()),
                    sort: *sort,
                },
                records,
            )
        })
    })
}

fn collect_sort(categories: &mut CategoryBuckets, sort: SortKind) -> Vec<&mut Vec<KeywordRecord>> {
    categories
        .values_mut()
        .filter_map(|sorts| sorts.get_mut(&sort))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn stat_record(keyword: &str, trending: bool) -> KeywordRecord {
        KeywordRecord {
            keyword: keyword.to_string(),
            trending: Some(trending),
            count: Some(10),
            change_in_count: Some(0),
            engagement: Some(5),
            change_in_engagement: Some(0),
            sentiment: Some(Sentiment::default()),
            ..KeywordRecord::default()
        }
    }
}
