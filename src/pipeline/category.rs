//! Category catalog and profile normalization.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Canonical category keys and their display names.
pub const CATEGORY_CATALOG: &[(&str, &str)] = &[
    ("subjects", "Subjects"),
    ("companies", "Companies & Organizations"),
    ("ai", "AI Models & Assistants"),
    ("frameworks", "Frameworks & Libraries"),
    ("languages", "Languages & Syntax"),
    ("concepts", "Concepts & Methods"),
    ("tools", "Tools & Services"),
    ("platforms", "Platforms & Search Engines"),
    ("hardware", "Hardware & Systems"),
    ("websites", "Websites & Applications"),
    ("people", "People"),
    ("bucket", "Bucket (other)"),
];

pub const DEFAULT_TIME_PERIOD: &str = "weekly";

/// User profile as stored by the profile service. Only the fields the digest reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default)]
    pub major_categories: Vec<String>,
    #[serde(default)]
    pub minor_categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period: Option<String>,
}

/// Result of [`normalize_profile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCategories {
    pub major: Vec<String>,
    pub minor: Vec<String>,
    pub period: String,
}

/// Resolve a free-form label to its catalog key.
///
/// Matches the key or the display name, case-insensitively. The label is trimmed first.
#[must_use]
pub fn find_category(label: &str) -> Option<&'static str> {
    let wanted = label.trim().to_lowercase();
    CATEGORY_CATALOG
        .iter()
        .find(|(key, display)| *key == wanted || display.to_lowercase() == wanted)
        .map(|(key, _)| *key)
}

#[must_use]
pub fn display_name(key: &str) -> Option<&'static str> {
    CATEGORY_CATALOG
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, display)| *display)
}

/// Split the profile's labels into canonical major/minor sets and resolve the period.
#[must_use]
pub fn normalize_profile(profile: &Profile, time_period_override: Option<&str>) -> NormalizedCategories {
    let major = normalize_labels(&profile.major_categories);
    let major_set: HashSet<&str> = major.iter().map(String::as_str).collect();
    let minor = normalize_labels(&profile.minor_categories)
        .into_iter()
        .filter(|key| !major_set.contains(key.as_str()))
        .collect();

    let period = time_period_override
        .filter(|value| !value.is_empty())
        .or_else(|| profile.time_period.as_deref().filter(|value| !value.is_empty()))
        .unwrap_or(DEFAULT_TIME_PERIOD)
        .to_lowercase();

    NormalizedCategories {
        major,
        minor,
        period,
    }
}

fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .filter_map(|label| find_category(label))
        .filter(|key| seen.insert(*key))
        .map(ToString::to_string)
        .collect()
}
