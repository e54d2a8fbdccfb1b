//! Post-generation citation handling.
//!
//! The narrative service echoes `[k:i]` markers verbatim. Adjacent markers collapse into
//! one footnote, equivalent footnotes share a number, and each footnote resolves to the
//! source URLs of the citations it names.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::markers::{NumberedMarker, numbered_markers};
use super::model::{AssembledDataset, KeywordRecord};

/// Maximum number of characters allowed between two markers of the same group.
const MAX_GROUP_GAP: usize = 1;

pub const DEFAULT_SOURCES_PER_MESSAGE: usize = 4;

/// One user-visible footnote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteCitation {
    pub n: usize,
    pub urls: Vec<String>,
}

/// Narrative text with compact footnote numbers and the footnotes they point at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedNarrative {
    pub text: String,
    pub citations: Vec<FootnoteCitation>,
}

impl GroupedNarrative {
    /// Footnotes none of whose markers resolved to a URL.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.citations.iter().filter(|c| c.urls.is_empty()).count()
    }
}

/// `citation id -> url` lookup over a numbered dataset.
struct CitationIndex<'d> {
    by_number: HashMap<u32, &'d KeywordRecord>,
}

impl<'d> CitationIndex<'d> {
    fn new(dataset: &'d AssembledDataset) -> Self {
        let mut by_number = HashMap::new();
        for record in dataset.records() {
            if let Some(number) = record.keyword_number {
                by_number.entry(number).or_insert(record);
            }
        }
        Self { by_number }
    }

    fn url(&self, marker: &NumberedMarker<'_>) -> Option<&'d str> {
        let record = self.by_number.get(&marker.keyword_number?)?;
        let id = marker.citation_id();
        record
            .citations
            .iter()
            .find(|citation| citation.n == id)
            .map(|citation| citation.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// Group, number and resolve the `[k:i]` markers in `text`.
///
/// Text without such markers comes back unchanged with no footnotes, so already
/// grouped text passes through untouched.
#[must_use]
pub fn group_citations(text: &str, dataset: &AssembledDataset) -> GroupedNarrative {
    let markers = numbered_markers(text);
    if markers.is_empty() {
        return GroupedNarrative {
            text: text.to_string(),
            citations: Vec::new(),
        };
    }

    let groups = merge_adjacent(text, &markers);
    let index = CitationIndex::new(dataset);

    let mut numbers: HashMap<Vec<&str>, usize> = HashMap::new();
    let mut citations = Vec::new();
    let mut rewritten = String::with_capacity(text.len());
    let mut cursor = 0;

    for group in &groups {
        let key = group_key(group);
        let number = match numbers.get(&key) {
            Some(number) => *number,
            None => {
                let number = citations.len() + 1;
                citations.push(FootnoteCitation {
                    n: number,
                    urls: resolve_urls(group, &index),
                });
                numbers.insert(key, number);
                number
            }
        };

        let (start, end) = span(group);
        rewritten.push_str(&text[cursor..start]);
        rewritten.push_str(&format!("[{number}]"));
        cursor = end;
    }
    rewritten.push_str(&text[cursor..]);

    debug!(
        markers = markers.len(),
        groups = groups.len(),
        footnotes = citations.len(),
        "grouped narrative citations"
    );

    GroupedNarrative {
        text: rewritten,
        citations,
    }
}

/// Run [`group_citations`] on the concise and long narrative independently.
#[must_use]
pub fn group_summaries(
    concise: &str,
    long: &str,
    dataset: &AssembledDataset,
) -> (GroupedNarrative, GroupedNarrative) {
    (
        group_citations(concise, dataset),
        group_citations(long, dataset),
    )
}

fn merge_adjacent<'m, 't>(
    text: &str,
    markers: &'m [NumberedMarker<'t>],
) -> Vec<&'m [NumberedMarker<'t>]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=markers.len() {
        let split = i == markers.len() || {
            let gap = &text[markers[i - 1].end..markers[i].start];
            gap.chars().count() > MAX_GROUP_GAP
        };
        if split {
            groups.push(&markers[start..i]);
            start = i;
        }
    }
    groups
}

/// Order-insensitive identity of a group (multiset of marker strings).
fn group_key<'t>(group: &[NumberedMarker<'t>]) -> Vec<&'t str> {
    let mut key: Vec<&str> = group.iter().map(|marker| marker.text).collect();
    key.sort_unstable();
    key
}

fn span(group: &[NumberedMarker<'_>]) -> (usize, usize) {
    match (group.first(), group.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => (0, 0),
    }
}

fn resolve_urls(group: &[NumberedMarker<'_>], index: &CitationIndex<'_>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for marker in group {
        match index.url(marker) {
            Some(url) => {
                if !urls.iter().any(|seen| seen == url) {
                    urls.push(url.to_string());
                }
            }
            None => debug!(marker = marker.text, "citation marker did not resolve"),
        }
    }
    urls
}

/// Render footnotes as chat-sized "Sources" messages, `per_message` footnotes each.
#[must_use]
pub fn render_source_messages(citations: &[FootnoteCitation], per_message: usize) -> Vec<String> {
    if citations.is_empty() {
        return Vec::new();
    }

    let per_message = per_message.max(1);
    let mut messages = Vec::new();
    let mut lines = vec!["**Sources:**".to_string()];
    let mut in_message = 0;

    for citation in citations {
        if in_message >= per_message && !lines.is_empty() {
            messages.push(lines.join("\n"));
            lines.clear();
            in_message = 0;
        }

        if citation.urls.is_empty() {
            lines.push(format!("[{}] (source not found)", citation.n));
        } else {
            lines.push(format!("[{}] {}", citation.n, citation.urls.join(", ")));
        }
        in_message += 1;
    }

    if !lines.is_empty() {
        messages.push(lines.join("\n"));
    }
    messages
}
