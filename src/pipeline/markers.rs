//! Inline citation marker scanning and rewriting.
//!
//! Raw facts text carries `[n]` markers; after renumbering the same places carry
//! `[k:i]`. Both forms are handled here as pure string transforms.
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static RAW_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("raw marker pattern is valid"));

static NUMBERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+):(\d+)\]").expect("numbered marker pattern is valid"));

/// Integers referenced by `[n]` markers anywhere in `texts`.
pub(crate) fn referenced_raw_ids<'a, I>(texts: I) -> HashSet<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    texts
        .into_iter()
        .flat_map(|text| RAW_MARKER.captures_iter(text))
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Replace every `[old]` with `[new]` using `mapping`; unknown markers stay as-is.
pub(crate) fn rewrite_raw_markers(text: &str, mapping: &HashMap<u64, String>) -> String {
    RAW_MARKER
        .replace_all(text, |caps: &Captures<'_>| {
            caps[1]
                .parse::<u64>()
                .ok()
                .and_then(|old| mapping.get(&old))
                .map_or_else(|| caps[0].to_string(), |new| format!("[{new}]"))
        })
        .into_owned()
}

/// One `[k:i]` occurrence in narrative text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NumberedMarker<'t> {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) text: &'t str,
    pub(crate) keyword_number: Option<u32>,
    pub(crate) index: Option<u32>,
}

impl NumberedMarker<'_> {
    /// Citation id the marker points at, e.g. `"3:2"`.
    pub(crate) fn citation_id(&self) -> &str {
        &self.text[1..self.text.len() - 1]
    }
}

/// All `[k:i]` markers in `text`, left to right.
pub(crate) fn numbered_markers(text: &str) -> Vec<NumberedMarker<'_>> {
    NUMBERED_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(NumberedMarker {
                start: whole.start(),
                end: whole.end(),
                text: whole.as_str(),
                // Overlong digit runs cannot name a real keyword; they resolve to nothing.
                keyword_number: caps[1].parse().ok(),
                index: caps[2].parse().ok(),
            })
        })
        .collect()
}
