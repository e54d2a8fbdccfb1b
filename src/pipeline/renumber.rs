use std::collections::HashMap;

use tracing::debug;

use super::markers::rewrite_raw_markers;
use super::model::{AssembledDataset, KeywordRecord};

/// Assign `keyword_number` 1..N in canonical traversal order and rewrite citation ids.
///
/// Each citation becomes `"{keyword_number}:{index}"` and every `[old]` marker in the
/// record's summary and bullet points is rewritten to match. Returns N.
pub fn renumber(dataset: &mut AssembledDataset) -> u32 {
    let mut next = 1;
    for record in dataset.records_mut() {
        if !record.has_keyword() {
            continue;
        }
        renumber_record(record, next);
        next += 1;
    }

    let assigned = next - 1;
    debug!(assigned, "renumbered keywords and citations");
    assigned
}

fn renumber_record(record: &mut KeywordRecord, keyword_number: u32) {
    record.keyword_number = Some(keyword_number);
    if record.citations.is_empty() {
        return;
    }

    let mut mapping = HashMap::with_capacity(record.citations.len());
    for (index, citation) in record.citations.iter_mut().enumerate() {
        let new_id = format!("{keyword_number}:{}", index + 1);
        if let Some(old) = citation.raw_id() {
            mapping.insert(old, new_id.clone());
        }
        citation.n = new_id;
    }

    record.summary = rewrite_raw_markers(&record.summary, &mapping);
    for item in &mut record.interesting {
        *item = rewrite_raw_markers(item, &mapping);
    }
}
