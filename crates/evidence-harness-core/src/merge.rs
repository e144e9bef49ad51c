//! Merge local and external evidence into one deduplicated, ranked list.
//!
//! Items are keyed by `(normalized title, year)`. Local items are walked
//! first, then external items in the order the router returned them; the
//! first item with a given key wins and later ones are skipped. The
//! survivors are stable-sorted by relevance (descending, local before
//! external on ties) and truncated to `max_results`.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    by_relevance_desc, EvidenceItem, ExternalResultItem, LocalResultSet, MergedResultSet,
};
use crate::text::normalize_title;

/// Duplicate-detection key for a paper.
pub fn dedup_key(title: &str, year: Option<i32>) -> (String, Option<i32>) {
    (normalize_title(title), year)
}

pub fn merge(
    local: &LocalResultSet,
    external: &[ExternalResultItem],
    max_results: usize,
) -> MergedResultSet {
    let mut seen = HashSet::new();
    let mut items: Vec<EvidenceItem> = local
        .iter()
        .map(EvidenceItem::from)
        .chain(external.iter().map(EvidenceItem::from))
        .filter(|item| seen.insert(dedup_key(&item.title, item.year)))
        .collect();

    items.sort_by(|a, b| match by_relevance_desc(a.relevance, b.relevance) {
        Ordering::Equal => a.is_external.cmp(&b.is_external),
        other => other,
    });
    items.truncate(max_results);

    MergedResultSet::from_items(items)
}

/// Local results as evidence, unchanged: same items, same order, no cap.
pub fn local_only(local: &LocalResultSet) -> MergedResultSet {
    MergedResultSet::from_items(local.iter().map(EvidenceItem::from).collect())
}
