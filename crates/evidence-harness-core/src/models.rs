//! Core data types that flow through query resolution.
//!
//! A [`Query`] goes in; a [`LocalResultSet`] comes back from the local
//! index; external adapters contribute [`ExternalResultItem`]s; and the merge
//! step produces a [`MergedResultSet`] of [`EvidenceItem`]s.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::text::{contains_sequence, tokens};

/// Source label carried by evidence that came from the local index.
pub const LOCAL_SOURCE: &str = "local";

/// Words that mark a query as asking for recent work.
const RECENCY_WORDS: &[&str] = &[
    "latest", "recent", "recently", "newest", "new", "current", "emerging", "sota",
];

const RECENCY_PHRASES: &[&[&str]] = &[
    &["state", "of", "the", "art"],
    &["cutting", "edge"],
    &["up", "to", "date"],
];

/// A year token counts as a recency cue when it is within this many years
/// before the reference year (or at most one year after it).
const RECENT_YEAR_SPAN: i32 = 2;

// ═══════════════════════════════════════════════════════════════════════
// Intent
// ═══════════════════════════════════════════════════════════════════════

/// Declared purpose of a query, used as a hint by the sufficiency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Find papers on a topic.
    Search,
    /// Identify research gaps.
    GapDetection,
    /// Find supporting evidence for a claim.
    Evidence,
    /// Produce citations or references.
    Citation,
    /// Literature review or synthesis across many papers.
    Synthesis,
}

type Patterns = &'static [&'static [&'static str]];

/// Detection order: most specific intents first, plain search last.
const INTENT_PATTERNS: &[(Intent, Patterns)] = &[
    (
        Intent::GapDetection,
        &[
            &["gap"],
            &["gaps"],
            &["unexplored"],
            &["understudied"],
            &["missing"],
            &["research", "opportunity"],
            &["research", "opportunities"],
        ],
    ),
    (
        Intent::Evidence,
        &[
            &["evidence", "for"],
            &["support", "for"],
            &["prove"],
            &["quote"],
            &["quotes"],
        ],
    ),
    (
        Intent::Citation,
        &[
            &["cite"],
            &["citation"],
            &["citations"],
            &["bibliography"],
            &["references"],
            &["apa"],
            &["mla"],
        ],
    ),
    (
        Intent::Synthesis,
        &[
            &["literature", "review"],
            &["synthesize"],
            &["synthesise"],
            &["synthesis"],
            &["summarize", "the", "literature"],
        ],
    ),
    (
        Intent::Search,
        &[
            &["find"],
            &["search"],
            &["show", "me"],
            &["what", "is"],
            &["tell", "me", "about"],
            &["papers", "on"],
            &["research", "on"],
            &["studies", "about"],
            &["look", "for"],
        ],
    ),
];

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::GapDetection => "gap_detection",
            Intent::Evidence => "evidence",
            Intent::Citation => "citation",
            Intent::Synthesis => "synthesis",
        }
    }

    /// Quick pattern-based intent detection.
    ///
    /// Returns `None` when no pattern matches; callers treat that as "no
    /// declared intent" rather than guessing.
    pub fn detect(text: &str) -> Option<Intent> {
        let toks = tokens(text);
        INTENT_PATTERNS
            .iter()
            .find(|(_, patterns)| matches_any(&toks, patterns))
            .map(|(intent, _)| *intent)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "search" => Ok(Intent::Search),
            "gap_detection" | "gaps" => Ok(Intent::GapDetection),
            "evidence" => Ok(Intent::Evidence),
            "citation" => Ok(Intent::Citation),
            "synthesis" | "review" => Ok(Intent::Synthesis),
            other => Err(format!(
                "unknown intent '{}': expected search, gap_detection, evidence, citation, or synthesis",
                other
            )),
        }
    }
}

fn matches_any(toks: &[String], patterns: &[&[&str]]) -> bool {
    patterns.iter().any(|p| {
        let needle: Vec<String> = p.iter().map(|s| s.to_string()).collect();
        contains_sequence(toks, &needle)
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Query
// ═══════════════════════════════════════════════════════════════════════

/// An immutable research query.
///
/// The `requires_latest` flag is derived once, at construction, from
/// lexical cues in the text: a recency word (`latest`, `recent`, ...), a
/// recency phrase (`state of the art`), or a year token close to the
/// reference year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    text: String,
    intent: Option<Intent>,
    requires_latest: bool,
}

impl Query {
    /// Build a query using the current UTC year as the recency reference.
    pub fn new(text: impl Into<String>) -> Self {
        Self::at_year(text, chrono::Utc::now().year())
    }

    /// Build a query against an explicit reference year.
    pub fn at_year(text: impl Into<String>, reference_year: i32) -> Self {
        let text = text.into();
        let requires_latest = detect_requires_latest(&tokens(&text), reference_year);
        Self {
            text,
            intent: None,
            requires_latest,
        }
    }

    /// Attach a declared intent hint.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    pub fn requires_latest(&self) -> bool {
        self.requires_latest
    }
}

fn detect_requires_latest(toks: &[String], reference_year: i32) -> bool {
    if toks.iter().any(|t| RECENCY_WORDS.contains(&t.as_str())) {
        return true;
    }
    if matches_any(toks, RECENCY_PHRASES) {
        return true;
    }
    toks.iter().any(|t| {
        t.len() == 4
            && t.parse::<i32>().is_ok_and(|y| {
                y >= reference_year - RECENT_YEAR_SPAN && y <= reference_year + 1
            })
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════════════════

/// A paper returned by the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalResultItem {
    pub paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Relevance in `[0.0, 1.0]`.
    pub relevance: f64,
    pub snippet: String,
}

/// Local results, ordered by descending relevance.
///
/// Construction clamps relevance into `[0, 1]` and stable-sorts the items;
/// there is no way to mutate the set afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LocalResultSet {
    items: Vec<LocalResultItem>,
}

impl LocalResultSet {
    pub fn new(mut items: Vec<LocalResultItem>) -> Self {
        for item in &mut items {
            item.relevance = clamp_relevance(item.relevance);
        }
        items.sort_by(|a, b| by_relevance_desc(a.relevance, b.relevance));
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[LocalResultItem] {
        &self.items
    }

    /// The first `n` items (or all of them, if fewer).
    pub fn top(&self, n: usize) -> &[LocalResultItem] {
        &self.items[..n.min(self.items.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocalResultItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A paper returned by an external source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResultItem {
    pub paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Relevance in `[0.0, 1.0]`.
    pub relevance: f64,
    pub snippet: String,
    /// Adapter that produced this item (e.g. `"arxiv"`).
    pub source_name: String,
    pub url: Option<String>,
}

impl ExternalResultItem {
    pub fn is_external(&self) -> bool {
        true
    }
}

/// One entry of a [`MergedResultSet`], from either origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub relevance: f64,
    pub snippet: String,
    /// `"local"` or the name of the external adapter.
    pub source: String,
    pub is_external: bool,
    pub url: Option<String>,
}

impl From<&LocalResultItem> for EvidenceItem {
    fn from(item: &LocalResultItem) -> Self {
        Self {
            paper_id: item.paper_id.clone(),
            title: item.title.clone(),
            year: item.year,
            relevance: item.relevance,
            snippet: item.snippet.clone(),
            source: LOCAL_SOURCE.to_string(),
            is_external: false,
            url: None,
        }
    }
}

impl From<&ExternalResultItem> for EvidenceItem {
    fn from(item: &ExternalResultItem) -> Self {
        Self {
            paper_id: item.paper_id.clone(),
            title: item.title.clone(),
            year: item.year,
            relevance: clamp_relevance(item.relevance),
            snippet: item.snippet.clone(),
            source: item.source_name.clone(),
            is_external: true,
            url: item.url.clone(),
        }
    }
}

/// Deduplicated union of local and external evidence.
///
/// Built only by [`crate::merge::merge`], which guarantees no two items share
/// a normalized `(title, year)`, or by [`crate::merge::local_only`], which
/// carries a sufficient local set over as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MergedResultSet {
    items: Vec<EvidenceItem>,
}

impl MergedResultSet {
    pub(crate) fn from_items(items: Vec<EvidenceItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn local_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_external).count()
    }

    pub fn external_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_external).count()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// DomainLabel
// ═══════════════════════════════════════════════════════════════════════

/// Coarse subject-matter category used to pick an external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainLabel {
    Medical,
    Technical,
    PhysicalScience,
    General,
}

impl DomainLabel {
    pub const ALL: [DomainLabel; 4] = [
        DomainLabel::Medical,
        DomainLabel::Technical,
        DomainLabel::PhysicalScience,
        DomainLabel::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainLabel::Medical => "medical",
            DomainLabel::Technical => "technical",
            DomainLabel::PhysicalScience => "physical-science",
            DomainLabel::General => "general",
        }
    }
}

impl fmt::Display for DomainLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "medical" => Ok(DomainLabel::Medical),
            "technical" | "tech" => Ok(DomainLabel::Technical),
            "physical-science" | "physics" => Ok(DomainLabel::PhysicalScience),
            "general" => Ok(DomainLabel::General),
            other => Err(format!(
                "unknown domain label '{}': expected medical, technical, physical-science, or general",
                other
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Clamp a relevance score into `[0.0, 1.0]`; NaN becomes `0.0`.
pub fn clamp_relevance(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

pub(crate) fn by_relevance_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, relevance: f64) -> LocalResultItem {
        LocalResultItem {
            paper_id: id.to_string(),
            title: format!("Paper {}", id),
            year: Some(2020),
            relevance,
            snippet: String::new(),
        }
    }

    #[test]
    fn test_query_latest_word() {
        let q = Query::at_year("latest transformer architectures", 2026);
        assert!(q.requires_latest());
    }

    #[test]
    fn test_query_recent_year_token() {
        assert!(Query::at_year("protein folding 2025", 2026).requires_latest());
        assert!(Query::at_year("protein folding 2024", 2026).requires_latest());
        assert!(!Query::at_year("protein folding 2019", 2026).requires_latest());
    }

    #[test]
    fn test_query_state_of_the_art_phrase() {
        assert!(Query::at_year("state-of-the-art object detection", 2026).requires_latest());
    }

    #[test]
    fn test_query_no_cue() {
        let q = Query::at_year("deep learning applications", 2026);
        assert!(!q.requires_latest());
        assert_eq!(q.intent(), None);
    }

    #[test]
    fn test_query_with_intent() {
        let q = Query::at_year("graph neural networks", 2026).with_intent(Intent::Synthesis);
        assert_eq!(q.intent(), Some(Intent::Synthesis));
        assert_eq!(q.text(), "graph neural networks");
    }

    #[test]
    fn test_intent_detect() {
        assert_eq!(
            Intent::detect("what are the research gaps in battery chemistry"),
            Some(Intent::GapDetection)
        );
        assert_eq!(
            Intent::detect("write a literature review of CRISPR delivery"),
            Some(Intent::Synthesis)
        );
        assert_eq!(
            Intent::detect("find papers on sparse attention"),
            Some(Intent::Search)
        );
        assert_eq!(Intent::detect("quantum error correction"), None);
    }

    #[test]
    fn test_intent_from_str() {
        assert_eq!("gap-detection".parse::<Intent>(), Ok(Intent::GapDetection));
        assert_eq!("Synthesis".parse::<Intent>(), Ok(Intent::Synthesis));
        assert!("chit-chat".parse::<Intent>().is_err());
    }

    #[test]
    fn test_local_result_set_sorted_and_clamped() {
        let set = LocalResultSet::new(vec![item("a", 0.2), item("b", 1.7), item("c", f64::NAN)]);
        let ids: Vec<&str> = set.iter().map(|i| i.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(set.items()[0].relevance, 1.0);
        assert_eq!(set.items()[2].relevance, 0.0);
    }

    #[test]
    fn test_local_result_set_sort_is_stable() {
        let set = LocalResultSet::new(vec![item("a", 0.5), item("b", 0.5), item("c", 0.5)]);
        let ids: Vec<&str> = set.iter().map(|i| i.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_top_never_overruns() {
        let set = LocalResultSet::new(vec![item("a", 0.5)]);
        assert_eq!(set.top(5).len(), 1);
        assert!(LocalResultSet::empty().top(5).is_empty());
    }

    #[test]
    fn test_domain_label_roundtrip_names() {
        for label in DomainLabel::ALL {
            assert_eq!(label.as_str().parse::<DomainLabel>(), Ok(label));
        }
        assert_eq!("physics".parse::<DomainLabel>(), Ok(DomainLabel::PhysicalScience));
        assert_eq!(
            serde_json::to_string(&DomainLabel::PhysicalScience).unwrap(),
            "\"physical-science\""
        );
    }
}
