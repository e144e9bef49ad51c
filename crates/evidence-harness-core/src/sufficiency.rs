//! Decide whether local results are good enough to answer a query.
//!
//! Three rules run in order and the first failing rule determines the
//! verdict:
//!
//! | # | Rule | Applies when | Fails when |
//! |---|------|--------------|------------|
//! | 1 | count | always | fewer than `min_results` items |
//! | 2 | recency | `query.requires_latest()` | no item in the top `recency_window` is from `reference_year - recency_years` or later |
//! | 3 | coverage | comprehensive wording or `synthesis` intent | fewer than `min_topics` distinct topic buckets in the top `coverage_window` |
//!
//! The checker performs no I/O. Its only inputs besides the query and the
//! results are the policy and the reference year: either pinned at
//! construction or the current UTC year at the time of each check.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::models::{Intent, LocalResultSet, Query};
use crate::text::tokens;

const COMPREHENSIVE_WORDS: &[&str] = &[
    "comprehensive",
    "review",
    "reviews",
    "survey",
    "surveys",
    "overview",
    "systematic",
    "literature",
];

/// Title words that never form a topic bucket on their own.
const TOPIC_STOPWORDS: &[&str] = &[
    "about", "above", "after", "against", "among", "analysis", "analyzing", "approach",
    "approaches", "based", "before", "being", "between", "case", "does", "effect", "effects",
    "efficient", "from", "have", "improved", "improving", "into", "method", "methods", "more",
    "novel", "over", "paper", "review", "role", "some", "studies", "study", "survey", "than",
    "that", "their", "there", "these", "this", "through", "toward", "towards", "under", "understanding",
    "using", "what", "when", "where", "which", "while", "with", "within", "without",
];

/// Tuning knobs for the sufficiency rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SufficiencyPolicy {
    /// Count rule: minimum number of local results.
    pub min_results: usize,
    /// Recency rule: how many top results are inspected.
    pub recency_window: usize,
    /// Recency rule: a result is recent if `year >= reference_year - recency_years`.
    pub recency_years: i32,
    /// Coverage rule: how many top results are inspected.
    pub coverage_window: usize,
    /// Coverage rule: minimum number of distinct topic buckets.
    pub min_topics: usize,
}

impl Default for SufficiencyPolicy {
    fn default() -> Self {
        Self {
            min_results: 5,
            recency_window: 5,
            recency_years: 1,
            coverage_window: 10,
            min_topics: 3,
        }
    }
}

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictReason {
    CountTooLow,
    RecencyMissing,
    CoverageTooNarrow,
    Ok,
}

impl VerdictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictReason::CountTooLow => "count-too-low",
            VerdictReason::RecencyMissing => "recency-missing",
            VerdictReason::CoverageTooNarrow => "coverage-too-narrow",
            VerdictReason::Ok => "ok",
        }
    }
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The threshold that triggered a failing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Threshold {
    MinResults { required: usize, found: usize },
    Recency { min_year: i32, window: usize },
    MinTopics { required: usize, found: usize, window: usize },
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::MinResults { required, found } => {
                write!(f, "{} results, need at least {}", found, required)
            }
            Threshold::Recency { min_year, window } => {
                write!(f, "none of the top {} results is from {} or later", window, min_year)
            }
            Threshold::MinTopics {
                required,
                found,
                window,
            } => write!(
                f,
                "{} distinct topics in the top {} results, need at least {}",
                found, window, required
            ),
        }
    }
}

/// Outcome of [`SufficiencyChecker::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyVerdict {
    pub sufficient: bool,
    pub reason: VerdictReason,
    /// `None` when every rule passed.
    pub threshold: Option<Threshold>,
}

impl SufficiencyVerdict {
    fn ok() -> Self {
        Self {
            sufficient: true,
            reason: VerdictReason::Ok,
            threshold: None,
        }
    }

    fn insufficient(reason: VerdictReason, threshold: Threshold) -> Self {
        Self {
            sufficient: false,
            reason,
            threshold: Some(threshold),
        }
    }

    /// One-line description suitable for logs and CLI output.
    pub fn summary(&self) -> String {
        match &self.threshold {
            Some(t) => format!("{}: {}", self.reason, t),
            None => self.reason.to_string(),
        }
    }
}

/// Pure decision function over `(Query, LocalResultSet)`.
#[derive(Debug, Clone)]
pub struct SufficiencyChecker {
    policy: SufficiencyPolicy,
    /// `None` follows the calendar, matching [`Query::new`].
    reference_year: Option<i32>,
}

impl SufficiencyChecker {
    /// Checker that measures recency against the current UTC year, read
    /// afresh on every check.
    pub fn new(policy: SufficiencyPolicy) -> Self {
        Self {
            policy,
            reference_year: None,
        }
    }

    pub fn at_year(policy: SufficiencyPolicy, reference_year: i32) -> Self {
        Self {
            policy,
            reference_year: Some(reference_year),
        }
    }

    pub fn policy(&self) -> &SufficiencyPolicy {
        &self.policy
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    pub fn check(&self, query: &Query, local: &LocalResultSet) -> SufficiencyVerdict {
        let p = &self.policy;

        if local.len() < p.min_results {
            return SufficiencyVerdict::insufficient(
                VerdictReason::CountTooLow,
                Threshold::MinResults {
                    required: p.min_results,
                    found: local.len(),
                },
            );
        }

        if query.requires_latest() {
            let min_year = self.reference_year() - p.recency_years;
            let has_recent = local
                .top(p.recency_window)
                .iter()
                .any(|item| item.year.is_some_and(|y| y >= min_year));
            if !has_recent {
                return SufficiencyVerdict::insufficient(
                    VerdictReason::RecencyMissing,
                    Threshold::Recency {
                        min_year,
                        window: p.recency_window,
                    },
                );
            }
        }

        if wants_comprehensive(query) {
            let topics: HashSet<String> = local
                .top(p.coverage_window)
                .iter()
                .filter_map(|item| topic_bucket(&item.title))
                .collect();
            if topics.len() < p.min_topics {
                return SufficiencyVerdict::insufficient(
                    VerdictReason::CoverageTooNarrow,
                    Threshold::MinTopics {
                        required: p.min_topics,
                        found: topics.len(),
                        window: p.coverage_window,
                    },
                );
            }
        }

        SufficiencyVerdict::ok()
    }
}

/// True if the query asks for a comprehensive, review, or survey treatment.
pub fn wants_comprehensive(query: &Query) -> bool {
    if query.intent() == Some(Intent::Synthesis) {
        return true;
    }
    let toks = tokens(query.text());
    toks.iter().any(|t| COMPREHENSIVE_WORDS.contains(&t.as_str()))
        || toks.windows(2).any(|w| w[0] == "meta" && w[1] == "analysis")
}

/// Coarse topic bucket for a title: its first significant token.
///
/// Significant means at least four characters, not numeric, and not a
/// stopword or generic research word. A trailing plural `s` is folded so
/// `"Transformers ..."` and `"Transformer ..."` share a bucket.
pub fn topic_bucket(title: &str) -> Option<String> {
    tokens(title)
        .into_iter()
        .find(|t| {
            t.chars().count() >= 4
                && !t.chars().all(|c| c.is_ascii_digit())
                && !TOPIC_STOPWORDS.contains(&t.as_str())
        })
        .map(|t| {
            if t.len() > 4 && t.ends_with('s') && !t.ends_with("ss") {
                t[..t.len() - 1].to_string()
            } else {
                t
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalResultItem;

    const YEAR: i32 = 2026;

    fn checker() -> SufficiencyChecker {
        SufficiencyChecker::at_year(SufficiencyPolicy::default(), YEAR)
    }

    fn paper(title: &str, year: i32, relevance: f64) -> LocalResultItem {
        LocalResultItem {
            paper_id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            year: Some(year),
            relevance,
            snippet: String::new(),
        }
    }

    fn set_of(n: usize, year: i32) -> LocalResultSet {
        LocalResultSet::new(
            (0..n)
                .map(|i| paper(&format!("Transformer study {}", i), year, 1.0 - i as f64 * 0.05))
                .collect(),
        )
    }

    #[test]
    fn test_count_rule_fires_below_minimum() {
        for n in 0..5 {
            let verdict = checker().check(&Query::at_year("anything", YEAR), &set_of(n, YEAR));
            assert!(!verdict.sufficient);
            assert_eq!(verdict.reason, VerdictReason::CountTooLow);
            assert_eq!(
                verdict.threshold,
                Some(Threshold::MinResults {
                    required: 5,
                    found: n
                })
            );
        }
    }

    #[test]
    fn test_count_rule_wins_over_recency() {
        let q = Query::at_year("recent cancer immunotherapy trials", YEAR);
        let verdict = checker().check(&q, &set_of(2, 2010));
        assert_eq!(verdict.reason, VerdictReason::CountTooLow);
    }

    #[test]
    fn test_recency_rule_fires_when_top_results_are_old() {
        let q = Query::at_year("latest transformer architectures 2024", YEAR);
        assert!(q.requires_latest());
        let verdict = checker().check(&q, &set_of(8, 2021));
        assert!(!verdict.sufficient);
        assert_eq!(verdict.reason, VerdictReason::RecencyMissing);
        assert_eq!(
            verdict.threshold,
            Some(Threshold::Recency {
                min_year: 2025,
                window: 5
            })
        );
    }

    #[test]
    fn test_recency_rule_only_inspects_top_window() {
        let mut items: Vec<LocalResultItem> = (0..5)
            .map(|i| paper(&format!("Old paper {}", i), 2015, 0.9))
            .collect();
        items.push(paper("Fresh paper", 2026, 0.1));
        let q = Query::at_year("latest results", YEAR);
        let verdict = checker().check(&q, &LocalResultSet::new(items));
        assert_eq!(verdict.reason, VerdictReason::RecencyMissing);
    }

    #[test]
    fn test_recency_rule_passes_with_one_recent_item() {
        let mut items: Vec<LocalResultItem> = (0..4)
            .map(|i| paper(&format!("Old paper {}", i), 2015, 0.5))
            .collect();
        items.push(paper("Fresh paper", 2025, 0.9));
        let q = Query::at_year("latest results", YEAR);
        assert!(checker().check(&q, &LocalResultSet::new(items)).sufficient);
    }

    #[test]
    fn test_recency_ignored_without_cue() {
        let verdict = checker().check(&Query::at_year("transformers", YEAR), &set_of(8, 2001));
        assert!(verdict.sufficient);
        assert_eq!(verdict.reason, VerdictReason::Ok);
        assert_eq!(verdict.threshold, None);
    }

    #[test]
    fn test_missing_years_are_not_recent() {
        let items: Vec<LocalResultItem> = (0..6)
            .map(|i| LocalResultItem {
                year: None,
                ..paper(&format!("Undated {}", i), 0, 0.5)
            })
            .collect();
        let verdict = checker().check(
            &Query::at_year("newest results", YEAR),
            &LocalResultSet::new(items),
        );
        assert_eq!(verdict.reason, VerdictReason::RecencyMissing);
    }

    #[test]
    fn test_coverage_rule_fires_for_narrow_survey() {
        let q = Query::at_year("a comprehensive survey of transformers", YEAR);
        let verdict = checker().check(&q, &set_of(10, 2020));
        assert!(!verdict.sufficient);
        assert_eq!(verdict.reason, VerdictReason::CoverageTooNarrow);
        assert_eq!(
            verdict.threshold,
            Some(Threshold::MinTopics {
                required: 3,
                found: 1,
                window: 10
            })
        );
    }

    #[test]
    fn test_coverage_rule_passes_with_distinct_topics() {
        let items = vec![
            paper("Transformers for vision", 2020, 0.9),
            paper("Graph attention networks", 2020, 0.8),
            paper("Protein structure prediction", 2020, 0.7),
            paper("Transformer scaling laws", 2020, 0.6),
            paper("Diffusion models beat GANs", 2020, 0.5),
        ];
        let q = Query::at_year("overview of attention mechanisms", YEAR);
        assert!(checker().check(&q, &LocalResultSet::new(items)).sufficient);
    }

    #[test]
    fn test_coverage_rule_triggered_by_synthesis_intent() {
        let q = Query::at_year("transformers", YEAR).with_intent(Intent::Synthesis);
        let verdict = checker().check(&q, &set_of(6, 2020));
        assert_eq!(verdict.reason, VerdictReason::CoverageTooNarrow);
    }

    #[test]
    fn test_meta_analysis_is_comprehensive() {
        assert!(wants_comprehensive(&Query::at_year(
            "meta-analysis of statin trials",
            YEAR
        )));
        assert!(!wants_comprehensive(&Query::at_year("statin trials", YEAR)));
    }

    #[test]
    fn test_topic_bucket() {
        assert_eq!(topic_bucket("Transformers for Vision"), Some("transformer".into()));
        assert_eq!(topic_bucket("A Survey of Graph Networks"), Some("graph".into()));
        assert_eq!(topic_bucket("On 2020"), None);
        assert_eq!(topic_bucket("Loss landscapes"), Some("loss".into()));
    }

    #[test]
    fn test_scenario_deep_learning_applications_sufficient() {
        let items: Vec<LocalResultItem> = (0..8)
            .map(|i| paper(&format!("Deep learning application {}", i), 2018 + (i % 6), 0.9))
            .collect();
        let q = Query::at_year("deep learning applications", YEAR);
        let verdict = checker().check(&q, &LocalResultSet::new(items));
        assert!(verdict.sufficient);
    }

    #[test]
    fn test_check_is_deterministic() {
        let q = Query::at_year("latest transformer architectures 2024", YEAR);
        let set = set_of(8, 2021);
        let c = checker();
        assert_eq!(c.check(&q, &set), c.check(&q, &set));
    }

    #[test]
    fn test_unpinned_checker_tracks_current_year() {
        let now = chrono::Utc::now().year();
        let c = SufficiencyChecker::new(SufficiencyPolicy::default());
        assert_eq!(c.reference_year(), now);

        // The query's recency cue and the checker's threshold use the same year.
        let q = Query::new("latest results");
        let verdict = c.check(&q, &set_of(6, now - 3));
        assert_eq!(
            verdict.threshold,
            Some(Threshold::Recency {
                min_year: now - 1,
                window: 5
            })
        );
        assert!(c.check(&q, &set_of(6, now)).sufficient);
    }

    #[test]
    fn test_summary_mentions_reason() {
        let verdict = checker().check(&Query::at_year("x", YEAR), &set_of(2, YEAR));
        assert_eq!(verdict.summary(), "count-too-low: 2 results, need at least 5");
    }
}
