//! Keyword-based domain classification.
//!
//! A [`ClassifierTable`] is an explicit, ordered list of
//! `(DomainLabel, term set)` rules. [`DomainClassifier::classify`] walks the
//! rules in order and returns the label of the first rule with any matching
//! term; if nothing matches, the query is [`DomainLabel::General`].
//!
//! Terms are matched against the query's token stream (see
//! [`crate::text::tokens`]):
//!
//! - `"cancer"` matches the whole token `cancer` only.
//! - `"immunotherap*"` matches any token starting with `immunotherap`.
//! - `"deep learning"` matches the contiguous tokens `deep learning`.
//!
//! Classification is total: every input, including the empty string, maps to
//! exactly one label.

use serde::Serialize;

use crate::models::{DomainLabel, Query};
use crate::text::{contains_sequence, tokens};

const MEDICAL_TERMS: &[&str] = &[
    "alzheimer*",
    "bacteri*",
    "biomedical",
    "cancer*",
    "cardiovascular",
    "chemotherap*",
    "clinical",
    "covid*",
    "dementia",
    "diabet*",
    "diagnos*",
    "disease*",
    "dna",
    "drug",
    "drugs",
    "epidemiolog*",
    "gene",
    "genes",
    "genom*",
    "health",
    "healthcare",
    "hospital*",
    "immunotherap*",
    "infect*",
    "medical",
    "medicine",
    "oncolog*",
    "patient*",
    "pharmac*",
    "protein*",
    "rna",
    "surgery",
    "surgical",
    "symptom*",
    "therap*",
    "tumor*",
    "tumour*",
    "vaccin*",
    "viral",
    "virus",
];

const PHYSICAL_SCIENCE_TERMS: &[&str] = &[
    "astronom*",
    "astrophysic*",
    "atomic",
    "black hole",
    "black holes",
    "boson*",
    "condensed matter",
    "cosmolog*",
    "dark matter",
    "electron*",
    "field theory",
    "galax*",
    "gravit*",
    "magnet*",
    "neutrino*",
    "nuclear",
    "optics",
    "particle*",
    "photon*",
    "physics",
    "quantum",
    "relativity",
    "superconduct*",
    "thermodynamic*",
];

const TECHNICAL_TERMS: &[&str] = &[
    "ai",
    "algorithm*",
    "artificial intelligence",
    "bert",
    "classification",
    "clustering",
    "cnn",
    "compiler*",
    "computer*",
    "computer vision",
    "cryptograph*",
    "database*",
    "deep learning",
    "distributed systems",
    "gpt*",
    "gradient descent",
    "language model",
    "language models",
    "llm*",
    "lstm",
    "machine learning",
    "natural language processing",
    "neural",
    "nlp",
    "optimization",
    "programming",
    "regression",
    "reinforcement learning",
    "rnn",
    "robot*",
    "software",
    "transformer*",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Word(String),
    Prefix(String),
    Phrase(Vec<String>),
}

impl Term {
    fn parse(raw: &str) -> Option<Term> {
        let raw = raw.trim().to_lowercase();
        if let Some(stem) = raw.strip_suffix('*') {
            let stem: String = stem.chars().filter(|c| c.is_alphanumeric()).collect();
            return (!stem.is_empty()).then_some(Term::Prefix(stem));
        }
        let mut toks = tokens(&raw);
        match toks.len() {
            0 => None,
            1 => toks.pop().map(Term::Word),
            _ => Some(Term::Phrase(toks)),
        }
    }

    fn matches(&self, toks: &[String]) -> bool {
        match self {
            Term::Word(w) => toks.iter().any(|t| t == w),
            Term::Prefix(p) => toks.iter().any(|t| t.starts_with(p.as_str())),
            Term::Phrase(seq) => contains_sequence(toks, seq),
        }
    }
}

/// One classification rule: a label and the terms that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    label: DomainLabel,
    raw: Vec<String>,
    terms: Vec<Term>,
}

impl DomainRule {
    /// Build a rule. Terms that are blank after trimming are ignored.
    pub fn new<I, S>(label: DomainLabel, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rule = Self {
            label,
            raw: Vec::new(),
            terms: Vec::new(),
        };
        rule.extend(terms);
        rule
    }

    fn extend<I, S>(&mut self, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for raw in terms {
            let raw = raw.into();
            if let Some(term) = Term::parse(&raw) {
                if !self.terms.contains(&term) {
                    self.terms.push(term);
                    self.raw.push(raw.trim().to_lowercase());
                }
            }
        }
    }

    pub fn label(&self) -> DomainLabel {
        self.label
    }

    /// The terms as written, lowercased.
    pub fn terms(&self) -> &[String] {
        &self.raw
    }

    fn matched_terms(&self, toks: &[String]) -> Vec<String> {
        self.terms
            .iter()
            .zip(&self.raw)
            .filter(|(term, _)| term.matches(toks))
            .map(|(_, raw)| raw.clone())
            .collect()
    }
}

/// Ordered rule list. Earlier rules take priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierTable {
    rules: Vec<DomainRule>,
}

impl ClassifierTable {
    pub fn new(rules: Vec<DomainRule>) -> Self {
        Self { rules }
    }

    /// Built-in table with priority medical > physical-science > technical.
    pub fn builtin() -> Self {
        Self::new(vec![
            DomainRule::new(DomainLabel::Medical, MEDICAL_TERMS.iter().copied()),
            DomainRule::new(
                DomainLabel::PhysicalScience,
                PHYSICAL_SCIENCE_TERMS.iter().copied(),
            ),
            DomainRule::new(DomainLabel::Technical, TECHNICAL_TERMS.iter().copied()),
        ])
    }

    /// Add terms to the rule for `label`, appending a new lowest-priority
    /// rule if the table has none for it.
    pub fn with_extra_terms<I, S>(mut self, label: DomainLabel, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.rules.iter_mut().find(|r| r.label == label) {
            Some(rule) => rule.extend(terms),
            None => self.rules.push(DomainRule::new(label, terms)),
        }
        self
    }

    pub fn rules(&self) -> &[DomainRule] {
        &self.rules
    }
}

impl Default for ClassifierTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Label plus the terms of the winning rule that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub label: DomainLabel,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainClassifier {
    table: ClassifierTable,
}

impl DomainClassifier {
    pub fn new(table: ClassifierTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ClassifierTable {
        &self.table
    }

    pub fn classify(&self, query: &Query) -> DomainLabel {
        self.explain(query.text()).label
    }

    pub fn classify_text(&self, text: &str) -> DomainLabel {
        self.explain(text).label
    }

    /// Like [`classify_text`](Self::classify_text), also reporting which
    /// terms selected the label.
    pub fn explain(&self, text: &str) -> Classification {
        let toks = tokens(text);
        for rule in &self.table.rules {
            let matched = rule.matched_terms(&toks);
            if !matched.is_empty() {
                return Classification {
                    label: rule.label,
                    matched_terms: matched,
                };
            }
        }
        Classification {
            label: DomainLabel::General,
            matched_terms: Vec::new(),
        }
    }
}
