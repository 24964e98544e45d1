//! # eoka-locator
//!
//! Turns a fuzzy target description ("Discussion tab in main navigation")
//! into a ranked set of locator expressions.
//!
//! ```
//! use eoka_locator::{Category, Decomposition, LocatorGenerator};
//!
//! let generator = LocatorGenerator::default();
//! let d = Decomposition::new("Discussion")
//!     .kind("tab")
//!     .region("navigation");
//! let set = generator.generate("Discussion tab in main navigation", None, Some(&d));
//! assert_eq!(set.first().unwrap().category, Category::SemanticPrecise);
//! ```
//!
//! Generation is a pipeline of pure stages (explicit, semantic, rule-based
//! fallback) whose outputs are merged, de-duplicated and sorted. The same
//! inputs always produce the same set.

mod fallback;
pub mod query;
mod semantic;
pub mod tables;
mod weights;

pub use fallback::literal_texts;
pub use query::{Query, TextMatch};
pub use weights::{Category, LocatorWeights};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One hypothesis for finding the target element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorCandidate {
    pub expression: String,
    pub confidence: f64,
    pub category: Category,
    pub rationale: String,
}

impl LocatorCandidate {
    pub(crate) fn new(
        query: Query,
        category: Category,
        weights: &LocatorWeights,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            expression: query.to_string(),
            confidence: weights.weight(category),
            category,
            rationale: rationale.into(),
        }
    }

    /// Parsed form of the expression.
    pub fn query(&self) -> Query {
        Query::parse(&self.expression)
    }
}

/// Best-effort structural breakdown of a target description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decomposition {
    pub target_text: String,
    pub element_kind: Option<String>,
    pub region: Option<String>,
    pub modifiers: Vec<String>,
    pub alternative_texts: Vec<String>,
}

impl Decomposition {
    pub fn new(target_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.element_kind = Some(kind.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn alternatives<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternative_texts = texts.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn text(&self) -> Option<&str> {
        let t = self.target_text.trim();
        (!t.is_empty()).then_some(t)
    }

    pub(crate) fn kind_locators(&self) -> &'static [&'static str] {
        self.element_kind
            .as_deref()
            .map(tables::kind_locators)
            .unwrap_or(tables::ANY)
    }

    /// Region table entry, if the region is a known one.
    pub(crate) fn known_region(&self) -> Option<&'static [&'static str]> {
        let region = self.region.as_deref()?;
        tables::is_known_region(region).then(|| tables::region_locators(region))
    }
}

/// De-duplicated candidates in descending confidence order.
///
/// The first occurrence of an expression wins; ties keep generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateSet {
    candidates: Vec<LocatorCandidate>,
}

impl CandidateSet {
    pub fn from_candidates(candidates: Vec<LocatorCandidate>) -> Self {
        let mut seen = HashSet::new();
        let mut candidates: Vec<_> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.expression.clone()))
            .collect();
        // sort_by is stable
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn first(&self) -> Option<&LocatorCandidate> {
        self.candidates.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocatorCandidate> {
        self.candidates.iter()
    }

    /// The `n` highest-ranked candidates.
    pub fn top(&self, n: usize) -> &[LocatorCandidate] {
        &self.candidates[..n.min(self.candidates.len())]
    }

    pub fn into_vec(self) -> Vec<LocatorCandidate> {
        self.candidates
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a LocatorCandidate;
    type IntoIter = std::slice::Iter<'a, LocatorCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Locator strategy generator.
#[derive(Debug, Clone, Default)]
pub struct LocatorGenerator {
    weights: LocatorWeights,
}

impl LocatorGenerator {
    pub fn new(weights: LocatorWeights) -> Self {
        Self {
            weights: weights.clamped(),
        }
    }

    pub fn weights(&self) -> &LocatorWeights {
        &self.weights
    }

    /// Candidates for an element to click or inspect.
    ///
    /// The rule-based fallback always runs, with or without a decomposition.
    pub fn generate(
        &self,
        description: &str,
        explicit: Option<&str>,
        decomposition: Option<&Decomposition>,
    ) -> CandidateSet {
        let w = &self.weights;
        let mut all = explicit_stage(explicit, w);
        if let Some(d) = decomposition {
            all.extend(semantic::precise(d, w));
            all.extend(semantic::element(d, w));
            all.extend(semantic::context(d, w));
            all.extend(semantic::alternative(d, w));
            all.extend(semantic::partial(d, w));
            all.extend(semantic::attribute(d, w));
        }
        all.extend(fallback::keyword_kinds(description, w));
        all.extend(fallback::any_text(description, w));
        CandidateSet::from_candidates(all)
    }

    /// Candidates restricted to text-accepting elements.
    pub fn generate_input(
        &self,
        description: &str,
        explicit: Option<&str>,
        decomposition: Option<&Decomposition>,
    ) -> CandidateSet {
        let w = &self.weights;
        let mut all = explicit_stage(explicit, w);
        if let Some(d) = decomposition {
            all.extend(semantic::input_attributes(d, w));
            all.extend(semantic::input_context(d, w));
        }
        all.extend(fallback::input_attributes(description, w));
        all.extend(fallback::generic_inputs(w));
        CandidateSet::from_candidates(all)
    }
}

fn explicit_stage(explicit: Option<&str>, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            vec![LocatorCandidate::new(
                Query::parse(s),
                Category::Explicit,
                w,
                "selector supplied with the action",
            )]
        })
        .unwrap_or_default()
}
