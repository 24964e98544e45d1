use serde::{Deserialize, Serialize};
use std::fmt;

/// How a candidate was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Explicit,
    SemanticPrecise,
    SemanticElement,
    SemanticContext,
    SemanticAlternative,
    SemanticPartial,
    SemanticAttribute,
    FallbackTab,
    FallbackButton,
    FallbackLink,
    FallbackText,
    FallbackInput,
    FallbackGeneric,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::SemanticPrecise => "semantic_precise",
            Self::SemanticElement => "semantic_element",
            Self::SemanticContext => "semantic_context",
            Self::SemanticAlternative => "semantic_alternative",
            Self::SemanticPartial => "semantic_partial",
            Self::SemanticAttribute => "semantic_attribute",
            Self::FallbackTab => "fallback_tab",
            Self::FallbackButton => "fallback_button",
            Self::FallbackLink => "fallback_link",
            Self::FallbackText => "fallback_text",
            Self::FallbackInput => "fallback_input",
            Self::FallbackGeneric => "fallback_generic",
        }
    }

    /// Whether the candidate came from a structural decomposition.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            Self::SemanticPrecise
                | Self::SemanticElement
                | Self::SemanticContext
                | Self::SemanticAlternative
                | Self::SemanticPartial
                | Self::SemanticAttribute
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence assigned to each generation stage.
///
/// The defaults are starting points, not measurements; override them from config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorWeights {
    pub semantic_precise: f64,
    pub semantic_element: f64,
    pub semantic_context: f64,
    pub semantic_alternative: f64,
    pub semantic_partial: f64,
    pub semantic_attribute: f64,
    /// Keyword-triggered element kinds (`fallback_tab`, `fallback_button`, ...).
    pub fallback_kind: f64,
    /// Catch-all text matches.
    pub fallback_text: f64,
    /// Region and kind locators combined for `semantic_precise` (N x N).
    pub precise_cap: usize,
}

impl Default for LocatorWeights {
    fn default() -> Self {
        Self {
            semantic_precise: 0.95,
            semantic_element: 0.85,
            semantic_context: 0.75,
            semantic_alternative: 0.70,
            semantic_partial: 0.65,
            semantic_attribute: 0.70,
            fallback_kind: 0.60,
            fallback_text: 0.40,
            precise_cap: 2,
        }
    }
}

impl LocatorWeights {
    /// Copy with every confidence clamped into [0, 1].
    pub fn clamped(&self) -> Self {
        let c = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            semantic_precise: c(self.semantic_precise),
            semantic_element: c(self.semantic_element),
            semantic_context: c(self.semantic_context),
            semantic_alternative: c(self.semantic_alternative),
            semantic_partial: c(self.semantic_partial),
            semantic_attribute: c(self.semantic_attribute),
            fallback_kind: c(self.fallback_kind),
            fallback_text: c(self.fallback_text),
            precise_cap: self.precise_cap,
        }
    }

    /// Confidence for a category. Explicit selectors are always 1.0.
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Explicit => 1.0,
            Category::SemanticPrecise => self.semantic_precise,
            Category::SemanticElement => self.semantic_element,
            Category::SemanticContext => self.semantic_context,
            Category::SemanticAlternative => self.semantic_alternative,
            Category::SemanticPartial => self.semantic_partial,
            Category::SemanticAttribute => self.semantic_attribute,
            Category::FallbackTab
            | Category::FallbackButton
            | Category::FallbackLink
            | Category::FallbackInput => self.fallback_kind,
            Category::FallbackText | Category::FallbackGeneric => self.fallback_text,
        }
    }
}
