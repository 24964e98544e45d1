//! Stages driven by a structural decomposition.

use crate::query::{quote, Query};
use crate::tables;
use crate::{Category, Decomposition, LocatorCandidate, LocatorWeights};

/// Region x kind x exact text, capped to `precise_cap` of each.
pub(crate) fn precise(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let (Some(text), Some(regions)) = (d.text(), d.known_region()) else {
        return Vec::new();
    };
    let kinds = d.kind_locators();
    let mut out = Vec::new();
    for region in regions.iter().take(w.precise_cap) {
        for kind in kinds.iter().take(w.precise_cap) {
            out.push(LocatorCandidate::new(
                Query::text_is(format!("{} {}", region, kind), text),
                Category::SemanticPrecise,
                w,
                format!("{} inside {}", kind, region),
            ));
        }
    }
    out
}

pub(crate) fn element(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let Some(text) = d.text() else {
        return Vec::new();
    };
    d.kind_locators()
        .iter()
        .map(|kind| {
            LocatorCandidate::new(
                Query::text_is(*kind, text),
                Category::SemanticElement,
                w,
                format!("{} labelled exactly", kind),
            )
        })
        .collect()
}

/// Any element inside the region.
pub(crate) fn context(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let (Some(text), Some(regions)) = (d.text(), d.known_region()) else {
        return Vec::new();
    };
    regions
        .iter()
        .map(|region| {
            LocatorCandidate::new(
                Query::text_is(format!("{} *", region), text),
                Category::SemanticContext,
                w,
                format!("any element inside {}", region),
            )
        })
        .collect()
}

pub(crate) fn alternative(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let kinds = d.kind_locators();
    let mut out = Vec::new();
    for alt in d.alternative_texts.iter().map(|a| a.trim()) {
        if alt.is_empty() {
            continue;
        }
        for kind in kinds.iter().take(2) {
            out.push(LocatorCandidate::new(
                Query::text_is(*kind, alt),
                Category::SemanticAlternative,
                w,
                format!("alternative text {:?}", alt),
            ));
        }
    }
    out
}

/// Half-length prefix of the target text.
pub(crate) fn partial(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let Some(text) = d.text() else {
        return Vec::new();
    };
    let len = text.chars().count();
    if len <= 3 {
        return Vec::new();
    }
    let prefix: String = text.chars().take(len / 2).collect();
    let kind = d.kind_locators()[0];
    vec![LocatorCandidate::new(
        Query::has_text(kind, prefix.trim_end()),
        Category::SemanticPartial,
        w,
        "prefix of the target text",
    )]
}

/// href substring for links.
pub(crate) fn attribute(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let Some(text) = d.text() else {
        return Vec::new();
    };
    if d.kind_locators() != tables::kind_locators("link") {
        return Vec::new();
    }
    let slug = href_slug(text);
    if slug.is_empty() {
        return Vec::new();
    }
    vec![LocatorCandidate::new(
        Query::css(format!("a[href*={}]", quote(&slug))),
        Category::SemanticAttribute,
        w,
        "href contains the target text",
    )]
}

/// Placeholder, aria-label and name matches on text-accepting elements.
pub(crate) fn input_attributes(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let Some(text) = d.text() else {
        return Vec::new();
    };
    let q = quote(text);
    let slug = href_slug(text);
    let mut out = vec![
        LocatorCandidate::new(
            Query::css(format!("input[placeholder={} i]", q)),
            Category::SemanticPrecise,
            w,
            "placeholder equals the target text",
        ),
        LocatorCandidate::new(
            Query::css(format!("textarea[placeholder={} i]", q)),
            Category::SemanticPrecise,
            w,
            "textarea placeholder equals the target text",
        ),
        LocatorCandidate::new(
            Query::css(format!("input[aria-label={} i]", q)),
            Category::SemanticElement,
            w,
            "aria-label equals the target text",
        ),
        LocatorCandidate::new(
            Query::css(format!("input[placeholder*={} i]", q)),
            Category::SemanticElement,
            w,
            "placeholder contains the target text",
        ),
    ];
    if !slug.is_empty() {
        out.push(LocatorCandidate::new(
            Query::css(format!("input[name*={} i]", quote(&slug))),
            Category::SemanticAttribute,
            w,
            "name attribute contains the target text",
        ));
    }
    out
}

/// Inputs scoped to a known region.
pub(crate) fn input_context(d: &Decomposition, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let Some(regions) = d.known_region() else {
        return Vec::new();
    };
    regions
        .iter()
        .take(w.precise_cap)
        .flat_map(|region| {
            ["input:not([type=\"hidden\"])", "textarea"].map(|kind| {
                LocatorCandidate::new(
                    Query::css(format!("{} {}", region, kind)),
                    Category::SemanticContext,
                    w,
                    format!("text field inside {}", region),
                )
            })
        })
        .collect()
}

fn href_slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
