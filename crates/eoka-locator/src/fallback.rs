//! Rule-based generation from the raw description.

use crate::query::{quote, Query};
use crate::{Category, LocatorCandidate, LocatorWeights};
use regex::Regex;
use std::sync::LazyLock;

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”|'([^']{2,})'"#).unwrap());

static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z0-9][\w&'.-]*(?:\s+[A-Z0-9][\w&'.-]*)*").unwrap()
});

/// Leading words dropped from a capitalized run.
const FILLER: &[&str] = &[
    "The", "A", "An", "Click", "Press", "Select", "Open", "Go", "Tap", "Choose", "Type", "Enter",
];

const KEYWORD_KINDS: &[(&str, &str, Category)] = &[
    ("tab", "[role=\"tab\"]", Category::FallbackTab),
    ("button", "button", Category::FallbackButton),
    ("link", "a", Category::FallbackLink),
];

const GENERIC_INPUTS: &[&str] = &[
    "input[type=\"text\"]",
    "input[type=\"search\"]",
    "input:not([type])",
    "textarea",
    "[contenteditable=\"true\"]",
];

/// Literal texts worth matching: quoted strings, then capitalized runs.
/// Falls back to the whole trimmed description.
pub fn literal_texts(description: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for caps in QUOTED.captures_iter(description) {
        if let Some(m) = caps.iter().skip(1).flatten().next() {
            push_unique(&mut out, m.as_str());
        }
    }
    let unquoted = QUOTED.replace_all(description, " ");
    for m in CAPITALIZED_RUN.find_iter(&unquoted) {
        let words: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| FILLER.contains(w))
            .collect();
        push_unique(&mut out, &words.join(" "));
    }

    if out.is_empty() {
        push_unique(&mut out, description);
    }
    out
}

fn push_unique(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() && !out.iter().any(|o| o == s) {
        out.push(s.to_string());
    }
}

/// Kind locators triggered by "tab", "button" and "link" in the description.
pub(crate) fn keyword_kinds(description: &str, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    let lower = description.to_lowercase();
    let texts = literal_texts(description);
    let mut out = Vec::new();
    for (keyword, css, category) in KEYWORD_KINDS {
        if !lower.contains(keyword) {
            continue;
        }
        for text in &texts {
            out.push(LocatorCandidate::new(
                Query::has_text(*css, text.as_str()),
                *category,
                w,
                format!("{:?} mentioned, text {:?}", keyword, text),
            ));
        }
    }
    out
}

/// Any element containing the text.
pub(crate) fn any_text(description: &str, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    literal_texts(description)
        .into_iter()
        .flat_map(|text| {
            [
                LocatorCandidate::new(
                    Query::has_text("*", text.as_str()),
                    Category::FallbackText,
                    w,
                    format!("any element containing {:?}", text),
                ),
                LocatorCandidate::new(
                    Query::css(format!("[aria-label*={} i]", quote(&text))),
                    Category::FallbackText,
                    w,
                    format!("aria-label containing {:?}", text),
                ),
                LocatorCandidate::new(
                    Query::css(format!("[title*={} i]", quote(&text))),
                    Category::FallbackText,
                    w,
                    format!("title containing {:?}", text),
                ),
                LocatorCandidate::new(
                    Query::css(format!("[alt*={} i]", quote(&text))),
                    Category::FallbackText,
                    w,
                    format!("alt text containing {:?}", text),
                ),
            ]
        })
        .collect()
}

pub(crate) fn input_attributes(description: &str, w: &LocatorWeights) -> Vec<LocatorCandidate> {
    literal_texts(description)
        .into_iter()
        .flat_map(|text| {
            let q = quote(&text);
            let name = quote(&text.to_lowercase().replace(char::is_whitespace, "_"));
            [
                LocatorCandidate::new(
                    Query::css(format!("input[placeholder*={} i]", q)),
                    Category::FallbackInput,
                    w,
                    "placeholder mentions the description",
                ),
                LocatorCandidate::new(
                    Query::css(format!("textarea[placeholder*={} i]", q)),
                    Category::FallbackInput,
                    w,
                    "textarea placeholder mentions the description",
                ),
                LocatorCandidate::new(
                    Query::css(format!("input[aria-label*={} i]", q)),
                    Category::FallbackInput,
                    w,
                    "aria-label mentions the description",
                ),
                LocatorCandidate::new(
                    Query::css(format!("input[name*={} i]", name)),
                    Category::FallbackInput,
                    w,
                    "name mentions the description",
                ),
            ]
        })
        .collect()
}

pub(crate) fn generic_inputs(w: &LocatorWeights) -> Vec<LocatorCandidate> {
    GENERIC_INPUTS
        .iter()
        .map(|css| {
            LocatorCandidate::new(
                Query::css(*css),
                Category::FallbackGeneric,
                w,
                "first editable field",
            )
        })
        .collect()
}
