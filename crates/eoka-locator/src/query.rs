//! Locator expressions - a CSS selector plus an optional text filter.
//!
//! ```text
//! nav a:text-is("Discussion")     exact (normalized, case-insensitive) label
//! *:has-text("Disc")              label contains
//! a[href*="discussion"]           plain CSS
//! ```

use std::fmt;

/// Text filter applied to the last compound selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// `:text-is("...")`
    Exact(String),
    /// `:has-text("...")`
    Contains(String),
}

impl TextMatch {
    /// Mode name handed to the in-page resolver.
    pub fn mode(&self) -> &'static str {
        match self {
            TextMatch::Exact(_) => "exact",
            TextMatch::Contains(_) => "contains",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            TextMatch::Exact(v) | TextMatch::Contains(v) => v,
        }
    }
}

/// A parsed locator expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub css: String,
    pub text: Option<TextMatch>,
}

const EXACT: &str = ":text-is(";
const CONTAINS: &str = ":has-text(";

impl Query {
    /// Plain CSS selector, no text filter.
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    pub fn text_is(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(TextMatch::Exact(text.into())),
        }
    }

    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(TextMatch::Contains(text.into())),
        }
    }

    /// Parse an expression. Anything without a trailing text pseudo-class is plain CSS.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        for marker in [EXACT, CONTAINS] {
            let Some(idx) = expr.rfind(marker) else {
                continue;
            };
            let Some(inner) = expr[idx + marker.len()..].strip_suffix(')') else {
                continue;
            };
            let Some(value) = unquote(inner) else {
                continue;
            };
            let css = match expr[..idx].trim() {
                "" => "*".to_string(),
                css => css.to_string(),
            };
            let text = if marker == EXACT {
                TextMatch::Exact(value)
            } else {
                TextMatch::Contains(value)
            };
            return Self {
                css,
                text: Some(text),
            };
        }
        Self::css(expr)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)?;
        match &self.text {
            Some(TextMatch::Exact(v)) => write!(f, "{}{})", EXACT, quote(v)),
            Some(TextMatch::Contains(v)) => write!(f, "{}{})", CONTAINS, quote(v)),
            None => Ok(()),
        }
    }
}

/// Double-quote a value for use in a CSS attribute selector or text filter.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unquote(s: &str) -> Option<String> {
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_css() {
        let q = Query::parse("a[href*=\"discussion\"]");
        assert_eq!(q.css, "a[href*=\"discussion\"]");
        assert!(q.text.is_none());
    }

    #[test]
    fn parse_exact_and_contains() {
        let q = Query::parse("nav a:text-is(\"Discussion\")");
        assert_eq!(q.css, "nav a");
        assert_eq!(q.text, Some(TextMatch::Exact("Discussion".into())));

        let q = Query::parse("*:has-text(\"Disc\")");
        assert_eq!(q.css, "*");
        assert_eq!(q.text, Some(TextMatch::Contains("Disc".into())));
    }

    #[test]
    fn bare_pseudo_class_targets_any_element() {
        let q = Query::parse(":has-text(\"Sign in\")");
        assert_eq!(q.css, "*");
        assert_eq!(q.text.as_ref().map(TextMatch::value), Some("Sign in"));
    }

    #[test]
    fn display_escapes_quotes() {
        let q = Query::has_text("button", "Say \"hi\"");
        let rendered = q.to_string();
        assert_eq!(rendered, r#"button:has-text("Say \"hi\"")"#);
        assert_eq!(Query::parse(&rendered), q);
    }

    #[test]
    fn malformed_filter_falls_back_to_css() {
        let q = Query::parse("button:has-text(Submit)");
        assert_eq!(q.css, "button:has-text(Submit)");
        assert!(q.text.is_none());
    }

    #[test]
    fn text_match_mode() {
        assert_eq!(TextMatch::Exact("x".into()).mode(), "exact");
        assert_eq!(TextMatch::Contains("x".into()).mode(), "contains");
    }
}
