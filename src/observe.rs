//! Page observation: the snapshot handed to the decision service, and the
//! content extraction that ends a session.

use crate::action::ExtractParams;
use crate::config::SessionConfig;
use crate::page::PageHandle;
use crate::{truncate, with_timeout, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

const OBSERVE_TIMEOUT_MS: u64 = 10_000;
const NODE_VALUE_CHARS: usize = 100;
const FINAL_PREVIEW_CHARS: usize = 1000;
const TREE_KEYS: &[&str] = &[
    "role",
    "name",
    "value",
    "description",
    "keyshortcuts",
    "roledescription",
];

const METRICS_JS: &str = r#"(() => ({
    clickable_elements: document.querySelectorAll('a, button, [role="button"], [role="tab"]').length,
    form_elements: document.querySelectorAll('input, textarea, select').length,
    navigation_elements: document.querySelectorAll('nav, [role="navigation"]').length,
    has_tabs: document.querySelectorAll('[role="tab"]').length > 0,
    viewport_height: window.innerHeight,
    scroll_position: window.pageYOffset,
    total_height: document.body ? document.body.scrollHeight : 0,
}))()"#;

const LINKS_JS: &str = r#"Array.from(document.querySelectorAll('a[href]'))
    .map(a => ({ text: a.textContent.trim(), href: a.href }))
    .filter(l => l.text && l.href)"#;

const STRUCTURED_JS: &str = r#"(() => {
    const text = el => el.textContent.trim();
    const data = { lists: [], tables: [], headings: [], navigation_elements: [] };
    document.querySelectorAll('ul, ol').forEach(list => {
        const items = Array.from(list.querySelectorAll('li')).map(text);
        if (items.length) data.lists.push(items);
    });
    document.querySelectorAll('table').forEach(table => {
        const rows = Array.from(table.querySelectorAll('tr'))
            .map(row => Array.from(row.querySelectorAll('td, th')).map(text));
        if (rows.length) data.tables.push(rows);
    });
    document.querySelectorAll('h1, h2, h3, h4, h5, h6').forEach(h => {
        data.headings.push({ level: h.tagName, text: text(h) });
    });
    document.querySelectorAll('nav a, [role="navigation"] a').forEach(a => {
        data.navigation_elements.push({ text: text(a), href: a.href });
    });
    return data;
})()"#;

/// Interactivity counts and scroll geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetrics {
    pub clickable_elements: u64,
    pub form_elements: u64,
    pub navigation_elements: u64,
    pub has_tabs: bool,
    pub viewport_height: f64,
    pub scroll_position: f64,
    pub total_height: f64,
}

/// What the decision service sees of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    /// Bounded structural tree.
    pub tree: Value,
    pub content_summary: String,
    pub metrics: PageMetrics,
}

impl PageSnapshot {
    /// Capture a snapshot. Parts that fail are left empty.
    pub async fn capture(page: &dyn PageHandle, config: &SessionConfig) -> Self {
        let depth = config.snapshot_depth;
        let children = config.snapshot_children;

        let tree = match bounded(page.capture_structural_snapshot(depth, children)).await {
            Ok(raw) => simplify_tree(&raw, depth, children),
            Err(e) => {
                debug!("structural snapshot failed: {}", e);
                json!({})
            }
        };
        let url = bounded(page.url()).await.unwrap_or_default();
        let title = bounded(page.title()).await.unwrap_or_default();
        let content_summary = match bounded(page.text_content()).await {
            Ok(text) => summarize(&text, config.summary_chars),
            Err(e) => {
                debug!("content summary failed: {}", e);
                "Could not extract page content".to_string()
            }
        };
        let metrics = match bounded(page.evaluate(METRICS_JS)).await {
            Ok(v) => serde_json::from_value(v).unwrap_or_default(),
            Err(e) => {
                debug!("page metrics failed: {}", e);
                PageMetrics::default()
            }
        };

        debug!("snapshot: {} ({:?})", title, metrics);
        Self {
            url,
            title,
            tree,
            content_summary,
            metrics,
        }
    }
}

/// Cut a structural tree to `max_depth` levels and `max_children` per node.
///
/// Nodes at the depth limit become `{"truncated": true}`; property values are
/// stringified and cut to 100 chars; empty nodes are dropped.
pub fn simplify_tree(tree: &Value, max_depth: usize, max_children: usize) -> Value {
    simplify_node(tree, max_depth, max_children, 0).unwrap_or_else(|| json!({}))
}

fn simplify_node(node: &Value, max_depth: usize, max_children: usize, depth: usize) -> Option<Value> {
    if depth >= max_depth {
        return Some(json!({ "truncated": true }));
    }
    let obj = node.as_object()?;
    let mut out = Map::new();
    for key in TREE_KEYS {
        let text = match obj.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        out.insert(key.to_string(), Value::String(truncate(&text, NODE_VALUE_CHARS).to_string()));
    }
    if let Some(kids) = obj.get("children").and_then(Value::as_array) {
        if !kids.is_empty() {
            let kids: Vec<Value> = kids
                .iter()
                .take(max_children)
                .filter_map(|c| simplify_node(c, max_depth, max_children, depth + 1))
                .collect();
            out.insert("children".into(), Value::Array(kids));
        }
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

fn summarize(text: &str, max: usize) -> String {
    let cut = truncate(text, max);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

async fn bounded<T, F>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    with_timeout(OBSERVE_TIMEOUT_MS, "observe", fut).await
}

/// Content requested by an Extract decision. Failure yields `extraction_error`.
pub async fn extract_content(page: &dyn PageHandle, params: &ExtractParams) -> Map<String, Value> {
    match try_extract(page, params).await {
        Ok(extracted) => {
            info!("extraction completed: {} content items", extracted.len());
            extracted
        }
        Err(e) => {
            error!("content extraction failed: {}", e);
            let mut m = Map::new();
            m.insert("extraction_error".into(), Value::String(e.to_string()));
            m
        }
    }
}

async fn try_extract(page: &dyn PageHandle, params: &ExtractParams) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    if params.extract_title {
        out.insert("title".into(), Value::String(bounded(page.title()).await?));
    }
    if params.extract_text {
        out.insert("text_content".into(), Value::String(bounded(page.text_content()).await?));
    }
    if params.extract_links {
        out.insert("links".into(), bounded(page.evaluate(LINKS_JS)).await?);
    }
    for (name, selector) in &params.selectors {
        match page.locate(selector, 0).await {
            Ok(Some(el)) => match bounded(el.text_content()).await {
                Ok(text) => {
                    out.insert(name.clone(), Value::String(text));
                }
                Err(e) => debug!("could not extract {} with {}: {}", name, selector, e),
            },
            Ok(None) => debug!("no element for {}: {}", name, selector),
            Err(e) => debug!("could not extract {} with {}: {}", name, selector, e),
        }
    }
    out.insert(
        "extraction_metadata".into(),
        json!({
            "url": bounded(page.url()).await?,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "extraction_method": "llm_guided",
        }),
    );
    Ok(out)
}

/// Best-effort summary of the page a session ended on.
/// Failure yields `final_extraction_error`.
pub async fn final_content(page: &dyn PageHandle) -> Map<String, Value> {
    match try_final(page).await {
        Ok(m) => m,
        Err(e) => {
            error!("final content extraction failed: {}", e);
            let mut m = Map::new();
            m.insert("final_extraction_error".into(), Value::String(e.to_string()));
            m
        }
    }
}

async fn try_final(page: &dyn PageHandle) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    out.insert("final_title".into(), Value::String(bounded(page.title()).await?));
    out.insert("final_url".into(), Value::String(bounded(page.url()).await?));
    let text = bounded(page.text_content()).await?;
    out.insert(
        "final_text_preview".into(),
        Value::String(truncate(&text, FINAL_PREVIEW_CHARS).to_string()),
    );

    match bounded(page.evaluate(STRUCTURED_JS)).await {
        Ok(data) => {
            let count = |k: &str| data.get(k).and_then(Value::as_array).map_or(0, Vec::len);
            info!(
                "final extraction: {} lists, {} tables, {} headings",
                count("lists"),
                count("tables"),
                count("headings")
            );
            out.insert("structured_data".into(), data);
        }
        Err(e) => debug!("structured data scan failed: {}", e),
    }
    Ok(out)
}
