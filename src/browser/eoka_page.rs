//! `PageHandle` over an eoka page.
//!
//! Locator expressions are resolved in the page by `RESOLVE_JS`. The winning
//! element is stamped with `data-eoka-ref` so later calls address it by a
//! unique selector.

use super::js_str;
use crate::page::{ClickOptions, ElementHandle, LoadState, PageHandle};
use crate::{with_timeout, Error, Result};
use async_trait::async_trait;
use eoka::{Browser, Page};
use eoka_locator::Query;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_MS: u64 = 100;
const DOM_SETTLE_MS: u64 = 300;
const OP_TIMEOUT_MS: u64 = 30_000;

const RESOLVE_JS: &str = r#"
((css, mode, value) => {
    const norm = s => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
    const label = el => norm(el.innerText || el.value || el.getAttribute('aria-label') || el.title || el.placeholder || '');

    let els;
    try {
        els = [...document.querySelectorAll(css)];
    } catch (e) {
        return JSON.stringify({ found: false, error: 'invalid selector: ' + e.message });
    }
    els = els.filter(el => el !== document.body && el !== document.documentElement);

    if (mode) {
        const want = norm(value);
        els = els.filter(el => mode === 'exact' ? label(el) === want : label(el).includes(want));
        els = els.filter(el => !els.some(o => o !== el && el.contains(o)));
    }
    if (!els.length) return JSON.stringify({ found: false });

    const shown = el => {
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    };
    const el = els.find(shown) || els[0];
    if (!el.hasAttribute('data-eoka-ref')) {
        window.__eokaRefSeq = (window.__eokaRefSeq || 0) + 1;
        el.setAttribute('data-eoka-ref', String(window.__eokaRefSeq));
    }
    return JSON.stringify({
        found: true,
        reference: el.getAttribute('data-eoka-ref'),
        tag: el.tagName.toLowerCase(),
        text: label(el).slice(0, 50),
        matches: els.length,
    });
})
"#;

const SNAPSHOT_JS: &str = r#"
((maxDepth, maxChildren) => {
    const IMPLICIT = {
        A: 'link', BUTTON: 'button', NAV: 'navigation', MAIN: 'main', HEADER: 'banner',
        FOOTER: 'contentinfo', ASIDE: 'complementary', FORM: 'form', DIALOG: 'dialog',
        H1: 'heading', H2: 'heading', H3: 'heading', H4: 'heading', H5: 'heading', H6: 'heading',
        TEXTAREA: 'textbox', SELECT: 'combobox', IMG: 'img', UL: 'list', OL: 'list',
        LI: 'listitem', TABLE: 'table', OPTION: 'option',
    };
    const INPUTS = { checkbox: 'checkbox', radio: 'radio', submit: 'button', button: 'button', search: 'searchbox' };
    const NAMED_BY_TEXT = ['link', 'button', 'heading', 'tab', 'menuitem', 'option', 'listitem'];
    const clip = s => String(s).replace(/\s+/g, ' ').trim().slice(0, 100);
    const hidden = el => {
        const s = getComputedStyle(el);
        return s.display === 'none' || s.visibility === 'hidden' || el.getAttribute('aria-hidden') === 'true';
    };
    const role = el => el.getAttribute('role')
        || (el.tagName === 'INPUT' ? (INPUTS[el.type] || 'textbox') : IMPLICIT[el.tagName]);
    const name = el => el.getAttribute('aria-label') || el.getAttribute('alt') || el.getAttribute('title')
        || el.getAttribute('placeholder') || (NAMED_BY_TEXT.includes(role(el)) ? el.innerText : '') || '';

    function interesting(el, out) {
        for (const c of el.children) {
            if (out.length >= maxChildren) break;
            if (hidden(c)) continue;
            if (role(c)) out.push(c); else interesting(c, out);
        }
        return out;
    }

    function node(el, depth) {
        if (depth >= maxDepth) return { truncated: true };
        const n = {};
        const r = role(el);
        if (r) n.role = r;
        const nm = name(el);
        if (nm) n.name = clip(nm);
        if (['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName) && el.type !== 'password' && el.value) {
            n.value = clip(el.value);
        }
        const kids = interesting(el, []).map(c => node(c, depth + 1));
        if (kids.length) n.children = kids;
        return n;
    }

    const root = node(document.body, 0);
    root.role = 'WebArea';
    root.name = clip(document.title);
    return JSON.stringify(root);
})
"#;

#[derive(Debug, Deserialize)]
struct Resolved {
    found: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    matches: usize,
}

/// An eoka page. Cheap to clone; clones address the same tab.
#[derive(Clone)]
pub struct EokaPage {
    page: Arc<Page>,
    browser: Option<Arc<Browser>>,
}

impl EokaPage {
    /// Wrap a page. The tab is closed through `browser` when the page is released.
    pub fn new(page: Page, browser: Option<Arc<Browser>>) -> Self {
        Self {
            page: Arc::new(page),
            browser,
        }
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn resolve_once(&self, query: &Query) -> Result<Resolved> {
        let (mode, value) = match &query.text {
            Some(t) => (t.mode(), t.value()),
            None => ("", ""),
        };
        let js = format!(
            "{}({},{},{})",
            RESOLVE_JS,
            js_str(&query.css),
            js_str(mode),
            js_str(value)
        );
        let raw: String = self.page.evaluate(&js).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn ready_state(&self) -> Result<String> {
        Ok(self.page.evaluate("document.readyState").await?)
    }
}

#[async_trait]
impl PageHandle for EokaPage {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<()> {
        debug!("goto: {}", url);
        with_timeout(timeout_ms, "goto", async {
            self.page.goto(url).await?;
            Ok(())
        })
        .await
    }

    async fn wait_until_settled(&self, timeout_ms: u64) -> Result<()> {
        let idle = self.page.wait_for_network_idle(500, timeout_ms).await;
        self.page.wait(DOM_SETTLE_MS).await;
        idle.map_err(Error::from)
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> Result<()> {
        if state == LoadState::NetworkIdle {
            self.page.wait_for_network_idle(500, timeout_ms).await?;
            return Ok(());
        }
        let wanted: &[&str] = match state {
            LoadState::DomContentLoaded => &["interactive", "complete"],
            _ => &["complete"],
        };
        with_timeout(timeout_ms, state.as_str(), async {
            loop {
                let rs = self.ready_state().await?;
                if wanted.contains(&rs.as_str()) {
                    return Ok(());
                }
                self.page.wait(POLL_MS).await;
            }
        })
        .await
    }

    async fn locate(
        &self,
        expression: &str,
        timeout_ms: u64,
    ) -> Result<Option<Box<dyn ElementHandle>>> {
        let query = Query::parse(expression);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let r = with_timeout(timeout_ms.max(POLL_MS), "locate", self.resolve_once(&query)).await?;
            if let Some(err) = r.error {
                return Err(Error::ActionFailed(err));
            }
            if r.found {
                debug!(
                    "located {} -> <{}> ref={} ({} matches)",
                    expression, r.tag, r.reference, r.matches
                );
                return Ok(Some(Box::new(EokaElement {
                    page: self.page.clone(),
                    selector: format!("[data-eoka-ref={}]", js_str(&r.reference)),
                    tag: r.tag,
                    text: r.text,
                })));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.page.wait(POLL_MS).await;
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.title().await?)
    }

    async fn text_content(&self) -> Result<String> {
        Ok(self.page.text().await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await?)
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let js = format!("JSON.stringify(({}) ?? null)", script);
        let raw: String = self.page.evaluate(&js).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn capture_structural_snapshot(
        &self,
        max_depth: usize,
        max_children: usize,
    ) -> Result<Value> {
        let js = format!("{}({},{})", SNAPSHOT_JS, max_depth, max_children);
        let raw: String = self.page.evaluate(&js).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn close(&self) -> Result<()> {
        if let Some(browser) = &self.browser {
            browser.close_tab(self.page.target_id()).await?;
        }
        Ok(())
    }
}

/// Element addressed by its `data-eoka-ref` stamp.
struct EokaElement {
    page: Arc<Page>,
    selector: String,
    tag: String,
    text: String,
}

impl EokaElement {
    /// Evaluate `body` with `el` bound to the element; `null` if it is gone.
    async fn eval_on<T: serde::de::DeserializeOwned>(&self, body: &str) -> Result<T> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; {} }})()",
            js_str(&self.selector),
            body
        );
        let v: Option<T> = self.page.evaluate(&js).await?;
        v.ok_or_else(|| self.gone())
    }

    fn gone(&self) -> Error {
        Error::Browser(eoka::Error::ElementNotFound(format!(
            "<{}> {} is no longer attached",
            self.tag, self.selector
        )))
    }

    async fn focus(&self) -> Result<()> {
        let _: bool = self.eval_on("el.focus(); return true;").await?;
        Ok(())
    }
}

#[async_trait]
impl ElementHandle for EokaElement {
    async fn is_visible(&self) -> Result<bool> {
        self.eval_on(
            r#"const r = el.getBoundingClientRect();
               const s = getComputedStyle(el);
               return r.width > 0 && r.height > 0 && s.visibility !== 'hidden'
                   && s.display !== 'none' && parseFloat(s.opacity) > 0;"#,
        )
        .await
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.eval_on(
            r#"return !el.disabled && !el.closest('fieldset[disabled]')
                   && el.getAttribute('aria-disabled') !== 'true';"#,
        )
        .await
    }

    async fn scroll_into_view(&self) -> Result<()> {
        let _: bool = self
            .eval_on("el.scrollIntoView({block: 'center', inline: 'center'}); return true;")
            .await?;
        Ok(())
    }

    async fn click(&self, options: ClickOptions) -> Result<()> {
        with_timeout(OP_TIMEOUT_MS, "click", async {
            if options.force {
                let _: bool = self.eval_on("el.click(); return true;").await?;
            } else if options.human {
                self.page.human_click(&self.selector).await?;
            } else {
                self.page.click(&self.selector).await?;
            }
            Ok(())
        })
        .await
    }

    async fn fill(&self, text: &str) -> Result<()> {
        with_timeout(OP_TIMEOUT_MS, "fill", async {
            self.page.fill(&self.selector, text).await?;
            Ok(())
        })
        .await
    }

    async fn type_text(&self, text: &str, delay_ms: u64) -> Result<()> {
        self.focus().await?;
        if delay_ms == 0 {
            self.page.type_text(text).await?;
            return Ok(());
        }
        let mut buf = [0u8; 4];
        for c in text.chars() {
            self.page.type_text(c.encode_utf8(&mut buf)).await?;
            self.page.wait(delay_ms).await;
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.focus().await?;
        self.page.human().press_key(key).await?;
        Ok(())
    }

    async fn text_content(&self) -> Result<String> {
        self.eval_on("return (el.textContent || '').trim();").await
    }

    fn describe(&self) -> Value {
        json!({ "tag": self.tag, "text": self.text })
    }
}
