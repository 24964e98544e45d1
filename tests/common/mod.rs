//! In-memory page and decision doubles for driving the executor and the
//! session loop without Chrome.

#![allow(dead_code)]

use async_trait::async_trait;
use eoka_navigator::{
    AbstractAction, ClickOptions, DecisionService, ElementHandle, Error, LoadState,
    NavigatorConfig, PageFactory, PageHandle, PageSnapshot, Result, TurnSummary,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Config with every pause and settle shortened for tests.
pub fn fast_config() -> NavigatorConfig {
    let mut config = NavigatorConfig::default();
    config.session.delay_min_secs = 0.0;
    config.session.delay_max_secs = 0.0;
    config.session.settle_timeout_ms = 100;
    config.executor.settle_ms = 0;
    config.executor.pause_before_click_ms = 0;
    config
}

pub fn action(kind: &str, target: &str, params: Value, confidence: f64) -> AbstractAction {
    AbstractAction::new(kind, target, params, confidence, "test step").unwrap()
}

/// How a registered element behaves.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
    /// URL the page moves to when clicked.
    pub navigates_to: Option<String>,
}

impl ElementSpec {
    pub fn visible(text: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            text: text.to_string(),
            navigates_to: None,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::visible("")
        }
    }

    pub fn navigating(text: &str, url: &str) -> Self {
        Self {
            navigates_to: Some(url.to_string()),
            ..Self::visible(text)
        }
    }
}

#[derive(Default)]
struct State {
    url: String,
    title: String,
    text: String,
    fail_goto: bool,
    url_failures: usize,
    ready_state: String,
    /// (substring of the expression, element) in lookup order.
    elements: Vec<(String, ElementSpec)>,
    locates: Vec<(String, u64)>,
    gotos: Vec<String>,
    evaluated: Vec<String>,
    clicks: Vec<String>,
    typed: Vec<String>,
    keys: Vec<String>,
}

/// Page double. An expression matches the first registered element whose key
/// it contains.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<State>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                url: url.to_string(),
                title: "Fake Page".into(),
                text: "Welcome to the fake page".into(),
                ready_state: "complete".into(),
                ..Default::default()
            })),
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        self.state.lock().unwrap().title = title.to_string();
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.state.lock().unwrap().text = text.to_string();
        self
    }

    pub fn with_element(self, key: &str, spec: ElementSpec) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .push((key.to_string(), spec));
        self
    }

    pub fn with_ready_state(self, state: &str) -> Self {
        self.state.lock().unwrap().ready_state = state.to_string();
        self
    }

    pub fn failing_goto(self) -> Self {
        self.state.lock().unwrap().fail_goto = true;
        self
    }

    /// The next `n` url reads fail.
    pub fn failing_url_reads(self, n: usize) -> Self {
        self.state.lock().unwrap().url_failures = n;
        self
    }

    pub fn current_url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn locates(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().locates.clone()
    }

    pub fn gotos(&self) -> Vec<String> {
        self.state.lock().unwrap().gotos.clone()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.state.lock().unwrap().evaluated.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.clone()
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, url: &str, _timeout_ms: u64) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.gotos.push(url.to_string());
        if s.fail_goto {
            return Err(Error::ActionFailed(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        s.url = url.to_string();
        Ok(())
    }

    async fn wait_until_settled(&self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn locate(
        &self,
        expression: &str,
        timeout_ms: u64,
    ) -> Result<Option<Box<dyn ElementHandle>>> {
        let mut s = self.state.lock().unwrap();
        s.locates.push((expression.to_string(), timeout_ms));
        let found = s
            .elements
            .iter()
            .find(|(key, _)| expression.contains(key.as_str()))
            .map(|(_, spec)| spec.clone());
        Ok(found.map(|spec| {
            Box::new(FakeElement {
                expression: expression.to_string(),
                spec,
                page: self.state.clone(),
            }) as Box<dyn ElementHandle>
        }))
    }

    async fn url(&self) -> Result<String> {
        let mut s = self.state.lock().unwrap();
        if s.url_failures > 0 {
            s.url_failures -= 1;
            return Err(Error::ActionFailed("target closed while reading url".into()));
        }
        Ok(s.url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn text_content(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().text.clone())
    }

    async fn content(&self) -> Result<String> {
        let s = self.state.lock().unwrap();
        Ok(format!("<html><body>{}</body></html>", s.text))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut s = self.state.lock().unwrap();
        s.evaluated.push(script.to_string());
        if script == "document.readyState" {
            return Ok(json!(s.ready_state));
        }
        Ok(Value::Null)
    }

    async fn capture_structural_snapshot(
        &self,
        _max_depth: usize,
        _max_children: usize,
    ) -> Result<Value> {
        let s = self.state.lock().unwrap();
        Ok(json!({ "role": "WebArea", "name": s.title }))
    }
}

pub struct FakeElement {
    expression: String,
    spec: ElementSpec,
    page: Arc<Mutex<State>>,
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn is_visible(&self) -> Result<bool> {
        Ok(self.spec.visible)
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.spec.enabled)
    }

    async fn scroll_into_view(&self) -> Result<()> {
        Ok(())
    }

    async fn click(&self, _options: ClickOptions) -> Result<()> {
        let mut s = self.page.lock().unwrap();
        s.clicks.push(self.expression.clone());
        if let Some(url) = &self.spec.navigates_to {
            s.url = url.clone();
        }
        Ok(())
    }

    async fn fill(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn type_text(&self, text: &str, _delay_ms: u64) -> Result<()> {
        self.page.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.page.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    async fn text_content(&self) -> Result<String> {
        Ok(self.spec.text.clone())
    }

    fn describe(&self) -> Value {
        json!({ "tag": "fake", "text": self.spec.text })
    }
}

/// Hands out queued actions, then an error action once the queue is empty.
#[derive(Default)]
pub struct ScriptedDecisions {
    queue: Mutex<VecDeque<AbstractAction>>,
    /// History length seen on each call.
    seen: Mutex<Vec<usize>>,
}

impl ScriptedDecisions {
    pub fn new(actions: Vec<AbstractAction>) -> Self {
        Self {
            queue: Mutex::new(actions.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn history_lengths(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionService for ScriptedDecisions {
    async fn decide(
        &self,
        _snapshot: &PageSnapshot,
        _goal: &str,
        history: &[TurnSummary],
    ) -> AbstractAction {
        self.seen.lock().unwrap().push(history.len());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| AbstractAction::error("no scripted action left"))
    }
}

/// Always proposes the same action.
pub struct RepeatDecision(pub AbstractAction);

#[async_trait]
impl DecisionService for RepeatDecision {
    async fn decide(
        &self,
        _snapshot: &PageSnapshot,
        _goal: &str,
        _history: &[TurnSummary],
    ) -> AbstractAction {
        self.0.clone()
    }
}

/// Page factory that opens a [`FakePage`] per context and counts them.
#[derive(Default)]
pub struct FakeFactory {
    pub created: AtomicUsize,
}

impl FakeFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFactory for FakeFactory {
    type Page = FakePage;

    async fn create(&self, _context_id: &str) -> Result<FakePage> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(FakePage::new("about:blank"))
    }
}
