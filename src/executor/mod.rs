//! Action resolution and execution.
//!
//! Click and type actions are resolved through ranked locator candidates and
//! tried in confidence order with shrinking timeouts. Per-candidate failures
//! are logged at debug level; only exhaustion is reported.

mod outcome;

pub use outcome::{ExecutionOutcome, FailureKind, TimeoutSchedule};

use crate::action::{
    AbstractAction, ActionSpec, ClickParams, ExtractParams, NavigateParams, ScrollParams,
    TypeParams, WaitParams,
};
use crate::config::ExecutorConfig;
use crate::decision::DescriptionParser;
use crate::page::{ClickOptions, ElementHandle, LoadState, PageHandle};
use crate::{with_timeout, Result};
use eoka_locator::{CandidateSet, Decomposition, LocatorCandidate, LocatorGenerator, LocatorWeights};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Visible elements matching any of these mark an error page.
const ERROR_INDICATORS: &[&str] = &[
    r#"[class*="error"]"#,
    r#"[class*="404"]"#,
    r#"[class*="not-found"]"#,
    r#"*:text-is("Access Denied")"#,
    r#"*:text-is("Page Not Found")"#,
];

/// What to do with an element once a candidate resolves.
enum Interaction<'a> {
    Click {
        options: ClickOptions,
        wait_after_ms: u64,
    },
    Type {
        params: &'a TypeParams,
        text: &'a str,
    },
}

impl Interaction<'_> {
    fn verb(&self) -> &'static str {
        match self {
            Interaction::Click { .. } => "click",
            Interaction::Type { .. } => "type",
        }
    }
}

/// A candidate that worked.
struct Hit<'a> {
    attempt: usize,
    candidate: &'a LocatorCandidate,
    element: Value,
}

/// Turns abstract actions into page interactions.
pub struct ActionExecutor {
    config: ExecutorConfig,
    schedule: TimeoutSchedule,
    generator: LocatorGenerator,
    parser: Option<Arc<dyn DescriptionParser>>,
}

impl ActionExecutor {
    pub fn new(config: &ExecutorConfig, weights: &LocatorWeights) -> Self {
        Self {
            config: config.clone(),
            schedule: TimeoutSchedule::from_config(config),
            generator: LocatorGenerator::new(weights.clone()),
            parser: None,
        }
    }

    /// Use `parser` to decompose target descriptions before generating locators.
    pub fn with_parser(mut self, parser: Arc<dyn DescriptionParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn schedule(&self) -> TimeoutSchedule {
        self.schedule
    }

    pub fn generator(&self) -> &LocatorGenerator {
        &self.generator
    }

    /// Execute one action. Never fails; every problem becomes an unsuccessful outcome.
    pub async fn execute(&self, page: &dyn PageHandle, action: &AbstractAction) -> ExecutionOutcome {
        info!("executing {}: {}", action.kind(), action.target_description);

        if action.confidence < self.config.min_confidence {
            warn!(
                "low confidence action ({:.2}): {}",
                action.confidence, action.rationale
            );
            return ExecutionOutcome::failure(
                FailureKind::LowConfidence,
                format!("Action confidence too low: {:.2}", action.confidence),
            );
        }

        match self.dispatch(page, action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("action execution failed: {}", e);
                ExecutionOutcome::failure(FailureKind::from_error(&e), format!("Execution error: {}", e))
            }
        }
    }

    async fn dispatch(&self, page: &dyn PageHandle, action: &AbstractAction) -> Result<ExecutionOutcome> {
        Ok(match &action.spec {
            ActionSpec::Click(p) => self.click(page, action, p).await,
            ActionSpec::Type(p) => self.type_into(page, action, p).await,
            ActionSpec::Scroll(p) => self.scroll(page, p).await,
            ActionSpec::Wait(p) => self.wait(page, p).await,
            ActionSpec::Navigate(p) => self.navigate(page, p).await,
            ActionSpec::Extract(p) => self.extract(page, p).await?,
            ActionSpec::Invalid { kind, reason } => ExecutionOutcome::failure(
                FailureKind::InvalidParameters,
                format!("Invalid {} parameters: {}", kind, reason),
            ),
            ActionSpec::Error | ActionSpec::Unsupported(_) => ExecutionOutcome::failure(
                FailureKind::Unsupported,
                format!("Unsupported action type: {}", action.kind()),
            ),
        })
    }

    /// Structural decomposition, or `None` to rely on rule-based locators.
    async fn decompose(&self, description: &str) -> Option<Decomposition> {
        let parser = self.parser.as_ref()?;
        match with_timeout(
            self.config.action_timeout_ms,
            "description parse",
            parser.parse(description),
        )
        .await
        {
            Ok(d) => Some(d),
            Err(e) => {
                debug!("description parse failed, using rule-based locators: {}", e);
                None
            }
        }
    }

    async fn click(&self, page: &dyn PageHandle, action: &AbstractAction, p: &ClickParams) -> ExecutionOutcome {
        let decomposition = self.decompose(&action.target_description).await;
        let candidates = self.generator.generate(
            &action.target_description,
            p.selector.as_deref(),
            decomposition.as_ref(),
        );
        let interaction = Interaction::Click {
            options: ClickOptions {
                force: p.force,
                human: p.human,
            },
            wait_after_ms: p.wait_after.unwrap_or(self.config.settle_ms),
        };

        match self.attempt_candidates(page, &candidates, &interaction).await {
            Some(hit) => {
                info!("clicked: {} via {}", action.target_description, hit.candidate.expression);
                ExecutionOutcome::success("Click executed successfully", hit_payload(&hit))
            }
            None => self.exhausted(
                format!("Could not find clickable element: {}", action.target_description),
                &candidates,
            ),
        }
    }

    async fn type_into(&self, page: &dyn PageHandle, action: &AbstractAction, p: &TypeParams) -> ExecutionOutcome {
        let text = match p.text.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => {
                return ExecutionOutcome::failure(
                    FailureKind::InvalidParameters,
                    "No text specified for typing action",
                )
            }
        };
        let decomposition = self.decompose(&action.target_description).await;
        let candidates = self.generator.generate_input(
            &action.target_description,
            p.selector.as_deref(),
            decomposition.as_ref(),
        );
        let interaction = Interaction::Type { params: p, text };

        match self.attempt_candidates(page, &candidates, &interaction).await {
            Some(hit) => {
                info!("typed into: {}", action.target_description);
                let mut payload = hit_payload(&hit);
                payload["text"] = json!(text);
                ExecutionOutcome::success("Text input successful", payload)
            }
            None => self.exhausted(
                format!("Could not find input element: {}", action.target_description),
                &candidates,
            ),
        }
    }

    /// Try candidates in order until one locates an interactive element and
    /// the interaction succeeds.
    async fn attempt_candidates<'c>(
        &self,
        page: &dyn PageHandle,
        candidates: &'c CandidateSet,
        interaction: &Interaction<'_>,
    ) -> Option<Hit<'c>> {
        let total = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            let timeout_ms = self.schedule.for_attempt(i);
            debug!(
                "{} candidate {}/{} ({}, {:.2}, {}ms): {}",
                interaction.verb(),
                i + 1,
                total,
                candidate.category,
                candidate.confidence,
                timeout_ms,
                candidate.expression
            );

            let element = match page.locate(&candidate.expression, timeout_ms).await {
                Ok(Some(el)) => el,
                Ok(None) => {
                    debug!("no match within {}ms", timeout_ms);
                    continue;
                }
                Err(e) => {
                    debug!("locate failed: {}", e);
                    continue;
                }
            };

            match self.interact(element.as_ref(), interaction).await {
                Ok(true) => {
                    return Some(Hit {
                        attempt: i + 1,
                        candidate,
                        element: element.describe(),
                    })
                }
                Ok(false) => continue,
                Err(e) => {
                    debug!("{} via {} failed: {}", interaction.verb(), candidate.expression, e);
                    continue;
                }
            }
        }
        None
    }

    /// `Ok(false)` when the element is not visible or not enabled.
    async fn interact(&self, el: &dyn ElementHandle, interaction: &Interaction<'_>) -> Result<bool> {
        let visible = el.is_visible().await?;
        let enabled = el.is_enabled().await?;
        if !visible || !enabled {
            debug!("element not interactive: visible={}, enabled={}", visible, enabled);
            return Ok(false);
        }

        let limit = self.config.action_timeout_ms;
        match interaction {
            Interaction::Click {
                options,
                wait_after_ms,
            } => {
                with_timeout(limit, "scroll into view", el.scroll_into_view()).await?;
                pause(self.config.pause_before_click_ms).await;
                with_timeout(limit, "click", el.click(*options)).await?;
                pause(*wait_after_ms).await;
            }
            Interaction::Type { params, text } => {
                if params.clear {
                    with_timeout(limit, "clear", el.fill("")).await?;
                }
                let typing_budget = limit.saturating_add(params.delay.saturating_mul(text.chars().count() as u64));
                with_timeout(typing_budget, "type", el.type_text(text, params.delay)).await?;
                if params.press_enter {
                    with_timeout(limit, "press Enter", el.press_key("Enter")).await?;
                }
            }
        }
        Ok(true)
    }

    fn exhausted(&self, message: String, candidates: &CandidateSet) -> ExecutionOutcome {
        warn!("{} ({} strategies tried)", message, candidates.len());
        let tried: Vec<Value> = candidates
            .top(self.config.max_reported_candidates)
            .iter()
            .map(|c| {
                json!({
                    "category": c.category,
                    "selector": c.expression,
                    "confidence": c.confidence,
                })
            })
            .collect();
        ExecutionOutcome::failure(FailureKind::StrategyExhausted, message).with_payload(json!({
            "strategies_tried": candidates.len(),
            "strategies": tried,
        }))
    }

    async fn scroll(&self, page: &dyn PageHandle, p: &ScrollParams) -> ExecutionOutcome {
        let script = match p.direction.trim().to_lowercase().as_str() {
            "down" => format!("window.scrollBy(0, {})", p.amount.saturating_abs()),
            "up" => format!("window.scrollBy(0, {})", -p.amount.saturating_abs()),
            "to_bottom" | "to-bottom" | "bottom" => {
                "window.scrollTo(0, document.body.scrollHeight)".to_string()
            }
            "to_top" | "to-top" | "top" => "window.scrollTo(0, 0)".to_string(),
            _ => {
                return ExecutionOutcome::failure(
                    FailureKind::InvalidParameters,
                    format!("Invalid scroll direction: {}", p.direction),
                )
            }
        };

        let limit = self.config.action_timeout_ms;
        if let Err(e) = with_timeout(limit, "scroll", page.evaluate(&script)).await {
            return ExecutionOutcome::failure(FailureKind::from_error(&e), format!("Scroll failed: {}", e));
        }
        pause(p.wait_after.unwrap_or(self.config.settle_ms)).await;

        info!("scrolled {}: {}px", p.direction, p.amount);
        ExecutionOutcome::success(
            "Scroll executed successfully",
            json!({ "direction": p.direction, "amount": p.amount }),
        )
    }

    async fn wait(&self, page: &dyn PageHandle, p: &WaitParams) -> ExecutionOutcome {
        let mode = p.mode.trim().to_lowercase();
        match mode.as_str() {
            "timeout" => {
                pause(p.duration).await;
                ExecutionOutcome::success(
                    format!("Waited for {}ms", p.duration),
                    json!({ "duration": p.duration }),
                )
            }
            "element" => {
                let Some(selector) = p.selector.as_deref().filter(|s| !s.trim().is_empty()) else {
                    return ExecutionOutcome::failure(
                        FailureKind::InvalidParameters,
                        "No selector specified for element wait",
                    );
                };
                let timeout = p.element_timeout();
                match page.locate(selector, timeout).await {
                    Ok(Some(_)) => ExecutionOutcome::success(
                        format!("Element appeared: {}", selector),
                        json!({ "selector": selector }),
                    ),
                    Ok(None) => wait_timeout(&p.mode),
                    Err(e) if e.is_timeout() => wait_timeout(&p.mode),
                    Err(e) => ExecutionOutcome::failure(
                        FailureKind::from_error(&e),
                        format!("Wait failed: {}", e),
                    ),
                }
            }
            "load_state" | "load-state" => {
                let Some(state) = LoadState::parse(&p.state) else {
                    return ExecutionOutcome::failure(
                        FailureKind::InvalidParameters,
                        format!("Invalid load state: {}", p.state),
                    );
                };
                let timeout = p.load_timeout();
                let waited = with_timeout(
                    timeout,
                    state.as_str(),
                    page.wait_for_load_state(state, timeout),
                )
                .await;
                match waited {
                    Ok(()) => ExecutionOutcome::success(
                        format!("Load state reached: {}", state.as_str()),
                        json!({ "state": state.as_str() }),
                    ),
                    Err(e) if e.is_timeout() => wait_timeout(&p.mode),
                    Err(e) => ExecutionOutcome::failure(
                        FailureKind::from_error(&e),
                        format!("Wait failed: {}", e),
                    ),
                }
            }
            _ => ExecutionOutcome::failure(
                FailureKind::InvalidParameters,
                format!("Invalid wait type: {}", p.mode),
            ),
        }
    }

    async fn navigate(&self, page: &dyn PageHandle, p: &NavigateParams) -> ExecutionOutcome {
        let Some(url) = p.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return ExecutionOutcome::failure(
                FailureKind::InvalidParameters,
                "No URL specified for navigation",
            );
        };

        let result = async {
            page.goto(url, self.config.action_timeout_ms).await?;
            let idle = self.config.navigation_idle_timeout_ms;
            with_timeout(idle, "networkidle", page.wait_for_load_state(LoadState::NetworkIdle, idle))
                .await
        }
        .await;

        match result {
            Ok(()) => {
                info!("navigated to: {}", url);
                ExecutionOutcome::success("Navigation successful", json!({ "url": url }))
            }
            Err(e) => ExecutionOutcome::failure(
                FailureKind::from_error(&e),
                format!("Navigation failed: {}", e),
            ),
        }
    }

    async fn extract(&self, page: &dyn PageHandle, p: &ExtractParams) -> Result<ExecutionOutcome> {
        let limit = self.config.action_timeout_ms;
        let mode = p.mode.trim().to_lowercase();
        let outcome = match mode.as_str() {
            "text" => {
                let content = with_timeout(limit, "extract text", page.text_content()).await?;
                ExecutionOutcome::success("Text extracted", json!({ "content": content }))
            }
            "html" => {
                let content = with_timeout(limit, "extract html", page.content()).await?;
                ExecutionOutcome::success("HTML extracted", json!({ "content": content }))
            }
            "element" => {
                let selector = p.selector.as_deref().filter(|s| !s.trim().is_empty());
                let element = match selector {
                    Some(s) => page.locate(s, self.schedule.for_attempt(0)).await?,
                    None => None,
                };
                match (selector, element) {
                    (Some(s), Some(el)) => {
                        let content = with_timeout(limit, "extract element", el.text_content()).await?;
                        ExecutionOutcome::success(
                            "Element text extracted",
                            json!({ "content": content, "selector": s }),
                        )
                    }
                    _ => invalid_extraction(&p.mode),
                }
            }
            _ => invalid_extraction(&p.mode),
        };
        Ok(outcome)
    }

    /// Check document readiness and scan for visible error indicators.
    ///
    /// Not called by `execute`; use it as a pre-flight or diagnostic check.
    pub async fn validate_page_state(&self, page: &dyn PageHandle) -> (bool, String) {
        let ready = match with_timeout(
            self.config.action_timeout_ms,
            "readyState",
            page.evaluate("document.readyState"),
        )
        .await
        {
            Ok(v) => v.as_str().unwrap_or_default().to_string(),
            Err(e) => return (false, format!("Could not validate page state: {}", e)),
        };
        if ready != "complete" {
            return (false, format!("Page not fully loaded: {}", ready));
        }

        for indicator in ERROR_INDICATORS {
            let Ok(Some(el)) = page.locate(indicator, 0).await else {
                continue;
            };
            if el.is_visible().await.unwrap_or(false) {
                let text = el.text_content().await.unwrap_or_default();
                return (false, format!("Page error detected: {}", text));
            }
        }
        (true, "Page state is valid".into())
    }
}

fn hit_payload(hit: &Hit<'_>) -> Value {
    json!({
        "strategy": hit.candidate.category,
        "selector": hit.candidate.expression,
        "confidence": hit.candidate.confidence,
        "attempt": hit.attempt,
        "element_info": hit.element,
    })
}

fn wait_timeout(mode: &str) -> ExecutionOutcome {
    ExecutionOutcome::failure(FailureKind::Timeout, format!("Wait timeout: {}", mode))
}

fn invalid_extraction(mode: &str) -> ExecutionOutcome {
    ExecutionOutcome::failure(
        FailureKind::InvalidParameters,
        format!("Invalid extraction type or missing selector: {}", mode),
    )
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
