//! Session orchestration: one goal, one page, a bounded number of turns.

use crate::action::{AbstractAction, ActionSpec};
use crate::browser::{PageFactory, PagePool};
use crate::config::{NavigatorConfig, SessionConfig};
use crate::decision::{DecisionService, DescriptionParser, TurnHistory};
use crate::executor::{ActionExecutor, ExecutionOutcome, FailureKind};
use crate::observe::{self, PageSnapshot};
use crate::page::PageHandle;
use crate::{with_timeout, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const SETTLE_GRACE_MS: u64 = 2_000;
const URL_TIMEOUT_MS: u64 = 5_000;

/// A navigation goal for one start page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub url: String,
    pub goal: String,
    /// Overrides `session.max_turns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,
}

impl SessionRequest {
    pub fn new(url: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            goal: goal.into(),
            max_turns: None,
        }
    }

    pub fn max_turns(mut self, turns: usize) -> Self {
        self.max_turns = Some(turns);
        self
    }
}

/// Failure taxonomy of a session's error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LowConfidenceRejection,
    StrategyExhausted,
    OperationTimeout,
    ActionFailed,
    DecisionServiceFault,
    SessionFault,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::LowConfidence => ErrorKind::LowConfidenceRejection,
            FailureKind::StrategyExhausted => ErrorKind::StrategyExhausted,
            FailureKind::Timeout => ErrorKind::OperationTimeout,
            FailureKind::InvalidParameters | FailureKind::Unsupported | FailureKind::Browser => {
                ErrorKind::ActionFailed
            }
        }
    }
}

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Turn the error happened in; 0 before the first turn.
    pub turn: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, turn: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            turn,
            message: message.into(),
            action_type: None,
            target_description: None,
            details: None,
            at: Utc::now(),
        }
    }

    fn for_action(mut self, action: &AbstractAction) -> Self {
        self.action_type = Some(action.kind().to_string());
        self.target_description = Some(action.target_description.clone());
        self
    }

    fn from_outcome(turn: usize, action: &AbstractAction, outcome: &ExecutionOutcome) -> Self {
        let kind = outcome.failure.map(ErrorKind::from).unwrap_or(ErrorKind::ActionFailed);
        let mut record = Self::new(kind, turn, outcome.message.clone()).for_action(action);
        if !outcome.payload.is_empty() {
            record.details = Some(Value::Object(outcome.payload.clone()));
        }
        record
    }
}

/// A decision and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub turn: usize,
    pub action: AbstractAction,
    pub page_title: String,
    pub page_url: String,
    /// Absent for extract and error decisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
}

/// A locator strategy that worked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRecord {
    pub action: String,
    pub strategy: String,
    pub selector: String,
    pub confidence: f64,
}

/// Everything a session did, returned on every exit path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub goal: String,
    pub start_url: String,
    pub final_url: String,
    pub turns_allowed: usize,
    /// Turns taken.
    pub total_actions: usize,
    pub navigation_path: Vec<String>,
    pub actions_taken: Vec<ActionRecord>,
    pub extracted_content: Map<String, Value>,
    pub errors: Vec<ErrorRecord>,
    pub successful_navigation: bool,
    pub strategies_used: Vec<StrategyRecord>,
    pub strategies_learned: usize,
    /// Recent goal/action turns as printed at the end of a run.
    pub conversation_summary: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    fn start(request: &SessionRequest, turns_allowed: usize) -> Self {
        let now = Utc::now();
        Self {
            goal: request.goal.clone(),
            start_url: request.url.clone(),
            final_url: String::new(),
            turns_allowed,
            total_actions: 0,
            navigation_path: Vec::new(),
            actions_taken: Vec::new(),
            extracted_content: Map::new(),
            errors: Vec::new(),
            successful_navigation: false,
            strategies_used: Vec::new(),
            strategies_learned: 0,
            conversation_summary: TurnHistory::default().summary(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Report for a session that never got a page.
    fn failed(request: &SessionRequest, turns_allowed: usize, message: impl Into<String>) -> Self {
        let mut report = Self::start(request, turns_allowed);
        report
            .errors
            .push(ErrorRecord::new(ErrorKind::SessionFault, 0, message));
        report.final_url = request.url.clone();
        report.finished_at = Utc::now();
        report
    }

    /// Whether the session ended on a session or decision-service fault.
    pub fn has_fault(&self) -> bool {
        self.errors.iter().any(|e| {
            matches!(
                e.kind,
                ErrorKind::SessionFault | ErrorKind::DecisionServiceFault
            )
        })
    }

    /// Whether the session moved off the start page or completed an Extract decision.
    pub fn made_progress(&self) -> bool {
        self.successful_navigation || self.extracted_content.contains_key("extraction_metadata")
    }

    fn finish(&mut self) {
        self.successful_navigation = self.navigation_path.len() > 1;
        self.strategies_learned = self.strategies_used.len();
        self.finished_at = Utc::now();
    }
}

/// Drives sessions: observe, decide, execute, repeat.
pub struct Navigator<D> {
    session: SessionConfig,
    history_window: usize,
    history_capacity: usize,
    decisions: D,
    executor: ActionExecutor,
}

impl<D: DecisionService> Navigator<D> {
    pub fn new(config: &NavigatorConfig, decisions: D) -> Self {
        Self {
            session: config.session.clone(),
            history_window: config.llm.history_window,
            history_capacity: config.llm.history_capacity,
            decisions,
            executor: ActionExecutor::new(&config.executor, &config.locator),
        }
    }

    /// Decompose target descriptions with `parser` before generating locators.
    pub fn with_parser<P: DescriptionParser + 'static>(mut self, parser: P) -> Self {
        self.executor = self.executor.with_parser(Arc::new(parser));
        self
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Run one session on `page`. Never fails; faults are recorded in the report.
    pub async fn run(&self, page: &dyn PageHandle, request: SessionRequest) -> SessionReport {
        let turns_allowed = request.max_turns.unwrap_or(self.session.max_turns);
        let mut report = SessionReport::start(&request, turns_allowed);
        info!("starting session: {}", request.url);
        info!("goal: {}", request.goal);

        let faulted = match self.drive(page, &mut report).await {
            Ok(()) => false,
            Err(e) => {
                error!("session failed: {}", e);
                report.errors.push(ErrorRecord::new(
                    ErrorKind::SessionFault,
                    report.total_actions,
                    e.to_string(),
                ));
                true
            }
        };

        if report.extracted_content.is_empty() && !faulted {
            let content = observe::final_content(page).await;
            report.extracted_content.extend(content);
        }

        report.final_url = match with_timeout(URL_TIMEOUT_MS, "url", page.url()).await {
            Ok(url) => url,
            Err(_) => report
                .navigation_path
                .last()
                .cloned()
                .unwrap_or_else(|| request.url.clone()),
        };
        report.finish();

        info!(
            "session completed: {} turns, navigation {}, {} strategies learned",
            report.total_actions,
            if report.successful_navigation { "succeeded" } else { "did not move" },
            report.strategies_learned
        );
        report
    }

    async fn drive(&self, page: &dyn PageHandle, report: &mut SessionReport) -> Result<()> {
        page.goto(&report.start_url, self.session.settle_timeout_ms).await?;
        self.settle(page).await;
        report.navigation_path.push(report.start_url.clone());

        let mut history = TurnHistory::new(self.history_capacity);
        while report.total_actions < report.turns_allowed {
            report.total_actions += 1;
            let turn = report.total_actions;
            info!("turn {}/{}", turn, report.turns_allowed);

            let snapshot = PageSnapshot::capture(page, &self.session).await;
            let action = self
                .decisions
                .decide(&snapshot, &report.goal, &history.recent(self.history_window))
                .await;
            history.push(&report.goal, &action);
            report.conversation_summary = history.summary();
            report.actions_taken.push(ActionRecord {
                turn,
                action: action.clone(),
                page_title: snapshot.title.clone(),
                page_url: snapshot.url.clone(),
                outcome: None,
            });

            match &action.spec {
                ActionSpec::Extract(params) => {
                    let content = observe::extract_content(page, params).await;
                    report.extracted_content.extend(content);
                    info!("content extraction completed");
                    break;
                }
                ActionSpec::Error => {
                    error!("decision service cannot proceed: {}", action.rationale);
                    report.errors.push(
                        ErrorRecord::new(ErrorKind::DecisionServiceFault, turn, action.rationale.clone())
                            .for_action(&action),
                    );
                    break;
                }
                _ => {
                    let outcome = self.executor.execute(page, &action).await;
                    if let Some(last) = report.actions_taken.last_mut() {
                        last.outcome = Some(outcome.clone());
                    }
                    if outcome.succeeded {
                        self.after_success(page, report, &action, &outcome).await;
                    } else {
                        warn!("action failed: {}", outcome.message);
                        log_strategies(&outcome);
                        report
                            .errors
                            .push(ErrorRecord::from_outcome(turn, &action, &outcome));
                    }
                }
            }
        }
        Ok(())
    }

    async fn after_success(
        &self,
        page: &dyn PageHandle,
        report: &mut SessionReport,
        action: &AbstractAction,
        outcome: &ExecutionOutcome,
    ) {
        info!("action succeeded: {}", outcome.message);
        if let (Some(strategy), Some(selector)) =
            (outcome.payload_str("strategy"), outcome.payload_str("selector"))
        {
            report.strategies_used.push(StrategyRecord {
                action: action.target_description.clone(),
                strategy: strategy.to_string(),
                selector: selector.to_string(),
                confidence: outcome
                    .payload
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            });
        }

        self.human_delay().await;
        self.settle(page).await;

        let last = report.navigation_path.last().cloned().unwrap_or_default();
        match with_timeout(URL_TIMEOUT_MS, "url", page.url()).await {
            Ok(now) if !now.is_empty() && now != last => {
                info!("navigation detected: {} -> {}", last, now);
                report.navigation_path.push(now);
            }
            Ok(_) => {}
            Err(e) => debug!("could not read url after action: {}", e),
        }
    }

    async fn settle(&self, page: &dyn PageHandle) {
        let timeout = self.session.settle_timeout_ms;
        let waited = with_timeout(
            timeout.saturating_add(SETTLE_GRACE_MS),
            "settle",
            page.wait_until_settled(timeout),
        )
        .await;
        if let Err(e) = waited {
            warn!("timeout waiting for content to load: {}", e);
        }
    }

    async fn human_delay(&self) {
        let secs = delay_secs(self.session.delay_min_secs, self.session.delay_max_secs);
        if secs > 0.0 {
            debug!("pausing {:.2}s", secs);
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }
}

impl<D: DecisionService + 'static> Navigator<D> {
    /// Lease a page from `pool` and run one session on it.
    pub async fn run_pooled<F: PageFactory>(
        &self,
        pool: &PagePool<F>,
        request: SessionRequest,
    ) -> SessionReport {
        let turns_allowed = request.max_turns.unwrap_or(self.session.max_turns);
        let lease = match pool.acquire(&request.url).await {
            Ok(lease) => lease,
            Err(e) => {
                error!("could not acquire a page for {}: {}", request.url, e);
                return SessionReport::failed(&request, turns_allowed, e.to_string());
            }
        };
        let report = self.run(&*lease, request).await;
        if let Err(e) = lease.release().await {
            warn!("closing page: {}", e);
        }
        report
    }

    /// Run sessions concurrently, at most `pool.size()` at a time.
    /// Reports come back in request order.
    pub async fn run_all<F: PageFactory + 'static>(
        self: Arc<Self>,
        pool: Arc<PagePool<F>>,
        requests: Vec<SessionRequest>,
    ) -> Vec<SessionReport> {
        let mut tasks = JoinSet::new();
        for (i, request) in requests.iter().cloned().enumerate() {
            let navigator = self.clone();
            let pool = pool.clone();
            tasks.spawn(async move { (i, navigator.run_pooled(&pool, request).await) });
        }

        let mut reports: Vec<Option<SessionReport>> = vec![None; requests.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, report)) => reports[i] = Some(report),
                Err(e) => error!("session task failed: {}", e),
            }
        }

        reports
            .into_iter()
            .zip(&requests)
            .map(|(report, request)| {
                report.unwrap_or_else(|| {
                    let turns = request.max_turns.unwrap_or(self.session.max_turns);
                    SessionReport::failed(request, turns, "session task aborted")
                })
            })
            .collect()
    }
}

/// Uniform draw from [min, max] seconds.
fn delay_secs(min: f64, max: f64) -> f64 {
    if min.is_finite() && max.is_finite() && max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min.max(0.0)
    }
}

fn log_strategies(outcome: &ExecutionOutcome) {
    let Some(tried) = outcome.payload.get("strategies_tried") else {
        return;
    };
    info!("tried {} strategies", tried);
    if let Some(list) = outcome.payload.get("strategies").and_then(Value::as_array) {
        for s in list {
            debug!(
                "  - {}: {} (confidence: {})",
                s["category"].as_str().unwrap_or_default(),
                s["selector"].as_str().unwrap_or_default(),
                s["confidence"]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delay_within_bounds() {
        for _ in 0..100 {
            let d = delay_secs(1.0, 3.0);
            assert!((1.0..=3.0).contains(&d));
        }
        assert_eq!(delay_secs(0.5, 0.5), 0.5);
        assert_eq!(delay_secs(0.0, 0.0), 0.0);
        assert_eq!(delay_secs(1.0, f64::INFINITY), 1.0);
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ErrorKind::from(FailureKind::LowConfidence),
            ErrorKind::LowConfidenceRejection
        );
        assert_eq!(
            ErrorKind::from(FailureKind::Timeout),
            ErrorKind::OperationTimeout
        );
        assert_eq!(
            ErrorKind::from(FailureKind::Unsupported),
            ErrorKind::ActionFailed
        );
    }

    #[test]
    fn test_failed_report() {
        let req = SessionRequest::new("https://example.com", "find pricing").max_turns(4);
        let r = SessionReport::failed(&req, 4, "pool closed");
        assert!(r.has_fault());
        assert!(!r.made_progress());
        assert_eq!(r.errors[0].kind, ErrorKind::SessionFault);
        assert_eq!(r.final_url, "https://example.com");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["errors"][0]["kind"], "session_fault");
        assert!(v["started_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_request_yaml() {
        let reqs: Vec<SessionRequest> = serde_yaml::from_str(
            "- url: https://a.example\n  goal: open docs\n- url: https://b.example\n  goal: find pricing\n  max_turns: 3\n",
        )
        .unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].max_turns, None);
        assert_eq!(reqs[1].max_turns, Some(3));
    }

    #[test]
    fn test_error_record_from_outcome() {
        let action = AbstractAction::new("click", "Docs link", json!({}), 0.8, "").unwrap();
        let outcome = ExecutionOutcome::failure(
            FailureKind::StrategyExhausted,
            "Could not find clickable element: Docs link",
        )
        .with_payload(json!({ "strategies_tried": 7 }));
        let r = ErrorRecord::from_outcome(2, &action, &outcome);
        assert_eq!(r.kind, ErrorKind::StrategyExhausted);
        assert_eq!(r.turn, 2);
        assert_eq!(r.action_type.as_deref(), Some("click"));
        assert_eq!(r.details.unwrap()["strategies_tried"], 7);
    }
}
