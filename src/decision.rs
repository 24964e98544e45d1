use crate::action::AbstractAction;
use crate::observe::PageSnapshot;
use crate::Result;
use async_trait::async_trait;
use eoka_locator::Decomposition;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Chooses the next action for a goal.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Never fails: a service that cannot decide returns [`AbstractAction::error`].
    async fn decide(
        &self,
        snapshot: &PageSnapshot,
        goal: &str,
        history: &[TurnSummary],
    ) -> AbstractAction;
}

/// Breaks a target description into text, kind, region and alternatives.
#[async_trait]
pub trait DescriptionParser: Send + Sync {
    async fn parse(&self, description: &str) -> Result<Decomposition>;
}

#[async_trait]
impl<T: DecisionService + ?Sized> DecisionService for Arc<T> {
    async fn decide(
        &self,
        snapshot: &PageSnapshot,
        goal: &str,
        history: &[TurnSummary],
    ) -> AbstractAction {
        (**self).decide(snapshot, goal, history).await
    }
}

#[async_trait]
impl<T: DescriptionParser + ?Sized> DescriptionParser for Arc<T> {
    async fn parse(&self, description: &str) -> Result<Decomposition> {
        (**self).parse(description).await
    }
}

/// One past turn as the decision service sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnSummary {
    pub goal: String,
    /// `kind -> target` one-liner.
    pub action: String,
}

/// Bounded, oldest-first record of recent turns.
#[derive(Debug, Clone)]
pub struct TurnHistory {
    entries: VecDeque<TurnSummary>,
    capacity: usize,
}

impl TurnHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, goal: &str, action: &AbstractAction) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TurnSummary {
            goal: goal.to_string(),
            action: action.summary(),
        });
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TurnSummary> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Numbered listing of the last five turns, for the end-of-run printout.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "No navigation history".to_string();
        }
        let mut out = String::from("Navigation History:");
        for (i, turn) in self.recent(5).iter().enumerate() {
            out.push_str(&format!("\n{}. Goal: {} -> Action: {}", i + 1, turn.goal, turn.action));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TurnHistory {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn click(target: &str) -> AbstractAction {
        AbstractAction::new("click", target, json!({}), 0.9, "").unwrap()
    }

    #[test]
    fn test_history_is_bounded() {
        let mut h = TurnHistory::new(3);
        for t in ["a", "b", "c", "d"] {
            h.push("goal", &click(t));
        }
        assert_eq!(h.len(), 3);
        let actions: Vec<String> = h.recent(10).into_iter().map(|s| s.action).collect();
        assert_eq!(actions, vec!["click -> b", "click -> c", "click -> d"]);
    }

    #[test]
    fn test_recent_window() {
        let mut h = TurnHistory::default();
        for t in ["a", "b", "c", "d", "e"] {
            h.push("find docs", &click(t));
        }
        let recent = h.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "click -> d");
        assert_eq!(recent[1].goal, "find docs");
        assert!(TurnHistory::new(0).recent(3).is_empty());
    }

    #[test]
    fn test_summary_lists_last_five() {
        let mut h = TurnHistory::default();
        assert_eq!(h.summary(), "No navigation history");
        for t in ["a", "b", "c", "d", "e", "f"] {
            h.push("find docs", &click(t));
        }
        let summary = h.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Navigation History:");
        assert_eq!(lines[1], "1. Goal: find docs -> Action: click -> b");
        assert_eq!(lines[5], "5. Goal: find docs -> Action: click -> f");
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut h = TurnHistory::new(0);
        h.push("g", &click("x"));
        assert!(h.is_empty());
    }
}
