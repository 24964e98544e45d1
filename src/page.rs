//! Browser seam. The executor and session loop only talk to these traits.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Document load states that can be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "domcontentloaded" => Some(LoadState::DomContentLoaded),
            "load" => Some(LoadState::Load),
            "networkidle" => Some(LoadState::NetworkIdle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClickOptions {
    /// Dispatch the click from script, skipping pointer simulation.
    pub force: bool,
    /// Human-like mouse path.
    pub human: bool,
}

/// A located element.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn is_visible(&self) -> Result<bool>;
    async fn is_enabled(&self) -> Result<bool>;
    async fn scroll_into_view(&self) -> Result<()>;
    async fn click(&self, options: ClickOptions) -> Result<()>;
    /// Replace the element's value.
    async fn fill(&self, text: &str) -> Result<()>;
    /// Type key by key with `delay_ms` between keystrokes.
    async fn type_text(&self, text: &str, delay_ms: u64) -> Result<()>;
    async fn press_key(&self, key: &str) -> Result<()>;
    async fn text_content(&self) -> Result<String>;
    /// Small JSON descriptor (tag, text) for reports.
    fn describe(&self) -> Value;
}

/// An isolated page owned by one session.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<()>;
    /// Best-effort wait for network quiet plus a short DOM settle.
    async fn wait_until_settled(&self, timeout_ms: u64) -> Result<()>;
    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> Result<()>;
    /// Wait up to `timeout_ms` for a locator expression to match.
    /// `Ok(None)` when nothing matched in time.
    async fn locate(
        &self,
        expression: &str,
        timeout_ms: u64,
    ) -> Result<Option<Box<dyn ElementHandle>>>;
    async fn url(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    /// Visible text of the body.
    async fn text_content(&self) -> Result<String>;
    /// Full document markup.
    async fn content(&self) -> Result<String>;
    /// Evaluate a JS expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value>;
    /// Accessibility-style tree bounded by depth and children per node.
    async fn capture_structural_snapshot(&self, max_depth: usize, max_children: usize)
        -> Result<Value>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state_parse() {
        assert_eq!(LoadState::parse("networkidle"), Some(LoadState::NetworkIdle));
        assert_eq!(LoadState::parse("Load"), Some(LoadState::Load));
        assert_eq!(LoadState::parse("idle"), None);
        assert_eq!(LoadState::NetworkIdle.as_str(), "networkidle");
    }
}
