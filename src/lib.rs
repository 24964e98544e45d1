//! # eoka-navigator
//!
//! Goal-driven browser navigation. A decision service proposes one abstract
//! action per turn ("click the Discussion tab in main navigation"); the
//! executor turns it into ranked locators and tries them against the live
//! page until one works.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_navigator::{
//!     ChatClient, ChatDecisionService, ChatDescriptionParser, EokaLauncher, Navigator,
//!     NavigatorConfig, PagePool, SessionRequest,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_navigator::Result<()> {
//! let config = NavigatorConfig::load("navigator.yaml")?;
//! let client = ChatClient::new(&config.llm)?;
//! let navigator = Navigator::new(&config, ChatDecisionService::new(client.clone(), &config.llm))
//!     .with_parser(ChatDescriptionParser::new(client));
//! let pool = PagePool::new(
//!     EokaLauncher::launch(&config.browser).await?,
//!     config.browser.max_concurrent_pages,
//! );
//! let report = navigator
//!     .run_pooled(&pool, SessionRequest::new("https://example.com", "Open the docs"))
//!     .await;
//! println!("finished at {}", report.final_url);
//! # Ok(())
//! # }
//! ```

mod action;
mod browser;
mod config;
mod decision;
mod executor;
mod llm;
mod observe;
mod page;
mod session;

pub use action::{
    AbstractAction, ActionSpec, ClickParams, ExtractParams, NavigateParams,
    ScrollParams, TypeParams, WaitParams,
};
pub use browser::{EokaLauncher, EokaPage, Lease, PageFactory, PagePool};
pub use config::{
    BrowserConfig, ExecutorConfig, LlmConfig, LoggingConfig, NavigatorConfig, SessionConfig,
    Viewport,
};
pub use decision::{DecisionService, DescriptionParser, TurnHistory, TurnSummary};
pub use executor::{ActionExecutor, ExecutionOutcome, FailureKind, TimeoutSchedule};
pub use llm::{ChatClient, ChatDecisionService, ChatDescriptionParser};
pub use observe::{simplify_tree, PageMetrics, PageSnapshot};
pub use page::{ClickOptions, ElementHandle, LoadState, PageHandle};
pub use session::{
    ActionRecord, ErrorKind, ErrorRecord, Navigator, SessionReport, SessionRequest, StrategyRecord,
};

pub use eoka_locator as locator;

/// Result type for eoka-navigator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration, browser, and decision-service calls.
///
/// The executor and the session loop never return these to their callers;
/// they are folded into outcomes and error records.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("decision service: {0}")]
    Decision(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Run `fut` with a deadline, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_timeout<T, F>(ms: u64, what: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(std::time::Duration::from_millis(ms), fut).await {
        Ok(r) => r,
        Err(_) => Err(Error::Timeout(format!("{} after {}ms", what, ms))),
    }
}

/// Truncate to at most `max` chars on a char boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
