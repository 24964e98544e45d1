use crate::config::ExecutorConfig;
use crate::Error;
use serde::Serialize;
use serde_json::{Map, Value};

/// Why an action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Confidence below the gate; the page was not touched.
    LowConfidence,
    /// Every locator candidate was tried without success.
    StrategyExhausted,
    Timeout,
    /// Required parameter missing or sub-mode not recognized.
    InvalidParameters,
    Unsupported,
    Browser,
}

impl FailureKind {
    pub fn from_error(e: &Error) -> Self {
        if e.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Browser
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::LowConfidence => "low_confidence",
            FailureKind::StrategyExhausted => "strategy_exhausted",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidParameters => "invalid_parameters",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Browser => "browser",
        }
    }
}

/// Result of one `execute` call. Always a value, never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub message: String,
    pub payload: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, payload: Value) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            payload: into_map(payload),
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            payload: Map::new(),
            failure: Some(kind),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload.extend(into_map(payload));
        self
    }

    /// String field of the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

fn into_map(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// Per-candidate locate timeout: shrinks by `step_ms` per attempt, never below `floor_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSchedule {
    pub start_ms: u64,
    pub step_ms: u64,
    pub floor_ms: u64,
}

impl TimeoutSchedule {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            start_ms: config.timeout_start_ms,
            step_ms: config.timeout_step_ms,
            floor_ms: config.timeout_floor_ms,
        }
    }

    pub fn for_attempt(&self, attempt: usize) -> u64 {
        let shrink = self.step_ms.saturating_mul(attempt as u64);
        self.start_ms.saturating_sub(shrink).max(self.floor_ms)
    }
}

impl Default for TimeoutSchedule {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}
