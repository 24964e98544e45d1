//! Abstract actions proposed by the decision service.
//!
//! The wire shape is `{action_type, target_description, parameters, confidence, reasoning}`.
//! Parameters are parsed into a typed struct per kind; the raw map is kept for reporting.

use crate::{Error, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClickParams {
    pub selector: Option<String>,
    /// Dispatch the click from script instead of simulating the pointer.
    pub force: bool,
    /// Use eoka's human-like mouse movement.
    pub human: bool,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub wait_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TypeParams {
    pub selector: Option<String>,
    pub text: Option<String>,
    pub clear: bool,
    /// Inter-keystroke delay in ms.
    #[serde(deserialize_with = "lenient_u64")]
    pub delay: u64,
    pub press_enter: bool,
}

impl Default for TypeParams {
    fn default() -> Self {
        Self {
            selector: None,
            text: None,
            clear: true,
            delay: 100,
            press_enter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScrollParams {
    /// `down`, `up`, `to_bottom` or `to_top`; validated at execution.
    pub direction: String,
    /// Pixels; the direction decides the sign.
    #[serde(deserialize_with = "lenient_i64")]
    pub amount: i64,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub wait_after: Option<u64>,
}

impl Default for ScrollParams {
    fn default() -> Self {
        Self {
            direction: "down".into(),
            amount: 500,
            wait_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaitParams {
    /// `timeout`, `element` or `load_state`; validated at execution.
    #[serde(rename = "type")]
    pub mode: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub duration: u64,
    pub selector: Option<String>,
    #[serde(deserialize_with = "lenient_opt_u64")]
    pub timeout: Option<u64>,
    pub state: String,
}

impl Default for WaitParams {
    fn default() -> Self {
        Self {
            mode: "timeout".into(),
            duration: 2000,
            selector: None,
            timeout: None,
            state: "networkidle".into(),
        }
    }
}

impl WaitParams {
    pub fn element_timeout(&self) -> u64 {
        self.timeout.unwrap_or(10_000)
    }

    pub fn load_timeout(&self) -> u64 {
        self.timeout.unwrap_or(30_000)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigateParams {
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractParams {
    /// `text`, `html` or `element`; validated at execution.
    #[serde(rename = "type")]
    pub mode: String,
    pub selector: Option<String>,
    pub extract_title: bool,
    pub extract_text: bool,
    pub extract_links: bool,
    /// Output key -> locator expression.
    pub selectors: BTreeMap<String, String>,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            mode: "text".into(),
            selector: None,
            extract_title: true,
            extract_text: true,
            extract_links: false,
            selectors: BTreeMap::new(),
        }
    }
}

/// Kind plus typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    Click(ClickParams),
    Type(TypeParams),
    Scroll(ScrollParams),
    Wait(WaitParams),
    Navigate(NavigateParams),
    Extract(ExtractParams),
    /// The decision service cannot proceed.
    Error,
    /// An `action_type` the executor does not know.
    Unsupported(String),
    /// A known kind whose parameters did not fit its schema.
    Invalid { kind: String, reason: String },
}

impl ActionSpec {
    fn parse(kind: &str, params: &Map<String, Value>) -> Self {
        fn typed<T: serde::de::DeserializeOwned>(
            kind: &str,
            params: &Map<String, Value>,
            wrap: fn(T) -> ActionSpec,
        ) -> ActionSpec {
            match serde_json::from_value(Value::Object(params.clone())) {
                Ok(p) => wrap(p),
                Err(e) => ActionSpec::Invalid {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                },
            }
        }

        match kind {
            "click" => typed(kind, params, ActionSpec::Click),
            "type" => typed(kind, params, ActionSpec::Type),
            "scroll" => typed(kind, params, ActionSpec::Scroll),
            "wait" => typed(kind, params, ActionSpec::Wait),
            "navigate" => typed(kind, params, ActionSpec::Navigate),
            "extract" => typed(kind, params, ActionSpec::Extract),
            "error" => ActionSpec::Error,
            other => ActionSpec::Unsupported(other.to_string()),
        }
    }

    /// Wire name of the kind.
    pub fn name(&self) -> &str {
        match self {
            ActionSpec::Click(_) => "click",
            ActionSpec::Type(_) => "type",
            ActionSpec::Scroll(_) => "scroll",
            ActionSpec::Wait(_) => "wait",
            ActionSpec::Navigate(_) => "navigate",
            ActionSpec::Extract(_) => "extract",
            ActionSpec::Error => "error",
            ActionSpec::Unsupported(kind) | ActionSpec::Invalid { kind, .. } => kind,
        }
    }
}

/// One recommended next step.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractAction {
    pub spec: ActionSpec,
    pub target_description: String,
    /// Parameters exactly as received.
    pub parameters: Map<String, Value>,
    pub confidence: f64,
    pub rationale: String,
}

impl AbstractAction {
    /// Build an action from its parts. `parameters` must be an object or null.
    pub fn new(
        kind: &str,
        target_description: impl Into<String>,
        parameters: Value,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Result<Self> {
        let parameters = match parameters {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::Decision(format!(
                    "parameters must be an object, got {}",
                    other
                )))
            }
        };
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::Decision(format!(
                "confidence must be between 0 and 1, got {}",
                confidence
            )));
        }
        let kind = kind.trim().to_lowercase();
        Ok(Self {
            spec: ActionSpec::parse(&kind, &parameters),
            target_description: target_description.into(),
            parameters,
            confidence,
            rationale: rationale.into(),
        })
    }

    /// Parse the decision service's JSON reply.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::Decision(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::Decision("reply is not a JSON object".into()));
        };
        for field in [
            "action_type",
            "target_description",
            "parameters",
            "confidence",
            "reasoning",
        ] {
            if !obj.contains_key(field) {
                return Err(Error::Decision(format!("missing required field: {}", field)));
            }
        }

        let kind = match obj.remove("action_type") {
            Some(Value::String(s)) => s,
            other => {
                return Err(Error::Decision(format!(
                    "action_type must be a string, got {}",
                    other.unwrap_or_default()
                )))
            }
        };
        let confidence = obj
            .get("confidence")
            .and_then(as_f64)
            .ok_or_else(|| Error::Decision("confidence must be a number".into()))?;
        // Non-object parameters are treated as empty.
        let parameters = match obj.remove("parameters") {
            Some(p @ Value::Object(_)) => p,
            _ => Value::Null,
        };
        Self::new(
            &kind,
            text_field(obj.remove("target_description")),
            parameters,
            confidence,
            text_field(obj.remove("reasoning")),
        )
    }

    /// Synthetic terminal action for a failed decision.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            spec: ActionSpec::Error,
            target_description: "decision unavailable".into(),
            parameters: Map::new(),
            confidence: 0.0,
            rationale: reason.into(),
        }
    }

    pub fn kind(&self) -> &str {
        self.spec.name()
    }

    /// `click -> Discussion tab` style one-liner for history.
    pub fn summary(&self) -> String {
        format!("{} -> {}", self.kind(), self.target_description)
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "action_type": self.kind(),
            "target_description": self.target_description,
            "parameters": self.parameters,
            "confidence": self.confidence,
            "reasoning": self.rationale,
        })
    }
}

impl Serialize for AbstractAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn text_field(v: Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    as_i64(&v).ok_or_else(|| de::Error::custom(format!("expected a number, got {}", v)))
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    as_u64(&v).ok_or_else(|| de::Error::custom(format!("expected a non-negative number, got {}", v)))
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        v => as_u64(&v)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative number, got {}", v))),
    }
}
