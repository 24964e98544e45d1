//! Chat-completions backed decision service and description parser.

use crate::action::AbstractAction;
use crate::config::LlmConfig;
use crate::decision::{DecisionService, DescriptionParser, TurnSummary};
use crate::observe::PageSnapshot;
use crate::{truncate, Error, Result};
use async_trait::async_trait;
use eoka_locator::Decomposition;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DECISION_SYSTEM_PROMPT: &str = "You are an expert web navigation agent. You understand web page \
structures through accessibility trees and make intelligent decisions about how to navigate to achieve \
specific goals. You are precise, efficient, and handle edge cases gracefully. Always respond with valid \
JSON as specified in the prompt.";

const PARSER_SYSTEM_PROMPT: &str = "You break descriptions of web page elements into structured parts. \
Always respond with a single JSON object.";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").unwrap());

/// OpenAI-compatible chat-completions client in JSON response mode.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
    retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("no API key configured for {}; requests are sent unauthenticated", config.endpoint);
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Send one system + user exchange and parse the reply as a JSON value.
    /// Rate-limited calls are retried with linear backoff.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };

        let mut attempt: u32 = 0;
        loop {
            let mut req = self.http.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                attempt += 1;
                let wait = self.retry_delay_ms.saturating_mul(attempt as u64);
                warn!("rate limited, retry {}/{} in {}ms", attempt, self.max_retries, wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
                continue;
            }
            if !status.is_success() {
                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                return Err(Error::Decision(format!(
                    "chat endpoint returned {}: {}",
                    status,
                    truncate(&text, 200)
                )));
            }

            let parsed: ChatCompletionResponse = resp.json().await?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| Error::Decision("response has no message content".into()))?;
            return parse_json_reply(&content);
        }
    }
}

/// Parse a model reply as JSON, tolerating a surrounding code fence.
fn parse_json_reply(content: &str) -> Result<Value> {
    let body = match CODE_FENCE.captures(content).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => content.trim(),
    };
    serde_json::from_str(body).map_err(|e| Error::Decision(format!("reply is not valid JSON: {}", e)))
}

/// Decision service that asks a chat model for the next action.
pub struct ChatDecisionService {
    client: ChatClient,
    tree_chars: usize,
}

impl ChatDecisionService {
    pub fn new(client: ChatClient, config: &LlmConfig) -> Self {
        Self {
            client,
            tree_chars: config.tree_chars,
        }
    }

    async fn try_decide(&self, prompt: &str) -> Result<AbstractAction> {
        let reply = self.client.complete_json(DECISION_SYSTEM_PROMPT, prompt).await?;
        AbstractAction::from_value(reply)
    }
}

#[async_trait]
impl DecisionService for ChatDecisionService {
    async fn decide(
        &self,
        snapshot: &PageSnapshot,
        goal: &str,
        history: &[TurnSummary],
    ) -> AbstractAction {
        let prompt = render_prompt(snapshot, goal, history, self.tree_chars);
        match self.try_decide(&prompt).await {
            Ok(action) => {
                info!("decision: {} ({:.2})", action.summary(), action.confidence);
                debug!("reasoning: {}", action.rationale);
                action
            }
            Err(e) => {
                error!("navigation planning failed: {}", e);
                let mut action = AbstractAction::error(format!("Error: {}", e));
                action.target_description = "LLM analysis failed".into();
                action
            }
        }
    }
}

/// Prompt for one navigation decision.
pub(crate) fn render_prompt(
    snapshot: &PageSnapshot,
    goal: &str,
    history: &[TurnSummary],
    tree_chars: usize,
) -> String {
    let tree = serde_json::to_string_pretty(&snapshot.tree).unwrap_or_else(|_| "{}".to_string());
    let cut = truncate(&tree, tree_chars);
    let ellipsis = if cut.len() < tree.len() { "..." } else { "" };
    let m = &snapshot.metrics;

    let mut lines = vec![
        "# Web Page Navigation Analysis".to_string(),
        String::new(),
        format!("**Current URL:** {}", snapshot.url),
        format!("**Navigation Goal:** {}", goal),
        format!(
            "**Page:** {} ({} clickable, {} form fields, {} navigation regions, tabs: {})",
            snapshot.title,
            m.clickable_elements,
            m.form_elements,
            m.navigation_elements,
            if m.has_tabs { "yes" } else { "no" }
        ),
        String::new(),
        "## Page Structure (Accessibility Tree)".to_string(),
        "```json".to_string(),
        format!("{}{}", cut, ellipsis),
        "```".to_string(),
        String::new(),
    ];

    if !snapshot.content_summary.is_empty() {
        lines.push("## Page Content Summary".to_string());
        lines.push(snapshot.content_summary.clone());
        lines.push(String::new());
    }

    if !history.is_empty() {
        lines.push("## Recent Navigation History".to_string());
        lines.extend(history.iter().map(|h| format!("- {}: {}", h.goal, h.action)));
        lines.push(String::new());
    }

    lines.push(TASK_SECTION.to_string());
    lines.join("\n")
}

const TASK_SECTION: &str = r#"## Your Task
Analyze the page structure and recommend the SINGLE BEST next action to achieve the navigation goal.
Consider:
- What interactive elements are available?
- Which element best matches the navigation goal?
- What's the most efficient path forward?
- Are there any obvious obstacles or dynamic content loading?

Respond with a JSON object containing:
- "action_type": one of [click, type, scroll, wait, navigate, extract, error]
- "target_description": clear description of the target element
- "parameters": action-specific parameters (selector, text, direction, etc.)
- "confidence": float 0-1 indicating confidence in this action
- "reasoning": brief explanation of why this action was chosen

Example response:
```json
{
  "action_type": "click",
  "target_description": "Discussion tab in main navigation",
  "parameters": {"wait_after": 2000},
  "confidence": 0.9,
  "reasoning": "Discussion tab is clearly visible and matches navigation goal"
}
```"#;

/// Description parser backed by a chat model.
pub struct ChatDescriptionParser {
    client: ChatClient,
}

impl ChatDescriptionParser {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParsedDescription {
    target_text: Option<String>,
    element_type: Option<String>,
    context_area: Option<String>,
    modifiers: Option<Vec<String>>,
    alternatives: Option<Vec<String>>,
}

impl ParsedDescription {
    fn into_decomposition(self) -> Result<Decomposition> {
        let nonempty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let target_text = nonempty(self.target_text)
            .ok_or_else(|| Error::Decision("parser reply has no target_text".into()))?;
        Ok(Decomposition {
            target_text,
            element_kind: nonempty(self.element_type),
            region: nonempty(self.context_area),
            modifiers: self.modifiers.unwrap_or_default(),
            alternative_texts: self.alternatives.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl DescriptionParser for ChatDescriptionParser {
    async fn parse(&self, description: &str) -> Result<Decomposition> {
        let prompt = format!(
            r#"Break this description of a web page element into parts: "{}"

Respond with a JSON object containing:
- "target_text": the visible text of the element
- "element_type": one of [button, link, tab, input, menu, checkbox, select, heading, image, unknown]
- "context_area": where on the page it is, one of [navigation, header, footer, sidebar, main, form, dialog, unknown]
- "modifiers": other qualifiers such as "first", "primary", "top"
- "alternatives": other texts the same element might show"#,
            description
        );
        let reply = self.client.complete_json(PARSER_SYSTEM_PROMPT, &prompt).await?;
        let parsed: ParsedDescription = serde_json::from_value(reply)?;
        let d = parsed.into_decomposition()?;
        debug!(
            "parsed {:?}: text={:?} kind={:?} region={:?}",
            description, d.target_text, d.element_kind, d.region
        );
        Ok(d)
    }
}
