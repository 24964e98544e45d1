mod common;

use common::{action, fast_config, ElementSpec, FakePage};
use eoka_navigator::{ActionExecutor, FailureKind};
use serde_json::json;

fn executor() -> ActionExecutor {
    let config = fast_config();
    ActionExecutor::new(&config.executor, &config.locator)
}

#[tokio::test]
async fn low_confidence_is_rejected_before_touching_the_page() {
    let page = FakePage::new("https://example.com").with_element("Docs", ElementSpec::visible("Docs"));
    let outcome = executor()
        .execute(&page, &action("click", "the \"Docs\" link", json!({}), 0.2))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::LowConfidence));
    assert_eq!(outcome.message, "Action confidence too low: 0.20");
    assert!(page.locates().is_empty());
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn explicit_selector_is_tried_first() {
    let page = FakePage::new("https://example.com").with_element("#go", ElementSpec::visible("Go"));
    let outcome = executor()
        .execute(
            &page,
            &action("click", "Go button", json!({ "selector": "#go" }), 0.9),
        )
        .await;

    assert!(outcome.succeeded, "{}", outcome.message);
    assert_eq!(outcome.payload_str("strategy"), Some("explicit"));
    assert_eq!(outcome.payload_str("selector"), Some("#go"));
    assert_eq!(outcome.payload["attempt"], 1);
    assert_eq!(page.clicks(), vec!["#go"]);
}

#[tokio::test]
async fn exhausted_candidates_use_shrinking_timeouts() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(&page, &action("click", "the \"Sign in\" button", json!({}), 0.8))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::StrategyExhausted));
    assert_eq!(outcome.message, "Could not find clickable element: the \"Sign in\" button");

    let timeouts: Vec<u64> = page.locates().iter().map(|(_, t)| *t).collect();
    assert!(timeouts.len() >= 2);
    assert_eq!(timeouts[0], 8000);
    assert_eq!(timeouts[1], 7000);
    assert!(timeouts.windows(2).all(|w| w[0] >= w[1]));
    assert!(timeouts.iter().all(|t| *t >= 2000));

    assert_eq!(outcome.payload["strategies_tried"], json!(timeouts.len()));
    let reported = outcome.payload["strategies"].as_array().unwrap();
    assert!(!reported.is_empty() && reported.len() <= 5);
    assert!(reported[0].get("selector").is_some());
}

#[tokio::test]
async fn hidden_match_falls_through_to_next_candidate() {
    let page = FakePage::new("https://example.com")
        .with_element("#signin", ElementSpec::hidden())
        .with_element("Sign in", ElementSpec::visible("Sign in"));
    let outcome = executor()
        .execute(
            &page,
            &action(
                "click",
                "the \"Sign in\" button",
                json!({ "selector": "#signin" }),
                0.8,
            ),
        )
        .await;

    assert!(outcome.succeeded, "{}", outcome.message);
    assert_ne!(outcome.payload_str("strategy"), Some("explicit"));
    assert!(outcome.payload["attempt"].as_u64().unwrap() >= 2);
    assert_eq!(page.clicks().len(), 1);
    assert!(page.clicks()[0].contains("Sign in"));
}

#[tokio::test]
async fn type_requires_text() {
    let page = FakePage::new("https://example.com").with_element("#q", ElementSpec::visible(""));
    let outcome = executor()
        .execute(&page, &action("type", "search box", json!({ "selector": "#q" }), 0.9))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::InvalidParameters));
    assert_eq!(outcome.message, "No text specified for typing action");
    assert!(page.locates().is_empty());
}

#[tokio::test]
async fn type_fills_and_submits() {
    let page = FakePage::new("https://example.com").with_element("#q", ElementSpec::visible(""));
    let outcome = executor()
        .execute(
            &page,
            &action(
                "type",
                "search box",
                json!({ "selector": "#q", "text": "rust async", "delay": 0, "press_enter": true }),
                0.9,
            ),
        )
        .await;

    assert!(outcome.succeeded, "{}", outcome.message);
    assert_eq!(outcome.payload_str("text"), Some("rust async"));
    assert_eq!(page.typed(), vec!["rust async"]);
    assert_eq!(page.keys(), vec!["Enter"]);
}

#[tokio::test]
async fn sideways_scroll_is_invalid() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(&page, &action("scroll", "page", json!({ "direction": "sideways" }), 0.9))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::InvalidParameters));
    assert_eq!(outcome.message, "Invalid scroll direction: sideways");
    assert!(page.evaluated().is_empty());
}

#[tokio::test]
async fn scroll_down_runs_script() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(&page, &action("scroll", "page", json!({ "amount": 300 }), 0.9))
        .await;

    assert!(outcome.succeeded);
    assert_eq!(page.evaluated(), vec!["window.scrollBy(0, 300)"]);
}

#[tokio::test]
async fn navigate_without_url_fails() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(&page, &action("navigate", "docs page", json!({}), 0.9))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.message, "No URL specified for navigation");
    assert!(page.gotos().is_empty());
}

#[tokio::test]
async fn navigate_goes_to_url() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(
            &page,
            &action("navigate", "docs", json!({ "url": "https://example.com/docs" }), 0.9),
        )
        .await;

    assert!(outcome.succeeded);
    assert_eq!(page.current_url(), "https://example.com/docs");
}

#[tokio::test]
async fn unknown_kind_is_unsupported() {
    let page = FakePage::new("https://example.com");
    let outcome = executor()
        .execute(&page, &action("hover", "menu", json!({}), 0.9))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::Unsupported));
    assert_eq!(outcome.message, "Unsupported action type: hover");
}

#[tokio::test]
async fn wait_modes_validate_parameters() {
    let page = FakePage::new("https://example.com");
    let exec = executor();

    let outcome = exec
        .execute(&page, &action("wait", "spinner", json!({ "type": "element" }), 0.9))
        .await;
    assert_eq!(outcome.message, "No selector specified for element wait");

    let outcome = exec
        .execute(
            &page,
            &action("wait", "page", json!({ "type": "load_state", "state": "idle" }), 0.9),
        )
        .await;
    assert_eq!(outcome.message, "Invalid load state: idle");

    let outcome = exec
        .execute(&page, &action("wait", "page", json!({ "type": "forever" }), 0.9))
        .await;
    assert_eq!(outcome.message, "Invalid wait type: forever");

    let outcome = exec
        .execute(
            &page,
            &action("wait", "results", json!({ "type": "element", "selector": "#results", "timeout": 50 }), 0.9),
        )
        .await;
    assert_eq!(outcome.failure, Some(FailureKind::Timeout));
    assert_eq!(outcome.message, "Wait timeout: element");
}

#[tokio::test]
async fn extract_element_requires_selector() {
    let page = FakePage::new("https://example.com").with_element("#price", ElementSpec::visible("$42"));
    let exec = executor();

    let outcome = exec
        .execute(&page, &action("extract", "price", json!({ "type": "element" }), 0.9))
        .await;
    assert_eq!(outcome.message, "Invalid extraction type or missing selector: element");

    let outcome = exec
        .execute(
            &page,
            &action("extract", "price", json!({ "type": "element", "selector": "#price" }), 0.9),
        )
        .await;
    assert!(outcome.succeeded);
    assert_eq!(outcome.payload_str("content"), Some("$42"));
}

#[tokio::test]
async fn validate_page_state_reports_visible_errors() {
    let exec = executor();

    let ok = FakePage::new("https://example.com");
    assert_eq!(exec.validate_page_state(&ok).await, (true, "Page state is valid".to_string()));

    let loading = FakePage::new("https://example.com").with_ready_state("interactive");
    let (valid, message) = exec.validate_page_state(&loading).await;
    assert!(!valid);
    assert_eq!(message, "Page not fully loaded: interactive");

    let broken = FakePage::new("https://example.com")
        .with_element("error", ElementSpec::visible("Something went wrong"));
    let (valid, message) = exec.validate_page_state(&broken).await;
    assert!(!valid);
    assert_eq!(message, "Page error detected: Something went wrong");
}

#[tokio::test]
async fn mistyped_parameters_fail_without_touching_the_page() {
    let page = FakePage::new("https://example.com").with_element("#save", ElementSpec::visible("Save"));
    let outcome = executor()
        .execute(
            &page,
            &action("click", "Save", json!({ "selector": "#save", "force": "true" }), 0.9),
        )
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureKind::InvalidParameters));
    assert!(outcome.message.starts_with("Invalid click parameters:"), "{}", outcome.message);
    assert!(page.locates().is_empty());
}

#[tokio::test]
async fn scroll_direction_sets_the_sign() {
    let page = FakePage::new("https://example.com");
    let exec = executor();
    exec.execute(&page, &action("scroll", "page", json!({ "direction": "up", "amount": -300 }), 0.9))
        .await;
    exec.execute(&page, &action("scroll", "page", json!({ "direction": "down", "amount": -200 }), 0.9))
        .await;

    assert_eq!(
        page.evaluated(),
        vec!["window.scrollBy(0, -300)", "window.scrollBy(0, 200)"]
    );
}
