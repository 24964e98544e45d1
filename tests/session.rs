mod common;

use common::{action, fast_config, ElementSpec, FakeFactory, FakePage, RepeatDecision, ScriptedDecisions};
use eoka_navigator::{ErrorKind, Navigator, PagePool, SessionRequest};
use serde_json::json;
use std::sync::Arc;

const START: &str = "https://example.com/";

#[tokio::test]
async fn session_stops_at_turn_limit() {
    let page = FakePage::new("about:blank");
    let navigator = Navigator::new(
        &fast_config(),
        RepeatDecision(action("scroll", "page", json!({ "direction": "down" }), 0.9)),
    );

    let report = navigator
        .run(&page, SessionRequest::new(START, "read everything").max_turns(3))
        .await;

    assert_eq!(report.turns_allowed, 3);
    assert_eq!(report.total_actions, 3);
    assert_eq!(report.actions_taken.len(), 3);
    assert!(report.errors.is_empty());
    assert_eq!(report.navigation_path, vec![START]);
    assert!(!report.successful_navigation);
    assert!(!report.made_progress());
    // nothing was extracted, so the final page summary fills in
    assert_eq!(report.extracted_content["final_url"], START);
    assert_eq!(report.final_url, START);
}

#[tokio::test]
async fn failed_click_then_extract_records_one_error() {
    let page = FakePage::new("about:blank").with_title("Pricing");
    let decisions = ScriptedDecisions::new(vec![
        action("click", "the \"Enterprise\" tab", json!({}), 0.8),
        action("extract", "pricing table", json!({ "extract_title": true, "extract_text": false }), 0.9),
    ]);
    let navigator = Navigator::new(&fast_config(), decisions);

    let report = navigator
        .run(&page, SessionRequest::new(START, "find enterprise pricing"))
        .await;

    assert_eq!(report.total_actions, 2);
    assert_eq!(report.errors.len(), 1);
    let err = &report.errors[0];
    assert_eq!(err.kind, ErrorKind::StrategyExhausted);
    assert_eq!(err.turn, 1);
    assert_eq!(err.action_type.as_deref(), Some("click"));
    assert!(err.details.as_ref().unwrap()["strategies_tried"].as_u64().unwrap() > 0);

    assert_eq!(report.extracted_content["title"], "Pricing");
    assert!(report.extracted_content.contains_key("extraction_metadata"));
    assert!(!report.extracted_content.contains_key("final_title"));
    assert!(report.made_progress());
    assert!(!report.has_fault());
    assert!(report.actions_taken[0].outcome.is_some());
    assert!(report.actions_taken[1].outcome.is_none());
}

#[tokio::test]
async fn successful_click_records_navigation_and_strategy() {
    let page = FakePage::new("about:blank").with_element(
        "#docs",
        ElementSpec::navigating("Docs", "https://example.com/docs"),
    );
    let navigator = Navigator::new(
        &fast_config(),
        ScriptedDecisions::new(vec![action(
            "click",
            "Docs link in header",
            json!({ "selector": "#docs" }),
            0.9,
        )]),
    );

    let report = navigator
        .run(&page, SessionRequest::new(START, "open the docs").max_turns(1))
        .await;

    assert_eq!(report.total_actions, 1);
    assert_eq!(
        report.navigation_path,
        vec![START.to_string(), "https://example.com/docs".to_string()]
    );
    assert!(report.successful_navigation);
    assert_eq!(report.strategies_learned, 1);
    assert_eq!(report.strategies_used[0].strategy, "explicit");
    assert_eq!(report.strategies_used[0].selector, "#docs");
    assert_eq!(report.final_url, "https://example.com/docs");
    assert_eq!(report.extracted_content["final_url"], "https://example.com/docs");
    assert!(report.made_progress());
}

#[tokio::test]
async fn decision_error_ends_session() {
    let page = FakePage::new("about:blank");
    let navigator = Navigator::new(&fast_config(), ScriptedDecisions::default());

    let report = navigator.run(&page, SessionRequest::new(START, "anything")).await;

    assert_eq!(report.total_actions, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::DecisionServiceFault);
    assert_eq!(report.errors[0].message, "no scripted action left");
    assert!(report.has_fault());
}

#[tokio::test]
async fn start_navigation_failure_is_a_session_fault() {
    let page = FakePage::new("about:blank").failing_goto();
    let decisions = Arc::new(ScriptedDecisions::default());
    let navigator = Navigator::new(&fast_config(), decisions.clone());

    let report = navigator.run(&page, SessionRequest::new(START, "anything")).await;

    assert_eq!(report.total_actions, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::SessionFault);
    assert_eq!(report.errors[0].turn, 0);
    assert!(report.has_fault());
    assert!(report.extracted_content.is_empty());
    assert!(decisions.history_lengths().is_empty());
}

#[tokio::test]
async fn low_confidence_turn_is_logged_and_loop_continues() {
    let page = FakePage::new("about:blank").with_element("#x", ElementSpec::visible("X"));
    let navigator = Navigator::new(
        &fast_config(),
        ScriptedDecisions::new(vec![
            action("click", "X", json!({ "selector": "#x" }), 0.1),
            action("extract", "page", json!({}), 0.9),
        ]),
    );

    let report = navigator.run(&page, SessionRequest::new(START, "guess")).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::LowConfidenceRejection);
    assert!(page.locates().is_empty());
    assert_eq!(report.total_actions, 2);
}

#[tokio::test]
async fn mistyped_parameters_are_recoverable() {
    let page = FakePage::new("about:blank").with_title("Feed");
    let navigator = Navigator::new(
        &fast_config(),
        ScriptedDecisions::new(vec![
            action("scroll", "feed", json!({ "direction": "up", "amount": [300] }), 0.9),
            action("extract", "feed", json!({}), 0.9),
        ]),
    );

    let report = navigator.run(&page, SessionRequest::new(START, "read the feed")).await;

    assert_eq!(report.total_actions, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::ActionFailed);
    assert!(report.errors[0].message.starts_with("Invalid scroll parameters:"));
    assert!(!report.has_fault());
    assert_eq!(report.extracted_content["title"], "Feed");
}

#[tokio::test]
async fn unreadable_snapshot_url_does_not_repeat_the_start() {
    // the snapshot's url read fails, the post-action read succeeds
    let page = FakePage::new("about:blank").failing_url_reads(1);
    let navigator = Navigator::new(
        &fast_config(),
        ScriptedDecisions::new(vec![action("scroll", "page", json!({ "direction": "down" }), 0.9)]),
    );

    let report = navigator
        .run(&page, SessionRequest::new(START, "skim").max_turns(1))
        .await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.actions_taken[0].page_url, "");
    assert_eq!(report.navigation_path, vec![START]);
    assert!(!report.successful_navigation);
}

#[tokio::test]
async fn report_carries_conversation_summary() {
    let page = FakePage::new("about:blank");
    let navigator = Navigator::new(
        &fast_config(),
        ScriptedDecisions::new(vec![
            action("scroll", "page", json!({}), 0.9),
            action("extract", "headline", json!({}), 0.9),
        ]),
    );

    let report = navigator.run(&page, SessionRequest::new(START, "read the news")).await;

    let lines: Vec<&str> = report.conversation_summary.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Navigation History:",
            "1. Goal: read the news -> Action: scroll -> page",
            "2. Goal: read the news -> Action: extract -> headline",
        ]
    );

    let failed = navigator
        .run(&FakePage::new("about:blank").failing_goto(), SessionRequest::new(START, "x"))
        .await;
    assert_eq!(failed.conversation_summary, "No navigation history");
}

#[tokio::test]
async fn history_grows_each_turn() {
    let page = FakePage::new("about:blank");
    let decisions = Arc::new(ScriptedDecisions::new(vec![
        action("scroll", "page", json!({}), 0.9),
        action("scroll", "page", json!({}), 0.9),
        action("scroll", "page", json!({}), 0.9),
        action("scroll", "page", json!({}), 0.9),
    ]));
    let navigator = Navigator::new(&fast_config(), decisions.clone());

    navigator
        .run(&page, SessionRequest::new(START, "scroll").max_turns(4))
        .await;

    // window of 3 recent turns
    assert_eq!(decisions.history_lengths(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn run_all_returns_reports_in_request_order() {
    let pool = Arc::new(PagePool::new(FakeFactory::default(), 2));
    let navigator = Arc::new(Navigator::new(
        &fast_config(),
        RepeatDecision(action("extract", "page", json!({}), 0.9)),
    ));
    let requests = vec![
        SessionRequest::new("https://a.example/", "a"),
        SessionRequest::new("https://b.example/", "b"),
        SessionRequest::new("https://c.example/", "c"),
    ];

    let reports = navigator.run_all(pool.clone(), requests).await;

    let goals: Vec<&str> = reports.iter().map(|r| r.goal.as_str()).collect();
    assert_eq!(goals, vec!["a", "b", "c"]);
    assert_eq!(reports[1].final_url, "https://b.example/");
    assert!(reports.iter().all(|r| r.made_progress() && !r.has_fault()));
    assert_eq!(pool.factory().created(), 3);
    assert_eq!(pool.available(), 2);
}
