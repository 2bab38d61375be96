//! End-to-end tests for Dispatcher over in-memory collaborators.

use std::sync::Arc;

use redrive_core::mock::{RecordingNotifier, RecordingQueue, StaticHistory};
use redrive_core::{
    Dispatcher, DispatcherConfig, Event, HistoryPage, Invocation, Outcome, RedriveError,
};
use serde_json::{Map, Value, json};

const ARN: &str = "arn:aws:states:us-west-2:123456789012:execution:capture-pipeline:run-42";
const QUEUE: &str = "https://sqs.us-west-2.amazonaws.com/123456789012/retry";
const TOPIC: &str = "arn:aws:sns:us-west-2:123456789012:failures";

struct Harness {
    dispatcher: Dispatcher,
    history: Arc<StaticHistory>,
    queue: Arc<RecordingQueue>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(history: StaticHistory, config: DispatcherConfig) -> Harness {
    let history = Arc::new(history);
    let queue = Arc::new(RecordingQueue::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = Dispatcher::new(history.clone(), queue.clone(), notifier.clone(), config);
    Harness {
        dispatcher,
        history,
        queue,
        notifier,
    }
}

fn failing_history() -> Vec<Event> {
    vec![
        Event::new(1, 0, "ExecutionStarted").with_detail(
            "executionStartedEventDetails",
            json!({"input": "{\"value\": 3}"}),
        ),
        Event::new(2, 1, "TaskStateEntered").with_detail(
            "stateEnteredEventDetails",
            json!({"name": "someState", "input": "{\"value\": \"3\"}"}),
        ),
        Event::new(3, 2, "LambdaFunctionFailed").with_detail(
            "lambdaFunctionFailedEventDetails",
            json!({"error": "ValueError", "cause": "{\"errorMessage\": \"ValueError\"}"}),
        ),
        Event::new(4, 3, "TaskStateEntered").with_detail(
            "stateEnteredEventDetails",
            json!({"name": "someOtherState", "input": "{\"value\": \"3\"}"}),
        ),
    ]
}

fn single_page(events: Vec<Event>) -> StaticHistory {
    StaticHistory::new(vec![HistoryPage {
        events,
        next_token: None,
    }])
}

fn start_input(value: Value) -> Map<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn body(h: &Harness, index: usize) -> Value {
    serde_json::from_str(&h.queue.sent()[index].body).unwrap()
}

#[tokio::test]
async fn test_first_failure_is_queued() {
    let h = harness(
        single_page(failing_history()),
        DispatcherConfig::new(QUEUE, TOPIC),
    );
    let invocation = Invocation::new(ARN, start_input(json!({"value": 3})));

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    let expected = json!({
        "value": "3",
        "resumeState": "someState",
        "stepFunctionFails": 1,
        "previousExecutions": [ARN]
    });
    assert!(matches!(outcome, Outcome::Retried(_)));
    assert_eq!(
        serde_json::to_value(outcome.record().unwrap()).unwrap(),
        expected
    );
    assert_eq!(h.queue.sent_count(), 1);
    assert_eq!(h.queue.sent()[0].queue_url, QUEUE);
    assert_eq!(body(&h, 0), expected);
    assert_eq!(h.notifier.published_count(), 0);
}

#[tokio::test]
async fn test_count_at_budget_is_retried() {
    let h = harness(
        single_page(failing_history()),
        DispatcherConfig::new(QUEUE, TOPIC).with_max_retries(6),
    );
    let invocation = Invocation::new(
        ARN,
        start_input(json!({
            "value": 3,
            "resumeState": "someState",
            "stepFunctionFails": 5,
            "previousExecutions": ["run-37", "run-38", "run-39", "run-40", "run-41"]
        })),
    );

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert!(matches!(outcome, Outcome::Retried(_)));
    assert_eq!(h.queue.sent_count(), 1);
    assert_eq!(h.notifier.published_count(), 0);
    let sent = body(&h, 0);
    assert_eq!(sent["stepFunctionFails"], json!(6));
    assert_eq!(sent["previousExecutions"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_count_over_budget_is_escalated() {
    let h = harness(
        single_page(failing_history()),
        DispatcherConfig::new(QUEUE, TOPIC)
            .with_max_retries(6)
            .with_stage("prod"),
    );
    let invocation = Invocation::new(
        ARN,
        start_input(json!({
            "value": 3,
            "resumeState": "someState",
            "stepFunctionFails": 6
        })),
    );

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert!(matches!(outcome, Outcome::Escalated(_)));
    assert_eq!(outcome.record().unwrap().step_function_fails, Some(7));
    assert_eq!(h.queue.sent_count(), 0);

    let published = h.notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic_arn, TOPIC);
    let subject = published[0].subject.as_deref().unwrap();
    assert!(subject.starts_with("Excessive Failures Reported on arn:aws:states"));
    assert!(subject.chars().count() <= 100);
    let message = &published[0].message;
    assert!(message.contains(ARN));
    assert!(message.contains("failed 7 time(s)"));
    assert!(message.contains("\"errorMessage\": \"ValueError\""));
    assert!(message.contains("$252Faws$252Flambda$252Fprod-someState"));
    assert!(message.contains("Source object: could not be determined"));
}

#[tokio::test]
async fn test_state_change_resets_count() {
    let h = harness(
        single_page(failing_history()),
        DispatcherConfig::new(QUEUE, TOPIC),
    );
    let invocation = Invocation::new(
        ARN,
        start_input(json!({"value": 3, "resumeState": "earlierState", "stepFunctionFails": 4})),
    );

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert!(matches!(outcome, Outcome::Retried(_)));
    assert_eq!(body(&h, 0)["stepFunctionFails"], json!(1));
    assert_eq!(body(&h, 0)["resumeState"], json!("someState"));
}

#[tokio::test]
async fn test_throttled_history_passes_start_input_through() {
    let h = harness(StaticHistory::throttled(), DispatcherConfig::new(QUEUE, TOPIC));
    let input = json!({"value": 3, "resumeState": "someState", "stepFunctionFails": 2});
    let invocation = Invocation::new(ARN, start_input(input.clone()));

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert!(matches!(outcome, Outcome::PassThrough(_)));
    assert_eq!(outcome.into_json().unwrap(), input);
    assert_eq!(h.history.call_count(), 1);
    assert_eq!(h.queue.sent_count(), 1);
    assert_eq!(body(&h, 0), input);
    assert_eq!(h.notifier.published_count(), 0);
}

#[tokio::test]
async fn test_pass_through_body_keeps_key_order() {
    let h = harness(StaticHistory::throttled(), DispatcherConfig::new(QUEUE, TOPIC));
    let raw = r#"{"value":3,"resumeState":"s","stepFunctionFails":"2","nested":{"z":1,"a":2}}"#;
    let invocation: Invocation =
        serde_json::from_str(&format!(r#"{{"executionArn":"{ARN}","startInput":{raw}}}"#))
            .unwrap();

    h.dispatcher.handle(&invocation).await.unwrap();

    assert_eq!(h.queue.sent()[0].body, raw);
}

#[tokio::test]
async fn test_badly_typed_count_is_treated_as_absent() {
    let h = harness(
        single_page(failing_history()),
        DispatcherConfig::new(QUEUE, TOPIC),
    );
    let invocation = Invocation::new(
        ARN,
        start_input(json!({"value": 3, "resumeState": "someState", "stepFunctionFails": "2"})),
    );

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert!(matches!(outcome, Outcome::Retried(_)));
    assert_eq!(body(&h, 0)["stepFunctionFails"], json!(1));
}

#[tokio::test]
async fn test_rejected_history_is_returned_to_caller() {
    let h = harness(
        StaticHistory::rejecting("AccessDeniedException: not authorized"),
        DispatcherConfig::new(QUEUE, TOPIC),
    );
    let invocation = Invocation::new(ARN, start_input(json!({"value": 3})));

    let err = h.dispatcher.handle(&invocation).await.unwrap_err();

    assert!(matches!(err, RedriveError::HistoryRejected(ref m) if m.contains("AccessDenied")));
    assert_eq!(h.queue.sent_count(), 0);
    assert_eq!(h.notifier.published_count(), 0);
}

#[tokio::test]
async fn test_malformed_history_needs_investigation() {
    let events = vec![
        Event::new(1, 0, "ExecutionStarted"),
        Event::new(2, 1, "TaskStateEntered").with_detail(
            "stateEnteredEventDetails",
            json!({"name": "someState", "input": "{}"}),
        ),
    ];
    let h = harness(single_page(events), DispatcherConfig::new(QUEUE, TOPIC));
    let invocation = Invocation::new(ARN, start_input(json!({"value": 3})));

    let outcome = h.dispatcher.handle(&invocation).await.unwrap();

    assert_eq!(outcome, Outcome::NeedsInvestigation);
    assert!(outcome.into_record().is_none());
    assert_eq!(h.queue.sent_count(), 0);
    let published = h.notifier.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].message.contains(ARN));
    assert!(
        published[0]
            .subject
            .as_deref()
            .unwrap()
            .starts_with("Unreadable Execution History for")
    );
}

#[tokio::test]
async fn test_history_across_pages() {
    let mut events = failing_history();
    let second = events.split_off(2);
    let history = StaticHistory::new(vec![
        HistoryPage {
            events,
            next_token: Some("page-2".to_string()),
        },
        HistoryPage {
            events: second,
            next_token: None,
        },
    ]);
    let h = harness(history, DispatcherConfig::new(QUEUE, TOPIC));

    let outcome = h
        .dispatcher
        .handle(&Invocation::new(ARN, start_input(json!({"value": 3}))))
        .await
        .unwrap();

    assert_eq!(h.history.call_count(), 2);
    assert_eq!(
        outcome.record().unwrap().resume_state.as_deref(),
        Some("someState")
    );
}

#[tokio::test]
async fn test_redelivery_produces_identical_body() {
    let config = DispatcherConfig::new(format!("{QUEUE}.fifo"), TOPIC);
    let first = harness(single_page(failing_history()), config.clone());
    let second = harness(single_page(failing_history()), config);
    let invocation = Invocation::new(ARN, start_input(json!({"value": 3})));

    first.dispatcher.handle(&invocation).await.unwrap();
    second.dispatcher.handle(&invocation).await.unwrap();

    let a = &first.queue.sent()[0];
    let b = &second.queue.sent()[0];
    assert_eq!(a.body, b.body);
    assert_eq!(a.options, b.options);
}
