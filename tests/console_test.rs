use async_trait::async_trait;
use flowdeck::console::{ConsoleError, WorkflowConsole};
use flowdeck::execution::{Completion, ExecutionError, ExecutionState, IDLE_OUTPUT};
use flowdeck::notify::{Notifier, Placement};
use flowdeck::rpc::{
    BackendError, ExecuteRequest, ExecutionResult, WorkflowBackend, WorkflowDefinitionId,
    WorkflowInfo,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBackend {
    schema: Option<Value>,
    schema_error: Option<String>,
    reply: Option<Result<ExecutionResult, String>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ExecuteRequest>>,
}

impl FakeBackend {
    fn with_schema(schema: Value) -> Self {
        Self {
            schema: Some(schema),
            ..Default::default()
        }
    }

    fn replying(mut self, reply: Result<ExecutionResult, &str>) -> Self {
        self.reply = Some(reply.map_err(str::to_string));
        self
    }

    fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowBackend for FakeBackend {
    async fn get_workflows(&self) -> Result<Vec<WorkflowInfo>, BackendError> {
        Ok(vec![info()])
    }

    async fn get_input_schema(
        &self,
        _id: &WorkflowDefinitionId,
    ) -> Result<Option<Value>, BackendError> {
        match &self.schema_error {
            Some(msg) => Err(BackendError::rejected(msg.clone())),
            None => Ok(self.schema.clone()),
        }
    }

    async fn execute_workflow(
        &self,
        request: &ExecuteRequest,
    ) -> Result<ExecutionResult, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(msg)) => Err(BackendError::rejected(msg.clone())),
            None => Ok(ExecutionResult::text("")),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn show_error_message(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }

    fn show_success_message(&self, _text: &str, _placement: Placement) {}
}

fn info() -> WorkflowInfo {
    WorkflowInfo::new(WorkflowDefinitionId::new("org.acme", "greet", "1.0.0"))
        .with_description("Says hello")
}

fn other_info() -> WorkflowInfo {
    WorkflowInfo::new(WorkflowDefinitionId::new("org.acme", "order", "1.0.0"))
}

fn person_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer"}
        },
        "required": ["name"]
    })
}

fn console_with(
    backend: FakeBackend,
) -> (WorkflowConsole, Arc<FakeBackend>, Arc<RecordingNotifier>) {
    flowdeck::logger::init_test();
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::default());
    let console = WorkflowConsole::new(backend.clone(), notifier.clone());
    (console, backend, notifier)
}

fn parsed(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

// ---------------------------------------------------------------------------
// Schema mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_schema_load_builds_default_model() {
    let (mut console, _, _) = console_with(FakeBackend::with_schema(person_schema()));
    let session = console.select_and_load(info()).await.unwrap();

    assert!(!session.is_raw());
    assert_eq!(session.model().unwrap().to_value(), json!({"name": "", "age": 0}));
    assert_eq!(parsed(session.canonical_input()), json!({"name": "", "age": 0}));
    assert_eq!(console.execution_state(), ExecutionState::Idle);
}

#[tokio::test]
async fn test_field_edit_regenerates_canonical_input() {
    let (mut console, _, _) = console_with(FakeBackend::with_schema(person_schema()));
    console.select_and_load(info()).await;

    console.edit_field("age", &json!("5")).unwrap();
    let session = console.session().unwrap();
    assert_eq!(session.model().unwrap().to_value(), json!({"name": "", "age": 5}));
    assert_eq!(
        console.canonical_input().unwrap(),
        "{\n  \"name\": \"\",\n  \"age\": 5\n}"
    );
}

#[tokio::test]
async fn test_invalid_json_edit_is_reported_and_submission_uses_last_valid_model() {
    let schema = json!({
        "properties": {
            "items": {"type": "array"},
            "note": {"type": "string"}
        }
    });
    let (mut console, backend, notifier) = console_with(
        FakeBackend::with_schema(schema).replying(Ok(ExecutionResult::text("ok"))),
    );
    console.select_and_load(info()).await;

    console.edit_field("items", &json!("[\"a\"]")).unwrap();
    let err = console.edit_field("items", &json!("[\"a\",")).unwrap_err();
    assert!(matches!(err, ConsoleError::Field(ref e) if e.field() == "items"));
    console.edit_field("note", &json!("still editable")).unwrap();

    let errors = notifier.errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Invalid JSON for 'items':"));

    console.execute().await.unwrap();
    let sent = backend.requests();
    assert_eq!(
        parsed(&sent[0].input),
        json!({"items": ["a"], "note": "still editable"})
    );
}

#[tokio::test]
async fn test_raw_input_is_refused_in_schema_mode() {
    let (mut console, _, _) = console_with(FakeBackend::with_schema(person_schema()));
    console.select_and_load(info()).await;
    assert_eq!(
        console.set_raw_input("{}"),
        Err(ConsoleError::SchemaMode("greet".into()))
    );
}

// ---------------------------------------------------------------------------
// Raw fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_null_schema_falls_back_and_submits_raw_buffer_verbatim() {
    let (mut console, backend, _) =
        console_with(FakeBackend::default().replying(Ok(ExecutionResult::text("done"))));
    let session = console.select_and_load(info()).await.unwrap();
    assert!(session.is_raw());

    console.set_raw_input("  not even {json").unwrap();
    assert_eq!(
        console.edit_field("name", &json!("x")),
        Err(ConsoleError::RawMode("greet".into()))
    );

    assert_eq!(console.execute().await.unwrap(), "done");
    let sent = backend.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].input, "  not even {json");
    assert_eq!(sent[0].id, info().id);
}

#[tokio::test]
async fn test_schema_load_error_is_not_fatal() {
    let backend = FakeBackend {
        schema_error: Some("backend down".into()),
        ..Default::default()
    };
    let (mut console, _, notifier) = console_with(backend);
    let session = console.select_and_load(info()).await.unwrap();
    assert!(session.is_raw());
    assert!(notifier.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_properties_fall_back() {
    let (mut console, _, _) =
        console_with(FakeBackend::with_schema(json!({"type": "object", "properties": {}})));
    assert!(console.select_and_load(info()).await.unwrap().is_raw());
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_execute_without_selection_makes_no_call() {
    let (mut console, backend, notifier) = console_with(FakeBackend::default());
    let err = console.execute().await.unwrap_err();
    assert_eq!(err, ConsoleError::Execution(ExecutionError::MissingSelection));
    assert!(backend.requests().is_empty());
    assert_eq!(console.execution_state(), ExecutionState::Idle);
    assert_eq!(
        notifier.errors.lock().unwrap().as_slice(),
        ["No workflow selected."]
    );
}

#[tokio::test]
async fn test_structured_result_is_pretty_printed() {
    let (mut console, _, _) = console_with(
        FakeBackend::with_schema(person_schema())
            .replying(Ok(ExecutionResult::json(json!({"greeting": "Hello, Ada"})))),
    );
    console.select_and_load(info()).await;
    console.edit_field("name", &json!("Ada")).unwrap();

    let output = console.execute().await.unwrap();
    assert_eq!(output, "{\n  \"greeting\": \"Hello, Ada\"\n}");
    assert_eq!(console.execution_state(), ExecutionState::Completed);
    assert!(!console.is_loading());
}

#[tokio::test]
async fn test_rejected_execution_shows_error_block() {
    let (mut console, _, notifier) =
        console_with(FakeBackend::default().replying(Err("timeout")));
    console.select_and_load(info()).await;

    let err = console.execute().await.unwrap_err();
    assert_eq!(
        err,
        ConsoleError::Execution(ExecutionError::Failed {
            message: "timeout".into()
        })
    );
    assert_eq!(console.output(), "# Error\n\ntimeout");
    assert!(!console.is_loading());
    assert_eq!(console.execution_state(), ExecutionState::Failed);
    assert_eq!(
        notifier.errors.lock().unwrap().as_slice(),
        ["Error while executing workflow: timeout"]
    );
}

#[tokio::test]
async fn test_execution_timeout_forces_failure() {
    let backend = FakeBackend {
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let (console, _, _) = console_with(backend);
    let mut console = console.with_execution_timeout(Some(Duration::from_millis(50)));
    console.select_and_load(info()).await;

    let err = console.execute().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Execution(ExecutionError::Failed { .. })));
    assert_eq!(console.execution_state(), ExecutionState::Failed);
    assert!(console.output().starts_with("# Error\n\nno response after"));
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stale_schema_reply_is_discarded() {
    let (mut console, _, _) = console_with(FakeBackend::with_schema(person_schema()));

    let first = console.select(info());
    let first_reply = console.load_schema(first).await;

    let second = console.select(other_info());
    let second_reply = console.load_schema(second).await;

    assert!(console.apply_schema(second_reply));
    // The earlier selection's reply arrives late.
    assert!(!console.apply_schema(first_reply));

    let session = console.session().unwrap();
    assert_eq!(session.id().name, "order");
    assert!(!session.is_raw());
}

#[tokio::test]
async fn test_stale_execution_reply_does_not_overwrite_output() {
    let (mut console, backend, _) =
        console_with(FakeBackend::default().replying(Ok(ExecutionResult::text("result"))));
    console.select_and_load(info()).await;

    console.set_raw_input("first").unwrap();
    let first = console.start_execution().unwrap();
    console.set_raw_input("second").unwrap();
    let second = console.start_execution().unwrap();

    let first_reply = first.dispatch(backend.as_ref(), None).await;
    let second_reply = second.dispatch(backend.as_ref(), None).await;

    assert_eq!(console.finish_execution(second_reply), Completion::Completed);
    assert_eq!(console.finish_execution(first_reply), Completion::Stale);
    assert_eq!(console.execution_state(), ExecutionState::Completed);
    assert_eq!(backend.requests()[1].input, "second");
}

#[tokio::test]
async fn test_reset_discards_session_and_in_flight_execution() {
    let (mut console, backend, _) =
        console_with(FakeBackend::default().replying(Ok(ExecutionResult::text("late"))));
    console.select_and_load(info()).await;
    let pending = console.start_execution().unwrap();
    assert!(console.is_loading());

    console.reset();
    assert!(console.session().is_none());
    assert_eq!(console.execution_state(), ExecutionState::Idle);

    let reply = pending.dispatch(backend.as_ref(), None).await;
    assert_eq!(console.finish_execution(reply), Completion::Stale);
    assert_eq!(console.output(), IDLE_OUTPUT);
}
