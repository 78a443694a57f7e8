// Flowdeck — Workflow console: selection, input editing and execution
//
// The console owns the single active FormSession and the execution state.
// Schema loads and executions are split into a request step and an apply
// step so replies can be checked against the active session token.

use crate::execution::{
    Completion, ExecutionController, ExecutionError, ExecutionReply, ExecutionState,
    PendingExecution,
};
use crate::form::{FieldValidationError, SchemaForm};
use crate::notify::Notifier;
use crate::rpc::{BackendError, WorkflowBackend, WorkflowDefinitionId, WorkflowInfo};
use crate::schema::{interpret, Interpretation};
use crate::session::{FormSession, InputMode, SessionToken, TokenIssuer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Field(#[from] FieldValidationError),
    #[error("No workflow selected.")]
    NoSession,
    #[error("'{0}' has no input schema; edit the raw input instead")]
    RawMode(String),
    #[error("'{0}' has an input form; edit its fields instead")]
    SchemaMode(String),
}

/// A schema fetch issued for a selection.
#[derive(Debug, Clone)]
pub struct SchemaRequest {
    pub token: SessionToken,
    pub id: WorkflowDefinitionId,
}

#[derive(Debug)]
pub struct SchemaReply {
    pub token: SessionToken,
    pub result: Result<Option<Value>, BackendError>,
}

impl SchemaRequest {
    pub async fn dispatch(self, backend: &dyn WorkflowBackend) -> SchemaReply {
        tracing::debug!(workflow = %self.id, token = %self.token, "Fetching input schema");
        let result = backend.get_input_schema(&self.id).await;
        SchemaReply {
            token: self.token,
            result,
        }
    }
}

pub struct WorkflowConsole {
    backend: Arc<dyn WorkflowBackend>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenIssuer,
    session: Option<FormSession>,
    execution: ExecutionController,
    execution_timeout: Option<Duration>,
}

impl WorkflowConsole {
    pub fn new(backend: Arc<dyn WorkflowBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            execution: ExecutionController::new(notifier.clone()),
            notifier,
            tokens: TokenIssuer::default(),
            session: None,
            execution_timeout: None,
        }
    }

    /// Fail executions that take longer than `timeout`.
    pub fn with_execution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn session(&self) -> Option<&FormSession> {
        self.session.as_ref()
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.execution.state()
    }

    pub fn is_loading(&self) -> bool {
        self.execution.is_loading()
    }

    pub fn output(&self) -> &str {
        self.execution.output()
    }

    /// Text that the next execution will submit.
    pub fn canonical_input(&self) -> Option<&str> {
        self.session.as_ref().map(FormSession::canonical_input)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Start a session for `info`. The returned request fetches its schema.
    pub fn select(&mut self, info: WorkflowInfo) -> SchemaRequest {
        let token = self.tokens.issue();
        tracing::info!(workflow = %info.id, token = %token, "Workflow selected");

        let request = SchemaRequest {
            token,
            id: info.id.clone(),
        };
        self.session = Some(FormSession::new(info, token));
        self.execution.reset();
        request
    }

    /// Apply a schema reply. Returns `false` if it was stale and dropped.
    pub fn apply_schema(&mut self, reply: SchemaReply) -> bool {
        let Some(session) = self.session.as_mut().filter(|s| s.token() == reply.token) else {
            tracing::debug!(token = %reply.token, "Discarding stale schema reply");
            return false;
        };

        let schema = match reply.result {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(workflow = %session.id(), error = %e, "Error fetching input schema");
                None
            }
        };

        match interpret(schema.as_ref()) {
            Interpretation::Fields(fields) => {
                tracing::info!(workflow = %session.id(), fields = fields.len(), "Input form ready");
                session.set_input(InputMode::Schema(SchemaForm::new(fields)));
            }
            Interpretation::NoUsableSchema(reason) => {
                tracing::info!(workflow = %session.id(), reason = %reason, "Using raw input");
                if !session.is_raw() {
                    session.set_input(InputMode::Raw(Default::default()));
                }
            }
        }
        true
    }

    pub async fn load_schema(&self, request: SchemaRequest) -> SchemaReply {
        request.dispatch(self.backend.as_ref()).await
    }

    /// Select a workflow and wait for its schema.
    pub async fn select_and_load(&mut self, info: WorkflowInfo) -> Option<&FormSession> {
        let request = self.select(info);
        let reply = self.load_schema(request).await;
        self.apply_schema(reply);
        self.session.as_ref()
    }

    /// Drop the session and return to idle.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(workflow = %session.id(), "Workflow deselected");
        }
        self.execution.reset();
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Apply a raw edit to a form field. Invalid input is reported to the
    /// user and leaves the rest of the form intact.
    pub fn edit_field(&mut self, name: &str, raw: &Value) -> Result<(), ConsoleError> {
        let session = self.session.as_mut().ok_or(ConsoleError::NoSession)?;
        let workflow = session.id().name.clone();
        let InputMode::Schema(form) = session.input_mut() else {
            return Err(ConsoleError::RawMode(workflow));
        };

        form.edit(name, raw).map_err(|e| {
            tracing::warn!(field = %e.field(), error = %e, "Rejected field edit");
            self.notifier.show_error_message(&e.to_string());
            ConsoleError::from(e)
        })
    }

    /// Replace the raw input buffer.
    pub fn set_raw_input(&mut self, text: impl Into<String>) -> Result<(), ConsoleError> {
        let session = self.session.as_mut().ok_or(ConsoleError::NoSession)?;
        let workflow = session.id().name.clone();
        match session.input_mut() {
            InputMode::Raw(raw) => {
                raw.set_text(text);
                Ok(())
            }
            InputMode::Schema(_) => Err(ConsoleError::SchemaMode(workflow)),
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    pub fn start_execution(&mut self) -> Result<PendingExecution, ExecutionError> {
        let token = self.tokens.issue();
        let (id, input) = match &self.session {
            Some(s) => (Some(s.id()), s.canonical_input()),
            None => (None, ""),
        };
        self.execution.begin(id, input, token)
    }

    pub fn finish_execution(&mut self, reply: ExecutionReply) -> Completion {
        self.execution.complete(reply)
    }

    /// Submit the current input and wait for the result.
    pub async fn execute(&mut self) -> Result<&str, ConsoleError> {
        let pending = self.start_execution()?;
        let reply = pending
            .dispatch(self.backend.as_ref(), self.execution_timeout)
            .await;
        match self.finish_execution(reply) {
            Completion::Failed(e) => Err(e.into()),
            Completion::Completed | Completion::Stale => Ok(self.execution.output()),
        }
    }
}
