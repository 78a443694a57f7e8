// Flowdeck — Workflow execution lifecycle
//
// Idle -> Loading -> Completed | Failed, and back to Loading on every new
// submission. Each submission carries a session token; a reply whose token
// is no longer the active one is dropped without touching state or output.

use crate::notify::Notifier;
use crate::rpc::{
    BackendError, ExecuteRequest, ExecutionResult, WorkflowBackend, WorkflowDefinitionId,
};
use crate::session::SessionToken;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Output shown before anything has run.
pub const IDLE_OUTPUT: &str = "# Your workflow output will be displayed here";

/// Heading of the inline block shown when an execution fails.
pub const ERROR_HEADING: &str = "# Error";

const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Loading,
    Completed,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("No workflow selected.")]
    MissingSelection,
    #[error("Error while executing workflow: {message}")]
    Failed { message: String },
}

/// Outcome of feeding a reply back into the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Completed,
    Failed(ExecutionError),
    /// Reply belonged to a superseded submission and was dropped.
    Stale,
}

/// A submission that has been accepted and is waiting to be sent.
#[derive(Debug, Clone)]
pub struct PendingExecution {
    pub token: SessionToken,
    pub request: ExecuteRequest,
}

#[derive(Debug)]
pub struct ExecutionReply {
    pub token: SessionToken,
    pub result: Result<ExecutionResult, BackendError>,
}

impl PendingExecution {
    /// Send the request. Never fails: errors are carried in the reply.
    pub async fn dispatch(
        self,
        backend: &dyn WorkflowBackend,
        timeout: Option<Duration>,
    ) -> ExecutionReply {
        tracing::info!(workflow = %self.request.id, token = %self.token, input_len = self.request.input.len(), "Executing workflow");
        let call = backend.execute_workflow(&self.request);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(BackendError::TimedOut(limit))),
            None => call.await,
        };
        ExecutionReply {
            token: self.token,
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Output formatting
// ---------------------------------------------------------------------------

/// Render a result for display.
///
/// `text/plain` data is shown verbatim. Anything else is pretty-printed as
/// JSON, falling back to a plain string rendering.
pub fn format_output(result: &ExecutionResult) -> String {
    if result.mimetype == TEXT_PLAIN {
        if let Value::String(s) = &result.data {
            return s.clone();
        }
    }
    serde_json::to_string_pretty(&result.data).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Result not serializable, using string form");
        plain_string(&result.data)
    })
}

fn plain_string(data: &Value) -> String {
    match data {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn error_block(message: &str) -> String {
    format!("{}\n\n{}", ERROR_HEADING, message)
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct ExecutionController {
    state: ExecutionState,
    output: String,
    active: Option<SessionToken>,
    notifier: Arc<dyn Notifier>,
}

impl ExecutionController {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: ExecutionState::Idle,
            output: IDLE_OUTPUT.to_string(),
            active: None,
            notifier,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == ExecutionState::Loading
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Accept a submission and enter `Loading`.
    pub fn begin(
        &mut self,
        workflow: Option<&WorkflowDefinitionId>,
        input: &str,
        token: SessionToken,
    ) -> Result<PendingExecution, ExecutionError> {
        let Some(id) = workflow else {
            let err = ExecutionError::MissingSelection;
            self.notifier.show_error_message(&err.to_string());
            return Err(err);
        };

        if self.is_loading() {
            tracing::debug!(workflow = %id, token = %token, "Superseding in-flight execution");
        }
        self.state = ExecutionState::Loading;
        self.active = Some(token);

        Ok(PendingExecution {
            token,
            request: ExecuteRequest {
                id: id.clone(),
                input: input.to_string(),
            },
        })
    }

    /// Apply a reply if it belongs to the active submission.
    pub fn complete(&mut self, reply: ExecutionReply) -> Completion {
        if self.active != Some(reply.token) {
            tracing::debug!(token = %reply.token, "Discarding stale execution reply");
            return Completion::Stale;
        }

        let completion = match reply.result {
            Ok(result) => {
                tracing::info!(mimetype = %result.mimetype, "Workflow completed");
                self.output = format_output(&result);
                self.state = ExecutionState::Completed;
                Completion::Completed
            }
            Err(e) => {
                let message = e.message();
                tracing::warn!(error = %message, "Workflow execution failed");
                self.output = error_block(&message);
                let err = ExecutionError::Failed { message };
                self.notifier.show_error_message(&err.to_string());
                self.state = ExecutionState::Failed;
                Completion::Failed(err)
            }
        };

        self.active = None;
        completion
    }

    pub fn reset(&mut self) {
        self.state = ExecutionState::Idle;
        self.output = IDLE_OUTPUT.to_string();
        self.active = None;
    }
}
