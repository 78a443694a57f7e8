// Flowdeck — Workflow backend abstraction

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Identity of a workflow definition. Compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowDefinitionId {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl WorkflowDefinitionId {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for WorkflowDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub id: WorkflowDefinitionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowInfo {
    pub fn new(id: WorkflowDefinitionId) -> Self {
        Self {
            id,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub id: WorkflowDefinitionId,
    pub input: String,
}

/// Result of a finished execution. `data` is whatever the workflow produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub mimetype: String,
    #[serde(default)]
    pub data: Value,
}

impl ExecutionResult {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            mimetype: "text/plain".into(),
            data: Value::String(data.into()),
        }
    }

    pub fn json(data: Value) -> Self {
        Self {
            mimetype: "application/json".into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend answered with an error object.
    #[error("{message}")]
    Rejected { code: Option<i64>, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("no response after {0:?}")]
    TimedOut(std::time::Duration),
}

impl BackendError {
    pub fn rejected(message: impl Into<String>) -> Self {
        BackendError::Rejected {
            code: None,
            message: message.into(),
        }
    }

    /// Text shown to the user for this failure.
    pub fn message(&self) -> String {
        match self {
            BackendError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(error_chain(&e))
        } else {
            BackendError::Transport(error_chain(&e))
        }
    }
}

/// `outer: cause: root cause`, so a refused connection reads differently
/// from a timeout.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn get_workflows(&self) -> Result<Vec<WorkflowInfo>, BackendError>;

    /// Raw input schema of a workflow, `None` when the workflow declares none.
    async fn get_input_schema(
        &self,
        id: &WorkflowDefinitionId,
    ) -> Result<Option<Value>, BackendError>;

    async fn execute_workflow(
        &self,
        request: &ExecuteRequest,
    ) -> Result<ExecutionResult, BackendError>;

    /// Number of workflows known to the backend.
    /// Default implementation counts the listing.
    async fn count_workflows(&self) -> Result<usize, BackendError> {
        Ok(self.get_workflows().await?.len())
    }
}

/// Find a listed workflow by name, optionally narrowed by namespace and version.
///
/// When several versions match and no version is given, the last one listed wins.
pub async fn resolve_workflow(
    backend: &dyn WorkflowBackend,
    name: &str,
    namespace: Option<&str>,
    version: Option<&str>,
) -> Result<Option<WorkflowInfo>, BackendError> {
    let workflows = backend.get_workflows().await?;
    Ok(workflows.into_iter().rev().find(|w| {
        w.id.name == name
            && namespace.is_none_or(|ns| w.id.namespace == ns)
            && version.is_none_or(|v| w.id.version == v)
    }))
}
