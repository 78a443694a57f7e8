// Flowdeck — Form session state for the selected workflow

use crate::form::{FormModel, RawInput, SchemaForm};
use crate::rpc::{WorkflowDefinitionId, WorkflowInfo};
use std::fmt;

/// Identifies one asynchronous request. Only the newest token is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out strictly increasing tokens.
#[derive(Debug, Default)]
pub struct TokenIssuer {
    last: u64,
}

impl TokenIssuer {
    pub fn issue(&mut self) -> SessionToken {
        self.last += 1;
        SessionToken(self.last)
    }
}

/// How input is edited for the current workflow.
#[derive(Debug, Clone)]
pub enum InputMode {
    Schema(SchemaForm),
    Raw(RawInput),
}

/// Everything tied to one selected workflow. Dropped on deselection.
#[derive(Debug, Clone)]
pub struct FormSession {
    info: WorkflowInfo,
    token: SessionToken,
    input: InputMode,
}

impl FormSession {
    /// New session in raw mode; a schema may switch it to a form later.
    pub fn new(info: WorkflowInfo, token: SessionToken) -> Self {
        Self {
            info,
            token,
            input: InputMode::Raw(RawInput::default()),
        }
    }

    pub fn info(&self) -> &WorkflowInfo {
        &self.info
    }

    pub fn id(&self) -> &WorkflowDefinitionId {
        &self.info.id
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn input(&self) -> &InputMode {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputMode {
        &mut self.input
    }

    pub fn set_input(&mut self, input: InputMode) {
        self.input = input;
    }

    pub fn form(&self) -> Option<&SchemaForm> {
        match &self.input {
            InputMode::Schema(form) => Some(form),
            InputMode::Raw(_) => None,
        }
    }

    pub fn model(&self) -> Option<&FormModel> {
        self.form().map(SchemaForm::model)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.input, InputMode::Raw(_))
    }

    /// Text submitted on execution: the form's canonical JSON or the raw buffer.
    pub fn canonical_input(&self) -> &str {
        match &self.input {
            InputMode::Schema(form) => form.canonical_text(),
            InputMode::Raw(raw) => raw.text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_increase() {
        let mut issuer = TokenIssuer::default();
        let a = issuer.issue();
        let b = issuer.issue();
        assert!(b > a);
        assert_eq!(a.value(), 1);
        assert_eq!(b.to_string(), "#2");
    }

    #[test]
    fn test_new_session_starts_raw() {
        let info = WorkflowInfo::new(WorkflowDefinitionId::new("ns", "wf", "1"));
        let session = FormSession::new(info, SessionToken::new(7));
        assert!(session.is_raw());
        assert!(session.model().is_none());
        assert_eq!(session.canonical_input(), "");
    }
}
