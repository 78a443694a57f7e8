// Flowdeck — Raw input buffer for workflows without a usable schema

/// Free-form input text. Submitted exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInput {
    buffer: String,
}

impl RawInput {
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
