// Flowdeck — User notifications (fire-and-forget toasts)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a transient notification should appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    TopStart,
    TopCenter,
    TopEnd,
    Middle,
    BottomStart,
    BottomCenter,
    #[default]
    BottomEnd,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::TopStart => "top-start",
            Placement::TopCenter => "top-center",
            Placement::TopEnd => "top-end",
            Placement::Middle => "middle",
            Placement::BottomStart => "bottom-start",
            Placement::BottomCenter => "bottom-center",
            Placement::BottomEnd => "bottom-end",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifier delivers short-lived messages to the user. Nothing is returned.
pub trait Notifier: Send + Sync {
    fn show_error_message(&self, text: &str);
    fn show_success_message(&self, text: &str, placement: Placement);
}

/// Prints notifications to stderr. The log only sees them at debug level,
/// since the default subscriber writes to stderr too.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn show_error_message(&self, text: &str) {
        tracing::debug!(notification = "error", "{}", text);
        eprintln!("✖ {}", text);
    }

    fn show_success_message(&self, text: &str, placement: Placement) {
        tracing::debug!(notification = "success", placement = %placement, "{}", text);
        eprintln!("✔ {}", text);
    }
}
