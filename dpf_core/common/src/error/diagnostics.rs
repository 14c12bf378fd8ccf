use serde::{Serialize, Serializer};
use std::{borrow::Cow, fmt, panic::Location};

/// Error message that remembers where it was raised.
///
/// Run logs and alerts only ever see [`DiagnosticMessage::message`]; the
/// call-site is kept for operator-facing `Display` output (CLI, server logs).
/// Use [`DiagnosticMessage::new`] or the [`diag!`] macro.
#[derive(Clone, Debug)]
pub struct DiagnosticMessage {
    message: Cow<'static, str>,
    location: &'static Location<'static>,
}

impl DiagnosticMessage {
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// The bare message, without location.
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (at {}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

// API payloads carry only the message; file/line are server-side detail.
impl Serialize for DiagnosticMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.message())
    }
}

/// `format!`-style constructor for [`DiagnosticMessage`] that captures the
/// call-site.
#[macro_export]
macro_rules! diag {
    ($msg:literal $(,)?) => {
        $crate::error::diagnostics::DiagnosticMessage::new($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::diagnostics::DiagnosticMessage::new(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_call_site() {
        let msg = DiagnosticMessage::new("job not found");
        let rendered = msg.to_string();
        assert!(rendered.starts_with("job not found (at "));
        assert!(rendered.contains("diagnostics.rs"));
    }

    #[test]
    fn serializes_message_only() {
        let msg = crate::diag!("source {} missing", "orders");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(json, "\"source orders missing\"");
    }
}
