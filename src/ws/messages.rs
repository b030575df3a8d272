//! Server → client control frames.
//!
//! Change notifications are the `{action, data}` envelopes produced by
//! [`crate::domain::ChangeEvent::to_frame`]; this module only holds the
//! frames a session emits on its own behalf.

use serde::Serialize;

/// Text of the confirmation sent once a session has joined its group.
pub const CONNECTION_ESTABLISHED_MESSAGE: &str = "You are now connected to the live product feed.";

/// Frames generated by the session itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Sent once after the session joins its group.
    ConnectionEstablished {
        /// Human-readable confirmation.
        message: String,
    },
}

impl ControlFrame {
    /// The standard join confirmation.
    #[must_use]
    pub fn connection_established() -> Self {
        Self::ConnectionEstablished {
            message: CONNECTION_ESTABLISHED_MESSAGE.to_string(),
        }
    }

    /// Renders the frame as JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`]; cannot happen for the
    /// current variants.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn connection_established_shape() {
        let Ok(text) = ControlFrame::connection_established().to_text() else {
            panic!("serialization failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            panic!("not JSON");
        };
        assert_eq!(
            value,
            serde_json::json!({
                "type": "connection_established",
                "message": CONNECTION_ESTABLISHED_MESSAGE,
            })
        );
    }
}
