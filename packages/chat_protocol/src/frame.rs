//! Frames exchanged over the streaming connection.

use serde::{Deserialize, Serialize};

/// Errors raised while decoding or encoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has no type discriminator")]
    MissingType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

/// User text sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
}

impl OutboundFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Frames sent FROM the backend TO the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Incremental fragment of the agent response being streamed.
    Token { content: String },

    /// Completion signal. Carries the full response only when the backend
    /// did not stream it.
    AgentMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default)]
        done: bool,
    },

    /// Backend failed to produce a response. `content` is diagnostic only.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    /// Echo of the user's own text.
    UserMessage {
        #[serde(default)]
        content: String,
    },
}

impl InboundFrame {
    const KNOWN_TYPES: [&'static str; 4] = ["token", "agent_message", "error", "user_message"];

    /// Decode one text frame.
    ///
    /// Unknown discriminators are reported separately from malformed JSON so
    /// callers can log them differently; both are meant to be dropped.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(FrameError::MissingType)?
            .to_owned();
        if !Self::KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(FrameError::UnknownType(kind));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether this frame ends the "waiting for a response" state.
    pub fn ends_loading(&self) -> bool {
        matches!(
            self,
            InboundFrame::Token { .. } | InboundFrame::AgentMessage { .. } | InboundFrame::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_serializes_message_field() {
        let json = OutboundFrame::new("hi there").to_json().unwrap();
        assert_eq!(json, r#"{"message":"hi there"}"#);
    }

    #[test]
    fn decode_token() {
        let frame = InboundFrame::decode(r#"{"type":"token","content":"He"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Token {
                content: "He".to_string()
            }
        );
        assert!(frame.ends_loading());
    }

    #[test]
    fn decode_agent_message_done_marker() {
        // The backend closes every streamed turn with an empty agent_message
        let frame =
            InboundFrame::decode(r#"{"type":"agent_message","content":"","done":true}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::AgentMessage {
                content: Some(String::new()),
                done: true
            }
        );
    }

    #[test]
    fn decode_agent_message_without_content() {
        let frame = InboundFrame::decode(r#"{"type":"agent_message"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::AgentMessage {
                content: None,
                done: false
            }
        );
    }

    #[test]
    fn decode_error_keeps_detail() {
        let frame =
            InboundFrame::decode(r#"{"type":"error","content":"Error processing message: boom"}"#)
                .unwrap();
        match frame {
            InboundFrame::Error { content } => {
                assert_eq!(content.as_deref(), Some("Error processing message: boom"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn decode_user_echo() {
        let frame = InboundFrame::decode(r#"{"type":"user_message","content":"hi"}"#).unwrap();
        assert!(!frame.ends_loading());
    }

    #[test]
    fn decode_unknown_type() {
        let err = InboundFrame::decode(r#"{"type":"typing","content":"x"}"#).unwrap_err();
        assert!(matches!(err, FrameError::UnknownType(ref t) if t == "typing"));
    }

    #[test]
    fn decode_missing_type() {
        let err = InboundFrame::decode(r#"{"content":"x"}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingType));
    }

    #[test]
    fn decode_not_json() {
        let err = InboundFrame::decode("definitely not json").unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn decode_token_without_content_is_malformed() {
        let err = InboundFrame::decode(r#"{"type":"token"}"#).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }
}
