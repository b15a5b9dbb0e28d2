//! Ordered message log and the streaming assembly rules.
//!
//! The log is append-only. The single exception is the most recent entry:
//! while it is an agent message, `token` frames grow its text in place.
//! Because the wire protocol carries no turn id, "the last entry is an agent
//! message" doubles as "this turn has already been streamed", which is what
//! lets a trailing `agent_message` frame be dropped without duplicating the
//! reply. Interleaved turns are not supported.

use tracing::{debug, warn};

use crate::frame::InboundFrame;
use crate::message::{Message, Role};

/// Text shown for any backend-reported failure. The backend's own detail is
/// logged, never displayed.
pub const ERROR_TEXT: &str = "Sorry, couldn't process your request at this moment";

/// What applying a frame did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A new message was pushed.
    Appended,
    /// The trailing agent message grew.
    Extended,
    /// The frame was valid for the stream but changed nothing.
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn last_is_agent(&self) -> bool {
        self.messages.last().is_some_and(Message::is_agent)
    }

    fn push(&mut self, role: Role, text: impl Into<String>) -> &Message {
        self.messages.push(Message::new(role, text));
        // just pushed
        &self.messages[self.messages.len() - 1]
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(Role::User, text)
    }

    /// Synthetic agent entry announcing finished uploads.
    pub fn push_upload_summary<I, S>(&mut self, filenames: I) -> &Message
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = filenames
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        self.push(
            Role::Agent,
            format!("Successfully uploaded: {}", names.join(", ")),
        )
    }

    /// Apply one inbound frame.
    pub fn apply(&mut self, frame: &InboundFrame) -> FrameOutcome {
        match frame {
            InboundFrame::Token { content } => {
                if let Some(last) = self.messages.last_mut().filter(|m| m.is_agent()) {
                    last.text.push_str(content);
                    FrameOutcome::Extended
                } else {
                    self.push(Role::Agent, content.clone());
                    FrameOutcome::Appended
                }
            }
            InboundFrame::AgentMessage { content, done } => {
                if self.last_is_agent() {
                    debug!(done, "agent_message after streamed reply, ignoring");
                    return FrameOutcome::Unchanged;
                }
                match content.as_deref() {
                    Some(text) if !text.is_empty() => {
                        self.push(Role::Agent, text);
                        FrameOutcome::Appended
                    }
                    _ => FrameOutcome::Unchanged,
                }
            }
            InboundFrame::Error { content } => {
                warn!(detail = ?content, "backend reported an error");
                self.push(Role::Error, ERROR_TEXT);
                FrameOutcome::Appended
            }
            InboundFrame::UserMessage { .. } => FrameOutcome::Unchanged,
        }
    }
}
