//! # Chat Protocol
//!
//! Types shared between the chatline client and the conversational backend,
//! plus the rules that turn a stream of inbound frames into an ordered
//! message log.
//!
//! ## Wire format
//!
//! ```text
//! client -> server   {"message": "hi"}
//! server -> client   {"type": "token", "content": "He"}
//!                    {"type": "token", "content": "llo"}
//!                    {"type": "agent_message", "content": "", "done": true}
//!                    {"type": "error", "content": "..."}
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use chat_protocol::{InboundFrame, MessageLog, Role};
//!
//! let mut log = MessageLog::new();
//! log.push_user("hi");
//!
//! for raw in [
//!     r#"{"type":"token","content":"He"}"#,
//!     r#"{"type":"token","content":"llo"}"#,
//!     r#"{"type":"agent_message","content":"","done":true}"#,
//! ] {
//!     let frame = InboundFrame::decode(raw).unwrap();
//!     log.apply(&frame);
//! }
//!
//! assert_eq!(log.len(), 2);
//! let reply = log.last().unwrap();
//! assert_eq!(reply.role, Role::Agent);
//! assert_eq!(reply.text, "Hello");
//! ```

pub mod api;
pub mod frame;
pub mod log;
pub mod message;

pub use api::{DatasetSummary, HealthStatus, UploadResponse, UploadedFile};
pub use frame::{FrameError, InboundFrame, OutboundFrame};
pub use log::{ERROR_TEXT, FrameOutcome, MessageLog};
pub use message::{Message, Role};
