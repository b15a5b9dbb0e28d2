//! Terminal conversation view: state machine plus ratatui rendering.

mod render;
mod state;

pub use render::render;
pub use state::{ConversationView, ViewAction};
