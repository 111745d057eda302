pub mod api;
pub mod conversation;
pub mod gemini;

pub use api::*;
pub use conversation::{ConversationTurn, Role};
