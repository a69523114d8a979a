mod model;
pub mod sanitize;

pub use model::{ActionItem, ChatMessage, ChatRole, Draft, Email, EmailCategory, Prompt};
