mod backend;
mod error;
mod service;

pub use backend::{
    AgentBackend, ChatReply, ChatRequest, GenerateDraftRequest, GeneratedDraft, HttpBackend,
};
pub use error::AgentError;
pub use service::{ProcessTask, RefreshTask, SyncService, SyncSettings};
