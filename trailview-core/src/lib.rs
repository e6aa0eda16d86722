//! Core of trailview: transcript data model, LCS diff engine, JSONL transcript
//! parser and the session-scoped stores the sync coordinator reads and writes.

pub mod db;
pub mod diff;
pub mod error;
pub mod parser;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{ParseError, StoreError, SyncError};
pub use parser::{JsonlParser, TranscriptParser};
pub use store::{MemoryStore, TranscriptStore};
pub use types::{
    DiffLine, DiffLineKind, DiffStats, EditPayload, ImageAttachment, Message, ParseResult, Role,
    SessionInfo, ToolCall,
};
