use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff;

/// Who produced a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Metadata for a tool invocation made by the agent.
///
/// `in_progress` stays `true` until the matching tool result is seen in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub input: serde_json::Value,
    pub output: Option<String>,
    pub in_progress: bool,
}

/// An inline image attached to a message (base64 payload, as stored in the log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

/// The change carried by an edit-type tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditPayload {
    /// Old and new text; the diff is computed on demand.
    Replace { old: String, new: String },
    /// A diff already rendered by the agent (e.g. a structured patch).
    Patch { lines: Vec<DiffLine> },
}

impl EditPayload {
    /// Returns the diff lines for this edit.
    ///
    /// `Replace` runs the LCS engine over both texts; `Patch` is returned as-is.
    pub fn diff_lines(&self) -> Vec<DiffLine> {
        match self {
            EditPayload::Replace { old, new } => diff::diff_text(old, new),
            EditPayload::Patch { lines } => lines.clone(),
        }
    }

    /// Size of the LCS table needed to diff this payload (`0` for patches).
    pub fn diff_cost(&self) -> usize {
        match self {
            EditPayload::Replace { old, new } => {
                diff::split_lines(old).len().saturating_mul(diff::split_lines(new).len())
            }
            EditPayload::Patch { .. } => 0,
        }
    }
}

/// One entry of a session transcript.
///
/// Ids are stable across reloads of the same log file. Within a session the
/// sequence is unique by id and ascending by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditPayload>,
}

/// Output of a full, from-scratch parse of a session log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub messages: Vec<Message>,
    pub last_user_prompt: Option<String>,
}

/// Per-session summary kept by the store next to the messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub last_prompt: Option<String>,
    pub message_count: usize,
    pub updated_at: i64, // Unix timestamp seconds
}

/// A single line within a rendered diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
    pub old_lineno: Option<u32>,
    pub new_lineno: Option<u32>,
}

impl DiffLine {
    pub fn context(content: impl Into<String>, old_lineno: u32, new_lineno: u32) -> Self {
        Self {
            kind: DiffLineKind::Context,
            content: content.into(),
            old_lineno: Some(old_lineno),
            new_lineno: Some(new_lineno),
        }
    }

    pub fn added(content: impl Into<String>, new_lineno: u32) -> Self {
        Self {
            kind: DiffLineKind::Added,
            content: content.into(),
            old_lineno: None,
            new_lineno: Some(new_lineno),
        }
    }

    pub fn removed(content: impl Into<String>, old_lineno: u32) -> Self {
        Self {
            kind: DiffLineKind::Removed,
            content: content.into(),
            old_lineno: Some(old_lineno),
            new_lineno: None,
        }
    }

    /// Single-character marker used by unified diff output.
    pub fn marker(&self) -> char {
        match self.kind {
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
            DiffLineKind::Context => ' ',
        }
    }
}

/// The type of change for a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Added,
    Removed,
    Context,
}

/// Added/removed line counts for one diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}
