//! Agent transcript parser.
//!
//! Session logs are JSONL files appended to by the agent while it runs: one
//! JSON object per line, each tagged with a `type`. Only `user` and
//! `assistant` entries become messages; everything else (summaries, file
//! snapshots, system notices) is skipped.
//!
//! Parsing is always a total re-read of the file. There is no incremental
//! mode, which keeps the parser a pure function of the file contents.
//!
//! Entries are handled as `serde_json::Value` rather than strongly typed
//! structs because the log format gains fields between agent versions.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ParseError;
use crate::types::{DiffLine, EditPayload, ImageAttachment, Message, ParseResult, Role, ToolCall};

/// Turns a session log into an ordered message list.
pub trait TranscriptParser: Send + Sync + 'static {
    /// Reads and parses the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be read and
    /// [`ParseError::Malformed`] if it contains no parseable entry at all.
    fn parse_all(&self, path: &Path) -> Result<ParseResult, ParseError>;
}

/// Parser for agent JSONL session logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlParser;

impl TranscriptParser for JsonlParser {
    fn parse_all(&self, path: &Path) -> Result<ParseResult, ParseError> {
        let bytes = std::fs::read(path)
            .map_err(|source| ParseError::Io { path: path.to_path_buf(), source })?;
        let raw = String::from_utf8_lossy(&bytes);
        parse_jsonl(&raw).map_err(|lines| ParseError::Malformed { path: path.to_path_buf(), lines })
    }
}

/// Parses JSONL text. On failure returns the number of malformed lines.
///
/// A malformed last line without a trailing newline is an append still in
/// progress and is skipped without being counted.
pub fn parse_jsonl(raw: &str) -> Result<ParseResult, usize> {
    let entries: Vec<(usize, &str)> =
        raw.lines().enumerate().filter(|(_, line)| !line.trim().is_empty()).collect();
    let unterminated = !raw.ends_with('\n');

    let mut builder = TranscriptBuilder::default();
    let mut parsed = 0usize;
    let mut malformed = 0usize;

    for (pos, (line_no, line)) in entries.iter().enumerate() {
        match serde_json::from_str::<Value>(line) {
            Ok(entry) => {
                parsed += 1;
                builder.push_entry(&entry);
            }
            Err(err) if pos + 1 == entries.len() && unterminated => {
                tracing::debug!(line = line_no + 1, %err, "skipping partially written transcript line");
            }
            Err(err) => {
                malformed += 1;
                tracing::warn!(line = line_no + 1, %err, "skipping malformed transcript line");
            }
        }
    }

    if parsed == 0 && malformed > 0 {
        return Err(malformed);
    }
    Ok(builder.finish())
}

#[derive(Default)]
struct TranscriptBuilder {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
    last_timestamp: Option<DateTime<Utc>>,
    last_user_prompt: Option<String>,
}

impl TranscriptBuilder {
    fn push_entry(&mut self, entry: &Value) {
        let kind = entry.get("type").and_then(Value::as_str).unwrap_or_default();
        if kind != "user" && kind != "assistant" {
            return;
        }
        let Some(uuid) = entry.get("uuid").and_then(Value::as_str) else {
            return;
        };

        // Entries without a timestamp inherit the previous one so ordering stays stable.
        let timestamp = entry
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .or(self.last_timestamp)
            .unwrap_or_default();
        self.last_timestamp = Some(timestamp);

        let content = entry.pointer("/message/content").unwrap_or(&Value::Null);
        if kind == "user" {
            let is_meta = entry.get("isMeta").and_then(Value::as_bool).unwrap_or(false);
            self.push_user(uuid, timestamp, content, is_meta, entry.get("toolUseResult"));
        } else {
            self.push_assistant(uuid, timestamp, content);
        }
    }

    fn push_user(
        &mut self,
        uuid: &str,
        timestamp: DateTime<Utc>,
        content: &Value,
        is_meta: bool,
        tool_use_result: Option<&Value>,
    ) {
        let mut texts: Vec<&str> = Vec::new();
        let mut images = Vec::new();

        match content {
            Value::String(text) => texts.push(text),
            Value::Array(blocks) => {
                for block in blocks {
                    match block.get("type").and_then(Value::as_str) {
                        Some("text") => {
                            if let Some(text) = block.get("text").and_then(Value::as_str) {
                                texts.push(text);
                            }
                        }
                        Some("image") => {
                            if let Some(image) = image_attachment(block) {
                                images.push(image);
                            }
                        }
                        Some("tool_result") => {
                            let tool_use_id =
                                block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default();
                            let output = block_text(block.get("content").unwrap_or(&Value::Null));
                            self.complete_tool(tool_use_id, output, tool_use_result);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        let text = texts.join("\n");
        if text.trim().is_empty() && images.is_empty() {
            return;
        }
        if !is_meta && !text.trim().is_empty() {
            self.last_user_prompt = Some(text.clone());
        }
        self.upsert(Message {
            id: uuid.to_owned(),
            timestamp,
            role: Role::User,
            content: text,
            tool: None,
            images,
            edit: None,
        });
    }

    fn push_assistant(&mut self, uuid: &str, timestamp: DateTime<Utc>, content: &Value) {
        let blocks = match content {
            Value::String(text) => {
                if !text.trim().is_empty() {
                    self.upsert(assistant_text(uuid.to_owned(), timestamp, text));
                }
                return;
            }
            Value::Array(blocks) => blocks,
            _ => return,
        };

        let mut texts_seen = 0usize;
        for (n, block) in blocks.iter().enumerate() {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                    if text.trim().is_empty() {
                        continue;
                    }
                    let id = if texts_seen == 0 { uuid.to_owned() } else { format!("{uuid}#{n}") };
                    texts_seen += 1;
                    self.upsert(assistant_text(id, timestamp, text));
                }
                Some("tool_use") => {
                    let id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                        .unwrap_or_else(|| format!("{uuid}#{n}"));
                    let name = block.get("name").and_then(Value::as_str).unwrap_or("tool");
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    self.upsert(Message {
                        id,
                        timestamp,
                        role: Role::Tool,
                        content: tool_summary(&input),
                        edit: edit_payload(name, &input),
                        tool: Some(ToolCall {
                            name: name.to_owned(),
                            input,
                            output: None,
                            in_progress: true,
                        }),
                        images: Vec::new(),
                    });
                }
                _ => {}
            }
        }
    }

    fn complete_tool(&mut self, tool_use_id: &str, output: String, tool_use_result: Option<&Value>) {
        let Some(&pos) = self.index.get(tool_use_id) else {
            tracing::debug!(tool_use_id, "tool result without a matching tool call");
            return;
        };
        let message = &mut self.messages[pos];
        if let Some(tool) = message.tool.as_mut() {
            tool.output = Some(output);
            tool.in_progress = false;
        }
        if let Some(lines) = tool_use_result
            .and_then(|r| r.get("structuredPatch"))
            .and_then(Value::as_array)
            .map(|hunks| patch_lines(hunks))
            .filter(|lines| !lines.is_empty())
        {
            message.edit = Some(EditPayload::Patch { lines });
        }
    }

    /// Keeps the first position of a repeated id and takes the latest content.
    fn upsert(&mut self, message: Message) {
        match self.index.get(&message.id) {
            Some(&pos) => self.messages[pos] = message,
            None => {
                self.index.insert(message.id.clone(), self.messages.len());
                self.messages.push(message);
            }
        }
    }

    fn finish(mut self) -> ParseResult {
        // sort_by_key is stable: equal timestamps keep log order.
        self.messages.sort_by_key(|m| m.timestamp);
        ParseResult { messages: self.messages, last_user_prompt: self.last_user_prompt }
    }
}

fn assistant_text(id: String, timestamp: DateTime<Utc>, text: &str) -> Message {
    Message {
        id,
        timestamp,
        role: Role::Assistant,
        content: text.to_owned(),
        tool: None,
        images: Vec::new(),
        edit: None,
    }
}

fn image_attachment(block: &Value) -> Option<ImageAttachment> {
    let source = block.get("source")?;
    Some(ImageAttachment {
        media_type: source.get("media_type").and_then(Value::as_str).unwrap_or("image/png").to_owned(),
        data: source.get("data").and_then(Value::as_str)?.to_owned(),
    })
}

/// Flattens tool-result content (a string or a list of text blocks).
fn block_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// One-line description of a tool call for list views.
fn tool_summary(input: &Value) -> String {
    ["file_path", "command", "pattern", "url", "description"]
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned()
}

fn edit_payload(name: &str, input: &Value) -> Option<EditPayload> {
    let text = |key: &str| input.get(key).and_then(Value::as_str).map(str::to_owned);
    match name {
        "Edit" => Some(EditPayload::Replace { old: text("old_string")?, new: text("new_string")? }),
        "Write" => Some(EditPayload::Replace { old: String::new(), new: text("content")? }),
        "MultiEdit" => {
            let edits = input.get("edits")?.as_array()?;
            let field = |key: &str| {
                edits
                    .iter()
                    .filter_map(|e| e.get(key).and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            Some(EditPayload::Replace { old: field("old_string"), new: field("new_string") })
        }
        _ => None,
    }
}

/// Converts structured-patch hunks (`oldStart`, `newStart`, prefixed `lines`) to diff lines.
fn patch_lines(hunks: &[Value]) -> Vec<DiffLine> {
    let mut out = Vec::new();
    for hunk in hunks {
        let start = |key: &str| hunk.get(key).and_then(Value::as_u64).unwrap_or(1) as u32;
        let (mut old_no, mut new_no) = (start("oldStart"), start("newStart"));
        let Some(lines) = hunk.get("lines").and_then(Value::as_array) else {
            continue;
        };
        for line in lines.iter().filter_map(Value::as_str) {
            match line.chars().next() {
                Some('+') => {
                    out.push(DiffLine::added(&line[1..], new_no));
                    new_no += 1;
                }
                Some('-') => {
                    out.push(DiffLine::removed(&line[1..], old_no));
                    old_no += 1;
                }
                Some('\\') => {} // "\ No newline at end of file"
                _ => {
                    let text = line.strip_prefix(' ').unwrap_or(line);
                    out.push(DiffLine::context(text, old_no, new_no));
                    old_no += 1;
                    new_no += 1;
                }
            }
        }
    }
    out
}
