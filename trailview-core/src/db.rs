use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::error::StoreError;
use crate::store::TranscriptStore;
use crate::types::{Message, ParseResult, SessionInfo};

/// Opens (or creates) the SQLite database at `path`, configures WAL mode,
/// and applies schema migrations via the `schema_version` table.
///
/// `busy_timeout` is set through the `Connection` method rather than a PRAGMA
/// string so it takes effect regardless of pragma caching.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the file cannot be opened, WAL configuration
/// fails, or schema DDL fails.
pub async fn open_db(path: &str) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path).await?;

    conn.call(|db| {
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        db.busy_timeout(Duration::from_secs(5))?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    // Leftover WAL from a previous run.
    conn.call(|db| {
        db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    conn.call(|db| {
        crate::schema::migrate(db)?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    Ok(conn)
}

/// Returns the current Unix timestamp in seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Persistent [`TranscriptStore`] on a WAL-mode SQLite database.
///
/// `tokio_rusqlite` runs every statement on its own background thread, so the
/// store can be shared across tasks behind an `Arc`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens the database at `path` (see [`open_db`]).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if opening or migrating fails.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self { conn: open_db(path).await? })
    }

    /// Borrow the underlying connection (used by tests and maintenance code).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A message flattened for insertion: `(id, seq, ts_micros, payload)`.
type MessageRow = (String, i64, i64, String);

impl TranscriptStore for SqliteStore {
    /// Upserts every message in one `BEGIN IMMEDIATE` transaction, then sweeps
    /// rows left over from earlier generations of the same session.
    async fn sync_from_parse_result(
        &self,
        session_id: &str,
        result: &ParseResult,
    ) -> Result<(), StoreError> {
        let rows = result
            .messages
            .iter()
            .enumerate()
            .map(|(seq, m)| {
                let payload = serde_json::to_string(m)?;
                Ok::<MessageRow, serde_json::Error>((
                    m.id.clone(),
                    seq as i64,
                    m.timestamp.timestamp_micros(),
                    payload,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let session_id = session_id.to_owned();
        let last_prompt = result.last_user_prompt.clone();

        self.conn
            .call(move |db| {
                let now = now_secs();
                let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

                let previous: Option<i64> = tx
                    .query_row(
                        "SELECT generation FROM sessions WHERE id = ?1",
                        rusqlite::params![&session_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                let generation = previous.unwrap_or(0) + 1;

                tx.execute(
                    "INSERT INTO sessions (id, last_prompt, message_count, generation, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id)
                     DO UPDATE SET last_prompt   = excluded.last_prompt,
                                   message_count = excluded.message_count,
                                   generation    = excluded.generation,
                                   updated_at    = excluded.updated_at",
                    rusqlite::params![&session_id, &last_prompt, rows.len() as i64, generation, now],
                )?;

                {
                    let mut upsert = tx.prepare(
                        "INSERT INTO messages (session_id, id, seq, ts_micros, generation, payload)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(session_id, id)
                         DO UPDATE SET seq        = excluded.seq,
                                       ts_micros  = excluded.ts_micros,
                                       generation = excluded.generation,
                                       payload    = excluded.payload",
                    )?;
                    for (id, seq, ts_micros, payload) in &rows {
                        upsert.execute(rusqlite::params![
                            &session_id, id, seq, ts_micros, generation, payload
                        ])?;
                    }
                }

                tx.execute(
                    "DELETE FROM messages WHERE session_id = ?1 AND generation <> ?2",
                    rusqlite::params![&session_id, generation],
                )?;
                tx.commit()?;
                Ok::<_, rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn read_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let session_id = session_id.to_owned();
        let payloads: Vec<String> = self
            .conn
            .call(move |db| {
                let mut stmt = db.prepare(
                    "SELECT payload FROM messages
                     WHERE session_id = ?1
                     ORDER BY ts_micros, seq",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![&session_id], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    async fn read_session_info(&self, session_id: &str) -> Result<Option<SessionInfo>, StoreError> {
        let session_id = session_id.to_owned();
        let info = self
            .conn
            .call(move |db| {
                let info = db
                    .query_row(
                        "SELECT last_prompt, message_count, updated_at FROM sessions WHERE id = ?1",
                        rusqlite::params![&session_id],
                        |r| {
                            Ok(SessionInfo {
                                session_id: session_id.clone(),
                                last_prompt: r.get(0)?,
                                message_count: r.get::<_, i64>(1)? as usize,
                                updated_at: r.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok::<_, rusqlite::Error>(info)
            })
            .await?;
        Ok(info)
    }

    async fn has_data(&self, session_id: &str) -> Result<bool, StoreError> {
        let session_id = session_id.to_owned();
        let exists = self
            .conn
            .call(move |db| {
                let exists: bool = db.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                    rusqlite::params![&session_id],
                    |r| r.get(0),
                )?;
                Ok::<_, rusqlite::Error>(exists)
            })
            .await?;
        Ok(exists)
    }
}
