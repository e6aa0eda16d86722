/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the v1 schema.
///
/// - `sessions`: one row per synced session log, keyed by session id. `generation`
///   counts syncs and is used to sweep messages that vanished from the log.
/// - `messages`: one row per message, payload stored as JSON. Ordered by
///   `ts_micros` then `seq` (position in the parse result).
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id            TEXT    PRIMARY KEY,
        last_prompt   TEXT,
        message_count INTEGER NOT NULL DEFAULT 0,
        generation    INTEGER NOT NULL DEFAULT 0,
        updated_at    INTEGER NOT NULL
    ) STRICT;

    CREATE TABLE IF NOT EXISTS messages (
        session_id  TEXT    NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        id          TEXT    NOT NULL,
        seq         INTEGER NOT NULL,
        ts_micros   INTEGER NOT NULL,
        generation  INTEGER NOT NULL,
        payload     TEXT    NOT NULL,
        PRIMARY KEY (session_id, id)
    ) STRICT;

    CREATE INDEX IF NOT EXISTS messages_by_time ON messages (session_id, ts_micros, seq);
";

/// Runs forward-only schema migration to the latest version.
///
/// Idempotent: safe to call on every open.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 = db
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    Ok(())
}
