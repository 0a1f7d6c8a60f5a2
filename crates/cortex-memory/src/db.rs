use rusqlite::{Connection, Result};
use tracing::warn;

/// Open the durable tier. When `durable_conn` names a filesystem path, opens
/// (creating if needed) that SQLite file; when absent, or when opening it
/// fails, falls back to a process-local `Connection::open_in_memory()` with
/// identical schema and semantics (§4.3, §9 "Conversation storage
/// fallback") — the fallback is logged, never surfaced as an error, and
/// selected once at startup, never at request time.
pub fn open_durable_tier(durable_conn: Option<&str>) -> Result<Connection> {
    let conn = match durable_conn {
        Some(path) => match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    error = %e,
                    path,
                    "durable conversation store unreachable at startup, falling back to in-memory"
                );
                Connection::open_in_memory()?
            }
        },
        None => Connection::open_in_memory()?,
    };
    init_db(&conn)?;
    Ok(conn)
}

/// Initialise durable-tier tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_conversations_table(conn)?;
    create_messages_table(conn)?;
    Ok(())
}

fn create_conversations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            owner       TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_owner
            ON conversations(owner);",
    )
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL,
            role            TEXT NOT NULL,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            seq             INTEGER NOT NULL,
            metadata        TEXT,
            FOREIGN KEY(conversation_id) REFERENCES conversations(id)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, seq);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_conn_string_opens_in_memory() {
        let conn = open_durable_tier(None).unwrap();
        conn.execute("INSERT INTO conversations (id, created_at, updated_at) VALUES ('a', 'x', 'x')", [])
            .unwrap();
    }

    #[test]
    fn unreachable_path_falls_back_to_in_memory_without_erroring() {
        let conn = open_durable_tier(Some("/nonexistent/dir/that/does/not/exist.db")).unwrap();
        conn.execute("INSERT INTO conversations (id, created_at, updated_at) VALUES ('a', 'x', 'x')", [])
            .unwrap();
    }
}
