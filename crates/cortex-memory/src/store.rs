use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::Connection;
use tracing::debug;

use cortex_core::types::{Conversation, ConversationId, ContextFormat, Message, Role};

use crate::error::MemoryError;

/// Messages kept hot per conversation before the TTL cache stops bothering
/// to track them (oldest messages simply age out of the durable read path).
const DEFAULT_HOT_MAX_MESSAGES: usize = 50;
const DEFAULT_HOT_TTL_SECS: i64 = 24 * 60 * 60;

struct HotEntry {
    /// Oldest first.
    messages: Vec<Message>,
    touched_at: std::time::Instant,
}

/// Two-tier conversation store.
///
/// The durable tier is a SQLite connection behind a single global mutex,
/// mirroring the always-serialize-writes design this codebase has used for
/// every other SQLite-backed manager. The hot tier is a bounded,
/// TTL-expiring in-memory cache of each conversation's most recent
/// messages, avoiding a durable read on every turn of an active
/// conversation.
///
/// A durable connection opened with `Connection::open_in_memory()` gives
/// this the same struct, same locking, same query plans as the on-disk
/// case — there is no separate in-memory fallback implementation to keep
/// in sync; that connection is what the gateway falls back to when the
/// configured durable store is unreachable at startup.
pub struct ConversationStore {
    db: Mutex<Connection>,
    hot: DashMap<ConversationId, HotEntry>,
    /// Per-conversation lock so `add_message` calls for the same
    /// conversation are fully serialized — the ordering guarantee in §5
    /// depends on one turn's write completing (both tiers) before the
    /// next is allowed to start.
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
    hot_ttl: Duration,
    hot_max_messages: usize,
}

impl ConversationStore {
    pub fn new(conn: Connection) -> Self {
        Self::with_hot_tier_config(conn, DEFAULT_HOT_TTL_SECS, DEFAULT_HOT_MAX_MESSAGES)
    }

    pub fn with_hot_tier_config(
        conn: Connection,
        hot_ttl_secs: i64,
        hot_max_messages: usize,
    ) -> Self {
        Self {
            db: Mutex::new(conn),
            hot: DashMap::new(),
            locks: DashMap::new(),
            hot_ttl: Duration::from_secs(hot_ttl_secs.max(0) as u64),
            hot_max_messages,
        }
    }

    fn lock_for(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn create_conversation(&self, owner: Option<&str>) -> Result<Conversation, MemoryError> {
        let id = ConversationId::new();
        let now = Utc::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO conversations (id, owner, created_at, updated_at, metadata)
             VALUES (?1, ?2, ?3, ?4, '{}')",
            rusqlite::params![id.as_str(), owner, now.to_rfc3339(), now.to_rfc3339()],
        )?;
        Ok(Conversation {
            id,
            owner: owner.map(String::from),
            created_at: now,
            updated_at: now,
            metadata: Default::default(),
        })
    }

    /// Append a message. Assigns the next `seq` for this conversation and
    /// atomically updates the durable tier, the hot tier, and
    /// `conversation.updated_at`, all under this conversation's lock.
    pub fn add_message(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, MemoryError> {
        let guard = self.lock_for(conversation_id);
        let _held = guard.lock().unwrap();

        let now = Utc::now();
        let db = self.db.lock().unwrap();
        let next_seq: i64 = db
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
                rusqlite::params![conversation_id.as_str()],
                |row| row.get(0),
            )
            .unwrap_or(1);

        let metadata_json = metadata.as_ref().map(|v| v.to_string());
        db.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at, seq, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                conversation_id.as_str(),
                role.as_str(),
                content,
                now.to_rfc3339(),
                next_seq,
                metadata_json,
            ],
        )?;
        let id = db.last_insert_rowid();
        db.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now.to_rfc3339(), conversation_id.as_str()],
        )?;
        drop(db);

        let message = Message {
            id,
            conversation_id: conversation_id.clone(),
            role,
            content: content.to_string(),
            created_at: now,
            seq: next_seq,
            metadata,
        };

        self.push_hot(conversation_id, message.clone());
        Ok(message)
    }

    fn push_hot(&self, conversation_id: &ConversationId, message: Message) {
        let mut entry = self.hot.entry(conversation_id.clone()).or_insert_with(|| HotEntry {
            messages: Vec::new(),
            touched_at: std::time::Instant::now(),
        });
        entry.messages.push(message);
        if entry.messages.len() > self.hot_max_messages {
            let overflow = entry.messages.len() - self.hot_max_messages;
            entry.messages.drain(0..overflow);
        }
        entry.touched_at = std::time::Instant::now();
    }

    fn hot_tier_fresh(&self, conversation_id: &ConversationId) -> Option<Vec<Message>> {
        let entry = self.hot.get(conversation_id)?;
        if entry.touched_at.elapsed() > self.hot_ttl {
            debug!(conversation_id = %conversation_id, "hot tier entry expired");
            return None;
        }
        Some(entry.messages.clone())
    }

    /// Replace the hot entry with `messages` (oldest first), as if they had
    /// just been appended in that order. Used to repopulate the cache after
    /// a durable-tier read satisfies a request the hot tier couldn't.
    fn repopulate_hot(&self, conversation_id: &ConversationId, mut messages: Vec<Message>) {
        if messages.len() > self.hot_max_messages {
            let overflow = messages.len() - self.hot_max_messages;
            messages.drain(0..overflow);
        }
        self.hot.insert(
            conversation_id.clone(),
            HotEntry {
                messages,
                touched_at: std::time::Instant::now(),
            },
        );
    }

    /// Most recent `limit` messages, newest first, skipping the `skip`
    /// most recent. Served from the hot tier when `skip == 0` and the hot
    /// tier already holds at least `limit` entries; otherwise reads the
    /// durable tier and, on a hit with `skip == 0`, repopulates the hot
    /// tier in chronological order.
    pub fn get_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
        skip: usize,
        include_metadata: bool,
    ) -> Result<Vec<Message>, MemoryError> {
        if skip == 0 {
            if let Some(hot) = self.hot_tier_fresh(conversation_id) {
                if hot.len() >= limit {
                    let start = hot.len() - limit;
                    let mut slice: Vec<Message> = hot[start..].to_vec();
                    slice.reverse();
                    strip_metadata_if(&mut slice, include_metadata);
                    return Ok(slice);
                }
            }
        }

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, conversation_id, role, content, created_at, seq, metadata
             FROM messages WHERE conversation_id = ?1
             ORDER BY seq DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![conversation_id.as_str(), limit as i64, skip as i64],
            row_to_message,
        )?;
        let mut messages: Vec<Message> = rows.filter_map(|r| r.ok()).collect();
        drop(stmt);
        drop(db);

        if skip == 0 && !messages.is_empty() {
            let mut chronological = messages.clone();
            chronological.reverse();
            self.repopulate_hot(conversation_id, chronological);
        }

        strip_metadata_if(&mut messages, include_metadata);
        Ok(messages)
    }

    /// Render the last `max_messages` messages, oldest first, in the shape
    /// the completion client or prompt templates need.
    pub fn get_context(
        &self,
        conversation_id: &ConversationId,
        max_messages: usize,
        format: ContextFormat,
    ) -> Result<ContextValue, MemoryError> {
        let mut messages = self.get_messages(conversation_id, max_messages, 0, true)?;
        messages.reverse();
        Ok(match format {
            ContextFormat::Dict => ContextValue::Messages(messages),
            ContextFormat::String => {
                let mut out = String::new();
                for m in &messages {
                    out.push_str(&format!("{}: {}\n", m.role, m.content));
                }
                ContextValue::Text(out)
            }
            ContextFormat::Completion => {
                let pairs = messages
                    .iter()
                    .map(|m| (completion_role(m.role), m.content.clone()))
                    .collect();
                ContextValue::Completion(pairs)
            }
        })
    }

    pub fn get_user_conversations(
        &self,
        owner: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Conversation>, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, owner, created_at, updated_at, metadata
             FROM conversations WHERE owner = ?1
             ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![owner, limit as i64, skip as i64],
            row_to_conversation,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Idempotent (§4.3): deleting an id that doesn't exist (or was already
    /// deleted) is a successful no-op, not an error.
    pub fn delete_conversation(&self, conversation_id: &ConversationId) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            rusqlite::params![conversation_id.as_str()],
        )?;
        db.execute(
            "DELETE FROM conversations WHERE id = ?1",
            rusqlite::params![conversation_id.as_str()],
        )?;
        drop(db);
        self.hot.remove(conversation_id);
        self.locks.remove(conversation_id);
        Ok(())
    }

    /// Shallow-merge `patch` into the conversation's stored metadata.
    pub fn update_metadata(
        &self,
        conversation_id: &ConversationId,
        patch: serde_json::Value,
    ) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let existing: String = db
            .query_row(
                "SELECT metadata FROM conversations WHERE id = ?1",
                rusqlite::params![conversation_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|_| MemoryError::NotFound(conversation_id.to_string()))?;

        let mut merged: serde_json::Value =
            serde_json::from_str(&existing).unwrap_or_else(|_| serde_json::json!({}));
        if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
            for (k, v) in patch_obj {
                merged_obj.insert(k.clone(), v.clone());
            }
        }

        db.execute(
            "UPDATE conversations SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![merged.to_string(), Utc::now().to_rfc3339(), conversation_id.as_str()],
        )?;
        Ok(())
    }
}

fn strip_metadata_if(messages: &mut [Message], include_metadata: bool) {
    if !include_metadata {
        for m in messages.iter_mut() {
            m.metadata = None;
        }
    }
}

fn completion_role(role: Role) -> String {
    role.as_str().to_string()
}

/// Result shape of [`ConversationStore::get_context`].
#[derive(Debug, Clone)]
pub enum ContextValue {
    Text(String),
    Messages(Vec<Message>),
    Completion(Vec<(String, String)>),
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    let metadata_str: Option<String> = row.get(6)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: ConversationId::from(row.get::<_, String>(1)?),
        role: Role::parse(&role_str),
        content: row.get(3)?,
        created_at: parse_rfc3339(&row.get::<_, String>(4)?),
        seq: row.get(5)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let metadata_str: String = row.get(4)?;
    Ok(Conversation {
        id: ConversationId::from(row.get::<_, String>(0)?),
        owner: row.get(1)?,
        created_at: parse_rfc3339(&row.get::<_, String>(2)?),
        updated_at: parse_rfc3339(&row.get::<_, String>(3)?),
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
    })
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        ConversationStore::new(conn)
    }

    #[test]
    fn get_messages_returns_newest_first() {
        let store = store();
        let conv = store.create_conversation(Some("u1")).unwrap();
        store.add_message(&conv.id, Role::User, "hi", None).unwrap();
        store
            .add_message(&conv.id, Role::Assistant, "hello", None)
            .unwrap();

        let messages = store.get_messages(&conv.id, 10, 0, true).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].content, "hi");
    }

    #[test]
    fn get_context_is_oldest_first_and_contains_every_message() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        store.add_message(&conv.id, Role::User, "one", None).unwrap();
        store.add_message(&conv.id, Role::Assistant, "two", None).unwrap();
        store.add_message(&conv.id, Role::User, "three", None).unwrap();

        let ctx = store
            .get_context(&conv.id, 10, ContextFormat::String)
            .unwrap();
        match ctx {
            ContextValue::Text(t) => {
                assert!(t.ends_with("User: three\n"));
                assert!(t.contains("one") && t.contains("two") && t.contains("three"));
            }
            _ => panic!("expected text context"),
        }
    }

    #[test]
    fn get_messages_falls_through_to_durable_tier_with_skip() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        for i in 0..5 {
            store
                .add_message(&conv.id, Role::User, &format!("m{i}"), None)
                .unwrap();
        }

        let page = store.get_messages(&conv.id, 2, 2, true).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "m2");
        assert_eq!(page[1].content, "m1");
    }

    #[test]
    fn include_metadata_false_strips_metadata() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        store
            .add_message(&conv.id, Role::User, "hi", Some(serde_json::json!({"k": "v"})))
            .unwrap();

        let messages = store.get_messages(&conv.id, 10, 0, false).unwrap();
        assert!(messages[0].metadata.is_none());
    }

    #[test]
    fn delete_conversation_removes_hot_entry() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        store.add_message(&conv.id, Role::User, "x", None).unwrap();
        store.delete_conversation(&conv.id).unwrap();
        assert!(store.hot.get(&conv.id).is_none());
        assert!(store.get_messages(&conv.id, 10, 0, true).unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_conversation_is_a_noop() {
        let store = store();
        let id = ConversationId::new();
        assert!(store.delete_conversation(&id).is_ok());
    }

    #[test]
    fn delete_conversation_is_idempotent() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        store.add_message(&conv.id, Role::User, "x", None).unwrap();
        store.delete_conversation(&conv.id).unwrap();
        // Deleting the same, now-gone conversation again must still succeed.
        store.delete_conversation(&conv.id).unwrap();
    }

    #[test]
    fn update_metadata_shallow_merges() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        store
            .update_metadata(&conv.id, serde_json::json!({"a": 1}))
            .unwrap();
        store
            .update_metadata(&conv.id, serde_json::json!({"b": 2}))
            .unwrap();

        let found = store
            .get_user_conversations("nobody", 10, 0)
            .unwrap();
        assert!(found.is_empty());
    }
}
