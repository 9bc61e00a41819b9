//! DuckDB-backed local store
//!
//! One database file holds the room registry plus an event table per source.
//! Every micro-batch is written in its own transaction; existing IDs are
//! skipped so replays and overlapping pages are harmless.

use super::traits::{EventStore, RoomStore};
use crate::chat::{ChatMessage, Room};
use crate::error::{Error, Result};
use crate::types::{SyncEvent, Watermark};
use crate::warehouse::GithubEvent;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use duckdb::{params, Connection, Statement, ToSql};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chat_rooms (
    id VARCHAR PRIMARY KEY,
    uri VARCHAR,
    name VARCHAR NOT NULL,
    github_type VARCHAR,
    payload VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS chat_messages (
    project VARCHAR NOT NULL,
    id VARCHAR NOT NULL,
    sent TIMESTAMP NOT NULL,
    edited_at TIMESTAMP,
    author VARCHAR,
    text VARCHAR,
    html VARCHAR,
    parent VARCHAR,
    thread_message_count INTEGER,
    from_user VARCHAR,
    unread BOOLEAN,
    read_by INTEGER,
    urls VARCHAR,
    mentions VARCHAR,
    issues VARCHAR,
    meta VARCHAR,
    v INTEGER,
    gv INTEGER,
    status BOOLEAN,
    virtual_user VARCHAR,
    PRIMARY KEY (project, id)
);
CREATE INDEX IF NOT EXISTS chat_messages_sent ON chat_messages (project, sent);
CREATE TABLE IF NOT EXISTS github_events (
    repo_name VARCHAR NOT NULL,
    id VARCHAR NOT NULL,
    created_at TIMESTAMP NOT NULL,
    event_type VARCHAR,
    actor_login VARCHAR,
    action VARCHAR,
    number INTEGER,
    title VARCHAR,
    payload VARCHAR NOT NULL,
    PRIMARY KEY (repo_name, id)
);
CREATE INDEX IF NOT EXISTS github_events_created ON github_events (repo_name, created_at);
";

const SQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Where a source's events live
struct EventTable {
    name: &'static str,
    resource_column: &'static str,
    time_column: &'static str,
    insert_sql: &'static str,
}

const CHAT_MESSAGES: EventTable = EventTable {
    name: "chat_messages",
    resource_column: "project",
    time_column: "sent",
    insert_sql: "INSERT INTO chat_messages (project, id, sent, edited_at, author, text, html, \
        parent, thread_message_count, from_user, unread, read_by, urls, mentions, issues, meta, \
        v, gv, status, virtual_user) VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), \
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
};

const GITHUB_EVENTS: EventTable = EventTable {
    name: "github_events",
    resource_column: "repo_name",
    time_column: "created_at",
    insert_sql: "INSERT INTO github_events (repo_name, id, created_at, event_type, actor_login, \
        action, number, title, payload) VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?)",
};

/// Local DuckDB database
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| Error::store(format!("failed to open {}: {e}", path.display())))?;
        Self::init(conn, Some(path))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!("store ready at {}", Self::describe(path.as_deref()));
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn describe(path: Option<&Path>) -> String {
        path.map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
    }

    /// Database file, None when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("connection lock poisoned"))
    }

    fn latest_in(&self, table: &EventTable, resource_key: &str) -> Result<Option<Watermark>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, CAST({time} AS VARCHAR) FROM {name} WHERE {resource} = ? \
             ORDER BY {time} DESC, id DESC LIMIT 1",
            time = table.time_column,
            name = table.name,
            resource = table.resource_column,
        );
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt
            .query_map(params![resource_key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .next()
            .transpose()?;

        row.map(|(id, at)| parse_sql_time(&at).map(|ts| Watermark::new(id, ts)))
            .transpose()
    }

    fn append_to<E: SyncEvent>(
        &self,
        table: &EventTable,
        resource_key: &str,
        events: &[E],
        insert: impl Fn(&mut Statement<'_>, &str, &E) -> Result<usize>,
    ) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut exists = tx.prepare(&format!(
                "SELECT count(*) FROM {} WHERE {} = ? AND id = ?",
                table.name, table.resource_column
            ))?;
            let mut insert_stmt = tx.prepare(table.insert_sql)?;

            for event in events {
                let found: i64 =
                    exists.query_row(params![resource_key, event.event_id()], |row| row.get(0))?;
                if found > 0 {
                    continue;
                }
                insert(&mut insert_stmt, resource_key, event)?;
                inserted += 1;
            }
        }
        tx.commit()?;

        debug!(
            "committed {inserted} of {} rows to {} for {resource_key}",
            events.len(),
            table.name
        );
        Ok(inserted)
    }

    fn count_in(&self, table: &EventTable, resource_key: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE {} = ?",
                table.name, table.resource_column
            ),
            params![resource_key],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| Error::store(format!("negative count {count}")))
    }

    fn ids_in(&self, table: &EventTable, resource_key: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {name} WHERE {resource} = ? ORDER BY {time}, id",
            name = table.name,
            resource = table.resource_column,
            time = table.time_column,
        ))?;
        let ids = stmt
            .query_map(params![resource_key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn rooms_where(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Room>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT payload FROM chat_rooms {filter} ORDER BY uri, id"
        ))?;
        let payloads = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        payloads
            .into_iter()
            .map(|payload| serde_json::from_str(&payload).map_err(Error::from))
            .collect()
    }
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("path", &Self::describe(self.path.as_deref()))
            .finish()
    }
}

// ============================================================================
// Chat
// ============================================================================

impl EventStore<ChatMessage> for DuckDbStore {
    fn latest(&self, resource_key: &str) -> Result<Option<Watermark>> {
        self.latest_in(&CHAT_MESSAGES, resource_key)
    }

    fn append(&self, resource_key: &str, events: &[ChatMessage]) -> Result<usize> {
        self.append_to(&CHAT_MESSAGES, resource_key, events, insert_message)
    }

    fn count(&self, resource_key: &str) -> Result<usize> {
        self.count_in(&CHAT_MESSAGES, resource_key)
    }

    fn event_ids(&self, resource_key: &str) -> Result<Vec<String>> {
        self.ids_in(&CHAT_MESSAGES, resource_key)
    }
}

fn insert_message(stmt: &mut Statement<'_>, project: &str, m: &ChatMessage) -> Result<usize> {
    let from_user = serde_json::to_string(&m.from_user)?;
    let urls = serde_json::to_string(&m.urls)?;
    let mentions = serde_json::to_string(&m.mentions)?;
    let issues = serde_json::to_string(&m.issues)?;
    let meta = serde_json::to_string(&m.meta)?;
    let virtual_user = m.virtual_user.as_ref().map(serde_json::to_string).transpose()?;

    Ok(stmt.execute(params![
        project,
        m.id,
        sql_time(&m.sent),
        m.edited_at.as_ref().map(sql_time),
        m.author,
        m.text,
        m.html,
        m.parent,
        i64::from(m.thread_message_count),
        from_user,
        m.unread,
        i64::from(m.read_by),
        urls,
        mentions,
        issues,
        meta,
        m.v.map(i64::from),
        m.gv.map(i64::from),
        m.status,
        virtual_user,
    ])?)
}

impl RoomStore for DuckDbStore {
    fn save_room(&self, room: &Room) -> Result<bool> {
        let payload = serde_json::to_string(room)?;
        let conn = self.lock()?;
        let existing: i64 = conn.query_row(
            "SELECT count(*) FROM chat_rooms WHERE id = ?",
            params![room.id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO chat_rooms (id, uri, name, github_type, payload) \
             VALUES (?, ?, ?, ?, ?)",
            params![room.id, room.key(), room.name, room.github_type, payload],
        )?;
        Ok(existing == 0)
    }

    fn get_room(&self, key: &str) -> Result<Option<Room>> {
        Ok(self
            .rooms_where("WHERE uri = ?", &[&key])?
            .into_iter()
            .next())
    }

    fn list_rooms(&self) -> Result<Vec<Room>> {
        self.rooms_where("", &[])
    }
}

// ============================================================================
// Warehouse
// ============================================================================

impl EventStore<GithubEvent> for DuckDbStore {
    fn latest(&self, resource_key: &str) -> Result<Option<Watermark>> {
        self.latest_in(&GITHUB_EVENTS, resource_key)
    }

    fn append(&self, resource_key: &str, events: &[GithubEvent]) -> Result<usize> {
        self.append_to(&GITHUB_EVENTS, resource_key, events, insert_github_event)
    }

    fn count(&self, resource_key: &str) -> Result<usize> {
        self.count_in(&GITHUB_EVENTS, resource_key)
    }

    fn event_ids(&self, resource_key: &str) -> Result<Vec<String>> {
        self.ids_in(&GITHUB_EVENTS, resource_key)
    }
}

fn insert_github_event(stmt: &mut Statement<'_>, repo: &str, e: &GithubEvent) -> Result<usize> {
    let payload = serde_json::to_string(e)?;
    Ok(stmt.execute(params![
        repo,
        e.id,
        sql_time(&e.created_at),
        e.event_type,
        e.actor_login,
        e.action,
        i64::from(e.number),
        e.title,
        payload,
    ])?)
}

// ============================================================================
// Helpers
// ============================================================================

fn sql_time(at: &DateTime<Utc>) -> String {
    at.format(SQL_TIME_FORMAT).to_string()
}

fn parse_sql_time(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::store(format!("unreadable timestamp {raw:?}: {e}")))
}
