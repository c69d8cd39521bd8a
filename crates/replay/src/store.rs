//! Record/Replay Store (C7, spec.md §4.7, §6): `replay_tasks` table,
//! keyed uniquely by `(site_name, task_hash, parameterized_task_hash)`.
//! Saving always deletes any existing row with that key before inserting
//! the current run, per spec.md §4.7 "Save protocol".

use std::collections::HashMap;

use chrono::Utc;
use nav_domain::chat::ChatMessage;
use nav_domain::error::{Error, Result};
use nav_domain::recording::Recording;
use rusqlite::{params, Connection};

pub struct ReplayStore {
    db_path: String,
}

impl ReplayStore {
    pub fn open(db_path: impl Into<String>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(sqlite_err)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS replay_tasks (
                task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                site_name TEXT NOT NULL,
                task_hash TEXT NOT NULL,
                task_description TEXT NOT NULL,
                parameterized_task_hash TEXT,
                parameterized_task_desc TEXT,
                chat_history TEXT NOT NULL,
                history_variables TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(site_name, task_hash, parameterized_task_hash)
            )",
            [],
        )
        .map_err(sqlite_err)?;
        Ok(Self { db_path })
    }

    pub fn find(&self, site_id: i64, task_hash: &str) -> Result<Option<Recording>> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT task_id, site_id, site_name, task_hash, task_description,
                        parameterized_task_hash, parameterized_task_desc, chat_history,
                        history_variables, created_at
                 FROM replay_tasks WHERE site_id = ?1 AND task_hash = ?2
                 ORDER BY created_at DESC LIMIT 1",
            )
            .map_err(sqlite_err)?;
        query_one(&mut stmt, params![site_id, task_hash])
    }

    pub fn find_parameterized(&self, site_id: i64, parameterized_hash: &str) -> Result<Option<Recording>> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT task_id, site_id, site_name, task_hash, task_description,
                        parameterized_task_hash, parameterized_task_desc, chat_history,
                        history_variables, created_at
                 FROM replay_tasks WHERE site_id = ?1 AND parameterized_task_hash = ?2
                 ORDER BY created_at DESC LIMIT 1",
            )
            .map_err(sqlite_err)?;
        query_one(&mut stmt, params![site_id, parameterized_hash])
    }

    /// Delete-then-insert on `(site_name, task_hash, parameterized_hash)`
    /// (spec.md §4.7 "Save protocol"). `save_successful_task_only` gates
    /// whether a failed run is persisted at all.
    pub fn save(&self, recording: &Recording, success: bool, save_successful_task_only: bool) -> Result<()> {
        if save_successful_task_only && !success {
            return Ok(());
        }
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        conn.execute(
            "DELETE FROM replay_tasks WHERE site_name = ?1 AND task_hash = ?2 AND
             (parameterized_task_hash IS ?3)",
            params![recording.site_name, recording.task_hash, recording.parameterized_hash],
        )
        .map_err(sqlite_err)?;
        conn.execute(
            "INSERT INTO replay_tasks
                (site_id, site_name, task_hash, task_description, parameterized_task_hash,
                 parameterized_task_desc, chat_history, history_variables, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                recording.site_id,
                recording.site_name,
                recording.task_hash,
                recording.task_text,
                recording.parameterized_hash,
                recording.parameterized_text,
                serde_json::to_string(&recording.chat_history).map_err(Error::Json)?,
                recording
                    .variables
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(Error::Json)?,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    pub fn list_all(&self) -> Result<Vec<Recording>> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT task_id, site_id, site_name, task_hash, task_description,
                        parameterized_task_hash, parameterized_task_desc, chat_history,
                        history_variables, created_at
                 FROM replay_tasks ORDER BY created_at DESC",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_recording(row)))
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sqlite_err)?.map_err(Error::Json)?);
        }
        Ok(out)
    }
}

fn query_one(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Option<Recording>> {
    let mut rows = stmt.query_map(params, |row| Ok(row_to_recording(row))).map_err(sqlite_err)?;
    match rows.next() {
        Some(r) => Ok(Some(r.map_err(sqlite_err)?.map_err(Error::Json)?)),
        None => Ok(None),
    }
}

fn row_to_recording(row: &rusqlite::Row<'_>) -> std::result::Result<Recording, serde_json::Error> {
    let chat_history_text: String = row.get(7).unwrap_or_default();
    let history_variables_text: Option<String> = row.get(8).unwrap_or(None);
    let created_at_text: String = row.get(9).unwrap_or_default();

    let chat_history: Vec<ChatMessage> = serde_json::from_str(&chat_history_text)?;
    let variables: Option<HashMap<String, String>> =
        history_variables_text.map(|t| serde_json::from_str(&t)).transpose()?;

    Ok(Recording {
        task_id: row.get(0).unwrap_or_default(),
        site_id: row.get(1).unwrap_or_default(),
        site_name: row.get(2).unwrap_or_default(),
        task_hash: row.get(3).unwrap_or_default(),
        task_text: row.get(4).unwrap_or_default(),
        parameterized_hash: row.get(5).unwrap_or(None),
        parameterized_text: row.get(6).unwrap_or(None),
        chat_history,
        variables,
        created_at: created_at_text.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn sqlite_err(e: rusqlite::Error) -> Error {
    Error::Sqlite(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::chat::ChatMessage;

    fn recording(site_name: &str, hash: &str) -> Recording {
        Recording {
            task_id: 0,
            site_id: 1,
            site_name: site_name.into(),
            task_hash: hash.into(),
            task_text: "Search for Macbook Pro".into(),
            parameterized_hash: None,
            parameterized_text: None,
            chat_history: vec![ChatMessage::user("go")],
            variables: None,
            created_at: Utc::now(),
        }
    }

    fn store() -> ReplayStore {
        let mut p = std::env::temp_dir();
        p.push(format!("nav-agent-replay-test-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&p);
        ReplayStore::open(p.to_string_lossy().to_string()).unwrap()
    }

    #[test]
    fn save_then_find_round_trips() {
        let store = store();
        store.save(&recording("Acme", "abc123"), true, false).unwrap();
        let found = store.find(1, "abc123").unwrap().unwrap();
        assert_eq!(found.task_text, "Search for Macbook Pro");
    }

    #[test]
    fn save_replaces_existing_row_with_same_key() {
        let store = store();
        let mut first = recording("Acme", "abc123");
        first.chat_history = vec![ChatMessage::user("first")];
        store.save(&first, true, false).unwrap();

        let mut second = recording("Acme", "abc123");
        second.chat_history = vec![ChatMessage::user("second")];
        store.save(&second, true, false).unwrap();

        let all: Vec<_> = store.list_all().unwrap().into_iter().filter(|r| r.task_hash == "abc123").collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].chat_history[0].text(), Some("second"));
    }

    #[test]
    fn save_successful_task_only_skips_failed_runs() {
        let store = store();
        store.save(&recording("Acme", "failhash"), false, true).unwrap();
        assert!(store.find(1, "failhash").unwrap().is_none());
    }
}
