//! `agent_run_stats` persisted state (spec.md §6, §4.8 "Accounting"):
//! per-purpose token usage turned into cost at task end using per-model
//! rates, inserted as one row per task.

use nav_domain::error::{Error, Result};
use nav_domain::usage::{ModelRates, TokenUsage};
use rusqlite::{params, Connection};

pub struct StatsStore {
    db_path: String,
}

impl StatsStore {
    pub fn open(db_path: impl Into<String>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(sqlite_err)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_run_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                prompt_token_count INTEGER NOT NULL,
                candidates_token_count INTEGER NOT NULL,
                prompt_token_cost REAL NOT NULL,
                candidates_token_cost REAL NOT NULL,
                total_llm_cost REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )
        .map_err(sqlite_err)?;
        Ok(Self { db_path })
    }

    /// Inserts one row per `(model, agent_name)` accumulated usage,
    /// unconditionally — spec.md §9's open question on whether
    /// `save_successful_task_only` should also gate stats is resolved as
    /// "no" here (see DESIGN.md), matching "stats always inserted".
    pub fn record(&self, agent_name: &str, usage: &TokenUsage, rates: ModelRates) -> Result<()> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        let prompt_cost = (usage.prompt as f64 / 1_000_000.0) * rates.prompt_per_million;
        let completion_cost = (usage.completion as f64 / 1_000_000.0) * rates.completion_per_million;
        conn.execute(
            "INSERT INTO agent_run_stats
                (model, agent_name, prompt_token_count, candidates_token_count,
                 prompt_token_cost, candidates_token_cost, total_llm_cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                usage.model,
                agent_name,
                usage.prompt as i64,
                usage.completion as i64,
                prompt_cost,
                completion_cost,
                prompt_cost + completion_cost,
            ],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }
}

fn sqlite_err(e: rusqlite::Error) -> Error {
    Error::Sqlite(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StatsStore {
        let mut p = std::env::temp_dir();
        p.push(format!("nav-agent-stats-test-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&p);
        StatsStore::open(p.to_string_lossy().to_string()).unwrap()
    }

    #[test]
    fn record_computes_cost_from_rates() {
        let store = store();
        let usage = TokenUsage { vendor: "anthropic".into(), model: "claude".into(), prompt: 1_000_000, cached_prompt: 0, completion: 500_000 };
        let rates = ModelRates { prompt_per_million: 3.0, completion_per_million: 15.0 };
        store.record("navigation_agent", &usage, rates).unwrap();

        let conn = Connection::open(&store.db_path).unwrap();
        let total: f64 = conn
            .query_row("SELECT total_llm_cost FROM agent_run_stats ORDER BY id DESC LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert!((total - 10.5).abs() < 1e-9);
    }
}
