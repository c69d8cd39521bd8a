use serde::{Deserialize, Serialize};

/// Record/Replay Store + credential store + run-stats store paths and
/// policy (spec.md §4.7, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "d_replay_db")]
    pub replay_db_path: String,
    #[serde(default = "d_credentials_db")]
    pub credentials_db_path: String,
    #[serde(default = "d_stats_db")]
    pub stats_db_path: String,
    #[serde(default)]
    pub save_successful_task_only: bool,
}

fn d_replay_db() -> String {
    "replay_tasks.db".into()
}
fn d_credentials_db() -> String {
    "credentials.db".into()
}
fn d_stats_db() -> String {
    "agent_run_stats.db".into()
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            replay_db_path: d_replay_db(),
            credentials_db_path: d_credentials_db(),
            stats_db_path: d_stats_db(),
            save_successful_task_only: false,
        }
    }
}
