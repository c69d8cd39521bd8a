use serde::{Deserialize, Serialize};

/// A single task invocation. Immutable once the agent loop starts on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub goal: String,
    pub site_id: i64,
    pub site_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub options: RunOptions,
}

/// Flags that shape a single run, set from CLI flags or a batch CSV row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default = "d_true")]
    pub mask_data: bool,
    #[serde(default)]
    pub multi_action_per_turn: bool,
    #[serde(default)]
    pub record_and_replay: bool,
    #[serde(default)]
    pub parameterize_replay: bool,
    #[serde(default)]
    pub send_screenshot: bool,
    #[serde(default)]
    pub save_screenshot: bool,
    #[serde(default)]
    pub use_system_browser: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_endpoint: Option<String>,
    #[serde(default = "d_10")]
    pub max_tabs: u32,
}

fn d_true() -> bool {
    true
}
fn d_10() -> u32 {
    10
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mask_data: true,
            multi_action_per_turn: false,
            record_and_replay: false,
            parameterize_replay: false,
            send_screenshot: false,
            save_screenshot: false,
            use_system_browser: false,
            attach_endpoint: None,
            max_tabs: 10,
        }
    }
}
