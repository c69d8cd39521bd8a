use serde::{Deserialize, Serialize};

/// Browser Session Manager configuration (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "d_executable")]
    pub executable: String,
    #[serde(default = "d_user_data_dir")]
    pub user_data_dir: String,
    #[serde(default = "d_debug_port")]
    pub debug_port: u16,
    #[serde(default = "d_hil_polling_times")]
    pub hil_polling_times: u64,
}

fn d_executable() -> String {
    "chromium".into()
}
fn d_user_data_dir() -> String {
    ".nav-agent/profile".into()
}
fn d_debug_port() -> u16 {
    0 // 0 = pick an ephemeral port.
}
fn d_hil_polling_times() -> u64 {
    300
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: d_executable(),
            user_data_dir: d_user_data_dir(),
            debug_port: d_debug_port(),
            hil_polling_times: d_hil_polling_times(),
        }
    }
}
