use serde::{Deserialize, Serialize};

/// OTP fetch source configuration (spec.md §4.8 "OTP"; recovered from
/// `gmail_otp_fetcher.py` and generalized per SPEC_FULL.md §C.3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OtpConfig {
    #[serde(default)]
    pub source: Option<OtpSource>,
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "d_poll_timeout_s")]
    pub poll_timeout_s: u64,
}

fn d_poll_interval_ms() -> u64 {
    2_000
}
fn d_poll_timeout_s() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OtpSource {
    Imap {
        host: String,
        account_env: String,
        password_env: String,
    },
    Http {
        url: String,
    },
}
