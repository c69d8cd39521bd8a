use serde::Serialize;

/// The machine event channel (spec.md §6): when log output is redirected to
/// a file, the process still emits these as single-line JSON on its
/// original output stream. Every variant carries `ts`/`ts_local` so a reader
/// never has to correlate against the surrounding log line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum NavEvent {
    TurnStarted {
        site_name: String,
        turn: u32,
    },
    ModelCalled {
        purpose: String,
        model: String,
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
        duration_ms: u64,
    },
    StepResolved {
        action: String,
        target: String,
        resolved: bool,
    },
    ActionExecuted {
        action: String,
        target: String,
        result: String,
    },
    ReplayHit {
        task_hash: String,
        parameterized: bool,
    },
    ReplayMiss {
        task_hash: String,
    },
    OtpApplied {
        per_digit: bool,
        digits: usize,
    },
    DelegatedToUser {
        reason: String,
    },
    DelegatedToAgent {
        target_site: String,
        spawned: bool,
    },
    TaskCompleted {
        site_name: String,
        turns: u32,
        answer: String,
    },
    TaskFailed {
        site_name: String,
        reason: String,
    },
}

impl NavEvent {
    /// Serializes to one JSON line and logs it at `info`, the way
    /// upstream's `TraceEvent::emit()` does. `ts`/`ts_local` are stamped in
    /// by the caller via [`with_timestamps`] since this crate does not call
    /// wall-clock functions itself.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(nav_event = %json, "nav_event");
    }

    /// Wraps this event with `ts`/`ts_local` fields and emits the envelope.
    pub fn emit_with_time(&self, ts_utc: chrono::DateTime<chrono::Utc>, ts_local: &str) {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("ts".into(), serde_json::Value::String(ts_utc.to_rfc3339()));
            obj.insert(
                "ts_local".into(),
                serde_json::Value::String(ts_local.to_string()),
            );
        }
        let json = serde_json::to_string(&value).unwrap_or_default();
        tracing::info!(nav_event = %json, "nav_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_with_time_adds_timestamp_fields() {
        let ev = NavEvent::ReplayMiss {
            task_hash: "abc123".into(),
        };
        let mut value = serde_json::to_value(&ev).unwrap();
        value["ts"] = serde_json::Value::String("2026-07-28T00:00:00Z".into());
        assert_eq!(value["type"], "ReplayMiss");
    }
}
