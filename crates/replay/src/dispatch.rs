//! Replay dispatch (spec.md §4.7 "Replay dispatch"): drains recorded
//! assistant messages in FIFO order while armed. Disarms itself once the
//! recorded turn says `SUCCESS` (the next turn always uses a live model
//! call for end-to-end review) or once the caller gives up resolving a
//! first-step locator.

use std::collections::VecDeque;
use std::time::Duration;

use nav_domain::chat::ChatMessage;

/// Retry policy for a first-step locator miss during replay (spec.md
/// §4.7): "retries locator resolution up to 3 times with 1-second
/// sleeps; on final failure replay is disarmed".
pub const LOCATOR_RETRY_ATTEMPTS: u32 = 3;
pub const LOCATOR_RETRY_SLEEP: Duration = Duration::from_secs(1);

pub struct ReplayCursor {
    assistant_messages: VecDeque<ChatMessage>,
    armed: bool,
}

impl ReplayCursor {
    /// Arms a cursor over every `Assistant` entry of a recorded chat
    /// history, in original order (spec.md §5: "Recorded chat history is
    /// consumed FIFO during replay").
    pub fn arm(history: &[ChatMessage]) -> Self {
        let assistant_messages = history
            .iter()
            .filter(|m| matches!(m, ChatMessage::Assistant(_)))
            .cloned()
            .collect();
        Self { assistant_messages, armed: true }
    }

    pub fn disarmed() -> Self {
        Self { assistant_messages: VecDeque::new(), armed: false }
    }

    pub fn is_armed(&self) -> bool {
        self.armed && !self.assistant_messages.is_empty()
    }

    /// Pops the next recorded assistant message, if still armed.
    pub fn next_message(&mut self) -> Option<ChatMessage> {
        if !self.armed {
            return None;
        }
        self.assistant_messages.pop_front()
    }

    /// Disarms replay; the turn that triggered this must fall back to a
    /// live model call (spec.md §4.7: on recorded `SUCCESS`, or on final
    /// locator-resolution failure).
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_collects_only_assistant_messages_in_order() {
        let history = vec![
            ChatMessage::user("go"),
            ChatMessage::assistant_text("first"),
            ChatMessage::tool_result("click", Some("c1".into()), "ok"),
            ChatMessage::assistant_text("second"),
        ];
        let mut cursor = ReplayCursor::arm(&history);
        assert!(cursor.is_armed());
        assert_eq!(cursor.next_message().unwrap().text(), Some("first"));
        assert_eq!(cursor.next_message().unwrap().text(), Some("second"));
        assert!(cursor.next_message().is_none());
    }

    #[test]
    fn disarm_stops_further_dispatch() {
        let history = vec![ChatMessage::assistant_text("only")];
        let mut cursor = ReplayCursor::arm(&history);
        cursor.disarm();
        assert!(cursor.next_message().is_none());
    }
}
