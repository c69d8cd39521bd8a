//! Success and delegation review passes (spec.md §4.8 "Review"): a second,
//! independent model call double-checks a turn's own verdict before the
//! loop commits to it, the same separation of actor and critic the teacher
//! uses for its own review steps.

use nav_domain::chat::ChatMessage;
use nav_domain::error::{Error, Result};
use nav_providers::{ChatRequest, LlmProvider};
use serde::Deserialize;

use crate::prompts::{review_delegation_system_prompt, review_success_system_prompt};

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewVerdict {
    pub review_decision: String,
    #[serde(default)]
    pub review_feedback: String,
}

impl ReviewVerdict {
    pub fn goal_met(&self) -> bool {
        self.review_decision.eq_ignore_ascii_case("Goal Met")
    }

    pub fn is_suggestion(&self) -> bool {
        self.review_decision.eq_ignore_ascii_case("Suggestion")
    }
}

async fn run_review(provider: &dyn LlmProvider, system: String, history: &[ChatMessage], site_id: i64, purpose: &str) -> Result<ReviewVerdict> {
    let req = ChatRequest {
        system,
        messages: history.to_vec(),
        tools: Vec::new(),
        temperature: Some(0.0),
        max_tokens: None,
        json_mode: true,
        model: None,
        image: None,
        purpose: purpose.to_string(),
        site_id: Some(site_id),
    };
    let resp = provider.chat(req).await?;
    serde_json::from_str(&resp.content).map_err(|e| Error::SchemaValidation(format!("review response: {e}")))
}

/// Double-checks a claimed `SUCCESS` against the turn history and current
/// page (spec.md §4.8 "Success review": "the assistant has indicated ... to
/// determine if it has indeed correctly fulfilled the user's goal").
pub async fn review_success(provider: &dyn LlmProvider, history: &[ChatMessage], site_id: i64) -> Result<ReviewVerdict> {
    run_review(provider, review_success_system_prompt(), history, site_id, "review_success").await
}

/// Double-checks a claimed `DELEGATE_TO_USER` (spec.md §4.8 "Delegation
/// review"). A `Suggestion` verdict is folded back into the loop as
/// feedback rather than letting the delegation stand.
pub async fn review_delegation(provider: &dyn LlmProvider, history: &[ChatMessage], site_id: i64) -> Result<ReviewVerdict> {
    run_review(provider, review_delegation_system_prompt(), history, site_id, "review_delegation").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_met_is_case_insensitive() {
        let v = ReviewVerdict { review_decision: "goal met".into(), review_feedback: String::new() };
        assert!(v.goal_met());
    }

    #[test]
    fn suggestion_is_recognized() {
        let v = ReviewVerdict { review_decision: "Suggestion".into(), review_feedback: "try X".into() };
        assert!(v.is_suggestion());
        assert!(!v.goal_met());
    }
}
