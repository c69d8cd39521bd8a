//! Task parameterization (spec.md §4.7 step 2): asks the model to rewrite
//! a task into a `:N`-placeholder template plus the variable values it
//! extracted, so future runs with different values can hit the same
//! recording.

use std::collections::HashMap;

use nav_domain::error::{Error, Result};
use nav_domain::recording::task_hash;
use nav_providers::traits::{ChatRequest, LlmProvider};
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You rewrite a browser-automation task description into a reusable \
template. Replace every concrete value that could plausibly vary between runs (place names, \
dates, quantities, search terms) with a placeholder `:1`, `:2`, ... in order of first \
appearance. Respond with JSON only: {\"template\": string, \"variables\": {\":1\": string, ...}}.";

#[derive(Debug, Clone)]
pub struct ParameterizedTask {
    pub template_text: String,
    pub variables: HashMap<String, String>,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
struct ParameterizeResponse {
    template: String,
    variables: HashMap<String, String>,
}

/// Calls the model once to produce a template + variables mapping for
/// `task_text`, then hashes the template the same way a literal task is
/// hashed (spec.md §4.7: "compute `parameterized_hash`").
pub async fn parameterize(provider: &dyn LlmProvider, task_text: &str, model: Option<&str>) -> Result<ParameterizedTask> {
    let response = provider
        .chat(ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![nav_domain::chat::ChatMessage::user(task_text)],
            tools: vec![],
            temperature: Some(0.0),
            max_tokens: None,
            json_mode: true,
            model: model.map(|m| m.to_string()),
            image: None,
            purpose: "parameterize_replay".to_string(),
            site_id: None,
        })
        .await?;

    let parsed: ParameterizeResponse = serde_json::from_str(&response.content)
        .map_err(|e| Error::Other(format!("parameterize response was not the expected JSON shape: {e}")))?;

    let hash = task_hash(&parsed.template);
    Ok(ParameterizedTask { template_text: parsed.template, variables: parsed.variables, hash })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_equal_templates() {
        assert_eq!(task_hash("Book flight from :1 to :2"), task_hash("Book flight from :1 to :2"));
    }
}
