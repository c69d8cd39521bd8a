use serde::{Deserialize, Serialize};

/// Token usage for one model call, as returned alongside a response and
/// accumulated per purpose (agent name) in a process-wide stats map
/// (spec.md §4.5, §4.8 "Accounting").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub vendor: String,
    pub model: String,
    pub prompt: u64,
    pub cached_prompt: u64,
    pub completion: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt += other.prompt;
        self.cached_prompt += other.cached_prompt;
        self.completion += other.completion;
    }
}

/// Per-model pricing (USD per million tokens) used to turn accumulated
/// usage into the `agent_run_stats` cost columns (spec.md §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelRates {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

impl TokenUsage {
    pub fn cost(&self, rates: ModelRates) -> f64 {
        (self.prompt as f64 / 1_000_000.0) * rates.prompt_per_million
            + (self.completion as f64 / 1_000_000.0) * rates.completion_per_million
    }
}
