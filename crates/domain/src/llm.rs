use crate::chat::ToolCall;
use serde::{Deserialize, Serialize};

/// One resolved or unresolved action a model wants executed against the page.
///
/// `value` and `resolve_value` are mutually exclusive on input from the
/// model: a step carries exactly one of them until the resolver chain (C6)
/// runs, after which `value` is always present and `resolve_value` is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStep {
    pub action: StepAction,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_value: Option<String>,
    #[serde(skip)]
    pub locator: Option<crate::locator::LocatorHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expandable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Click,
    Fill,
    Select,
    Check,
    Uncheck,
    Scroll,
    Run,
}

/// A single step, or an ordered list of them — the model may reply with
/// either shape under `step` or `steps`; both are normalized to a `Vec` by
/// `LlmResponse::into_steps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepOrSteps {
    One(LlmStep),
    Many(Vec<LlmStep>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepExecution {
    Single,
    Sequence,
    Success,
    Wait,
    Back,
    DismissModal,
    CloseCurrentTab,
    DelegateToUser,
    DelegateToAgent,
}

/// The parsed shape of a model turn. `step`/`steps` and `tool_calls` are
/// populated depending on `step_execution`; permissive by design since the
/// model is an untrusted producer (spec.md §9: "keep a permissive parser for
/// model input").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    #[serde(default)]
    pub step_execution: Option<StepExecution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepOrSteps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<LlmStep>>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl LlmResponse {
    /// Normalizes `step` (single or list) and `steps` into one ordered list,
    /// mirroring the original's `extract_steps()`: a `step` dict becomes a
    /// one-element list, a `step` list passes through, and `steps` (always a
    /// list) takes precedence when both are present.
    pub fn into_steps(self) -> Vec<LlmStep> {
        if let Some(steps) = self.steps {
            return steps;
        }
        match self.step {
            Some(StepOrSteps::One(s)) => vec![s],
            Some(StepOrSteps::Many(v)) => v,
            None => Vec::new(),
        }
    }

    pub fn steps(&self) -> Vec<&LlmStep> {
        if let Some(steps) = &self.steps {
            return steps.iter().collect();
        }
        match &self.step {
            Some(StepOrSteps::One(s)) => vec![s],
            Some(StepOrSteps::Many(v)) => v.iter().collect(),
            None => Vec::new(),
        }
    }

    /// Mutable view over whichever of `steps`/`step` is populated, in the
    /// same precedence order as [`Self::into_steps`]. Used by the resolver
    /// chain (spec.md §4.6) to fill in `value` without discarding the
    /// single-vs-list shape the model chose.
    pub fn steps_mut(&mut self) -> Vec<&mut LlmStep> {
        if let Some(steps) = &mut self.steps {
            return steps.iter_mut().collect();
        }
        match &mut self.step {
            Some(StepOrSteps::One(s)) => vec![s],
            Some(StepOrSteps::Many(v)) => v.iter_mut().collect(),
            None => Vec::new(),
        }
    }

    /// Clears `step`/`steps`, the way the resolver chain's delegation
    /// fallback does when rewriting a response to `DELEGATE_TO_USER`
    /// (spec.md §4.6 stage 4).
    pub fn clear_steps(&mut self) {
        self.step = None;
        self.steps = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_steps_normalizes_single_step_dict() {
        let resp = LlmResponse {
            step_execution: Some(StepExecution::Single),
            step: Some(StepOrSteps::One(LlmStep {
                action: StepAction::Fill,
                target: "{Search}".into(),
                value: Some("Macbook Pro".into()),
                resolve_value: None,
                locator: None,
                is_expandable: None,
                result: None,
                orig_value: None,
                orig_target: None,
            })),
            steps: None,
            reasoning: "".into(),
            answer: None,
            tool_calls: None,
        };
        let steps = resp.into_steps();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn steps_field_takes_precedence_over_step() {
        let resp = LlmResponse {
            step_execution: Some(StepExecution::Sequence),
            step: Some(StepOrSteps::One(LlmStep {
                action: StepAction::Click,
                target: "[A]".into(),
                value: None,
                resolve_value: None,
                locator: None,
                is_expandable: None,
                result: None,
                orig_value: None,
                orig_target: None,
            })),
            steps: Some(vec![]),
            reasoning: "".into(),
            answer: None,
            tool_calls: None,
        };
        assert_eq!(resp.into_steps().len(), 0);
    }
}
