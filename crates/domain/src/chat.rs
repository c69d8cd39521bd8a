use serde::{Deserialize, Serialize};

/// A provider-agnostic tool invocation requested by a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the model, normalized by the Tool Fabric (C3)
/// from a typed function signature or a Remote Tool Session's declared
/// schema. `parameters` is always a flattened JSON Schema object — no
/// `$ref`/`$defs` (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One entry in a task's conversation history.
///
/// `Assistant` carries either free text or a list of tool calls, never both
/// — callers that need to tell the two apart match on the variant rather
/// than inspecting optional fields, per the re-architecture note in
/// spec.md §9 ("sum types for ChatMessage").
///
/// Invariant: for every `Assistant { tool_calls }` entry with a call id `k`,
/// the history must eventually contain a matching `Tool { call_id: Some(k) }`
/// entry; call order within one assistant turn is preserved by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    User { text: String },
    Assistant(AssistantMessage),
    Tool {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        payload: String,
    },
}

/// The two mutually-exclusive shapes an assistant turn can take.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssistantMessage {
    Text { text: String },
    ToolCalls { tool_calls: Vec<ToolCall> },
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage::User { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        ChatMessage::Assistant(AssistantMessage::Text { text: text.into() })
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        ChatMessage::Assistant(AssistantMessage::ToolCalls { tool_calls })
    }

    pub fn tool_result(
        name: impl Into<String>,
        call_id: Option<String>,
        payload: impl Into<String>,
    ) -> Self {
        ChatMessage::Tool {
            name: name.into(),
            call_id,
            payload: payload.into(),
        }
    }

    /// Extract a mutable handle to the raw text content for literal
    /// substitution during replay (spec.md §4.7 / §8 property 4). Only
    /// `User`, `Assistant::Text`, and `Tool` payload content is rewritten;
    /// tool-call argument shapes are left untouched.
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            ChatMessage::User { text } => Some(text),
            ChatMessage::Assistant(AssistantMessage::Text { text }) => Some(text),
            ChatMessage::Tool { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ChatMessage::User { text } => Some(text.as_str()),
            ChatMessage::Assistant(AssistantMessage::Text { text }) => Some(text.as_str()),
            ChatMessage::Tool { payload, .. } => Some(payload.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_text_and_tool_calls_are_mutually_exclusive_on_the_wire() {
        let text = ChatMessage::assistant_text("hello");
        let calls = ChatMessage::assistant_tool_calls(vec![ToolCall {
            id: Some("c1".into()),
            name: "click".into(),
            arguments: serde_json::json!({"target": "[Login]"}),
        }]);
        let text_json = serde_json::to_value(&text).unwrap();
        let calls_json = serde_json::to_value(&calls).unwrap();
        assert!(text_json.get("text").is_some());
        assert!(calls_json.get("tool_calls").is_some());
    }

    #[test]
    fn text_mut_rewrites_user_and_tool_payload() {
        let mut m = ChatMessage::user("Book flight from Boston to Seattle");
        *m.text_mut().unwrap() = m.text().unwrap().replace("Boston", "NYC");
        assert_eq!(m.text(), Some("Book flight from NYC to Seattle"));
    }
}
