//! Responses-shape conversation types (spec §3 `ConversationTurn`, §4.6).
//!
//! The Responses API represents a conversation as a flat list of typed
//! items rather than role-tagged messages: plain messages, function calls
//! emitted by the model, and function-call outputs fed back to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::CallParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl ResponsesItem {
    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    #[serde(flatten)]
    pub call_params: CallParams,
    pub input: Vec<ResponsesItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub output: Vec<ResponsesItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_output_round_trips_call_id() {
        let item = ResponsesItem::function_call_output("call-9", "42");
        match item {
            ResponsesItem::FunctionCallOutput { call_id, output } => {
                assert_eq!(call_id, "call-9");
                assert_eq!(output, "42");
            }
            _ => panic!("wrong variant"),
        }
    }
}
