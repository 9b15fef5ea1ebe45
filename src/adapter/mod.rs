//! Uniform conversation adapter over the Chat and Responses LLM request
//! shapes (spec §4.6).
//!
//! Rather than a generic trait parameterized over an associated shape, this
//! follows the closed-tagged-union style the domain calls for: a
//! [`Conversation`]/[`LlmResponse`] enum with exactly two variants, and free
//! functions that exhaustively match on them. Adding a third shape would be
//! a compile error at every match site instead of a silent downcast bug.

pub mod chat;
pub mod responses;

use serde_json::Value;

use chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatToolCall, ToolCallMetadata};
use responses::{ResponsesItem, ResponsesRequest, ResponsesResponse};

/// A tool call extracted from an LLM response, shape-neutral.
#[derive(Debug, Clone)]
pub struct ExtractedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The executed outcome of one tool call, ready to be folded back into
/// either conversation shape.
#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub content: String,
    pub metadata: ToolCallMetadata,
}

#[derive(Debug, Clone)]
pub enum LlmRequest {
    Chat(ChatRequest),
    Responses(ResponsesRequest),
}

#[derive(Debug, Clone)]
pub enum LlmResponse {
    Chat(ChatResponse),
    Responses(ResponsesResponse),
}

impl LlmRequest {
    pub fn tools(&self) -> Option<&[Value]> {
        match self {
            LlmRequest::Chat(r) => r.tools.as_deref(),
            LlmRequest::Responses(r) => r.tools.as_deref(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        match &mut self {
            LlmRequest::Chat(r) => r.tools = Some(tools),
            LlmRequest::Responses(r) => r.tools = Some(tools),
        }
        self
    }
}

/// Pull the tool calls an LLM response asked for, in emission order.
pub fn extract_tool_calls(response: &LlmResponse) -> Vec<ExtractedToolCall> {
    match response {
        LlmResponse::Chat(r) => r
            .choices
            .first()
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| ExtractedToolCall {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        LlmResponse::Responses(r) => r
            .output
            .iter()
            .filter_map(|item| match item {
                ResponsesItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => Some(ExtractedToolCall {
                    id: call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect(),
    }
}

/// True when the response carries no tool calls at all, i.e. the agent
/// loop's iteration condition (spec §4.7 step 2) is already satisfied.
pub fn has_tool_calls(response: &LlmResponse) -> bool {
    !extract_tool_calls(response).is_empty()
}

/// Append the assistant's turn (its own message, including any tool calls)
/// onto the running history, shape-matched to the request it came from.
pub fn append_assistant_turn(request: &mut LlmRequest, response: &LlmResponse) {
    match (request, response) {
        (LlmRequest::Chat(req), LlmResponse::Chat(resp)) => {
            if let Some(choice) = resp.choices.first() {
                req.input.push(choice.message.clone());
            }
        }
        (LlmRequest::Responses(req), LlmResponse::Responses(resp)) => {
            req.input.extend(resp.output.iter().cloned());
        }
        _ => unreachable!("request/response shape mismatch"),
    }
}

/// Append tool results to the running history, producing a `Tool`-role
/// message per result (Chat) or a `function_call_output` item (Responses).
pub fn append_tool_results(request: &mut LlmRequest, results: &[ToolExecutionResult]) {
    match request {
        LlmRequest::Chat(req) => {
            for result in results {
                let mut msg = ChatMessage::tool_result(result.tool_call_id.clone(), result.content.clone());
                msg.metadata = Some(result.metadata.clone());
                req.input.push(msg);
            }
        }
        LlmRequest::Responses(req) => {
            for result in results {
                req.input
                    .push(ResponsesItem::function_call_output(result.tool_call_id.clone(), result.content.clone()));
            }
        }
    }
}

const EXECUTED_PREFIX: &str = "The Output from allowed tools calls is - ";
const NEXT_CALLS_SUFFIX: &str = "Now I shall call these tools next...";

/// Build the literal framing text for the synthesized "executed-tools"
/// response (spec §4.6, §9 worked example 4). When `executed` is empty only
/// the trailing phrase is used.
pub fn build_executed_tools_text(executed: &[(String, Value)]) -> String {
    if executed.is_empty() {
        return NEXT_CALLS_SUFFIX.to_string();
    }
    let map: serde_json::Map<String, Value> = executed.iter().cloned().collect();
    let json = serde_json::to_string(&Value::Object(map)).unwrap_or_else(|_| "{}".to_string());
    format!("{EXECUTED_PREFIX}{json}\n\n{NEXT_CALLS_SUFFIX}")
}

/// Synthesize the "executed-tools" response that stops the agent loop when
/// approval-required calls remain (spec §4.6, §4.7 step 5).
pub fn build_executed_tools_response(
    shape: &LlmResponse,
    executed: &[(String, Value)],
    pending: &[ExtractedToolCall],
) -> LlmResponse {
    let text = build_executed_tools_text(executed);
    match shape {
        LlmResponse::Chat(_) => {
            let tool_calls = if pending.is_empty() {
                None
            } else {
                Some(
                    pending
                        .iter()
                        .map(|c| ChatToolCall {
                            id: c.id.clone(),
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        })
                        .collect(),
                )
            };
            let message = ChatMessage {
                role: ChatRole::Assistant,
                content: Some(text),
                tool_calls,
                tool_call_id: None,
                metadata: None,
            };
            LlmResponse::Chat(ChatResponse::single(message, "stop"))
        }
        LlmResponse::Responses(_) => {
            let mut output = vec![ResponsesItem::message("assistant", text)];
            for call in pending {
                output.push(ResponsesItem::FunctionCall {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }
            LlmResponse::Responses(ResponsesResponse { output })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::chat::CallParams;

    #[test]
    fn executed_tools_text_has_no_prefix_when_nothing_executed() {
        assert_eq!(build_executed_tools_text(&[]), NEXT_CALLS_SUFFIX);
    }

    #[test]
    fn executed_tools_text_embeds_json_map() {
        let text = build_executed_tools_text(&[("add".to_string(), Value::String("3".to_string()))]);
        assert!(text.starts_with(EXECUTED_PREFIX));
        assert!(text.contains("\"add\":\"3\""));
        assert!(text.ends_with(NEXT_CALLS_SUFFIX));
    }

    #[test]
    fn extract_tool_calls_reads_first_chat_choice() {
        let resp = LlmResponse::Chat(ChatResponse::single(
            ChatMessage::assistant_with_tool_calls(vec![ChatToolCall {
                id: "1".into(),
                name: "add".into(),
                arguments: "{}".into(),
            }]),
            "tool_calls",
        ));
        let calls = extract_tool_calls(&resp);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "add");
    }

    #[test]
    fn append_assistant_turn_matches_responses_shape() {
        let mut req = LlmRequest::Responses(ResponsesRequest {
            call_params: CallParams::default(),
            input: vec![],
            tools: None,
        });
        let resp = LlmResponse::Responses(ResponsesResponse {
            output: vec![ResponsesItem::message("assistant", "hi")],
        });
        append_assistant_turn(&mut req, &resp);
        match req {
            LlmRequest::Responses(r) => assert_eq!(r.input.len(), 1),
            _ => panic!("wrong variant"),
        }
    }
}
