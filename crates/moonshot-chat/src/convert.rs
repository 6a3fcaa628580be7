//! Conversion between canonical types and the Moonshot wire format

use crate::error::ChatError;
use crate::protocol::{
    ChatCompletion, ChatCompletionMessage, Choice, FunctionCall, WireToolCall, function_type, render_finish_reason,
};
use crate::types::{
    AssistantMessage, ChatResponse, Generation, Message, Metadata, ResponseMetadata, ToolCall, ToolResponse,
    ToolResponseMessage,
};
use crate::usage::cumulative_usage;

// -- Outbound: canonical types -> wire format --

/// Serialize one message into its wire representation
///
/// A tool message expands to one wire message per response. Tool responses
/// without an id are rejected.
pub fn message_to_wire(message: &Message) -> Result<Vec<ChatCompletionMessage>, ChatError> {
    match message {
        Message::System { content } => Ok(vec![ChatCompletionMessage::text("system", content.clone())]),
        Message::User { content } => Ok(vec![ChatCompletionMessage::text("user", content.clone())]),
        Message::Assistant(assistant) => {
            let tool_calls = assistant.has_tool_calls().then(|| {
                assistant
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        tool_type: function_type(),
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect()
            });
            Ok(vec![ChatCompletionMessage {
                role: "assistant".to_owned(),
                content: assistant.content.clone(),
                name: None,
                tool_call_id: None,
                tool_calls,
            }])
        }
        Message::Tool(tool) => tool
            .responses
            .iter()
            .map(|response| {
                if response.id.is_empty() {
                    return Err(ChatError::Validation("tool response message must have an id".to_owned()));
                }
                Ok(ChatCompletionMessage {
                    role: "tool".to_owned(),
                    content: Some(response.response_data.clone()),
                    name: Some(response.name.clone()),
                    tool_call_id: Some(response.id.clone()),
                    tool_calls: None,
                })
            })
            .collect(),
    }
}

// -- Inbound: wire format -> canonical types --

impl TryFrom<ChatCompletionMessage> for Message {
    type Error = ChatError;

    fn try_from(msg: ChatCompletionMessage) -> Result<Self, Self::Error> {
        match msg.role.as_str() {
            "system" => Ok(Self::system(msg.content.unwrap_or_default())),
            "user" => Ok(Self::user(msg.content.unwrap_or_default())),
            "assistant" => Ok(Self::Assistant(AssistantMessage {
                content: msg.content,
                tool_calls: tool_calls_from_wire(msg.tool_calls.unwrap_or_default()),
                metadata: Metadata::new(),
            })),
            "tool" => {
                let id = msg
                    .tool_call_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ChatError::Validation("tool response message must have an id".to_owned()))?;
                Ok(Self::Tool(ToolResponseMessage {
                    responses: vec![ToolResponse {
                        id,
                        name: msg.name.unwrap_or_default(),
                        response_data: msg.content.unwrap_or_default(),
                    }],
                }))
            }
            other => Err(ChatError::Validation(format!("unsupported message role: {other}"))),
        }
    }
}

/// Convert a wire conversation into canonical messages
pub fn messages_from_wire(messages: Vec<ChatCompletionMessage>) -> Result<Vec<Message>, ChatError> {
    messages.into_iter().map(Message::try_from).collect()
}

fn tool_calls_from_wire(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect()
}

/// Build a generation from one choice
///
/// `index` is recorded in the metadata only when given; streamed snapshots
/// omit it.
pub fn build_generation(choice: Choice, id: &str, role: &str, index: Option<u32>) -> Generation {
    let finish_reason = render_finish_reason(choice.finish_reason.as_deref());

    let mut metadata = Metadata::new();
    metadata.insert("id".to_owned(), id.into());
    metadata.insert("role".to_owned(), role.to_uppercase().into());
    if let Some(index) = index {
        metadata.insert("index".to_owned(), index.into());
    }
    metadata.insert("finishReason".to_owned(), finish_reason.clone().into());

    let output = AssistantMessage {
        content: choice.message.content,
        tool_calls: tool_calls_from_wire(choice.message.tool_calls.unwrap_or_default()),
        metadata,
    };

    Generation::new(output, finish_reason)
}

/// Convert a non-streamed completion, folding in the previous turn's usage
pub fn to_chat_response(completion: ChatCompletion, previous: Option<&ChatResponse>) -> ChatResponse {
    let id = completion.id.unwrap_or_default();

    if completion.choices.is_empty() {
        tracing::warn!(id = %id, "no choices returned for completion");
    }

    let generations = completion
        .choices
        .into_iter()
        .map(|choice| {
            let role = choice.message.role.clone();
            let index = choice.index;
            build_generation(choice, &id, &role, Some(index))
        })
        .collect();

    ChatResponse::new(
        generations,
        ResponseMetadata {
            id,
            model: completion.model.unwrap_or_default(),
            created: completion.created.unwrap_or_default(),
            usage: cumulative_usage(completion.usage, previous),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Usage;

    fn completion(choices: Vec<Choice>, usage: Option<Usage>) -> ChatCompletion {
        ChatCompletion {
            id: Some("cmpl-1".to_owned()),
            object: Some("chat.completion".to_owned()),
            created: Some(1_700_000_000),
            model: Some("moonshot-v1-8k".to_owned()),
            choices,
            usage,
        }
    }

    fn text_choice(index: u32, text: &str) -> Choice {
        Choice {
            index,
            message: ChatCompletionMessage::text("assistant", text),
            finish_reason: Some("stop".to_owned()),
        }
    }

    #[test]
    fn generation_metadata_echoes_choice() {
        let response = to_chat_response(completion(vec![text_choice(0, "hello")], Some(Usage::new(5, 1, 6))), None);

        let generation = response.result().unwrap();
        assert_eq!(generation.finish_reason, "STOP");
        assert_eq!(generation.output.metadata["id"], "cmpl-1");
        assert_eq!(generation.output.metadata["role"], "ASSISTANT");
        assert_eq!(generation.output.metadata["index"], 0);
        assert_eq!(generation.output.metadata["finishReason"], "STOP");
        assert_eq!(response.metadata.model, "moonshot-v1-8k");
        assert_eq!(response.usage(), Usage::new(5, 1, 6));
    }

    #[test]
    fn empty_choices_yield_empty_generations() {
        let response = to_chat_response(completion(Vec::new(), None), None);
        assert!(response.generations.is_empty());
        assert_eq!(response.usage(), Usage::default());
    }

    #[test]
    fn usage_accumulates_from_previous_turn() {
        let first = to_chat_response(completion(vec![text_choice(0, "a")], Some(Usage::new(10, 2, 12))), None);
        let second = to_chat_response(
            completion(vec![text_choice(0, "b")], Some(Usage::new(20, 3, 23))),
            Some(&first),
        );
        assert_eq!(second.usage(), Usage::new(30, 5, 35));
    }

    #[test]
    fn tool_message_without_id_is_rejected() {
        let message = Message::Tool(ToolResponseMessage {
            responses: vec![ToolResponse {
                id: String::new(),
                name: "lookup".to_owned(),
                response_data: "42".to_owned(),
            }],
        });
        let err = message_to_wire(&message).unwrap_err();
        assert!(matches!(err, ChatError::Validation(msg) if msg.contains("must have an id")));
    }

    #[test]
    fn tool_message_expands_per_response() {
        let message = Message::Tool(ToolResponseMessage {
            responses: vec![
                ToolResponse {
                    id: "call_1".to_owned(),
                    name: "lookup".to_owned(),
                    response_data: "42".to_owned(),
                },
                ToolResponse {
                    id: "call_2".to_owned(),
                    name: "clock".to_owned(),
                    response_data: "noon".to_owned(),
                },
            ],
        });
        let wire = message_to_wire(&message).unwrap();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_2"));
        assert_eq!(wire[1].name.as_deref(), Some("clock"));
    }

    #[test]
    fn unknown_wire_role_is_rejected() {
        let err = Message::try_from(ChatCompletionMessage::text("developer", "hi")).unwrap_err();
        assert!(matches!(err, ChatError::Validation(msg) if msg.contains("developer")));

        let messages = messages_from_wire(vec![
            ChatCompletionMessage::text("system", "be brief"),
            ChatCompletionMessage::text("user", "hi"),
        ])
        .unwrap();
        assert_eq!(messages, vec![Message::system("be brief"), Message::user("hi")]);
    }
}
