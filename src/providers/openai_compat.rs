//! OpenAI-compatible `/chat/completions` wire format
//!
//! Spoken by Groq, Cerebras, Mistral, OpenRouter and most other hosted
//! inference services.

use super::http::{WireProtocol, WireReply};
use super::request::{CompletionRequest, Message, Role, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiCompatWire;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl OpenAiCompatWire {
    fn body<'a>(request: &'a CompletionRequest, model: &'a str) -> ChatCompletionRequest<'a> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        if let Some(system) = request.combined_system() {
            messages.push(ChatMessage {
                role: "system",
                content: Value::String(system),
            });
        }
        messages.extend(request.conversation().map(|m: &Message| ChatMessage {
            role: role_name(m.role),
            content: Value::String(m.content.clone()),
        }));

        if !request.inline_data.is_empty() {
            let images = request.inline_data.iter().map(|d| {
                json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:{};base64,{}", d.mime_type, d.data)}
                })
            });
            match messages.last_mut() {
                Some(last) if last.role == "user" => {
                    let text = std::mem::take(&mut last.content);
                    let mut parts = vec![json!({"type": "text", "text": text})];
                    parts.extend(images);
                    last.content = Value::Array(parts);
                }
                _ => messages.push(ChatMessage {
                    role: "user",
                    content: Value::Array(images.collect()),
                }),
            }
        }

        ChatCompletionRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .require_json
                .then(|| json!({"type": "json_object"})),
            tools: request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters.clone().unwrap_or_else(|| json!({"type": "object", "properties": {}})),
                        }
                    })
                })
                .collect(),
        }
    }
}

impl WireProtocol for OpenAiCompatWire {
    fn build(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> reqwest::RequestBuilder {
        client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&Self::body(request, model))
    }

    fn parse(&self, body: &str) -> Result<WireReply, String> {
        let response: ChatCompletionResponse =
            serde_json::from_str(body).map_err(|e| e.to_string())?;

        let message = response.choices.into_iter().next().map(|c| c.message);
        let mut text = message
            .as_ref()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        if text.trim().is_empty()
            && let Some(calls) = message.and_then(|m| m.tool_calls)
            && !calls.is_empty()
        {
            text = serde_json::to_string(&calls).map_err(|e| e.to_string())?;
        }

        Ok(WireReply {
            text,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}
