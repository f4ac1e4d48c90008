//! Google Gemini `generateContent` wire format

use super::http::{WireProtocol, WireReply};
use super::request::{CompletionRequest, Role, Usage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiWire;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<serde_json::Value>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GeminiWire {
    fn body<'a>(request: &'a CompletionRequest, system: Option<&'a str>) -> GenerateContentRequest<'a> {
        let mut contents: Vec<Content<'a>> = request
            .conversation()
            .map(|m| Content {
                role: Some(match m.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                }),
                parts: vec![Part {
                    text: Some(&m.content),
                    ..Default::default()
                }],
            })
            .collect();

        if !request.inline_data.is_empty() {
            let media = request.inline_data.iter().map(|d| Part {
                inline_data: Some(Blob {
                    mime_type: &d.mime_type,
                    data: &d.data,
                }),
                ..Default::default()
            });
            match contents.last_mut() {
                Some(last) if last.role == Some("user") => last.parts.extend(media),
                _ => contents.push(Content {
                    role: Some("user"),
                    parts: media.collect(),
                }),
            }
        }

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: &t.name,
                        description: &t.description,
                        parameters: t.parameters.as_ref(),
                    })
                    .collect(),
            }]
        };

        GenerateContentRequest {
            contents,
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text),
                    ..Default::default()
                }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                response_mime_type: request.require_json.then_some("application/json"),
            },
            tools,
        }
    }
}

impl WireProtocol for GeminiWire {
    fn build(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> reqwest::RequestBuilder {
        let system = request.combined_system();
        let url = format!("{}/models/{}:generateContent", base_url, model);
        client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&Self::body(request, system.as_deref()))
    }

    fn parse(&self, body: &str) -> Result<WireReply, String> {
        let response: GenerateContentResponse =
            serde_json::from_str(body).map_err(|e| e.to_string())?;

        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        let mut text = String::new();
        let mut calls = Vec::new();
        for part in parts {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                calls.push(call);
            }
        }

        // Tool calls with no prose come back as their JSON
        if text.trim().is_empty() && !calls.is_empty() {
            text = serde_json::to_string(&calls).map_err(|e| e.to_string())?;
        }

        Ok(WireReply {
            text,
            usage: response.usage_metadata.map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            }),
        })
    }
}
