//! Vendor-neutral completion request and response types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Base64 media attached to the final user turn
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// Function the model may call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// A completion request as the caller expresses it
///
/// Adapters translate this into their vendor's wire format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CompletionRequest {
    pub intent: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub require_json: bool,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub inline_data: Vec<InlineData>,
    /// Earlier turns, sent before `messages`
    #[serde(default)]
    pub chat_history: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(intent: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            intent: intent.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_require_json(mut self, require_json: bool) -> Self {
        self.require_json = require_json;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_inline_data(mut self, data: Vec<InlineData>) -> Self {
        self.inline_data = data;
        self
    }

    pub fn with_chat_history(mut self, history: Vec<Message>) -> Self {
        self.chat_history = history;
        self
    }

    /// System text from the explicit instruction and any system messages
    pub fn combined_system(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .system_instruction
            .as_deref()
            .into_iter()
            .chain(
                self.chat_history
                    .iter()
                    .chain(&self.messages)
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str()),
            )
            .filter(|s| !s.trim().is_empty())
            .collect();

        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Non-system turns in send order (history first)
    pub fn conversation(&self) -> impl Iterator<Item = &Message> {
        self.chat_history
            .iter()
            .chain(&self.messages)
            .filter(|m| m.role != Role::System)
    }

    /// Characters across every text the vendor will see
    pub fn prompt_chars(&self) -> usize {
        self.system_instruction.as_deref().map_or(0, str::len)
            + self
                .chat_history
                .iter()
                .chain(&self.messages)
                .map(|m| m.content.len())
                .sum::<usize>()
    }
}

/// Token counts for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    /// Rough count used when the vendor does not report usage (4 chars per token)
    pub fn estimate(prompt_chars: usize, completion_chars: usize) -> Self {
        fn tokens(chars: usize) -> u32 {
            u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
        }
        Self {
            input_tokens: tokens(prompt_chars),
            output_tokens: tokens(completion_chars),
        }
    }
}

/// Text and usage returned by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterResponse {
    pub text: String,
    pub usage: Usage,
}
