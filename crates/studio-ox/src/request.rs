use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    message::{Message, Messages},
    response::Metadata,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ChatRequest {
    #[builder(field)]
    pub messages: Messages,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl<S: chat_request_builder::State> ChatRequestBuilder<S> {
    pub fn messages(mut self, messages: impl IntoIterator<Item = impl Into<Message>>) -> Self {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn message(mut self, message: impl Into<Message>) -> Self {
        self.messages.push(message.into());
        self
    }
}

impl ChatRequest {
    pub fn push_message(&mut self, message: impl Into<Message>) {
        self.messages.push(message.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct AgentTaskRequest {
    #[builder(into)]
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_planner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Metadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct ToolRegistrationRequest {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub description: String,
    /// JSON schema of the tool arguments
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_override: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct VectorSearchRequest {
    #[builder(into)]
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub conversation_id: Option<String>,
}

/// A task split across several cooperating agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct CollaborationTaskRequest {
    #[builder(into)]
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct VisionGenerateRequest {
    #[builder(into)]
    pub prompt: String,
    /// e.g. `1024x1024`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub adapter_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct VisionAnalyzeRequest {
    /// Image URL or base64 data URL
    #[builder(into)]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub analyze_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub adapter_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct VisionEditRequest {
    #[builder(into)]
    pub image: String,
    #[builder(into)]
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub adapter_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_skips_unset_options() {
        let request = ChatRequest::builder()
            .message("hello")
            .message(Message::assistant("hi"))
            .temperature(0.2)
            .build();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi"}
                ],
                "temperature": 0.2_f32
            })
        );
    }

    #[test]
    fn search_request_serializes_only_given_fields() {
        let request = VectorSearchRequest::builder().query("rust jobs").top_k(3).build();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"query": "rust jobs", "top_k": 3})
        );
    }
}
