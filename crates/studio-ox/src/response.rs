use serde::{Deserialize, Serialize};
use serde_json::Value;
use studio_ox_common::{StreamPayload, TokenUsage};

/// Open key-value map the backend attaches to most responses.
pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One increment of a streamed chat response.
///
/// Every field is optional: absence means "not part of this increment".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamChatChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamPayload for StreamChatChunk {
    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub tool: String,
    #[serde(default)]
    pub arguments: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTaskResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRegistrationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub tool_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolListResponse {
    #[serde(default)]
    pub tools: Metadata,
    #[serde(default)]
    pub schemas: Metadata,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySearchResponse {
    #[serde(default)]
    pub results: Vec<Metadata>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborationTaskResponse {
    pub content: String,
    #[serde(default)]
    pub agent_results: Vec<Metadata>,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborationStatus {
    #[serde(default)]
    pub agents: Metadata,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub total_agents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionGenerateResponse {
    /// Image URLs or base64 data URLs
    #[serde(default)]
    pub images: Vec<String>,
    pub model: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionAnalyzeResponse {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub objects: Vec<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub adapters: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterHealthResponse {
    #[serde(default)]
    pub adapters: Metadata,
    #[serde(default)]
    pub healthy_count: usize,
    #[serde(default)]
    pub unhealthy_count: usize,
    #[serde(default)]
    pub unknown_count: usize,
}
