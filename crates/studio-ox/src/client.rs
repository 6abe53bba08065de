use std::time::Duration;

use bon::Builder;
use serde::Serialize;
use serde::de::IgnoredAny;
use studio_ox_common::{
    BoxStream, Endpoint, MultipartForm, SseParser, StreamOptions, StreamSummary,
};

use crate::{
    config::{API_PREFIX, API_TIMEOUT, DEFAULT_API_BASE_URL, OPTIMIZE_TIMEOUT, StudioConfig},
    error::{DispatchError, StudioRequestError},
    internal::StudioRequestHelper,
    logger::LogEntry,
    request::{
        AgentTaskRequest, ChatRequest, CollaborationTaskRequest, ToolRegistrationRequest,
        VectorSearchRequest, VisionAnalyzeRequest, VisionEditRequest, VisionGenerateRequest,
    },
    response::{
        AdapterHealthResponse, AgentTaskResponse, ChatResponse, CollaborationStatus,
        CollaborationTaskResponse, HealthResponse, MemorySearchResponse, StreamChatChunk,
        ToolListResponse, ToolRegistrationResponse, VisionAnalyzeResponse,
        VisionGenerateResponse,
    },
    resume::{
        GenerateResumeRequest, GenerateResumeResponse, ListTemplatesResponse,
        OptimizeResumeRequest, OptimizeResumeResponse, ParseResumeResponse,
    },
};

const HEALTH_URL: &str = "health";
const ADAPTER_HEALTH_URL: &str = "health/adapters";
const CHAT_URL: &str = "llm/chat";
const CHAT_STREAM_URL: &str = "llm/chat/stream";
const MODELS_URL: &str = "llm/models";
const AGENT_TASK_URL: &str = "agent/task";
const AGENT_TOOLS_URL: &str = "agent/tools";
const AGENT_TOOL_REGISTER_URL: &str = "agent/tools/register";
const AGENT_MEMORY_SEARCH_URL: &str = "agent/memory/search";
const AGENT_COLLABORATION_TASK_URL: &str = "agent/collaboration/task";
const AGENT_COLLABORATION_STATUS_URL: &str = "agent/collaboration/status";
const FRONTEND_LOGS_URL: &str = "agent/logs/frontend";
const VISION_GENERATE_URL: &str = "vision/generate";
const VISION_ANALYZE_URL: &str = "vision/analyze";
const VISION_EDIT_URL: &str = "vision/edit";
const RESUME_PARSE_URL: &str = "resume/parse";
const RESUME_OPTIMIZE_URL: &str = "resume/optimize";
const RESUME_GENERATE_URL: &str = "resume/generate";
const RESUME_TEMPLATES_URL: &str = "resume/templates";
const RESUME_DOWNLOAD_URL: &str = "resume/download";
const RESUME_PREVIEW_URL: &str = "resume/preview";

/// Client for the studio backend.
#[derive(Debug, Clone, Builder)]
pub struct Studio {
    /// Backend origin, without the API prefix
    #[builder(default = DEFAULT_API_BASE_URL.to_string(), into)]
    pub(crate) base_url: String,
    #[builder(default = API_PREFIX.to_string(), into)]
    pub(crate) api_prefix: String,
    #[builder(default)]
    pub(crate) client: reqwest::Client,
    #[builder(default = API_TIMEOUT)]
    pub(crate) timeout: Duration,
    #[builder(default)]
    pub(crate) stream_options: StreamOptions,
}

impl Default for Studio {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Studio {
    /// Client for a backend at `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).build()
    }

    pub fn from_config(config: &StudioConfig) -> Self {
        Self::builder()
            .base_url(config.api_base_url.clone())
            .api_prefix(config.api_prefix.clone())
            .timeout(config.timeout)
            .build()
    }

    pub fn load_from_env() -> Result<Self, crate::config::ConfigError> {
        Ok(Self::from_config(&StudioConfig::load_from_env()?))
    }

    /// Base URL every route is relative to.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }

    /// Create request helper for internal use
    fn request_helper(&self) -> StudioRequestHelper {
        StudioRequestHelper::new(self.client.clone(), &self.api_url(), self.timeout)
    }
}

// Health
impl Studio {
    pub async fn health(&self) -> Result<HealthResponse, StudioRequestError> {
        self.request_helper().get(HEALTH_URL).await
    }

    pub async fn adapter_health(&self) -> Result<AdapterHealthResponse, StudioRequestError> {
        self.request_helper().get(ADAPTER_HEALTH_URL).await
    }
}

// LLM
impl Studio {
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, StudioRequestError> {
        self.request_helper().post(CHAT_URL, request).await
    }

    /// Stream a chat completion as a `Stream` of increments.
    pub fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> BoxStream<'static, Result<StreamChatChunk, StudioRequestError>> {
        self.request_helper()
            .stream(CHAT_STREAM_URL, request, self.stream_options)
    }

    /// Open a chat stream and return the reader once response headers arrived.
    pub async fn open_chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<SseParser, StudioRequestError> {
        self.request_helper()
            .open_stream(CHAT_STREAM_URL, request, self.stream_options)
            .await
    }

    /// Stream a chat completion into `handler`, one increment at a time.
    pub async fn stream_chat_with<F, E>(
        &self,
        request: &ChatRequest,
        handler: F,
    ) -> Result<StreamSummary, DispatchError<E>>
    where
        F: FnMut(StreamChatChunk) -> Result<(), E>,
    {
        let mut parser = self.open_chat_stream(request).await?;
        parser.dispatch(handler).await
    }

    pub async fn list_models(&self) -> Result<Vec<String>, StudioRequestError> {
        self.request_helper().get(MODELS_URL).await
    }
}

// Agent
impl Studio {
    pub async fn run_task(
        &self,
        request: &AgentTaskRequest,
    ) -> Result<AgentTaskResponse, StudioRequestError> {
        self.request_helper().post(AGENT_TASK_URL, request).await
    }

    pub async fn register_tool(
        &self,
        request: &ToolRegistrationRequest,
    ) -> Result<ToolRegistrationResponse, StudioRequestError> {
        self.request_helper()
            .post(AGENT_TOOL_REGISTER_URL, request)
            .await
    }

    pub async fn list_tools(&self) -> Result<ToolListResponse, StudioRequestError> {
        log::debug!("listing agent tools");
        self.request_helper()
            .get(AGENT_TOOLS_URL)
            .await
            .inspect_err(|err| log::error!("listing agent tools failed: {err}"))
    }

    pub async fn search_memory(
        &self,
        request: &VectorSearchRequest,
    ) -> Result<MemorySearchResponse, StudioRequestError> {
        self.request_helper()
            .post(AGENT_MEMORY_SEARCH_URL, request)
            .await
    }

    pub async fn run_collaboration_task(
        &self,
        request: &CollaborationTaskRequest,
    ) -> Result<CollaborationTaskResponse, StudioRequestError> {
        self.request_helper()
            .post(AGENT_COLLABORATION_TASK_URL, request)
            .await
    }

    pub async fn collaboration_status(&self) -> Result<CollaborationStatus, StudioRequestError> {
        self.request_helper()
            .get(AGENT_COLLABORATION_STATUS_URL)
            .await
    }

    /// Persist frontend log entries on the backend.
    pub async fn submit_logs(&self, logs: &[LogEntry]) -> Result<(), StudioRequestError> {
        #[derive(Serialize)]
        struct LogBatch<'a> {
            logs: &'a [LogEntry],
        }

        let _: IgnoredAny = self
            .request_helper()
            .post(FRONTEND_LOGS_URL, &LogBatch { logs })
            .await?;
        Ok(())
    }
}

// Vision
impl Studio {
    pub async fn generate_image(
        &self,
        request: &VisionGenerateRequest,
    ) -> Result<VisionGenerateResponse, StudioRequestError> {
        self.request_helper().post(VISION_GENERATE_URL, request).await
    }

    pub async fn analyze_image(
        &self,
        request: &VisionAnalyzeRequest,
    ) -> Result<VisionAnalyzeResponse, StudioRequestError> {
        self.request_helper().post(VISION_ANALYZE_URL, request).await
    }

    pub async fn edit_image(
        &self,
        request: &VisionEditRequest,
    ) -> Result<VisionGenerateResponse, StudioRequestError> {
        self.request_helper().post(VISION_EDIT_URL, request).await
    }
}

// Resume
impl Studio {
    /// Upload a resume file (PDF, DOCX, ...) for parsing.
    pub async fn parse_resume(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<ParseResumeResponse, StudioRequestError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let form =
            MultipartForm::new().file_from_bytes_with_mime("file", file_name, data, mime.as_ref())?;
        self.request_helper()
            .post_multipart(RESUME_PARSE_URL, form)
            .await
    }

    pub async fn optimize_resume(
        &self,
        request: &OptimizeResumeRequest,
    ) -> Result<OptimizeResumeResponse, StudioRequestError> {
        let endpoint = Endpoint::post(RESUME_OPTIMIZE_URL).with_timeout(OPTIMIZE_TIMEOUT);
        self.request_helper().send(&endpoint, request).await
    }

    pub async fn generate_resume(
        &self,
        request: &GenerateResumeRequest,
    ) -> Result<GenerateResumeResponse, StudioRequestError> {
        self.request_helper().post(RESUME_GENERATE_URL, request).await
    }

    pub async fn list_templates(&self) -> Result<ListTemplatesResponse, StudioRequestError> {
        self.request_helper().get(RESUME_TEMPLATES_URL).await
    }

    pub async fn download_resume(
        &self,
        file_id: &str,
    ) -> Result<bytes::Bytes, StudioRequestError> {
        self.request_helper()
            .get_bytes(&format!("{RESUME_DOWNLOAD_URL}/{file_id}"))
            .await
    }

    /// URL the backend serves a generated resume preview at; no request is made.
    pub fn preview_url(&self, file_id: &str) -> String {
        self.request_helper()
            .url(&format!("{RESUME_PREVIEW_URL}/{file_id}"))
    }
}
