use studio_ox_common::{RequestTracker, user_message};

use crate::{
    Studio,
    request::AgentTaskRequest,
    response::{AgentTaskResponse, Metadata},
};

/// Optional settings for [`AgentStore::run_task`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    pub conversation_id: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug)]
pub struct AgentStore {
    client: Studio,
    current_task: String,
    task_result: Option<AgentTaskResponse>,
    tools: Metadata,
    loading: RequestTracker,
}

impl AgentStore {
    pub fn new(client: Studio) -> Self {
        Self {
            client,
            current_task: String::new(),
            task_result: None,
            tools: Metadata::new(),
            loading: RequestTracker::new(),
        }
    }

    pub fn current_task(&self) -> &str {
        &self.current_task
    }

    pub fn task_result(&self) -> Option<&AgentTaskResponse> {
        self.task_result.as_ref()
    }

    /// Registered tools keyed by name.
    pub fn tools(&self) -> &Metadata {
        &self.tools
    }

    pub fn loading(&self) -> &RequestTracker {
        &self.loading
    }

    pub fn error(&self) -> Option<String> {
        self.loading.error()
    }

    /// Refresh [`Self::tools`]; a failure only records the error.
    pub async fn load_tools(&mut self) {
        match self.client.list_tools().await {
            Ok(list) => self.tools = list.tools,
            Err(err) => self.loading.set_error(user_message(&err)),
        }
    }

    /// Run `task`; on failure the previous result is kept.
    pub async fn run_task(
        &mut self,
        task: impl Into<String>,
        options: TaskOptions,
    ) -> Option<&AgentTaskResponse> {
        let task = task.into();
        self.current_task.clone_from(&task);

        let request = AgentTaskRequest::builder()
            .task(task)
            .maybe_conversation_id(options.conversation_id)
            .maybe_model(options.model)
            .maybe_temperature(options.temperature)
            .build();

        let response = self.loading.run(self.client.run_task(&request)).await?;
        log::debug!(
            "agent task finished after {} iterations with {} tool calls",
            response.iterations,
            response.tool_calls.len()
        );
        self.task_result = Some(response);
        self.task_result.as_ref()
    }
}
