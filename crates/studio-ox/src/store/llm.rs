use std::convert::Infallible;

use studio_ox_common::{RequestTracker, user_message};

use super::{StoreError, StreamBuffer, clear_errors, first_error};
use crate::{
    Studio,
    config::{MAX_MESSAGE_LENGTH, MAX_MESSAGES_HISTORY},
    message::{Message, Messages},
    request::ChatRequest,
    response::StreamChatChunk,
};

/// Chat history and model selection for one conversation.
#[derive(Debug)]
pub struct LlmStore {
    client: Studio,
    messages: Messages,
    current_model: Option<String>,
    available_models: Vec<String>,
    stream: StreamBuffer,
    loading: RequestTracker,
    streaming: RequestTracker,
}

impl LlmStore {
    pub fn new(client: Studio) -> Self {
        Self {
            client,
            messages: Messages::new(),
            current_model: None,
            available_models: Vec::new(),
            stream: StreamBuffer::new(),
            loading: RequestTracker::new(),
            streaming: RequestTracker::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_model(&self) -> Option<&str> {
        self.current_model.as_deref()
    }

    pub fn select_model(&mut self, model: impl Into<String>) {
        self.current_model = Some(model.into());
    }

    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Text received so far by the running (or last) stream.
    pub fn stream_buffer(&self) -> &StreamBuffer {
        &self.stream
    }

    pub fn loading(&self) -> &RequestTracker {
        &self.loading
    }

    pub fn streaming(&self) -> &RequestTracker {
        &self.streaming
    }

    pub fn error(&self) -> Option<String> {
        first_error(&[&self.loading, &self.streaming])
    }

    /// Fetch the model list, selecting the first model if none is selected.
    ///
    /// Does not toggle `loading`; a failure only records the error.
    pub async fn load_models(&mut self) {
        match self.client.list_models().await {
            Ok(models) => {
                if self.current_model.is_none() {
                    self.current_model = models.first().cloned();
                }
                self.available_models = models;
            }
            Err(err) => self.loading.set_error(user_message(&err)),
        }
    }

    /// Send `content` and append the assistant's reply to the history.
    pub async fn send_message(&mut self, content: impl Into<String>) -> Option<&Message> {
        let request = self.begin_turn(content.into(), Tracker::Loading)?;

        let response = self.loading.run(self.client.chat(&request)).await?;
        self.push_message(Message::assistant(response.content));
        self.messages.last()
    }

    /// Stream the reply to `content`, calling `on_chunk` with each non-empty
    /// text increment.
    ///
    /// The assistant message is appended only once the stream completes; a
    /// failed stream leaves the user message in the history and the partial
    /// text in [`Self::stream_buffer`].
    pub async fn stream_message<F>(
        &mut self,
        content: impl Into<String>,
        mut on_chunk: F,
    ) -> Option<&Message>
    where
        F: FnMut(&str),
    {
        let request = self.begin_turn(content.into(), Tracker::Streaming)?;

        self.stream.start();
        let client = &self.client;
        let buffer = &mut self.stream;
        let summary = self
            .streaming
            .run(client.stream_chat_with(&request, |chunk: StreamChatChunk| {
                if let Some(text) = chunk.content.as_deref().filter(|text| !text.is_empty()) {
                    buffer.append(text);
                    on_chunk(text);
                }
                Ok::<(), Infallible>(())
            }))
            .await;
        self.stream.end();

        let summary = summary?;
        log::debug!(
            "chat stream finished: {} events, {} skipped frames",
            summary.events,
            summary.skipped_frames
        );
        self.push_message(Message::assistant(self.stream.content().to_string()));
        self.messages.last()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Clear errors, validate and record the user message, and build the request.
    fn begin_turn(&mut self, content: String, tracker: Tracker) -> Option<ChatRequest> {
        clear_errors(&[&self.loading, &self.streaming]);

        let length = content.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            let err = StoreError::MessageTooLong {
                length,
                limit: MAX_MESSAGE_LENGTH,
            };
            let tracker = match tracker {
                Tracker::Loading => &self.loading,
                Tracker::Streaming => &self.streaming,
            };
            tracker.set_error(user_message(&err));
            return None;
        }

        self.push_message(Message::user(content));
        Some(
            ChatRequest::builder()
                .messages(self.messages.iter().cloned())
                .maybe_model(self.current_model.clone())
                .build(),
        )
    }

    /// Append to the history, dropping the oldest messages past the limit.
    fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        if self.messages.len() > MAX_MESSAGES_HISTORY {
            let excess = self.messages.len() - MAX_MESSAGES_HISTORY;
            self.messages.drain(..excess);
        }
    }
}

#[derive(Clone, Copy)]
enum Tracker {
    Loading,
    Streaming,
}
