/// Text of the response currently being streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffer {
    content: String,
    streaming: bool,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop previous content and mark a stream as active.
    pub fn start(&mut self) {
        self.content.clear();
        self.streaming = true;
    }

    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    /// Mark the stream finished; content is kept.
    pub fn end(&mut self) {
        self.streaming = false;
    }

    pub fn reset(&mut self) {
        self.content.clear();
        self.streaming = false;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}
