#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Client and stateful stores for the AI studio backend.
//!
//! [`Studio`] covers the backend's chat, agent, vision and resume routes,
//! including streamed chat over Server-Sent Events. The [`store`] module wraps
//! those calls with observable loading and error state.

mod client;
pub mod config;
pub mod error;
pub mod image;
mod internal;
pub mod logger;
pub mod message;
pub mod request;
pub mod response;
pub mod resume;
pub mod store;

// Re-export main types
pub use client::Studio;
pub use config::{Environment, StudioConfig};
pub use error::{StudioRequestError, StudioStreamError};
pub use logger::{LogBuffer, LogEntry, LogLevel, LogSink};
pub use message::{Message, Messages, Role};
pub use request::ChatRequest;
pub use response::{ChatResponse, StreamChatChunk};

// Re-export types from studio-ox-common for convenience
pub use studio_ox_common::{
    ErrorEventPolicy, RequestState, RequestTracker, SseParser, StreamOptions, StreamState,
    StreamSummary, TokenUsage, UserMessage, user_message,
};
