#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared HTTP client abstractions for the studio-ox client
//!
//! Request building and error extraction, the Server-Sent Events reader used
//! for streamed chat output, and the loading/error state wrapper the stores
//! put around every call.

pub mod error;
pub mod request_builder;
pub mod state;
pub mod streaming;
pub mod usage;

pub use error::{CommonRequestError, DispatchError, UNKNOWN_ERROR, UserMessage, user_message};
pub use request_builder::{
    AuthMethod, Endpoint, HttpMethod, MultipartForm, RequestBuilder, RequestConfig, StreamOptions,
};
pub use state::{RequestState, RequestTracker};
pub use streaming::{
    ErrorEventPolicy, FrameOutcome, SseDecoder, SseParser, StreamPayload, StreamState,
    StreamSummary,
};
pub use usage::TokenUsage;

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
