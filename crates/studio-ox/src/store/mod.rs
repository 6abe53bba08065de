//! Stateful wrappers around [`crate::Studio`] calls.
//!
//! Each store owns the data its operations produce plus one or more
//! [`RequestTracker`]s describing whether an operation is in flight and how
//! the last one failed. Trackers settle on every exit path, so `loading` never
//! stays set after an operation returns.

mod agent;
mod app;
mod llm;
mod resume;
mod stream;
mod vision;

pub use agent::{AgentStore, TaskOptions};
pub use app::AppStore;
pub use llm::LlmStore;
pub use resume::ResumeStore;
pub use stream::StreamBuffer;
pub use vision::VisionStore;

use studio_ox_common::{RequestTracker, UserMessage};

use crate::{error::StudioRequestError, image::ImageValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Request(#[from] StudioRequestError),
    /// An operation needs a resume that has not been parsed yet
    #[error("{0}")]
    MissingResume(&'static str),
    #[error(transparent)]
    InvalidImage(#[from] ImageValidationError),
    #[error("message is {length} characters, the limit is {limit}")]
    MessageTooLong { length: usize, limit: usize },
}

impl UserMessage for StoreError {
    fn server_message(&self) -> Option<&str> {
        match self {
            Self::Request(err) => err.server_message(),
            _ => None,
        }
    }
}

/// First recorded error across `trackers`.
fn first_error(trackers: &[&RequestTracker]) -> Option<String> {
    trackers.iter().find_map(|tracker| tracker.error())
}

fn clear_errors(trackers: &[&RequestTracker]) {
    for tracker in trackers {
        tracker.clear_error();
    }
}
