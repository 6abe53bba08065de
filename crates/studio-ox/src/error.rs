// Re-export shared error types from studio-ox-common
pub use studio_ox_common::error::{
    CommonRequestError, DispatchError, UNKNOWN_ERROR, UserMessage, parse_error_response,
    user_message,
};

/// Error returned by every [`crate::Studio`] call
pub type StudioRequestError = CommonRequestError;

/// Error returned by handler-driven chat streams
pub type StudioStreamError<E> = DispatchError<E>;
