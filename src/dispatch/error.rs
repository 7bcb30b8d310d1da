use axum::response::Response;
use thiserror::Error;

use crate::auth::AuthError;
use crate::session::SessionError;

/// Faults raised while a resolved handler is being set up or run.
///
/// These never reach the client in detail; the dispatcher logs them and
/// answers with a generic 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Resource '{resource}' could not be instantiated: {reason}")]
    Instantiation { resource: &'static str, reason: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Authenticator(#[from] AuthError),

    #[error("Handler panicked: {0}")]
    Panic(String),
}

/// What every dispatchable action returns
pub type ActionResult = Result<Response, DispatchError>;
