use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::dispatch::{Dispatch, Dispatcher};

/// Offer every request to the dispatcher first.
///
/// Requests no registered action owns continue down the stack unchanged:
/// router routes, then static files.
pub async fn dispatch_middleware(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
    next: Next,
) -> Response {
    match dispatcher.dispatch(request).await {
        Dispatch::Handled(response) => response,
        Dispatch::Miss(request) => next.run(request).await,
    }
}
