// handlers/register.rs - /register/* session authentication actions
//
// The per-session identity moves between Anonymous and Authenticated(username).
// login and verify set it, logout clears it, userinfo and the status check read it.

use std::sync::Arc;

use axum::response::{IntoResponse, Redirect, Response};
use futures::future::BoxFuture;
use serde_json::json;

use crate::auth::{AuthOutcome, Authenticator};
use crate::dispatch::{Action, ActionResult, DispatchError, RequestContext, Resource, Services};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::session::user::{MESSAGE_LOGGED_OUT, MESSAGE_NOT_LOGGED_IN};
use crate::session::UserSession;

pub const MESSAGE_USERNAME_REQUIRED: &str =
    "You must provide a username to the \"login\" request";
pub const MESSAGE_AUTH_INCOMPLETE: &str = "Authentication did not complete";
pub const MESSAGE_VERIFY_FAILED: &str = "Unable to verify";

pub struct Register {
    authenticator: Arc<dyn Authenticator>,
}

impl Resource for Register {
    const NAME: &'static str = "Register";

    fn create(services: &Services) -> Result<Self, DispatchError> {
        Ok(Self {
            authenticator: services.authenticator.clone(),
        })
    }

    fn actions() -> Vec<Action<Self>> {
        vec![
            Action::protected("userinfo", Self::userinfo),
            Action::public("login", Self::login),
            Action::public("verify", Self::verify),
            Action::public("logout", Self::logout),
            Action::public("handler", Self::handler),
        ]
    }
}

impl Register {
    /// GET /register/userinfo - identity of the logged-in user
    fn userinfo<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            match ctx.session().user().await? {
                Some(user) => Ok(user_info(user)),
                None => Ok(ApiError::unauthorized(MESSAGE_NOT_LOGGED_IN).into_response()),
            }
        })
    }

    /// POST /register/login/:username - password from the `password` parameter
    fn login<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            let username = ctx.parameter(0).filter(|u| !u.is_empty()).map(str::to_string);
            let Some(username) = username else {
                return Ok(ApiError::bad_request(MESSAGE_USERNAME_REQUIRED).into_response());
            };
            let password = ctx.request_param("password").unwrap_or_default().to_string();

            // Already logged in as this user
            if let Some(user) = ctx.session().user().await? {
                if user.username == username {
                    return Ok(user_info(user));
                }
            }

            match self.authenticator.authenticate(ctx, &username, &password).await? {
                AuthOutcome::Authenticated(identity) => {
                    let user = ctx.session_mut().store_user(&identity).await?;
                    Ok(user_info(user))
                }
                AuthOutcome::Challenge { redirect_to } => {
                    Ok(Redirect::to(redirect_to.as_str()).into_response())
                }
                AuthOutcome::Failed => {
                    tracing::info!("Login for '{}' did not complete", username);
                    Ok(ApiError::unauthorized(MESSAGE_AUTH_INCOMPLETE).into_response())
                }
            }
        })
    }

    /// GET /register/verify - identity provider callback
    fn verify<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            match self.authenticator.verify(ctx).await? {
                Some(identity) => {
                    let user = ctx.session_mut().store_user(&identity).await?;
                    Ok(status(Some(&user)))
                }
                None => Ok(ApiError::unauthorized(MESSAGE_VERIFY_FAILED).into_response()),
            }
        })
    }

    fn logout<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            ctx.session_mut().clear_user().await?;
            tracing::info!("Session {} logged out", ctx.session().id());
            Ok(ApiResponse::success(json!({ "message": MESSAGE_LOGGED_OUT })).into_response())
        })
    }

    /// Status check, no side effects
    fn handler<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            let user = ctx.session().user().await?;
            Ok(status(user.as_ref()))
        })
    }
}

fn user_info(user: UserSession) -> Response {
    ApiResponse::success(user).into_response()
}

fn status(user: Option<&UserSession>) -> Response {
    let body = match user {
        Some(user) => json!({
            "logged_in": true,
            "username": user.username,
            "message": user.logged_in_message(),
        }),
        None => json!({
            "logged_in": false,
            "username": null,
            "message": MESSAGE_NOT_LOGGED_IN,
        }),
    };
    ApiResponse::success(body).into_response()
}
