use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{header, request::Parts, HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use url::form_urlencoded;

use super::context::RequestContext;
use super::error::DispatchError;
use super::registry::{HandlerDescriptor, Registry, Services};
use super::resolve::{resource_type_name, Resolution};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::session::{self, Session, SessionStore};

pub const MESSAGE_LOGIN_REQUIRED: &str =
    "You're not logged in, and this request requires you to be";
pub const MESSAGE_INVOCATION_FAILED: &str = "Error invoking method for request";

/// Outcome of offering a request to the dispatcher
pub enum Dispatch {
    /// A handler owned the route; this is the final response
    Handled(Response),
    /// No handler matched; the untouched request goes to the next service
    Miss(Request),
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub max_body_bytes: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cookie_name: config.session.cookie_name.clone(),
            secure_cookie: config.session.secure_cookie,
            max_body_bytes: config.api.max_request_size_bytes,
        }
    }
}

/// Routes requests to registered resource actions and enforces the login gate
pub struct Dispatcher {
    registry: Arc<Registry>,
    services: Services,
    sessions: Arc<dyn SessionStore>,
    init_parameters: Arc<HashMap<String, String>>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        services: Services,
        sessions: Arc<dyn SessionStore>,
        init_parameters: HashMap<String, String>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            services,
            sessions,
            init_parameters: Arc::new(init_parameters),
            settings,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle the request if a registered action owns its path.
    ///
    /// Once a handler is found the result is always `Handled`, whether the
    /// action succeeded, was rejected by the gate, or failed.
    pub async fn dispatch(&self, request: Request) -> Dispatch {
        let Some(Resolution {
            resource,
            descriptor,
            parameters,
        }) = self.registry.resolve(request.method(), request.uri().path())
        else {
            tracing::trace!("No handler for {} {}", request.method(), request.uri().path());
            return Dispatch::Miss(request);
        };

        tracing::debug!(
            "Dispatching {} {} to {}.{} ({} parameter(s))",
            request.method(),
            request.uri().path(),
            resource_type_name(&resource),
            descriptor.action(),
            parameters.len()
        );

        let (head, body) = request.into_parts();

        let session = match self.resume_session(&head).await {
            Ok(session) => session,
            Err(response) => return Dispatch::Handled(response),
        };

        // The body is only read once the gate has let the request through
        if let Some(rejection) = self.gate(descriptor, &session).await {
            return Dispatch::Handled(rejection);
        }

        let mut ctx = match self.build_context(head, body, parameters, session).await {
            Ok(ctx) => ctx,
            Err(response) => return Dispatch::Handled(response),
        };

        let response = self.invoke(descriptor, &mut ctx).await;
        Dispatch::Handled(self.with_session_cookie(ctx.session(), response))
    }

    async fn resume_session(&self, head: &Parts) -> Result<Session, Response> {
        let cookie_id =
            session::session_id_from_headers(&head.headers, &self.settings.cookie_name);
        Session::resume(self.sessions.clone(), cookie_id.as_deref())
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session for {}: {}", head.uri.path(), e);
                ApiError::internal_server_error(MESSAGE_INVOCATION_FAILED).into_response()
            })
    }

    /// `Some(response)` when a protected action is requested by an anonymous session
    async fn gate(&self, descriptor: &HandlerDescriptor, session: &Session) -> Option<Response> {
        if !descriptor.requires_authentication() {
            return None;
        }

        match session.user().await {
            Ok(Some(_)) => None,
            Ok(None) => {
                tracing::debug!(
                    "Rejected anonymous request to {}.{}",
                    descriptor.resource_type(),
                    descriptor.action()
                );
                Some(ApiError::unauthorized(MESSAGE_LOGIN_REQUIRED).into_response())
            }
            Err(e) => Some(invocation_failure(descriptor, e.into())),
        }
    }

    async fn build_context(
        &self,
        head: Parts,
        body: Body,
        parameters: VecDeque<String>,
        session: Session,
    ) -> Result<RequestContext, Response> {
        let body = axum::body::to_bytes(body, self.settings.max_body_bytes)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to read request body for {}: {}", head.uri.path(), e);
                ApiError::bad_request("Request body could not be read").into_response()
            })?;

        let request_params = collect_request_params(&head.uri, &head.headers, &body);

        Ok(RequestContext::new(
            head,
            body,
            request_params,
            self.init_parameters.clone(),
            parameters,
            session,
        ))
    }

    /// Instantiate and invoke; faults and panics become a generic 500
    async fn invoke(&self, descriptor: &HandlerDescriptor, ctx: &mut RequestContext) -> Response {
        let invocation = AssertUnwindSafe(descriptor.invoke(&self.services, ctx));
        match invocation.catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => invocation_failure(descriptor, e),
            Err(panic) => {
                invocation_failure(descriptor, DispatchError::Panic(panic_message(panic)))
            }
        }
    }

    fn with_session_cookie(&self, session: &Session, mut response: Response) -> Response {
        if session.needs_cookie() {
            let cookie = session::session_cookie(
                &self.settings.cookie_name,
                session.id(),
                self.settings.secure_cookie,
            );
            if let Some(cookie) = cookie {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
        }
        response
    }
}

fn invocation_failure(descriptor: &HandlerDescriptor, error: DispatchError) -> Response {
    tracing::error!(
        "Error invoking {}.{}: {}",
        descriptor.resource_type(),
        descriptor.action(),
        error
    );
    ApiError::internal_server_error(MESSAGE_INVOCATION_FAILED).into_response()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// Query-string values, then url-encoded form values; the first occurrence of a name wins
pub(crate) fn collect_request_params(
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let query = uri.query().unwrap_or_default().as_bytes();
    let form: &[u8] = if is_form(headers) { &body[..] } else { &[] };

    for (name, value) in form_urlencoded::parse(query).chain(form_urlencoded::parse(form)) {
        params
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}
