//! Fixtures shared by the unit tests: throwaway resources, a scripted
//! authenticator and helpers for building contexts and dispatchers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::Request;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::auth::{AuthError, AuthOutcome, Authenticator, NoPasswordNeeded};
use crate::dispatch::dispatcher::collect_request_params;
use crate::dispatch::{
    Action, ActionResult, DispatchError, DispatchSettings, Dispatcher, Registry, RequestContext,
    Resource, Services,
};
use crate::handlers::Register;
use crate::middleware::ApiResponse;
use crate::session::{MemorySessionStore, Session, SessionError};

pub const COOKIE_NAME: &str = "BESPIN_TEST_SESSION";
pub const MAX_BODY_BYTES: usize = 1024;
pub const FILESYSTEM: &str = "/srv/bespin";

pub fn store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new(Duration::from_secs(60)))
}

pub fn init_parameters() -> HashMap<String, String> {
    HashMap::from([("filesystem".to_string(), FILESYSTEM.to_string())])
}

/// Context on a fresh store with an anonymous session
pub async fn context(method: &str, uri: &str, parameters: &[&str]) -> RequestContext {
    context_with(store(), None, method, uri, parameters).await
}

pub async fn context_with(
    store: Arc<MemorySessionStore>,
    session_id: Option<&str>,
    method: &str,
    uri: &str,
    parameters: &[&str],
) -> RequestContext {
    let (head, _) = Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .unwrap()
        .into_parts();
    let body = Bytes::new();
    let request_params = collect_request_params(&head.uri, &head.headers, &body);
    let session = Session::resume(store, session_id).await.unwrap();

    RequestContext::new(
        head,
        body,
        request_params,
        Arc::new(init_parameters()),
        parameters.iter().map(|p| p.to_string()).collect::<VecDeque<_>>(),
        session,
    )
}

pub fn registry() -> Registry {
    Registry::builder()
        .resource::<Register>()
        .resource::<Widget>()
        .resource::<NoDefault>()
        .resource::<Broken>()
        .build()
}

pub fn dispatcher() -> (Dispatcher, Arc<MemorySessionStore>) {
    dispatcher_with(Arc::new(NoPasswordNeeded))
}

pub fn dispatcher_with(
    authenticator: Arc<dyn Authenticator>,
) -> (Dispatcher, Arc<MemorySessionStore>) {
    let store = store();
    let dispatcher = Dispatcher::new(
        Arc::new(registry()),
        Services { authenticator },
        store.clone(),
        init_parameters(),
        DispatchSettings {
            cookie_name: COOKIE_NAME.to_string(),
            secure_cookie: false,
            max_body_bytes: MAX_BODY_BYTES,
        },
    );
    (dispatcher, store)
}

/// Seed a logged-in session and return its `Cookie` header value
pub async fn logged_in_cookie(store: &Arc<MemorySessionStore>, username: &str) -> String {
    let mut session = Session::resume(store.clone(), None).await.unwrap();
    session.store_user(username).await.unwrap();
    format!("{}={}", COOKIE_NAME, session.id())
}

/// `name=value` pair from the response's `Set-Cookie`
pub fn cookie_from(response: &Response) -> Option<String> {
    let raw = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(str::to_string)
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Resource exercising every resolution path and failure mode
pub struct Widget;

impl Resource for Widget {
    const NAME: &'static str = "Widget";

    fn create(_services: &Services) -> Result<Self, DispatchError> {
        Ok(Widget)
    }

    fn actions() -> Vec<Action<Self>> {
        vec![
            Action::public("get", Self::get),
            Action::public("handler", Self::handler),
            Action::protected("secret", Self::secret),
            Action::public("fail", Self::fail),
            Action::public("explode", Self::explode),
        ]
    }
}

impl Widget {
    fn get<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            Ok(ApiResponse::success(json!({
                "action": "get",
                "parameters": ctx.parameter_list(),
                "filesystem": ctx.init_parameter("filesystem"),
            }))
            .into_response())
        })
    }

    fn handler<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            Ok(ApiResponse::success(json!({
                "action": "handler",
                "parameters": ctx.parameter_list(),
            }))
            .into_response())
        })
    }

    fn secret<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            ctx.session_mut().set("widgetTouched", &true).await?;
            let user = ctx.session().user().await?.map(|u| u.username);
            Ok(ApiResponse::success(json!({ "user": user })).into_response())
        })
    }

    fn fail<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            Err(SessionError::Backend("backend offline".to_string()).into())
        })
    }

    fn explode<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move { panic!("kaboom") })
    }
}

/// Shares `Widget`'s name; used to check that the first registration wins
pub struct WidgetShadow;

impl Resource for WidgetShadow {
    const NAME: &'static str = "Widget";

    fn create(_services: &Services) -> Result<Self, DispatchError> {
        Ok(WidgetShadow)
    }

    fn actions() -> Vec<Action<Self>> {
        vec![
            Action::public("secret", Self::reply),
            Action::public("shadow", Self::reply),
        ]
    }
}

impl WidgetShadow {
    fn reply<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move { Ok(ApiResponse::success("shadow").into_response()) })
    }
}

/// Resource without a default handler
pub struct NoDefault;

impl Resource for NoDefault {
    const NAME: &'static str = "NoDefault";

    fn create(_services: &Services) -> Result<Self, DispatchError> {
        Ok(NoDefault)
    }

    fn actions() -> Vec<Action<Self>> {
        vec![Action::public("only", Self::only)]
    }
}

impl NoDefault {
    fn only<'a>(&'a mut self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move { Ok(ApiResponse::success(ctx.parameter_list()).into_response()) })
    }
}

/// Resource that can never be instantiated
pub struct Broken;

impl Resource for Broken {
    const NAME: &'static str = "Broken";

    fn create(_services: &Services) -> Result<Self, DispatchError> {
        Err(DispatchError::Instantiation {
            resource: Self::NAME,
            reason: "missing collaborator".to_string(),
        })
    }

    fn actions() -> Vec<Action<Self>> {
        vec![
            Action::public("handler", Self::handler),
            Action::protected("guarded", Self::handler),
        ]
    }
}

impl Broken {
    fn handler<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move { Ok(ApiResponse::success("unreachable").into_response()) })
    }
}

/// Authenticator with a scripted answer that records how it was called
pub struct RecordingAuthenticator {
    outcome: Option<AuthOutcome>,
    verified: Option<String>,
    authenticate_calls: AtomicUsize,
    last_password: Mutex<Option<String>>,
}

impl RecordingAuthenticator {
    /// Accepts every username as-is
    pub fn accepting() -> Self {
        Self {
            outcome: None,
            verified: None,
            authenticate_calls: AtomicUsize::new(0),
            last_password: Mutex::new(None),
        }
    }

    pub fn with_outcome(outcome: AuthOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..Self::accepting()
        }
    }

    /// `verify` resolves to `identity`
    pub fn verifying(mut self, identity: &str) -> Self {
        self.verified = Some(identity.to_string());
        self
    }

    pub fn authenticate_calls(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    pub fn last_password(&self) -> Option<String> {
        self.last_password.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for RecordingAuthenticator {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn authenticate(
        &self,
        _ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_password.lock().unwrap() = Some(password.to_string());
        Ok(self
            .outcome
            .clone()
            .unwrap_or_else(|| AuthOutcome::Authenticated(username.to_string())))
    }

    async fn verify(&self, _ctx: &mut RequestContext) -> Result<Option<String>, AuthError> {
        Ok(self.verified.clone())
    }
}
