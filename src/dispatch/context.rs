use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, Uri};

use crate::session::Session;

/// Per-request state handed to every dispatched action.
///
/// Owns the leftover path segments (positional parameters), the decoded
/// query/form values, the raw body, the server-wide init parameters and the
/// client's session.
pub struct RequestContext {
    head: Parts,
    body: Bytes,
    request_params: HashMap<String, String>,
    init_parameters: Arc<HashMap<String, String>>,
    parameters: VecDeque<String>,
    session: Session,
}

impl RequestContext {
    pub fn new(
        head: Parts,
        body: Bytes,
        request_params: HashMap<String, String>,
        init_parameters: Arc<HashMap<String, String>>,
        parameters: VecDeque<String>,
        session: Session,
    ) -> Self {
        Self {
            head,
            body,
            request_params,
            init_parameters,
            parameters,
            session,
        }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Raw request body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Named query-string or form value
    pub fn request_param(&self, name: &str) -> Option<&str> {
        self.request_params.get(name).map(String::as_str)
    }

    pub fn request_params(&self) -> &HashMap<String, String> {
        &self.request_params
    }

    pub fn init_parameter(&self, key: &str) -> Option<&str> {
        self.init_parameters.get(key).map(String::as_str)
    }

    pub fn init_parameters(&self) -> &HashMap<String, String> {
        &self.init_parameters
    }

    /// Positional parameter at `index`, or `None` when out of range
    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }

    pub fn parameter_list(&self) -> Vec<&str> {
        self.parameters.iter().map(String::as_str).collect()
    }

    /// Remove and return the first positional parameter
    pub fn pop_param(&mut self) -> Option<String> {
        self.parameters.pop_front()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
