use std::collections::VecDeque;

use axum::http::Method;

use super::registry::{HandlerDescriptor, Registry};

/// Action name used when neither a path segment nor the HTTP method matches
pub const DEFAULT_ACTION: &str = "handler";

/// A handler chosen for a request plus the path segments left for it
#[derive(Debug)]
pub struct Resolution<'r> {
    pub resource: String,
    pub descriptor: &'r HandlerDescriptor,
    pub parameters: VecDeque<String>,
}

/// Split a request path into lower-cased segments.
///
/// The leading empty segment is discarded and trailing empty segments are
/// dropped, so `/Register/Login/` yields `["register", "login"]`.
pub fn split_path(path: &str) -> VecDeque<String> {
    let mut segments: VecDeque<String> = path
        .strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .map(str::to_lowercase)
        .collect();

    while segments.back().is_some_and(|s| s.is_empty()) {
        segments.pop_back();
    }
    segments
}

/// Capitalize-first convention mapping a path segment to a type identifier
pub fn resource_type_name(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Registry {
    /// Resolve `method` + `path` to a handler.
    ///
    /// Precedence, first match wins: the next path segment as action name
    /// (consumed), the lower-cased HTTP method, then the `handler` default.
    /// `None` is a routing miss.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolution<'_>> {
        let mut segments = split_path(path);

        let resource = segments.pop_front().filter(|s| !s.is_empty())?;

        let explicit = segments.front().and_then(|action| self.lookup(&resource, action));
        if let Some(descriptor) = explicit {
            segments.pop_front();
            return Some(Resolution {
                resource,
                descriptor,
                parameters: segments,
            });
        }

        let descriptor = self
            .lookup(&resource, &method.as_str().to_lowercase())
            .or_else(|| self.lookup(&resource, DEFAULT_ACTION))?;

        Some(Resolution {
            resource,
            descriptor,
            parameters: segments,
        })
    }
}
