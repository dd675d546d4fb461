use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::http::headers::HeaderBag;
use crate::http::{HttpMethod, http_method_from_str};
use crate::net::sink::CancellationToken;

/// Host hook that turns off response buffering at the transport level.
pub type DisableBuffering = Arc<dyn Fn() + Send + Sync>;

/// Opaque authenticated principal supplied by the host.
pub type User = Arc<dyn Any + Send + Sync>;

/// Read-only view of the inbound request, supplied by the host once per request.
///
/// Nothing in this crate mutates it after construction.
#[derive(Clone)]
pub struct Environment {
    pub method: HttpMethod,
    pub scheme: String,
    pub host: String,
    pub path_base: String,
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query_string: String,
    pub headers: HeaderBag,
    /// Raw `application/x-www-form-urlencoded` body, if the host read one.
    pub form: Option<String>,
    pub user: Option<User>,
    /// Cancelled when the request ends or the client goes away.
    pub call_disposed: CancellationToken,
    pub disable_buffering: Option<DisableBuffering>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("method", &self.method)
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("path_base", &self.path_base)
            .field("path", &self.path)
            .field("query_string", &self.query_string)
            .field("headers", &self.headers.len())
            .field("user", &self.user.is_some())
            .finish()
    }
}

impl Environment {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: http_method_from_str(method),
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            path_base: String::new(),
            path: path.to_string(),
            query_string: String::new(),
            headers: HeaderBag::new(),
            form: None,
            user: None,
            call_disposed: CancellationToken::new(),
            disable_buffering: None,
        }
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_path_base(mut self, path_base: &str) -> Self {
        self.path_base = path_base.to_string();
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query_string = query.trim_start_matches('?').to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_form(mut self, body: &str) -> Self {
        self.form = Some(body.to_string());
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.call_disposed = token;
        self
    }

    pub fn with_disable_buffering<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.disable_buffering = Some(Arc::new(hook));
        self
    }
}
