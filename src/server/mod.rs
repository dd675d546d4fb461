//! Per-request wiring between a host and the dispatch layer.
//!
//! The host builds one [`Host`] from its [`ResponseConfig`] at startup and calls
//! [`Host::context`] for every inbound request. The returned [`HostContext`]
//! pairs the request projection with a fresh response; the host attaches its
//! transport whenever it becomes available.

mod request;
mod response;

use std::sync::Arc;

use tracing::debug;

pub use request::{Params, RequestCookie, RequestCookies, ServerRequest, parse_urlencoded};
pub use response::ServerResponse;

use crate::config::ResponseConfig;
use crate::error::Result;
use crate::http::request::Environment;
use crate::http::response::Response;
use crate::net::sink::Sink;

#[derive(Debug, Clone, Default)]
pub struct Host {
    config: Arc<ResponseConfig>,
}

#[derive(Debug)]
pub struct HostContext {
    pub request: ServerRequest,
    pub response: ServerResponse,
}

impl Host {
    pub fn new(config: ResponseConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    pub fn context(&self, env: Environment) -> HostContext {
        debug!(method = ?env.method, path = %env.path, "new request context");
        let response = Arc::new(Response::from_config(&self.config));
        let response = ServerResponse::new(response, &env);
        HostContext {
            request: ServerRequest::new(env),
            response,
        }
    }
}

impl HostContext {
    /// Attaches the transport, bound to the request's lifetime token.
    pub fn attach(&self, sink: Arc<dyn Sink>) -> Result<()> {
        let token = self.request.environment().call_disposed.clone();
        self.response.response().attach(sink, token)
    }
}
