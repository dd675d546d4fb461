use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::http::request::{DisableBuffering, Environment};
use crate::http::response::Response;
use crate::net::sink::CancellationToken;

/// Response side of the dispatch boundary.
///
/// Writes issued through this façade are flushed right away, and the first
/// [`write_async`](Self::write_async) turns buffering off for the rest of the
/// request, telling the host through its disable hook.
pub struct ServerResponse {
    response: Arc<Response>,
    call_disposed: CancellationToken,
    disable_buffering: Option<DisableBuffering>,
}

impl std::fmt::Debug for ServerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerResponse")
            .field("response", &self.response)
            .field("connected", &self.is_client_connected())
            .finish()
    }
}

impl ServerResponse {
    pub fn new(response: Arc<Response>, env: &Environment) -> Self {
        Self {
            response,
            call_disposed: env.call_disposed.clone(),
            disable_buffering: env.disable_buffering.clone(),
        }
    }

    pub fn response(&self) -> &Arc<Response> {
        &self.response
    }

    pub fn is_client_connected(&self) -> bool {
        !self.call_disposed.is_cancelled()
    }

    pub fn content_type(&self) -> Option<String> {
        self.response.content_type()
    }

    pub fn set_content_type(&self, value: &str) {
        self.response.set_content_type(value);
    }

    /// Writes `data` and flushes. Completes immediately once the client is gone.
    pub async fn write_async(&self, data: &[u8]) -> Result<()> {
        self.send(data, true).await
    }

    /// Writes the final `data`, flushes and ends the response.
    pub async fn end_async(&self, data: &[u8]) -> Result<()> {
        let sent = self.send(data, false).await;
        self.response.end();
        sent
    }

    async fn send(&self, data: &[u8], disable_buffering: bool) -> Result<()> {
        if disable_buffering && self.response.buffering() {
            self.response.set_buffering(false);
            if let Some(hook) = &self.disable_buffering {
                debug!("disabling host response buffering");
                hook();
            }
        }

        if !self.is_client_connected() {
            return Ok(());
        }

        if !data.is_empty() {
            self.response.write(data)?;
        }
        // the flush is queued behind the write, so its completion covers both
        self.response.flush_async().await
    }
}
