//! A [`Sink`] that forwards everything onto an `async-std` channel.
//!
//! Hosts that own the socket in a separate task receive [`SinkEvent`]s in
//! commit → data → end order and do the actual I/O there.

use async_std::channel::{self, Receiver, Sender};
use bytes::Bytes;
use tracing::trace;

use crate::error::ResponseError;
use crate::http::headers::HeaderBag;
use crate::net::sink::{Completion, Sink};

#[derive(Debug)]
pub enum SinkEvent {
    Commit { status: String, headers: HeaderBag },
    Data { chunk: Bytes, completion: Option<Completion> },
    Flush { completion: Option<Completion> },
    End(Option<ResponseError>),
}

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    acknowledged: bool,
}

impl ChannelSink {
    /// Writes complete as soon as the event is queued.
    pub fn new() -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx, acknowledged: false }, rx)
    }

    /// Writes complete only when the receiver calls [`Completion::complete`] on
    /// the completion carried by the event.
    pub fn acknowledged() -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx, acknowledged: true }, rx)
    }

    fn send(&self, event: SinkEvent) -> std::io::Result<()> {
        self.tx
            .try_send(event)
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }
}

impl Sink for ChannelSink {
    fn commit(&self, status: &str, headers: &HeaderBag) -> std::io::Result<()> {
        self.send(SinkEvent::Commit {
            status: status.to_string(),
            headers: headers.clone(),
        })
    }

    fn write(&self, chunk: Bytes, on_complete: Option<Completion>) -> std::io::Result<bool> {
        let completion = if self.acknowledged { on_complete } else { None };
        let pending = completion.is_some();
        trace!(len = chunk.len(), pending, "channel sink write");

        if chunk.is_empty() {
            self.send(SinkEvent::Flush { completion })?;
        } else {
            self.send(SinkEvent::Data { chunk, completion })?;
        }
        Ok(pending)
    }

    fn end(&self, error: Option<ResponseError>) {
        // receiver gone means the host already tore the request down
        let _ = self.send(SinkEvent::End(error));
        self.tx.close();
    }
}
