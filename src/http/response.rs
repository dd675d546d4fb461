//! Deferred-start, buffered response writer.
//!
//! A [`Response`] exists before its transport does. Handlers may set status,
//! headers and cookies and write body bytes right away; the host attaches a
//! [`Sink`] later. The physical start (header commit followed by the replay of
//! every captured write) happens exactly once, as soon as both a start has
//! been requested and a sink is attached, no matter which of the two comes
//! last or how many threads race on it.
//!
//! Start is requested explicitly with [`Response::start`], or implicitly by a
//! write when buffering is off, by any flush, and by [`Response::end`].
//!
//! Headers changed after the commit stay readable from the response but are
//! never sent: the commit is a snapshot and is not re-transmitted.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering, fence};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_std::channel;
use async_std::task;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::config::ResponseConfig;
use crate::error::{ResponseError, Result};
use crate::http::Encoding;
use crate::http::barrier::{Continuation, StartBarrier};
use crate::http::cookie::{self, CookieOptions};
use crate::http::headers::HeaderBag;
use crate::http::status::HttpStatus;
use crate::http::stream::ResponseStream;
use crate::net::sink::{CancellationToken, Completion, Sink};

const NOT_STARTED: u8 = 0;
const STARTING: u8 = 1;
const STARTED: u8 = 2;

pub const CONTENT_TYPE: &str = "Content-Type";

struct AttachedSink {
    sink: Arc<dyn Sink>,
    token: CancellationToken,
}

pub struct Response {
    status: Mutex<String>,
    headers: Mutex<HeaderBag>,
    encoding: Mutex<Encoding>,
    buffering: AtomicBool,

    started: AtomicU8,
    barrier: StartBarrier,
    sink: OnceCell<AttachedSink>,

    // set by the first end/error call
    end_requested: AtomicBool,
    // set right before Sink::end runs
    sink_ended: AtomicBool,

    output: OnceCell<ResponseStream>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &*lock(&self.status))
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("attached", &self.sink.get().is_some())
            .field("barrier", &self.barrier)
            .finish()
    }
}

impl Response {
    pub fn new() -> Self {
        Self::with_status(&HttpStatus::Ok.status_line())
    }

    pub fn with_status(status: &str) -> Self {
        Self {
            status: Mutex::new(status.to_string()),
            headers: Mutex::new(HeaderBag::new()),
            encoding: Mutex::new(Encoding::Utf8),
            buffering: AtomicBool::new(false),
            started: AtomicU8::new(NOT_STARTED),
            barrier: StartBarrier::new(),
            sink: OnceCell::new(),
            end_requested: AtomicBool::new(false),
            sink_ended: AtomicBool::new(false),
            output: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ResponseConfig) -> Self {
        let response = Self::with_status(&config.default_status);
        response.set_encoding(config.encoding);
        response.set_buffering(config.buffer_output);
        if let Some(server) = config.server_name.as_deref() {
            response.set_header("Server", server);
        }
        if let Some(content_type) = config.default_content_type.as_deref() {
            response.set_content_type(content_type);
        }
        response
    }

    pub fn status(&self) -> String {
        lock(&self.status).clone()
    }

    /// Takes effect on the wire only if called before the commit.
    pub fn set_status(&self, status: &str) -> &Self {
        *lock(&self.status) = status.to_string();
        self
    }

    pub fn set_status_code(&self, status: HttpStatus) -> &Self {
        self.set_status(&status.status_line())
    }

    pub fn encoding(&self) -> Encoding {
        *lock(&self.encoding)
    }

    pub fn set_encoding(&self, encoding: Encoding) -> &Self {
        *lock(&self.encoding) = encoding;
        self
    }

    pub fn buffering(&self) -> bool {
        self.buffering.load(Ordering::SeqCst)
    }

    /// With buffering on, non-empty writes are held until a start is requested.
    /// Turning it off does not start the response by itself; the next write does.
    pub fn set_buffering(&self, enabled: bool) -> &Self {
        self.buffering.store(enabled, Ordering::SeqCst);
        self
    }

    /// Snapshot of the current headers.
    pub fn headers(&self) -> HeaderBag {
        lock(&self.headers).clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        lock(&self.headers).get(name)
    }

    pub fn headers_of(&self, name: &str) -> Option<Vec<String>> {
        lock(&self.headers).get_all(name).map(<[String]>::to_vec)
    }

    /// Replaces `name`. A blank value removes the header instead.
    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        self.note_late_header(name);
        let mut headers = lock(&self.headers);
        if value.trim().is_empty() {
            headers.remove(name);
        } else {
            headers.set(name, value);
        }
        self
    }

    pub fn append_header(&self, name: &str, value: &str) -> &Self {
        self.note_late_header(name);
        lock(&self.headers).append(name, value);
        self
    }

    pub fn remove_header(&self, name: &str) -> &Self {
        self.note_late_header(name);
        lock(&self.headers).remove(name);
        self
    }

    fn note_late_header(&self, name: &str) {
        if self.barrier.has_fired() {
            trace!(header = name, "header changed after commit; not sent");
        }
    }

    pub fn content_type(&self) -> Option<String> {
        self.header(CONTENT_TYPE)
    }

    pub fn set_content_type(&self, value: &str) -> &Self {
        self.set_header(CONTENT_TYPE, value)
    }

    /// `key=value; path=/`
    pub fn set_cookie(&self, key: &str, value: &str) -> &Self {
        self.set_cookie_with(key, &CookieOptions::new(value))
    }

    pub fn set_cookie_with(&self, key: &str, options: &CookieOptions) -> &Self {
        self.note_late_header(cookie::SET_COOKIE);
        cookie::set_cookie(&mut lock(&self.headers), key, options);
        self
    }

    /// Drops every pending cookie named `key`, whatever its scope, and
    /// expires it for the root path.
    pub fn delete_cookie(&self, key: &str) -> &Self {
        self.note_late_header(cookie::SET_COOKIE);
        cookie::delete_cookie(&mut lock(&self.headers), key, None);
        self
    }

    /// Deletes `key` within the domain/path scope of `options`; its value,
    /// expiry and flags are ignored.
    pub fn delete_cookie_with(&self, key: &str, options: &CookieOptions) -> &Self {
        self.note_late_header(cookie::SET_COOKIE);
        cookie::delete_cookie(&mut lock(&self.headers), key, Some(options));
        self
    }

    /// True once a start has been requested, explicitly or implicitly.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst) == STARTED
    }

    /// True once status and headers have been handed to the sink.
    pub fn is_committed(&self) -> bool {
        self.barrier.has_fired()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.get().is_some()
    }

    /// Requests the start. Fails if a start was already requested, including
    /// an implicit one triggered by a write, flush or end.
    pub fn start(&self) -> Result<()> {
        if !self.begin_start() {
            return Err(ResponseError::AlreadyStarted);
        }
        self.complete_start();
        Ok(())
    }

    /// Like [`start`](Self::start), applying `status` (unless blank) and
    /// replacing the listed headers first.
    pub fn start_with<I>(&self, status: Option<&str>, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        if !self.begin_start() {
            return Err(ResponseError::AlreadyStarted);
        }
        if let Some(status) = status.filter(|s| !s.trim().is_empty()) {
            self.set_status(status);
        }
        {
            let mut bag = lock(&self.headers);
            for (name, values) in headers {
                bag.set_values(&name, values);
            }
        }
        self.complete_start();
        Ok(())
    }

    /// Registers `continuation` to run after the commit, in order with the
    /// writes issued around it. Runs inline when the commit already happened.
    /// A failure ends the response with that error.
    pub fn on_start<F>(&self, continuation: F)
    where
        F: FnOnce(&Response) -> Result<()> + Send + 'static,
    {
        self.defer(Box::new(continuation));
    }

    /// Attaches the transport. A response accepts exactly one sink.
    pub fn attach(&self, sink: Arc<dyn Sink>, token: CancellationToken) -> Result<()> {
        self.sink
            .set(AttachedSink { sink, token })
            .map_err(|_| ResponseError::SinkAlreadyAttached)?;
        // pairs with the fence in `complete_start`: one side always sees the other
        fence(Ordering::SeqCst);
        debug!(started = self.is_started(), "sink attached");
        self.try_commit();
        Ok(())
    }

    fn begin_start(&self) -> bool {
        self.started
            .compare_exchange(NOT_STARTED, STARTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn complete_start(&self) {
        self.started.store(STARTED, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        debug!(attached = self.is_attached(), "response start requested");
        self.try_commit();
    }

    fn autostart(&self) {
        if self.begin_start() {
            self.complete_start();
        }
    }

    /// Commits and drains once both a start was requested and a sink is
    /// attached. Both `complete_start` and `attach` call this; the barrier lets
    /// only one of them through.
    fn try_commit(&self) {
        if self.started.load(Ordering::SeqCst) != STARTED {
            return;
        }
        let Some(attached) = self.sink.get() else {
            return;
        };
        if !self.barrier.try_fire() {
            return;
        }

        let status = self.status();
        let headers = self.headers();
        debug!(status = %status, headers = headers.len(), "committing response head");
        if let Err(err) = attached.sink.commit(&status, &headers) {
            warn!(error = %err, "header commit failed");
            self.fail(err.into());
        }

        let ran = self.barrier.drain(|continuation| self.run(continuation));
        debug!(continuations = ran, "start barrier drained");
    }

    fn defer(&self, continuation: Continuation) {
        if let Some(continuation) = self.barrier.submit(continuation) {
            self.run(continuation);
        }
    }

    fn run(&self, continuation: Continuation) {
        let outcome = catch_unwind(AssertUnwindSafe(|| continuation(self)))
            .unwrap_or_else(|_| Err(ResponseError::Handler("continuation panicked".to_string())));
        if let Err(err) = outcome {
            warn!(error = %err, "deferred response work failed");
            self.fail(err);
        }
    }

    pub fn write(&self, data: &[u8]) -> Result<bool> {
        self.write_with(data, None)
    }

    /// Writes `data`, returning `true` when `callback` will fire later and
    /// `false` when the write already completed.
    ///
    /// Before the commit the payload is copied and queued; the return value is
    /// then always `true`. An empty payload is a flush and always requests a
    /// start. After [`end`](Self::end), or once the request is cancelled,
    /// writes are ignored and report completion.
    pub fn write_with(&self, data: &[u8], callback: Option<Completion>) -> Result<bool> {
        if self.end_requested.load(Ordering::SeqCst) {
            trace!(len = data.len(), "write after end ignored");
            return Ok(false);
        }
        if self.is_cancelled() {
            trace!(len = data.len(), "client gone, write dropped");
            return Ok(false);
        }

        if self.barrier.is_open() {
            return match self.write_now(Bytes::copy_from_slice(data), callback) {
                Ok(pending) => Ok(pending),
                Err(err) => {
                    warn!(error = %err, "response write failed");
                    self.fail(ResponseError::Transport(std::io::Error::new(
                        err.kind(),
                        err.to_string(),
                    )));
                    Err(err.into())
                }
            };
        }

        let chunk = Bytes::copy_from_slice(data);
        let flush = chunk.is_empty();
        trace!(len = chunk.len(), flush, "write deferred until start");
        self.defer(Box::new(move |response: &Response| {
            let notify = callback.clone();
            if !response.write_now(chunk, callback)? {
                if let Some(notify) = notify {
                    notify.complete();
                }
            }
            Ok(())
        }));

        if flush || !self.buffering() {
            self.autostart();
        }
        Ok(true)
    }

    /// Encodes `text` with the response encoding and writes it.
    pub fn write_str(&self, text: &str) -> Result<bool> {
        let bytes = self.encoding().encode(text);
        self.write(&bytes)
    }

    pub fn flush(&self) -> Result<bool> {
        self.write_with(&[], None)
    }

    pub fn flush_with(&self, callback: Option<Completion>) -> Result<bool> {
        self.write_with(&[], callback)
    }

    /// Resolves once the sink reports the write complete.
    pub async fn write_async(&self, data: &[u8]) -> Result<()> {
        let (tx, rx) = channel::bounded::<()>(1);
        let done = Completion::new(move || {
            let _ = tx.try_send(());
        });
        if self.write_with(data, Some(done))? {
            rx.recv().await.map_err(|_| ResponseError::Abandoned)?;
        }
        Ok(())
    }

    pub async fn flush_async(&self) -> Result<()> {
        self.write_async(&[]).await
    }

    /// Blocks the calling thread until the write completes. Not meant for
    /// async contexts.
    pub fn write_blocking(&self, data: &[u8]) -> Result<()> {
        task::block_on(self.write_async(data))
    }

    pub fn flush_blocking(&self) -> Result<()> {
        task::block_on(self.flush_async())
    }

    fn is_cancelled(&self) -> bool {
        self.sink
            .get()
            .is_some_and(|attached| attached.token.is_cancelled())
    }

    fn write_now(&self, chunk: Bytes, callback: Option<Completion>) -> std::io::Result<bool> {
        let Some(attached) = self.sink.get() else {
            return Ok(false);
        };
        if self.sink_ended.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if attached.token.is_cancelled() {
            trace!(len = chunk.len(), "client gone, write dropped");
            return Ok(false);
        }
        attached.sink.write(chunk, callback)
    }

    pub fn end(&self) {
        self.request_end(None);
    }

    /// Writes `data`, then ends.
    pub fn end_with(&self, data: &[u8]) -> Result<()> {
        let written = self.write(data);
        self.end();
        written.map(|_| ())
    }

    pub fn end_str(&self, text: &str) -> Result<()> {
        let bytes = self.encoding().encode(text);
        self.end_with(&bytes)
    }

    /// Ends the response with `error`. Nothing is sent afterwards.
    pub fn error(&self, error: ResponseError) {
        self.request_end(Some(error));
    }

    fn request_end(&self, error: Option<ResponseError>) {
        if self.end_requested.swap(true, Ordering::SeqCst) {
            debug!("response already ended");
            return;
        }
        if self.barrier.is_open() {
            self.finish(error);
            return;
        }
        self.defer(Box::new(move |response: &Response| {
            response.finish(error);
            Ok(())
        }));
        self.autostart();
    }

    fn fail(&self, error: ResponseError) {
        self.end_requested.store(true, Ordering::SeqCst);
        self.finish(Some(error));
    }

    fn finish(&self, error: Option<ResponseError>) {
        let Some(attached) = self.sink.get() else {
            return;
        };
        if self.sink_ended.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(failed = error.is_some(), "ending response");
        attached.sink.end(error);
    }

    pub fn is_ended(&self) -> bool {
        self.sink_ended.load(Ordering::SeqCst)
    }

    /// The write-only stream bound to this response. Always the same instance.
    pub fn output_stream(self: &Arc<Self>) -> &ResponseStream {
        self.output.get_or_init(|| ResponseStream::new(self))
    }
}
