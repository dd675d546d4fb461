//! Deferred-start, buffered HTTP response writer.
//!
//! A [`Response`] lets a handler set status, headers and cookies and write body
//! bytes before the host has a transport for it. When the host attaches a
//! [`Sink`] and a start has been requested, the head is committed once and the
//! captured writes are replayed in order, however many threads race on it.
//!
//! [`server::Host`] builds the per-request [`server::ServerRequest`] /
//! [`server::ServerResponse`] pair consumed by the dispatch layer.

pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod server;

pub use config::ResponseConfig;
pub use error::{ConfigError, ResponseError, Result};
pub use http::cookie::CookieOptions;
pub use http::headers::HeaderBag;
pub use http::request::Environment;
pub use http::response::Response;
pub use http::stream::ResponseStream;
pub use net::{CancellationToken, ChannelSink, Completion, Sink, SinkEvent};
