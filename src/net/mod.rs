pub mod channel;
pub mod sink;

pub use channel::{ChannelSink, SinkEvent};
pub use sink::{CancellationToken, Completion, Sink};
