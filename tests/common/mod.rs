#![allow(dead_code)]

use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rustygate::{Completion, HeaderBag, ResponseError, Sink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Commit { status: String, headers: HeaderBag },
    Data(Vec<u8>),
    Flush,
    End(Option<String>),
}

/// Sink that records every call and completes writes synchronously.
///
/// Failing calls are not recorded.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
    fail_commit: bool,
    fail_data: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Rejects the header commit with `BrokenPipe`.
    pub fn failing_commit() -> Arc<Self> {
        Arc::new(Self {
            fail_commit: true,
            ..Self::default()
        })
    }

    /// Accepts the commit and flushes, rejects every data chunk.
    pub fn failing_data() -> Arc<Self> {
        Arc::new(Self {
            fail_data: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.count(|e| matches!(e, Recorded::Commit { .. }))
    }

    pub fn ends(&self) -> usize {
        self.count(|e| matches!(e, Recorded::End(_)))
    }

    pub fn data(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Data(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn count(&self, f: impl Fn(&Recorded) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| f(e)).count()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl Sink for RecordingSink {
    fn commit(&self, status: &str, headers: &HeaderBag) -> std::io::Result<()> {
        if self.fail_commit {
            return Err(ErrorKind::BrokenPipe.into());
        }
        self.push(Recorded::Commit {
            status: status.to_string(),
            headers: headers.clone(),
        });
        Ok(())
    }

    fn write(&self, chunk: Bytes, _on_complete: Option<Completion>) -> std::io::Result<bool> {
        if chunk.is_empty() {
            self.push(Recorded::Flush);
        } else if self.fail_data {
            return Err(ErrorKind::ConnectionReset.into());
        } else {
            self.push(Recorded::Data(chunk.to_vec()));
        }
        Ok(false)
    }

    fn end(&self, error: Option<ResponseError>) {
        self.push(Recorded::End(error.map(|e| e.to_string())));
    }
}
