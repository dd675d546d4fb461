//! Write-only stream view of a [`Response`].
//!
//! Writes and flushes go straight to the response; reading, seeking and
//! length queries fail with [`std::io::ErrorKind::Unsupported`].

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Weak};

use crate::error::{ResponseError, Result};
use crate::http::response::Response;

#[derive(Debug)]
pub struct ResponseStream {
    response: Weak<Response>,
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{op} is not supported on a response stream"),
    )
}

impl ResponseStream {
    pub(crate) fn new(response: &Arc<Response>) -> Self {
        Self {
            response: Arc::downgrade(response),
        }
    }

    fn response(&self) -> io::Result<Arc<Response>> {
        self.response
            .upgrade()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))
    }

    pub fn can_read(&self) -> bool {
        false
    }

    pub fn can_seek(&self) -> bool {
        false
    }

    pub fn can_write(&self) -> bool {
        true
    }

    pub fn len(&self) -> io::Result<u64> {
        Err(unsupported("length"))
    }

    pub fn set_len(&self, _len: u64) -> io::Result<()> {
        Err(unsupported("set_len"))
    }

    pub fn position(&self) -> io::Result<u64> {
        Err(unsupported("position"))
    }

    pub async fn write_async(&self, buf: &[u8]) -> Result<()> {
        let response = self.response().map_err(ResponseError::Transport)?;
        response.write_async(buf).await
    }

    pub async fn flush_async(&self) -> Result<()> {
        let response = self.response().map_err(ResponseError::Transport)?;
        response.flush_async().await
    }
}

impl Write for &ResponseStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.response()?.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.response()?.flush()?;
        Ok(())
    }
}

impl Write for ResponseStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

impl Read for &ResponseStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }
}

impl Read for ResponseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl Seek for &ResponseStream {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("seek"))
    }
}

impl Seek for ResponseStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (&*self).seek(pos)
    }
}
