//! Trait abstraction for link port operations to enable testing

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes reserved in the receive buffer before each read
const READ_RESERVE: usize = 256;

/// Trait for duplex link I/O operations
#[async_trait]
pub trait LinkPort: Send {
    /// Append whatever bytes arrive within `budget` to `buf`.
    ///
    /// Returns the number of bytes read, 0 when the budget expired first.
    /// A closed port is reported as [`io::ErrorKind::UnexpectedEof`].
    async fn read_chunk(&mut self, buf: &mut BytesMut, budget: Duration) -> io::Result<usize>;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// [`LinkPort`] over any tokio byte stream (serial port, pipe, socket)
pub struct StreamPort<T> {
    inner: T,
}

impl<T> StreamPort<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> std::fmt::Debug for StreamPort<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPort").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> LinkPort for StreamPort<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self, buf: &mut BytesMut, budget: Duration) -> io::Result<usize> {
        buf.reserve(READ_RESERVE);
        match tokio::time::timeout(budget, self.inner.read_buf(buf)).await {
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "link port closed",
            )),
            Ok(result) => result,
            Err(_elapsed) => Ok(0),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}
