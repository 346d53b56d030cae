use crate::error::{ApiError, ErrorCode, TelnetResult};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

const READ_CHUNK: usize = 4096;

/// A connected duplex byte channel that can report how many bytes are ready
/// without waiting for more.
#[async_trait]
pub trait ByteStream: Send {
    fn is_connected(&self) -> bool;

    /// Number of bytes that can be read right now. Never waits for the peer.
    async fn bytes_available(&mut self) -> usize;

    /// Next ready byte, or `None` when nothing is ready.
    async fn read_byte(&mut self) -> Option<u8>;

    async fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Release the channel. Calling it more than once is harmless.
    async fn close(&mut self);
}

pub struct TcpByteStream {
    /// `None` once closed; dropping the socket releases both halves.
    inner: Option<TcpStream>,
    pending: BytesMut,
    connected: bool,
}

impl TcpByteStream {
    pub async fn connect(host: &str, port: u16, connect_timeout_ms: u64) -> TelnetResult<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(
            Duration::from_millis(connect_timeout_ms),
            TcpStream::connect(addr),
        )
        .await
        .map_err(|_| ApiError::new(ErrorCode::ConnectTimeout, "Telnet connect timeout"))?
        .map_err(|err| {
            ApiError::new(ErrorCode::ConnectFailed, "Telnet connect failed")
                .with_details(err.to_string())
        })?;
        Ok(Self::new(stream))
    }

    pub fn new(inner: TcpStream) -> Self {
        Self {
            inner: Some(inner),
            pending: BytesMut::with_capacity(READ_CHUNK),
            connected: true,
        }
    }

    async fn fill(&mut self) {
        if !self.connected {
            return;
        }
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        // Zero-length wait: completes only if the socket is already readable.
        if timeout(Duration::ZERO, inner.readable()).await.is_err() {
            return;
        }
        loop {
            self.pending.reserve(READ_CHUNK);
            match inner.try_read_buf(&mut self.pending) {
                Ok(0) => {
                    tracing::debug!("Telnet peer closed the connection");
                    self.connected = false;
                    break;
                }
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(error = %err, "Telnet read failed");
                    self.connected = false;
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ByteStream for TcpByteStream {
    fn is_connected(&self) -> bool {
        self.connected && self.inner.is_some()
    }

    async fn bytes_available(&mut self) -> usize {
        if self.pending.is_empty() {
            self.fill().await;
        }
        self.pending.len()
    }

    async fn read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.fill().await;
        }
        if self.pending.has_remaining() {
            Some(self.pending.get_u8())
        } else {
            None
        }
    }

    async fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
        };
        if let Err(err) = inner.write_all(data).await {
            self.connected = false;
            return Err(err);
        }
        inner.flush().await
    }

    async fn close(&mut self) {
        let Some(mut inner) = self.inner.take() else {
            return;
        };
        self.pending.clear();
        if let Err(err) = inner.shutdown().await {
            tracing::debug!(error = %err, "Telnet shutdown failed");
        }
    }
}
