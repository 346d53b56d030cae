//! In-memory [`ByteStream`] for exercising reads and flows under paused time.

use crate::session::stream::ByteStream;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

pub struct ScriptedStream {
    origin: Instant,
    pending: VecDeque<u8>,
    timed: VecDeque<(Duration, Vec<u8>)>,
    replies: VecDeque<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    connected: bool,
    closes: Arc<Mutex<usize>>,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            pending: VecDeque::new(),
            timed: VecDeque::new(),
            replies: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            connected: true,
            closes: Arc::new(Mutex::new(0)),
        }
    }

    /// Makes `bytes` readable `ms` milliseconds after the stream was built.
    pub fn chunk_at(mut self, ms: u64, bytes: &[u8]) -> Self {
        self.timed.push_back((Duration::from_millis(ms), bytes.to_vec()));
        self
    }

    /// Makes `bytes` readable after the next line (a write ending in `\n` or
    /// `\r`) is sent.
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }

    pub fn closes(&self) -> Arc<Mutex<usize>> {
        self.closes.clone()
    }

    fn release_due(&mut self) {
        let elapsed = Instant::now().duration_since(self.origin);
        while let Some((due, _)) = self.timed.front() {
            if *due > elapsed {
                break;
            }
            if let Some((_, bytes)) = self.timed.pop_front() {
                self.pending.extend(bytes);
            }
        }
    }
}

#[async_trait]
impl ByteStream for ScriptedStream {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn bytes_available(&mut self) -> usize {
        self.release_due();
        self.pending.len()
    }

    async fn read_byte(&mut self) -> Option<u8> {
        self.release_due();
        self.pending.pop_front()
    }

    async fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(data);
        if matches!(data.last(), Some(b'\n') | Some(b'\r')) {
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend(reply);
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.connected = false;
        *self.closes.lock().unwrap() += 1;
    }
}
