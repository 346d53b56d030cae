mod flows;
mod prompt;
mod settle;
mod state;
mod stream;
mod telnet;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::{Config, IncomingIac, LineEnding, OutgoingIac, SplitSequencePolicy};
use crate::error::{ApiError, TelnetResult};
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

pub use flows::PromptCapture;
pub use prompt::{Prompt, PromptMatcher};
pub use settle::SettlePolicy;
pub use state::{Authenticated, Connected, Privileged, PromptStage, Session, Stage};
pub use stream::{ByteStream, TcpByteStream};
pub use telnet::{
    DO, DONT, IAC, OPT_SGA, ParseResult, TelnetParser, WILL, WONT, decode_text, encode_text,
    negotiation_reply,
};

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub settle: SettlePolicy,
    pub retry_limit: u32,
    pub prompt: PromptMatcher,
    pub line_ending: LineEnding,
    pub split_sequences: SplitSequencePolicy,
    pub outgoing_iac: OutgoingIac,
    pub incoming_iac: IncomingIac,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            settle: SettlePolicy::default(),
            retry_limit: 3,
            prompt: PromptMatcher::default(),
            line_ending: LineEnding::default(),
            split_sequences: SplitSequencePolicy::default(),
            outgoing_iac: OutgoingIac::default(),
            incoming_iac: IncomingIac::default(),
        }
    }
}

impl ConnectionOptions {
    pub fn from_config(config: &Config) -> TelnetResult<Self> {
        Ok(Self {
            settle: config.read.settle_policy(),
            retry_limit: config.read.retry_limit,
            prompt: config.prompt.matcher()?,
            line_ending: config.telnet.line_ending,
            split_sequences: config.telnet.split_sequences,
            outgoing_iac: config.telnet.outgoing_iac,
            incoming_iac: config.telnet.incoming_iac,
        })
    }
}

/// A TELNET session over an exclusively owned byte stream.
///
/// Every operation takes `&mut self`: one logical operation at a time. Once
/// closed the connection stays closed; reads return `None` and writes are
/// dropped.
pub struct Connection {
    id: String,
    stream: Box<dyn ByteStream>,
    parser: TelnetParser,
    settle: SettlePolicy,
    retry_limit: u32,
    prompt: PromptMatcher,
    line_ending: LineEnding,
    outgoing_iac: OutgoingIac,
    connected: bool,
}

impl Connection {
    pub fn new(stream: Box<dyn ByteStream>, options: ConnectionOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stream,
            parser: TelnetParser::new(options.split_sequences)
                .with_incoming_iac(options.incoming_iac),
            settle: options.settle,
            retry_limit: options.retry_limit,
            prompt: options.prompt,
            line_ending: options.line_ending,
            outgoing_iac: options.outgoing_iac,
            connected: true,
        }
    }

    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout_ms: u64,
        options: ConnectionOptions,
    ) -> TelnetResult<Self> {
        let stream = TcpByteStream::connect(host, port, connect_timeout_ms).await?;
        let connection = Self::new(Box::new(stream), options);
        tracing::info!(connection_id = %connection.id, host, port, "Telnet connected");
        Ok(connection)
    }

    pub async fn connect_with_config(host: &str, config: &Config) -> TelnetResult<Self> {
        Self::connect(
            host,
            config.connection.port,
            config.connection.connect_timeout_ms,
            ConnectionOptions::from_config(config)?,
        )
        .await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.stream.is_connected()
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        self.settle
    }

    pub fn set_settle_policy(&mut self, settle: SettlePolicy) {
        self.settle = settle;
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn set_retry_limit(&mut self, retry_limit: u32) {
        self.retry_limit = retry_limit;
    }

    pub fn prompt_matcher(&self) -> &PromptMatcher {
        &self.prompt
    }

    /// Widens the inactivity window until the returned guard is dropped.
    pub fn scoped_quiet_period(&mut self, window: Duration) -> QuietPeriodGuard<'_> {
        let previous = self.settle;
        self.settle = previous.with_window(window);
        QuietPeriodGuard {
            conn: self,
            previous,
        }
    }

    pub async fn write(&mut self, text: &str) {
        if !self.is_connected() {
            return;
        }
        let payload = telnet::normalize_line_endings(
            &encode_text(text, self.outgoing_iac),
            self.line_ending,
        );
        if let Err(err) = self.stream.write_bytes(&payload).await {
            tracing::warn!(connection_id = %self.id, error = %err, "Telnet write failed");
        }
    }

    pub async fn write_line(&mut self, text: &str) {
        self.write(&format!("{text}\n")).await;
    }

    /// Reads until the output settles: one full inactivity window with
    /// nothing new on the stream. `None` when not connected.
    pub async fn read(&mut self) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        let mut gathered = Vec::new();
        loop {
            self.parser
                .interpret(self.stream.as_mut(), &mut gathered)
                .await;
            if self.settle.is_complete(&gathered) {
                break;
            }
            sleep(self.settle.window()).await;
            if self.stream.bytes_available().await == 0 {
                break;
            }
        }
        tracing::trace!(connection_id = %self.id, bytes = gathered.len(), "Settled read");
        Some(decode_text(&gathered))
    }

    /// Reads until the accumulated output contains `target`. Gives up after
    /// `retry_limit` consecutive empty reads; any non-empty read resets the
    /// count.
    pub async fn poll_until(&mut self, target: &str) -> TelnetResult<String> {
        match self.poll_for(target).await {
            Some(text) => Ok(text),
            None => Err(ApiError::target_not_found(target).into()),
        }
    }

    async fn poll_for(&mut self, target: &str) -> Option<String> {
        let mut remaining = self.retry_limit;
        let mut text = self.read().await.unwrap_or_default();
        while !text.contains(target) {
            let chunk = self.read().await.unwrap_or_default();
            if chunk.is_empty() {
                remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    tracing::debug!(connection_id = %self.id, target, "Retry budget exhausted");
                    return None;
                }
            } else {
                remaining = self.retry_limit;
            }
            text.push_str(&chunk);
        }
        Some(text)
    }

    pub async fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.stream.close().await;
        tracing::info!(connection_id = %self.id, "Telnet connection closed");
    }
}

/// Restores the connection's previous settle policy when dropped, including
/// on early returns and cancellation.
pub struct QuietPeriodGuard<'a> {
    conn: &'a mut Connection,
    previous: SettlePolicy,
}

impl Deref for QuietPeriodGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &*self.conn
    }
}

impl DerefMut for QuietPeriodGuard<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut *self.conn
    }
}

impl Drop for QuietPeriodGuard<'_> {
    fn drop(&mut self) {
        self.conn.settle = self.previous;
    }
}
