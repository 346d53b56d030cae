use crate::config::{IncomingIac, LineEnding, OutgoingIac, SplitSequencePolicy};
use crate::session::stream::ByteStream;

pub const IAC: u8 = 0xff;
pub const DONT: u8 = 0xfe;
pub const DO: u8 = 0xfd;
pub const WONT: u8 = 0xfc;
pub const WILL: u8 = 0xfb;

pub const OPT_SGA: u8 = 3;

/// Literal text that the legacy escaping mode doubles instead of raw 0xFF.
const IAC_PLACEHOLDER: &str = "\0xFF";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub data: Vec<u8>,
    pub replies: Vec<[u8; 3]>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    #[default]
    Data,
    Iac,
    Verb(u8),
}

/// Splits a raw TELNET byte stream into literal data and negotiation replies.
#[derive(Debug, Default)]
pub struct TelnetParser {
    state: ParserState,
    split: SplitSequencePolicy,
    incoming: IncomingIac,
}

impl TelnetParser {
    pub fn new(split: SplitSequencePolicy) -> Self {
        Self {
            state: ParserState::Data,
            split,
            incoming: IncomingIac::default(),
        }
    }

    pub fn with_incoming_iac(mut self, incoming: IncomingIac) -> Self {
        self.incoming = incoming;
        self
    }

    pub fn process(&mut self, input: &[u8]) -> ParseResult {
        let mut result = ParseResult::default();

        for &byte in input {
            match self.state {
                ParserState::Data => {
                    if byte == IAC {
                        self.state = ParserState::Iac;
                    } else {
                        result.data.push(byte);
                    }
                }
                ParserState::Iac => match byte {
                    IAC => {
                        match self.incoming {
                            IncomingIac::Decimal => result.data.extend_from_slice(b"255"),
                            IncomingIac::Byte => result.data.push(IAC),
                        }
                        self.state = ParserState::Data;
                    }
                    DO | DONT | WILL | WONT => {
                        self.state = ParserState::Verb(byte);
                    }
                    _ => {
                        self.state = ParserState::Data;
                    }
                },
                ParserState::Verb(verb) => {
                    result.replies.push(negotiation_reply(verb, byte));
                    self.state = ParserState::Data;
                }
            }
        }

        result
    }

    /// Ends one availability window. Under [`SplitSequencePolicy::Drop`] a
    /// sequence still waiting for its verb or option byte is abandoned.
    pub fn finish_pass(&mut self) {
        if self.split == SplitSequencePolicy::Drop && self.state != ParserState::Data {
            tracing::warn!(state = ?self.state, "Dropping partial telnet command sequence");
            self.state = ParserState::Data;
        }
    }

    pub fn is_mid_sequence(&self) -> bool {
        self.state != ParserState::Data
    }

    /// Drains every byte the stream has ready, writes any negotiation replies
    /// back, and appends literal data to `out`.
    pub async fn interpret<S>(&mut self, stream: &mut S, out: &mut Vec<u8>) -> usize
    where
        S: ByteStream + ?Sized,
    {
        let mut raw = Vec::new();
        while stream.bytes_available().await > 0 {
            match stream.read_byte().await {
                Some(byte) => raw.push(byte),
                None => break,
            }
        }

        let result = self.process(&raw);
        self.finish_pass();
        tracing::trace!(raw = raw.len(), data = result.data.len(), "Telnet pass");

        for reply in &result.replies {
            tracing::debug!(verb = reply[1], option = reply[2], "Telnet negotiation reply");
            if let Err(err) = stream.write_bytes(reply).await {
                tracing::warn!(error = %err, "Telnet write failed");
                break;
            }
        }

        out.extend_from_slice(&result.data);
        raw.len()
    }
}

/// Only Suppress-Go-Ahead is accepted; every other option is refused.
pub fn negotiation_reply(verb: u8, option: u8) -> [u8; 3] {
    let reply = match (option, verb) {
        (OPT_SGA, DO) => WILL,
        (OPT_SGA, _) => DO,
        (_, DO) => WONT,
        _ => DONT,
    };
    [IAC, reply, option]
}

/// Wire text is one byte per character.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub fn encode_text(text: &str, iac: OutgoingIac) -> Vec<u8> {
    match iac {
        OutgoingIac::Double => escape_iac_bytes(&single_byte(text)),
        OutgoingIac::Placeholder => {
            let doubled = format!("{IAC_PLACEHOLDER}{IAC_PLACEHOLDER}");
            single_byte(&text.replace(IAC_PLACEHOLDER, &doubled))
        }
    }
}

pub fn normalize_line_endings(bytes: &[u8], mode: LineEnding) -> Vec<u8> {
    match mode {
        LineEnding::PassThrough | LineEnding::Lf => bytes.to_vec(),
        LineEnding::Cr => bytes
            .iter()
            .map(|&b| if b == b'\n' { b'\r' } else { b })
            .collect(),
        LineEnding::Crlf => {
            let mut out = Vec::with_capacity(bytes.len());
            for &b in bytes {
                if b == b'\n' {
                    out.push(b'\r');
                }
                out.push(b);
            }
            out
        }
    }
}

fn single_byte(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn escape_iac_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out
}
