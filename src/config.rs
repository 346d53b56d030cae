use crate::error::{ApiError, ErrorCode, TelnetResult};
use crate::session::{PromptMatcher, SettlePolicy};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Cr,
    Crlf,
    PassThrough,
}

/// What happens to a command sequence cut off at the end of an availability
/// window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitSequencePolicy {
    #[default]
    Drop,
    Buffer,
}

/// How a literal 0xFF in outgoing text is escaped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutgoingIac {
    #[default]
    Double,
    Placeholder,
}

/// What an escaped `IAC IAC` pair contributes to the received text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncomingIac {
    /// The decimal text `255`, as legacy device scripts expect.
    #[default]
    Decimal,
    /// A single 0xFF byte, decoded as U+00FF.
    Byte,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub read: ReadConfig,
    pub prompt: PromptConfig,
    pub telnet: TelnetConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub port: u16,
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: 23,
            connect_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub quiet_period_ms: u64,
    pub retry_limit: u32,
    pub terminator: Option<u8>,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 100,
            retry_limit: 3,
            terminator: None,
        }
    }
}

impl ReadConfig {
    pub fn settle_policy(&self) -> SettlePolicy {
        let window = Duration::from_millis(self.quiet_period_ms);
        match self.terminator {
            Some(byte) => SettlePolicy::Terminator { byte, window },
            None => SettlePolicy::QuietPeriod { window },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub pattern: String,
    pub trim_chars: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            pattern: PromptMatcher::DEFAULT_PATTERN.to_string(),
            trim_chars: PromptMatcher::DEFAULT_TRIM.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn matcher(&self) -> TelnetResult<PromptMatcher> {
        PromptMatcher::new(&self.pattern, &self.trim_chars)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TelnetConfig {
    pub line_ending: LineEnding,
    pub split_sequences: SplitSequencePolicy,
    pub outgoing_iac: OutgoingIac,
    pub incoming_iac: IncomingIac,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Log in, optionally enable, and run commands.
    Run(RunArgs),
    /// Connect and print whatever the device sends first.
    Banner(CommonArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct CommonArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub quiet_period_ms: Option<u64>,
    #[arg(long)]
    pub retry_limit: Option<u32>,
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, default_value = "")]
    pub username: String,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub enable: bool,
    #[arg(long)]
    pub enable_password: Option<String>,
    /// Use the HP "press any key" login sequence.
    #[arg(long)]
    pub hp: bool,
    #[arg(long)]
    pub send_space: bool,
    #[arg(long, default_value_t = 5_000)]
    pub login_timeout_ms: u64,
    #[arg(short = 'c', long = "command")]
    pub commands: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Config {
    pub fn load(args: &CommonArgs) -> TelnetResult<Self> {
        let mut config = if let Some(path) = &args.config {
            Self::from_file(path)?
        } else if Path::new("telctl.toml").exists() {
            Self::from_file(Path::new("telctl.toml"))?
        } else {
            Self::default()
        };

        config.apply_env();
        config.apply_cli(args);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> TelnetResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            ApiError::new(ErrorCode::IoError, "Failed to read config file")
                .with_details(err.to_string())
        })?;
        let parsed: Self = toml::from_str(&content).map_err(|err| {
            ApiError::new(ErrorCode::InvalidArgument, "Failed to parse config file")
                .with_details(err.to_string())
        })?;
        Ok(parsed)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("TELCTL_PORT")
            && let Ok(port) = value.parse() {
                self.connection.port = port;
            }
        if let Ok(value) = env::var("TELCTL_QUIET_PERIOD_MS")
            && let Ok(ms) = value.parse() {
                self.read.quiet_period_ms = ms;
            }
        if let Ok(value) = env::var("TELCTL_RETRY_LIMIT")
            && let Ok(limit) = value.parse() {
                self.read.retry_limit = limit;
            }
        if let Ok(value) = env::var("TELCTL_PROMPT_PATTERN") {
            self.prompt.pattern = value;
        }
        if let Ok(value) = env::var("TELCTL_LINE_ENDING")
            && let Some(ending) = parse_line_ending(&value) {
                self.telnet.line_ending = ending;
            }
        if let Ok(value) = env::var("TELCTL_LOG_LEVEL") {
            self.logging.level = value;
        }
    }

    fn apply_cli(&mut self, args: &CommonArgs) {
        if let Some(port) = args.port {
            self.connection.port = port;
        }
        if let Some(ms) = args.quiet_period_ms {
            self.read.quiet_period_ms = ms;
        }
        if let Some(limit) = args.retry_limit {
            self.read.retry_limit = limit;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }
}

fn parse_line_ending(value: &str) -> Option<LineEnding> {
    match value.to_ascii_lowercase().as_str() {
        "lf" => Some(LineEnding::Lf),
        "cr" => Some(LineEnding::Cr),
        "crlf" => Some(LineEnding::Crlf),
        "passthrough" => Some(LineEnding::PassThrough),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_device_conventions() {
        let config = Config::default();
        assert_eq!(config.connection.port, 23);
        assert_eq!(config.read.quiet_period_ms, 100);
        assert_eq!(config.read.retry_limit, 3);
        assert_eq!(config.telnet.line_ending, LineEnding::Lf);
        assert_eq!(config.telnet.split_sequences, SplitSequencePolicy::Drop);
        assert_eq!(config.telnet.incoming_iac, IncomingIac::Decimal);
        assert_eq!(
            config.read.settle_policy(),
            SettlePolicy::QuietPeriod {
                window: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[read]\nretry_limit = 5\nterminator = 35\n\n[telnet]\nsplit_sequences = \"buffer\"\noutgoing_iac = \"placeholder\"\nincoming_iac = \"byte\""
        )
        .expect("write");

        let config = Config::from_file(file.path()).expect("load");
        assert_eq!(config.read.retry_limit, 5);
        assert_eq!(config.read.quiet_period_ms, 100);
        assert_eq!(config.telnet.split_sequences, SplitSequencePolicy::Buffer);
        assert_eq!(config.telnet.outgoing_iac, OutgoingIac::Placeholder);
        assert_eq!(config.telnet.incoming_iac, IncomingIac::Byte);
        assert!(matches!(
            config.read.settle_policy(),
            SettlePolicy::Terminator { byte: b'#', .. }
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::from_file(&dir.path().join("absent.toml")).expect_err("missing");
        assert_eq!(err.code(), Some(&ErrorCode::IoError));
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[read\nretry_limit = ").expect("write");
        let err = Config::from_file(file.path()).expect_err("parse error");
        assert_eq!(err.code(), Some(&ErrorCode::InvalidArgument));
    }

    #[test]
    fn cli_overrides_config() {
        let args = CommonArgs {
            host: "switch".to_string(),
            port: Some(2323),
            config: None,
            quiet_period_ms: Some(250),
            retry_limit: None,
            log_level: Some("debug".to_string()),
        };
        let mut config = Config::default();
        config.apply_cli(&args);
        assert_eq!(config.connection.port, 2323);
        assert_eq!(config.read.quiet_period_ms, 250);
        assert_eq!(config.read.retry_limit, 3);
        assert_eq!(config.logging.level, "debug");
    }
}
