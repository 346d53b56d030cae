use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    ConnectTimeout,
    ConnectFailed,
    IoError,
    NoLoginPrompt,
    NoPasswordPrompt,
    NoEnablePasswordPrompt,
    TargetNotFound,
    CommandPromptNotFound,
    UnusualPromptCharacter,
    NoPromptCaptured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn target_not_found(target: &str) -> Self {
        Self::new(
            ErrorCode::TargetNotFound,
            format!("Target text not found: {target}"),
        )
    }

    pub fn command_prompt_not_found(command: &str) -> Self {
        Self::new(
            ErrorCode::CommandPromptNotFound,
            format!("Prompt not found after command: {command}"),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

#[derive(Debug, Error)]
pub enum TelnetError {
    #[error("{0}")]
    Api(ApiError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<ApiError> for TelnetError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

impl TelnetError {
    /// The API error code, if this error came from a session flow.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            TelnetError::Api(api) => Some(&api.error_code),
            _ => None,
        }
    }
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ConnectTimeout => "CONNECT_TIMEOUT",
            ErrorCode::ConnectFailed => "CONNECT_FAILED",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::NoLoginPrompt => "NO_LOGIN_PROMPT",
            ErrorCode::NoPasswordPrompt => "NO_PASSWORD_PROMPT",
            ErrorCode::NoEnablePasswordPrompt => "NO_ENABLE_PASSWORD_PROMPT",
            ErrorCode::TargetNotFound => "TARGET_NOT_FOUND",
            ErrorCode::CommandPromptNotFound => "COMMAND_PROMPT_NOT_FOUND",
            ErrorCode::UnusualPromptCharacter => "UNUSUAL_PROMPT_CHARACTER",
            ErrorCode::NoPromptCaptured => "NO_PROMPT_CAPTURED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type TelnetResult<T> = Result<T, TelnetError>;
