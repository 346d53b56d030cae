use crate::error::{ApiError, ErrorCode, TelnetResult};
use regex::Regex;
use std::fmt;

/// Finds the device prompt in a transcript: the last non-empty match of
/// `pattern`, with trailing `trim` characters removed.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    pattern: Regex,
    trim: Vec<char>,
}

impl PromptMatcher {
    pub const DEFAULT_PATTERN: &'static str = r"(?m)^.*$";
    pub const DEFAULT_TRIM: &'static str = "\n\r\0 \t";

    pub fn new(pattern: &str, trim: &str) -> TelnetResult<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            trim: trim.chars().collect(),
        })
    }

    pub fn capture(&self, text: &str) -> Option<Prompt> {
        let matches: Vec<_> = self.pattern.find_iter(text).collect();
        matches.iter().rev().find_map(|m| {
            let trimmed = m.as_str().trim_end_matches(self.trim.as_slice());
            if trimmed.is_empty() {
                None
            } else {
                Some(Prompt(trimmed.to_string()))
            }
        })
    }
}

impl Default for PromptMatcher {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("default prompt pattern is valid"),
            trim: Self::DEFAULT_TRIM.chars().collect(),
        }
    }
}

/// The trailing line a device prints when it is ready for input. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> TelnetResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(ApiError::new(ErrorCode::NoPromptCaptured, "Prompt is empty").into());
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `#` means privileged, `>` unprivileged. Trailing whitespace and NULs
    /// are ignored.
    pub fn is_enabled(&self) -> TelnetResult<bool> {
        let last = self
            .0
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
            .chars()
            .last();
        match last {
            Some('#') => Ok(true),
            Some('>') => Ok(false),
            other => Err(ApiError::new(
                ErrorCode::UnusualPromptCharacter,
                format!("Unusual prompt character: {:?}", other.unwrap_or('\0')),
            )
            .with_details(self.0.clone())
            .into()),
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
