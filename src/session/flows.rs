//! Login, privilege and command scripts composed from write, settle-read and
//! poll-until.
//!
//! Flows that take a `timeout` widen the inactivity window for their own
//! duration only; the previous window is back in place however they exit.

use super::{Connection, Prompt, PromptMatcher};
use crate::error::{ApiError, ErrorCode, TelnetResult};
use std::time::Duration;

const HP_ANY_KEY: &str = "Press any key to continue";
const HP_USERNAME: &str = "Username:";
const HP_PASSWORD: &str = "Password:";
const HP_LOGOUT_CONFIRM: &str = "log out [y/n]?";

/// Transcript of a flow together with the prompt it ended on.
#[derive(Debug, Clone)]
pub struct PromptCapture {
    pub transcript: String,
    pub prompt: Prompt,
}

impl Connection {
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<PromptCapture> {
        let matcher = self.prompt.clone();
        self.login_with_matcher(username, password, timeout, &matcher)
            .await
    }

    pub async fn login_with_matcher(
        &mut self,
        username: &str,
        password: &str,
        timeout: Duration,
        matcher: &PromptMatcher,
    ) -> TelnetResult<PromptCapture> {
        let mut conn = self.scoped_quiet_period(timeout);
        tracing::debug!(connection_id = %conn.id, username, "Login started");

        let mut transcript = conn.read().await.unwrap_or_default();
        expect_colon(&transcript, ErrorCode::NoLoginPrompt, "Login prompt not found")?;
        conn.write_line(username).await;

        let reply = conn.read().await.unwrap_or_default();
        transcript.push_str(&reply);
        expect_colon(&reply, ErrorCode::NoPasswordPrompt, "Password prompt not found")?;
        conn.write_line(password).await;

        transcript.push_str(&conn.read().await.unwrap_or_default());
        let prompt = capture_prompt(matcher, &transcript)?;
        tracing::info!(connection_id = %conn.id, prompt = %prompt, "Logged in");
        Ok(PromptCapture { transcript, prompt })
    }

    pub async fn password_login(
        &mut self,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<PromptCapture> {
        let matcher = self.prompt.clone();
        let mut conn = self.scoped_quiet_period(timeout);

        let mut transcript = conn.read().await.unwrap_or_default();
        expect_colon(&transcript, ErrorCode::NoPasswordPrompt, "Password prompt not found")?;
        conn.write_line(password).await;

        transcript.push_str(&conn.read().await.unwrap_or_default());
        let prompt = capture_prompt(&matcher, &transcript)?;
        tracing::info!(connection_id = %conn.id, prompt = %prompt, "Logged in");
        Ok(PromptCapture { transcript, prompt })
    }

    /// HP ProCurve style login. The output is full of terminal escapes, so
    /// progress is tracked by substring polling rather than prompt suffixes.
    pub async fn hp_login(
        &mut self,
        username: &str,
        password: &str,
        send_space: bool,
        timeout: Duration,
    ) -> TelnetResult<String> {
        let mut conn = self.scoped_quiet_period(timeout);
        let mut transcript = String::new();

        if send_space {
            transcript.push_str(&conn.poll_until(HP_ANY_KEY).await?);
            conn.write(" ").await;
        }
        if !username.is_empty() {
            transcript.push_str(&conn.poll_until(HP_USERNAME).await?);
            conn.write_line(username).await;
        }
        transcript.push_str(&conn.poll_until(HP_PASSWORD).await?);
        conn.write_line(password).await;
        tracing::debug!(connection_id = %conn.id, "HP login credentials sent");
        Ok(transcript)
    }

    /// Logs out of an HP device. The connection is closed whether or not the
    /// confirmation prompt showed up.
    pub async fn hp_logout(&mut self, timeout: Option<Duration>) -> TelnetResult<String> {
        let outcome = {
            let mut conn = match timeout {
                Some(window) => self.scoped_quiet_period(window),
                None => {
                    let window = self.settle.window();
                    self.scoped_quiet_period(window)
                }
            };
            conn.write_line("logout").await;
            let outcome = conn.poll_until(HP_LOGOUT_CONFIRM).await;
            if outcome.is_ok() {
                conn.write("y").await;
            }
            outcome
        };
        self.close().await;
        outcome
    }

    /// Sends `command` and collects output until `prompt` shows up again.
    pub async fn command(&mut self, prompt: &Prompt, command: &str) -> TelnetResult<String> {
        self.write_line(command).await;
        match self.poll_for(prompt.as_str()).await {
            Some(text) => Ok(text),
            None => Err(ApiError::command_prompt_not_found(command).into()),
        }
    }

    pub async fn enable(
        &mut self,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<PromptCapture> {
        let matcher = self.prompt.clone();
        let mut conn = self.scoped_quiet_period(timeout);

        conn.write_line("enable").await;
        let mut transcript = conn.read().await.unwrap_or_default();
        expect_colon(
            &transcript,
            ErrorCode::NoEnablePasswordPrompt,
            "Enable password prompt not found",
        )?;
        conn.write_line(password).await;

        transcript.push_str(&conn.read().await.unwrap_or_default());
        let prompt = capture_prompt(&matcher, &transcript)?;
        tracing::info!(connection_id = %conn.id, prompt = %prompt, "Enabled");
        Ok(PromptCapture { transcript, prompt })
    }
}

fn expect_colon(output: &str, code: ErrorCode, message: &str) -> TelnetResult<()> {
    if output.trim_end().ends_with(':') {
        Ok(())
    } else {
        Err(ApiError::new(code, message)
            .with_details(output.to_string())
            .into())
    }
}

fn capture_prompt(matcher: &PromptMatcher, transcript: &str) -> TelnetResult<Prompt> {
    matcher.capture(transcript).ok_or_else(|| {
        ApiError::new(ErrorCode::NoPromptCaptured, "No prompt in device output").into()
    })
}
