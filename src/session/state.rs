//! Call-order guarded sessions.
//!
//! `Session<Connected>` can only log in; authenticated stages can run
//! commands; only `Session<Authenticated>` can enable. Transitions consume
//! the session, so a failed login or enable drops (and thereby closes) the
//! underlying connection.

use super::{Connection, Prompt, PromptCapture};
use crate::config::Config;
use crate::error::{ApiError, ErrorCode, TelnetResult};
use std::time::Duration;

mod sealed {
    pub trait Sealed {}
}

pub trait Stage: sealed::Sealed {}

/// Stages that know the device prompt.
pub trait PromptStage: Stage {
    fn prompt(&self) -> &Prompt;
}

#[derive(Debug)]
pub struct Connected;

#[derive(Debug)]
pub struct Authenticated {
    prompt: Prompt,
}

#[derive(Debug)]
pub struct Privileged {
    prompt: Prompt,
}

impl sealed::Sealed for Connected {}
impl sealed::Sealed for Authenticated {}
impl sealed::Sealed for Privileged {}
impl Stage for Connected {}
impl Stage for Authenticated {}
impl Stage for Privileged {}

impl PromptStage for Authenticated {
    fn prompt(&self) -> &Prompt {
        &self.prompt
    }
}

impl PromptStage for Privileged {
    fn prompt(&self) -> &Prompt {
        &self.prompt
    }
}

pub struct Session<S: Stage> {
    conn: Connection,
    stage: S,
}

impl Session<Connected> {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            stage: Connected,
        }
    }

    pub async fn connect(host: &str, config: &Config) -> TelnetResult<Self> {
        Ok(Self::new(Connection::connect_with_config(host, config).await?))
    }

    pub async fn login(
        mut self,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<(Session<Authenticated>, String)> {
        let outcome = self.conn.login(username, password, timeout).await?;
        Ok(self.authenticated(outcome))
    }

    pub async fn password_login(
        mut self,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<(Session<Authenticated>, String)> {
        let outcome = self.conn.password_login(password, timeout).await?;
        Ok(self.authenticated(outcome))
    }

    /// HP login does not validate prompts itself, so the prompt is taken
    /// from one more settled read after the password is sent.
    pub async fn hp_login(
        mut self,
        username: &str,
        password: &str,
        send_space: bool,
        timeout: Duration,
    ) -> TelnetResult<(Session<Authenticated>, String)> {
        let mut transcript = self
            .conn
            .hp_login(username, password, send_space, timeout)
            .await?;
        let banner = {
            let mut conn = self.conn.scoped_quiet_period(timeout);
            conn.read().await.unwrap_or_default()
        };
        transcript.push_str(&banner);
        let prompt = self.conn.prompt_matcher().capture(&banner).ok_or_else(|| {
            ApiError::new(ErrorCode::NoPromptCaptured, "No prompt after HP login")
        })?;
        Ok(self.authenticated(PromptCapture { transcript, prompt }))
    }

    fn authenticated(self, outcome: PromptCapture) -> (Session<Authenticated>, String) {
        let session = Session {
            conn: self.conn,
            stage: Authenticated {
                prompt: outcome.prompt,
            },
        };
        (session, outcome.transcript)
    }
}

impl Session<Authenticated> {
    pub async fn enable(
        mut self,
        password: &str,
        timeout: Duration,
    ) -> TelnetResult<(Session<Privileged>, String)> {
        let outcome = self.conn.enable(password, timeout).await?;
        let session = Session {
            conn: self.conn,
            stage: Privileged {
                prompt: outcome.prompt,
            },
        };
        Ok((session, outcome.transcript))
    }
}

impl<S: PromptStage> Session<S> {
    pub fn prompt(&self) -> &Prompt {
        self.stage.prompt()
    }

    pub fn is_enabled(&self) -> TelnetResult<bool> {
        self.stage.prompt().is_enabled()
    }

    pub async fn command(&mut self, command: &str) -> TelnetResult<String> {
        self.conn.command(self.stage.prompt(), command).await
    }
}

impl<S: Stage> Session<S> {
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub async fn read(&mut self) -> Option<String> {
        self.conn.read().await
    }

    pub async fn close(mut self) {
        self.conn.close().await;
    }

    pub async fn hp_logout(mut self, timeout: Option<Duration>) -> TelnetResult<String> {
        self.conn.hp_logout(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionOptions;
    use crate::session::testing::ScriptedStream;

    fn session(stream: ScriptedStream) -> Session<Connected> {
        Session::new(Connection::new(Box::new(stream), ConnectionOptions::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn login_enable_command() {
        let stream = ScriptedStream::new()
            .chunk_at(0, b"Username: ")
            .reply(b"Password: ")
            .reply(b"\r\nedge-2>")
            .reply(b"enable\r\nPassword: ")
            .reply(b"\r\nedge-2#")
            .reply(b"show clock\r\n12:00:00 UTC\r\nedge-2#");
        let written = stream.written();
        let session = session(stream);

        let (session, _) = session
            .login("ops", "pw", Duration::from_millis(200))
            .await
            .expect("login");
        assert_eq!(session.prompt().as_str(), "edge-2>");
        assert!(!session.is_enabled().unwrap());

        let (mut session, _) = session
            .enable("en", Duration::from_millis(200))
            .await
            .expect("enable");
        assert!(session.is_enabled().unwrap());

        let output = session.command("show clock").await.expect("command");
        assert!(output.contains("12:00:00 UTC"));
        session.close().await;

        let sent = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        assert_eq!(sent, "ops\npw\nenable\nen\nshow clock\n");
    }

    #[tokio::test(start_paused = true)]
    async fn hp_login_takes_prompt_from_banner() {
        let stream = ScriptedStream::new()
            .chunk_at(0, b"Password: ")
            .reply(b"\x1b[24;1H\r\nProCurve Switch 2810# ");
        let session = session(stream);

        let (session, transcript) = session
            .hp_login("", "friend", false, Duration::from_millis(100))
            .await
            .expect("hp login");

        assert!(transcript.starts_with("Password: "));
        assert_eq!(session.prompt().as_str(), "ProCurve Switch 2810#");
        assert!(session.is_enabled().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_is_reported() {
        let session = session(ScriptedStream::new().chunk_at(0, b"no prompt here"));
        let err = session
            .login("ops", "pw", Duration::from_millis(100))
            .await
            .err()
            .expect("login should fail");
        assert_eq!(err.code(), Some(&ErrorCode::NoLoginPrompt));
    }
}
