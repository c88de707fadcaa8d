//! Shell apply-program
//!
//! [`ShellProgram`] adapts configured shell commands to the scheduler's
//! program interface. Each command gets the current state as JSON on stdin
//! and prints the next state as JSON on stdout; an empty stdout keeps the
//! previous state. Unset commands pass state through unchanged.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use span_core::ApplyProgram;
use span_types::Action;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProgramConfig;

pub struct ShellProgram {
    config: ProgramConfig,
}

impl ShellProgram {
    pub fn new(config: ProgramConfig) -> Self {
        Self { config }
    }

    async fn run_command(
        &self,
        action: Action,
        command: Option<&str>,
        state: Value,
    ) -> anyhow::Result<Value> {
        let Some(command) = command else {
            debug!(action = %action, "no command configured; state passed through");
            return Ok(state);
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {} command", action))?;

        let input = serde_json::to_vec(&state)?;
        let mut stdin = child
            .stdin
            .take()
            .context("child stdin not captured")?;
        stdin.write_all(&input).await?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for {} command", action))?;

        if !output.status.success() {
            bail!(
                "{} command failed ({}): {}",
                action,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(state);
        }
        serde_json::from_str(stdout.trim())
            .with_context(|| format!("parsing {} command output as JSON", action))
    }
}

#[async_trait]
impl ApplyProgram for ShellProgram {
    type State = Value;

    async fn init(&mut self) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    async fn deploy(&mut self, state: Value) -> anyhow::Result<Value> {
        let command = self.config.deploy.clone();
        self.run_command(Action::Deploy, command.as_deref(), state)
            .await
    }

    async fn terminate(&mut self, state: Value) -> anyhow::Result<Value> {
        let command = self.config.terminate.clone();
        self.run_command(Action::Terminate, command.as_deref(), state)
            .await
    }

    async fn destroy(&mut self, state: Value) -> anyhow::Result<Value> {
        let command = self.config.destroy.clone();
        self.run_command(Action::Destroy, command.as_deref(), state)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(deploy: Option<&str>) -> ShellProgram {
        ShellProgram::new(ProgramConfig {
            deploy: deploy.map(String::from),
            terminate: None,
            destroy: None,
        })
    }

    #[tokio::test]
    async fn test_unset_command_passes_state_through() {
        let mut p = program(None);
        let state = p.deploy(json!({"x": 1})).await.unwrap();
        assert_eq!(state, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_command_output_becomes_state() {
        let mut p = program(Some(r#"echo '{"deployed": true}'"#));
        let state = p.deploy(Value::Null).await.unwrap();
        assert_eq!(state, json!({"deployed": true}));
    }

    #[tokio::test]
    async fn test_command_reads_state_on_stdin() {
        // cat echoes stdin, so the state round-trips
        let mut p = program(Some("cat"));
        let state = p.deploy(json!(["a", "b"])).await.unwrap();
        assert_eq!(state, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_empty_output_keeps_state() {
        let mut p = program(Some("true"));
        let state = p.deploy(json!(42)).await.unwrap();
        assert_eq!(state, json!(42));
    }

    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let mut p = program(Some("echo boom >&2; exit 3"));
        let err = p.deploy(Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
