//! External command execution
//!
//! Every tool the planner drives (kind, helm, git, make, kubectl, clusterctl)
//! is described as a [`CommandSpec`]: a program plus a structured argument
//! list. Nothing is ever passed through a shell, so component names, override
//! arguments and registry URLs from configuration cannot inject extra commands.
//!
//! [`CommandRunner`] is the seam between the planner and the operating system.
//! [`ProcessRunner`] spawns real processes; [`DryRunRunner`] only logs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::{BootstrapError, Result};

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    /// Build a command from an argument vector; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BootstrapError::validation("empty command"))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn kubectl<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("kubectl").args(args)
    }

    pub fn clusterctl<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("clusterctl").args(args)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Look up an environment variable set on this command.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn to_tokio(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command.stdin(Stdio::null()).kill_on_drop(true);
        command
    }
}

/// Renders a copy-pasteable shell line, e.g. `FOO=bar make 'build all'`.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(
                f,
                "{}={} ",
                shell_words::quote(key),
                shell_words::quote(value)
            )?;
        }
        write!(f, "{}", shell_words::quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_words::quote(arg))?;
        }
        Ok(())
    }
}

/// Executes external commands on behalf of the planner and its hooks
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, relaying its output to the log.
    ///
    /// Fails with [`BootstrapError::Exec`] if the command exits non-zero.
    async fn run(&self, command: &CommandSpec) -> Result<()>;

    /// Run a command to completion and return its stdout.
    async fn output(&self, command: &CommandSpec) -> Result<String>;

    /// Check whether a program is resolvable on `PATH`.
    async fn is_available(&self, program: &str) -> bool;
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<()> {
        debug!(command = %command, "running");

        let mut child = command
            .to_tokio()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BootstrapError::Spawn {
                command: command.to_string(),
                source,
            })?;

        // Drain stderr concurrently so a chatty child cannot fill the pipe
        // while we are blocked on stdout.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        // Lines are relayed lossily; build tools do not promise UTF-8.
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();
            while reader.read_until(b'\n', &mut line).await? > 0 {
                info!("{}", String::from_utf8_lossy(&line).trim_end());
                line.clear();
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(BootstrapError::exec(
                command.to_string(),
                status.to_string(),
                stderr.trim(),
            ));
        }

        Ok(())
    }

    async fn output(&self, command: &CommandSpec) -> Result<String> {
        debug!(command = %command, "running");

        let output = command
            .to_tokio()
            .output()
            .await
            .map_err(|source| BootstrapError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BootstrapError::exec(
                command.to_string(),
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn is_available(&self, program: &str) -> bool {
        Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Adds environment variables to every command before delegating.
///
/// Used to point kubectl, helm and clusterctl at a non-default kubeconfig.
pub struct EnvRunner {
    inner: Arc<dyn CommandRunner>,
    env: Vec<(String, String)>,
}

impl EnvRunner {
    pub fn new(inner: Arc<dyn CommandRunner>) -> Self {
        Self {
            inner,
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn decorate(&self, command: &CommandSpec) -> CommandSpec {
        // Variables set on the command itself win over the overlay.
        let mut decorated = command.clone();
        decorated.env = self
            .env
            .iter()
            .cloned()
            .chain(command.env.iter().cloned())
            .collect();
        decorated
    }
}

#[async_trait]
impl CommandRunner for EnvRunner {
    async fn run(&self, command: &CommandSpec) -> Result<()> {
        self.inner.run(&self.decorate(command)).await
    }

    async fn output(&self, command: &CommandSpec) -> Result<String> {
        self.inner.output(&self.decorate(command)).await
    }

    async fn is_available(&self, program: &str) -> bool {
        self.inner.is_available(program).await
    }
}

/// Logs commands instead of running them
#[derive(Debug, Default, Clone)]
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &CommandSpec) -> Result<()> {
        info!("[dry-run] {}", command);
        Ok(())
    }

    async fn output(&self, command: &CommandSpec) -> Result<String> {
        info!("[dry-run] {}", command);
        Ok(String::new())
    }

    async fn is_available(&self, _program: &str) -> bool {
        true
    }
}
