// SPDX-License-Identifier: MIT

//! External command execution
//!
//! [`CommandRunner`] is the only way steps talk to platform tooling. A nonzero
//! exit status is an ordinary result (`success == false`); only transport
//! failures (missing program, timeout, spawn failure) are errors.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::error::CommandError;

/// Sink for progress notifications of long-running commands
pub trait ProgressReporter: Send + Sync {
    fn report(
        &self,
        current: u64,
        total: u64,
        message: Option<&str>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Writes progress notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(
        &self,
        current: u64,
        total: u64,
        message: Option<&str>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::info!("[{}/{}] {}", current, total, message.unwrap_or(""));
        Ok(())
    }
}

/// Per-invocation options
#[derive(Clone)]
pub struct CommandOptions {
    pub timeout: Duration,
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child only; the parent environment is never modified
    pub env: Vec<(String, String)>,
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

/// Result of a finished process
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub duration: Duration,
}

/// Trait abstracting how external programs are run.
///
/// Production code uses [`ProcessRunner`]; tests use [`ScriptedRunner`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput, CommandError>;

    /// Launch a long-lived program without waiting for it. Returns the pid if known.
    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<Option<u32>, CommandError>;
}

impl CommandOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cwd: None,
            env: Vec::new(),
            progress: None,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Forward a progress notification; sink failures are logged and swallowed
    pub fn report(&self, current: u64, total: u64, message: Option<&str>) {
        if let Some(progress) = &self.progress {
            if let Err(e) = progress.report(current, total, message) {
                log::warn!("Progress reporter failed: {}", e);
            }
        }
    }
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("timeout", &self.timeout)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl CommandOutput {
    /// Trimmed stdout, the common case for single-value queries
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Last `lines` lines of stdout and stderr combined
    pub fn tail(&self, lines: usize) -> String {
        let combined: Vec<&str> = self.stdout.lines().chain(self.stderr.lines()).collect();
        let start = combined.len().saturating_sub(lines);
        combined[start..].join("\n")
    }
}

/// Runs real OS processes through `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn build_command(program: &str, args: &[String], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn spawn_error(program: &str, err: std::io::Error) -> CommandError {
        if err.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound {
                program: program.to_string(),
            }
        } else {
            CommandError::Spawn {
                program: program.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput, CommandError> {
        log::info!("Running {} {:?}", program, args);
        options.report(0, 1, Some(&format!("Running {}", program)));

        let started = Instant::now();
        let mut cmd = Self::build_command(program, args, options);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| Self::spawn_error(program, e))?;

        // On timeout the future is dropped, which kills the child
        let output = match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CommandError::Spawn {
                    program: program.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                log::warn!("{} timed out after {:?}", program, options.timeout);
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout: options.timeout,
                });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            duration: started.elapsed(),
        };

        log::info!(
            "{} exited with {} after {:?}",
            program,
            result.exit_code,
            result.duration
        );
        options.report(1, 1, Some(&format!("{} finished", program)));

        Ok(result)
    }

    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<Option<u32>, CommandError> {
        log::info!("Launching detached {} {:?}", program, args);
        let mut cmd = Self::build_command(program, args, options);
        cmd.stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        let child = cmd.spawn().map_err(|e| Self::spawn_error(program, e))?;
        Ok(child.id())
    }
}

/// Canned reply used by [`ScriptedRunner`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NotFound,
    Timeout,
}

impl ScriptedReply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

struct ScriptRule {
    program: String,
    needles: Vec<String>,
    replies: VecDeque<ScriptedReply>,
}

/// Invocation recorded by [`ScriptedRunner`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub detached: bool,
}

/// Deterministic runner for tests and dry runs.
///
/// A rule matches when the program name matches and every needle appears among
/// the arguments. Replies are consumed in order; the last reply repeats.
/// Unmatched invocations fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<ScriptRule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register replies for `program` invoked with all of `needles` among its args
    pub fn on(self, program: &str, needles: &[&str], replies: Vec<ScriptedReply>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(ScriptRule {
                program: program.to_string(),
                needles: needles.iter().map(|s| s.to_string()).collect(),
                replies: replies.into(),
            });
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded invocations of `program` whose args contain `needle`
    pub fn count(&self, program: &str, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == program && c.args.iter().any(|a| a == needle))
            .count()
    }

    fn next_reply(&self, program: &str, args: &[String]) -> Option<ScriptedReply> {
        let mut rules = self.rules.lock().ok()?;
        let rule = rules.iter_mut().find(|r| {
            r.program == program && r.needles.iter().all(|n| args.iter().any(|a| a == n))
        })?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }

    fn record(&self, program: &str, args: &[String], options: &CommandOptions, detached: bool) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                program: program.to_string(),
                args: args.to_vec(),
                env: options.env.clone(),
                detached,
            });
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput, CommandError> {
        self.record(program, args, options, false);
        options.report(0, 1, Some(program));
        match self.next_reply(program, args) {
            Some(ScriptedReply::Exit {
                code,
                stdout,
                stderr,
            }) => {
                options.report(1, 1, Some(program));
                Ok(CommandOutput {
                    exit_code: code,
                    stdout,
                    stderr,
                    success: code == 0,
                    duration: Duration::from_millis(1),
                })
            }
            Some(ScriptedReply::Timeout) => Err(CommandError::Timeout {
                program: program.to_string(),
                timeout: options.timeout,
            }),
            Some(ScriptedReply::NotFound) | None => Err(CommandError::NotFound {
                program: program.to_string(),
            }),
        }
    }

    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<Option<u32>, CommandError> {
        self.record(program, args, options, true);
        match self.next_reply(program, args) {
            Some(ScriptedReply::Exit { .. }) => Ok(Some(4242)),
            Some(ScriptedReply::Timeout) => Err(CommandError::Timeout {
                program: program.to_string(),
                timeout: options.timeout,
            }),
            Some(ScriptedReply::NotFound) | None => Err(CommandError::NotFound {
                program: program.to_string(),
            }),
        }
    }
}

/// Convenience for building argument vectors from string literals
pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
