//! Process supervision
//!
//! Runs an engine binary with a wall-clock deadline, capturing stdout and
//! stderr. On timeout the child and everything it spawned are killed and
//! reaped before [`ProcessOutcome::TimedOut`] is returned.
//!
//! The orchestration layers only talk to the [`Supervisor`] trait, so they can
//! be driven by [`ProcessSupervisor`] in production and by a scripted backend
//! in tests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A command line plus an optional environment override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Argument vector; `argv[0]` is the program
    pub argv: Vec<String>,
    /// When set, the child environment is exactly this map
    pub env: Option<BTreeMap<String, String>>,
}

impl Invocation {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv, env: None }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    /// Space-joined command line, for diagnostics
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Output of a process that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-N` when the process was killed by signal `N`
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Terminated by a signal rather than exiting
    pub fn signaled(&self) -> bool {
        self.exit_code < 0
    }

    /// Command line plus whatever the process printed, attached to failures
    pub fn report(&self, invocation: &Invocation) -> String {
        let mut report = format!("Run command: {}\n", invocation.command_line());
        if !self.stdout.is_empty() {
            report.push_str(&format!("stdout:\n {}", self.stdout_string()));
        }
        if !self.stderr.is_empty() {
            report.push_str(&format!("stderr:\n {}", self.stderr_string()));
        }
        report
    }
}

/// Result of a supervised process: completion or timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed(ProcessOutput),
    TimedOut,
}

/// Something that can run an [`Invocation`] under a deadline
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Run to completion or until `deadline` elapses.
    ///
    /// Failing to start the program is an error; everything the program does
    /// once started is an outcome.
    async fn run(&self, invocation: &Invocation, deadline: Duration) -> Result<ProcessOutcome>;
}

/// [`Supervisor`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation, program: &str) -> Command {
        let mut command = std::process::Command::new(program);
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(env) = &invocation.env {
            command.env_clear().envs(env);
        }
        // Lead a fresh process group so a timeout can take down the whole tree.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut command = Command::from(command);
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    async fn run(&self, invocation: &Invocation, deadline: Duration) -> Result<ProcessOutcome> {
        let program = invocation
            .program()
            .ok_or_else(|| Error::InvalidArgs("empty argument vector".to_string()))?;

        debug!(command = %invocation.command_line(), ?deadline, "spawning");
        let mut child = Self::command(invocation, program)
            .spawn()
            .map_err(|err| Error::spawn(program, err))?;
        // `Child::id` is gone once the child is reaped, but its group can
        // outlive it through descendants holding the pipes open.
        let pid = child.id();

        match tokio::time::timeout(deadline, communicate(&mut child)).await {
            Ok(output) => {
                let output = output?;
                if output.signaled() {
                    warn!(command = %invocation.command_line(), exit_code = output.exit_code, "terminated by signal");
                }
                Ok(ProcessOutcome::Completed(output))
            }
            Err(_) => {
                warn!(command = %invocation.command_line(), ?deadline, "timed out, killing process tree");
                terminate_tree(&mut child, pid).await;
                Ok(ProcessOutcome::TimedOut)
            }
        }
    }
}

/// Wait for exit while draining both pipes
async fn communicate(child: &mut Child) -> Result<ProcessOutput> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, stdout, stderr) =
        tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))?;
    Ok(ProcessOutput {
        exit_code: exit_code(status),
        stdout,
        stderr,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Kill the child's process tree, then the child itself if it is still
/// running, and reap it
async fn terminate_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_tree(pid).await;
    }
    match child.try_wait() {
        Ok(Some(status)) => debug!(?status, "child already exited"),
        _ => {
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to kill timed out process");
            }
        }
    }
}

#[cfg(unix)]
async fn kill_process_tree(pid: u32) {
    // The child leads its own group, so the group id is its pid.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, err = %io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(windows)]
async fn kill_process_tree(pid: u32) {
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(err) = status {
        debug!(pid, %err, "taskkill failed");
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_process_tree(_pid: u32) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Invocation {
        Invocation::new(vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()])
    }

    async fn completed(invocation: &Invocation) -> ProcessOutput {
        match ProcessSupervisor.run(invocation, Duration::from_secs(30)).await.unwrap() {
            ProcessOutcome::Completed(output) => output,
            ProcessOutcome::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn test_invocation_accessors() {
        let inv = Invocation::new(vec!["hermes".into(), "a.js".into(), "-b".into()]);
        assert_eq!(inv.program(), Some("hermes"));
        assert_eq!(inv.args(), ["a.js".to_string(), "-b".to_string()]);
        assert_eq!(inv.command_line(), "hermes a.js -b");
        assert!(Invocation::new(Vec::new()).args().is_empty());
    }

    #[test]
    fn test_report() {
        let inv = Invocation::new(vec!["hermes".into(), "a.js".into()]);
        assert_eq!(ProcessOutput::new(1).report(&inv), "Run command: hermes a.js\n");
        let output = ProcessOutput::new(1).with_stdout("1\n").with_stderr("TypeError\n");
        assert_eq!(
            output.report(&inv),
            "Run command: hermes a.js\nstdout:\n 1\nstderr:\n TypeError\n"
        );
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let output = completed(&sh("echo out; echo err >&2; exit 3")).await;
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout_string(), "out\n");
        assert_eq!(output.stderr_string(), "err\n");
        assert!(!output.signaled());
    }

    #[tokio::test]
    async fn test_signal_is_negative_exit_code() {
        let output = completed(&sh("kill -SEGV $$")).await;
        assert_eq!(output.exit_code, -libc::SIGSEGV);
        assert!(output.signaled());
    }

    #[tokio::test]
    async fn test_env_override_replaces_environment() {
        let mut env = BTreeMap::new();
        env.insert("LC_ALL".to_string(), "en_US.UTF-8".to_string());
        let output = completed(&sh("echo \"$LC_ALL ${HOME:-unset}\"").with_env(env)).await;
        assert_eq!(output.stdout_string(), "en_US.UTF-8 unset\n");
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly() {
        let start = Instant::now();
        let outcome = ProcessSupervisor
            .run(&sh("sleep 30"), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    /// Run `sleep 30 & <tail>` under a short deadline and check the
    /// backgrounded sleep does not outlive the timeout
    #[cfg(target_os = "linux")]
    async fn assert_timeout_kills_background_sleep(tail: &str) {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > {}; {}", pid_file.display(), tail);
        let outcome = ProcessSupervisor
            .run(&sh(&script), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::TimedOut);

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let stat = format!("/proc/{}/stat", pid);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut alive = true;
        while Instant::now() < deadline {
            // gone, or a zombie waiting for its new parent to reap it
            alive = match std::fs::read_to_string(&stat) {
                Ok(text) => !text.contains(") Z "),
                Err(_) => false,
            };
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "grandchild {} survived the timeout", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        assert_timeout_kills_background_sleep("wait").await;
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants_of_exited_child() {
        // the child is reaped before the deadline, the sleep keeps the pipes open
        assert_timeout_kills_background_sleep("exit 0").await;
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let inv = Invocation::new(vec!["/nonexistent/engine/hermes".to_string()]);
        let err = ProcessSupervisor.run(&inv, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_argv_is_error() {
        let err = ProcessSupervisor
            .run(&Invocation::new(Vec::new()), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));
    }
}
