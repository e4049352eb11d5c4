//! Shared test helpers for integration tests

use async_trait::async_trait;
use engine_testsuite::{Invocation, ProcessOutcome, ProcessOutput, Supervisor};
use std::sync::Mutex;
use std::time::Duration;

/// Supervisor that answers from a closure and records every invocation
pub struct ScriptedSupervisor<F> {
    respond: F,
    calls: Mutex<Vec<Invocation>>,
}

impl<F> ScriptedSupervisor<F>
where
    F: Fn(&Invocation) -> ProcessOutcome + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Invocations seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> Supervisor for ScriptedSupervisor<F>
where
    F: Fn(&Invocation) -> ProcessOutcome + Send + Sync,
{
    async fn run(
        &self,
        invocation: &Invocation,
        _deadline: Duration,
    ) -> engine_testsuite::Result<ProcessOutcome> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.respond)(invocation))
    }
}

/// Completed outcome with the given exit code and no output
#[allow(dead_code)]
pub fn exited(code: i32) -> ProcessOutcome {
    ProcessOutcome::Completed(ProcessOutput::new(code))
}

/// Completed outcome with exit code 0 and the given stdout
#[allow(dead_code)]
pub fn printed(stdout: &str) -> ProcessOutcome {
    ProcessOutcome::Completed(ProcessOutput::new(0).with_stdout(stdout))
}

/// Compiler invocation (ahead-of-time path)
#[allow(dead_code)]
pub fn is_compile(invocation: &Invocation) -> bool {
    invocation.argv.iter().any(|arg| arg == "-out" || arg == "-o")
}

/// Runtime invocation
#[allow(dead_code)]
pub fn is_run(invocation: &Invocation) -> bool {
    invocation.argv.iter().any(|arg| arg == "-Xmicrotask-queue")
}

/// Whether any argument mentions `needle`
#[allow(dead_code)]
pub fn mentions(invocation: &Invocation, needle: &str) -> bool {
    invocation.argv.iter().any(|arg| arg.contains(needle))
}

/// Fake `hermes` for end-to-end tests. Uses shell builtins only, because the
/// run phase launches it with a cleared environment.
///
/// - `-dump-ast`: prints `AST:` followed by the last argument's contents
/// - `-emit-binary`: fails for sources named `*compile_error*`, otherwise
///   creates the `-out` artifact
/// - a single argument: evaluation of a generator script, prints `42`
/// - anything else is a run; the artifact name picks the behaviour:
///   `*throws*` exits 3, `*crash*` kills itself with SIGSEGV, `*hang*` spins
#[cfg(unix)]
#[allow(dead_code)]
pub const FAKE_HERMES: &str = r#"#!/bin/sh
mode=run
last=
for arg in "$@"; do
  case "$arg" in
    -dump-ast|-dump-transformed-ast) mode=ast ;;
    -emit-binary) mode=compile ;;
  esac
  last="$arg"
done
if [ "$mode" = run ] && [ "$#" -eq 1 ]; then
  mode=eval
fi
case "$mode:$1" in
  ast:*)
    printf 'AST:'
    while IFS= read -r line || [ -n "$line" ]; do printf '%s' "$line"; done < "$last"
    printf '\n'
    exit 0 ;;
  eval:*)
    echo 42
    exit 0 ;;
  compile:*compile_error*)
    echo "error: ';' expected" >&2
    exit 1 ;;
  compile:*)
    : > "$3"
    exit 0 ;;
  run:*throws*)
    echo "Uncaught Error: boom" >&2
    exit 3 ;;
  run:*crash*)
    kill -SEGV $$ ;;
  run:*hang*)
    while :; do :; done ;;
  run:*)
    echo ok
    exit 0 ;;
esac
"#;
