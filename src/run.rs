//! Run phase
//!
//! Executes a compiled artifact, or in lazy mode the source itself, and
//! classifies the exit status against the expected failure phase.
//!
//! Lazy mode compiles and runs in one invocation, so a parse error and a
//! runtime throw look the same: any expected failure is satisfied by any
//! non-zero exit. Ahead-of-time mode has already compiled successfully by the
//! time it gets here, so only a `runtime` expectation allows a throw.

use crate::binaries::hermes_path;
use crate::compile::COMPILE_ARGS;
use crate::config::{engine_environment, CompileRunArgs, FailurePhase};
use crate::error::Result;
use crate::result::{TestCaseResult, TestResultCode};
use crate::supervisor::{Invocation, ProcessOutcome, Supervisor};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ES6_ARGS: &[&str] = &["-Xes6-promise", "-Xes6-proxy"];
pub const EXTRA_RUN_ARGS: &[&str] = &["-Xhermes-internal-test-methods"];
pub const USE_MICROTASK_FLAG: &[&str] = &["-Xmicrotask-queue"];

/// How a completed run relates to the test's expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// Exited cleanly and no throw was expected
    Pass,
    /// Killed by a signal
    Signaled,
    /// Failed but no (matching) failure was expected
    UnexpectedError,
    /// Failed as expected
    ExpectedError,
    /// Exited cleanly but a throw was expected
    MissingError,
}

/// Classify a run-phase exit code
pub fn classify_run(exit_code: i32, lazy: bool, phase: Option<&FailurePhase>) -> RunVerdict {
    let phase = phase.filter(|phase| !phase.is_empty());
    let failure_allowed = if lazy {
        phase.is_some()
    } else {
        phase == Some(&FailurePhase::Runtime)
    };
    match (exit_code, failure_allowed) {
        (code, _) if code < 0 => RunVerdict::Signaled,
        (0, false) => RunVerdict::Pass,
        (0, true) => RunVerdict::MissingError,
        (_, false) => RunVerdict::UnexpectedError,
        (_, true) => RunVerdict::ExpectedError,
    }
}

/// Runtime argument vector for `file_to_run`
pub fn runtime_argv(file_to_run: &Path, args: &CompileRunArgs) -> Vec<String> {
    let mut argv = Vec::new();
    // shermes artifacts are native executables
    if !args.shermes {
        argv.push(hermes_path(&args.binary_directory).display().to_string());
    }
    argv.push(file_to_run.display().to_string());
    argv.extend(
        ES6_ARGS
            .iter()
            .chain(EXTRA_RUN_ARGS)
            .chain(USE_MICROTASK_FLAG)
            .map(|arg| arg.to_string()),
    );
    if args.lazy {
        argv.push("-lazy".to_string());
        argv.extend(COMPILE_ARGS.iter().map(|arg| arg.to_string()));
        if args.is_strict() {
            argv.push("-strict".to_string());
        }
    } else if !args.shermes {
        argv.push("-b".to_string());
    }
    argv.extend(args.extra_vm_args().iter().cloned());
    if args.lazy {
        argv.extend(args.extra_compile_args().iter().cloned());
    }
    if args.disable_handle_san {
        argv.push("-gc-sanitize-handles=0".to_string());
    }
    argv
}

/// Runtime invocation, including the engine environment
pub fn runtime_invocation(file_to_run: &Path, args: &CompileRunArgs) -> Invocation {
    Invocation::new(runtime_argv(file_to_run, args))
        .with_env(engine_environment(&args.binary_directory))
}

/// Map a run outcome to a result; `None` means carry on.
pub fn classify_run_outcome(
    base_file_name: &str,
    file_to_run: &Path,
    args: &CompileRunArgs,
    invocation: &Invocation,
    outcome: &ProcessOutcome,
) -> Option<TestCaseResult> {
    let test_name = args.test_name.as_str();
    let output = match outcome {
        ProcessOutcome::TimedOut => {
            return Some(
                TestCaseResult::new(
                    test_name,
                    TestResultCode::ExecuteTimeout,
                    format!(
                        "FAIL: Execution of binary timed out for {}",
                        file_to_run.display()
                    ),
                )
                .with_output(format!("Run command: {}\n", invocation.command_line())),
            );
        }
        ProcessOutcome::Completed(output) => output,
    };

    let failed = |message: String| {
        Some(
            TestCaseResult::new(test_name, TestResultCode::ExecuteFailed, message)
                .with_output(output.report(invocation)),
        )
    };
    match classify_run(output.exit_code, args.lazy, args.expected_failure_phase()) {
        RunVerdict::Pass => None,
        RunVerdict::Signaled => failed(format!(
            "FAIL: Execution terminated with {}",
            output.exit_code
        )),
        RunVerdict::UnexpectedError => failed(format!(
            "FAIL: Execution of {} threw unexpected error",
            base_file_name
        )),
        RunVerdict::MissingError => failed(format!(
            "FAIL: Expected execution of {} to throw",
            base_file_name
        )),
        RunVerdict::ExpectedError => Some(TestCaseResult::new(
            test_name,
            TestResultCode::TestPassed,
            format!(
                "PASS: Execution of {} threw an error as expected",
                base_file_name
            ),
        )),
    }
}

/// Run `file_to_run` (bytecode, native artifact, or source in lazy mode).
///
/// Returns `None` if it ran cleanly and nothing was expected to throw.
pub async fn run<S: Supervisor + ?Sized>(
    supervisor: &S,
    base_file_name: &str,
    file_to_run: &Path,
    args: &CompileRunArgs,
    deadline: Duration,
) -> Result<Option<TestCaseResult>> {
    let invocation = runtime_invocation(file_to_run, args);
    let outcome = supervisor.run(&invocation, deadline).await?;
    let result = classify_run_outcome(base_file_name, file_to_run, args, &invocation, &outcome);
    debug!(
        test = %args.test_name,
        file = base_file_name,
        lazy = args.lazy,
        code = ?result.as_ref().map(|r| r.code),
        "run phase done"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExpectedFailure, ExtraCompileVmArgs, StrictMode};
    use crate::supervisor::ProcessOutput;
    use pretty_assertions::assert_eq;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_classify_run_ahead_of_time() {
        let runtime = FailurePhase::Runtime;
        let parse = FailurePhase::Parse;
        assert_eq!(classify_run(0, false, None), RunVerdict::Pass);
        assert_eq!(classify_run(1, false, None), RunVerdict::UnexpectedError);
        assert_eq!(classify_run(1, false, Some(&runtime)), RunVerdict::ExpectedError);
        assert_eq!(classify_run(0, false, Some(&runtime)), RunVerdict::MissingError);
        // a parse expectation cannot be met at run time
        assert_eq!(classify_run(1, false, Some(&parse)), RunVerdict::UnexpectedError);
        assert_eq!(classify_run(0, false, Some(&parse)), RunVerdict::Pass);
        assert_eq!(
            classify_run(3, false, Some(&FailurePhase::Resolution)),
            RunVerdict::UnexpectedError
        );
    }

    #[test]
    fn test_classify_run_lazy() {
        let parse = FailurePhase::Parse;
        let runtime = FailurePhase::Runtime;
        assert_eq!(classify_run(0, true, None), RunVerdict::Pass);
        assert_eq!(classify_run(1, true, None), RunVerdict::UnexpectedError);
        assert_eq!(classify_run(1, true, Some(&parse)), RunVerdict::ExpectedError);
        assert_eq!(classify_run(1, true, Some(&runtime)), RunVerdict::ExpectedError);
        assert_eq!(classify_run(0, true, Some(&parse)), RunVerdict::MissingError);
        assert_eq!(classify_run(0, true, Some(&runtime)), RunVerdict::MissingError);
    }

    #[test]
    fn test_classify_run_empty_phase_expects_nothing() {
        let empty = FailurePhase::from("");
        for lazy in [false, true] {
            assert_eq!(classify_run(0, lazy, Some(&empty)), RunVerdict::Pass);
            assert_eq!(classify_run(1, lazy, Some(&empty)), RunVerdict::UnexpectedError);
        }
    }

    #[test]
    fn test_classify_run_signal_always_fails() {
        let phases = [
            None,
            Some(FailurePhase::Parse),
            Some(FailurePhase::Runtime),
            Some(FailurePhase::Other("early".to_string())),
        ];
        for lazy in [false, true] {
            for phase in &phases {
                assert_eq!(classify_run(-11, lazy, phase.as_ref()), RunVerdict::Signaled);
                assert_eq!(classify_run(-9, lazy, phase.as_ref()), RunVerdict::Signaled);
            }
        }
    }

    #[test]
    fn test_runtime_argv_bytecode() {
        let args = CompileRunArgs::new("a.js", "/bin").with_disable_handle_san(true);
        assert_eq!(
            runtime_argv(Path::new("a.js.out"), &args),
            strings(&[
                "/bin/hermes",
                "a.js.out",
                "-Xes6-promise",
                "-Xes6-proxy",
                "-Xhermes-internal-test-methods",
                "-Xmicrotask-queue",
                "-b",
                "-gc-sanitize-handles=0",
            ])
        );
    }

    #[test]
    fn test_runtime_argv_lazy() {
        let args = CompileRunArgs::new("a.js", "/bin")
            .with_lazy(true)
            .with_strict_mode(StrictMode::STRICT)
            .with_extra_args(ExtraCompileVmArgs::new(
                strings(&["-Xcompile"]),
                strings(&["-Xvm"]),
            ));
        assert_eq!(
            runtime_argv(Path::new("a.js"), &args),
            strings(&[
                "/bin/hermes",
                "a.js",
                "-Xes6-promise",
                "-Xes6-proxy",
                "-Xhermes-internal-test-methods",
                "-Xmicrotask-queue",
                "-lazy",
                "-test262",
                "-fno-static-builtins",
                "-strict",
                "-Xvm",
                "-Xcompile",
            ])
        );
    }

    #[test]
    fn test_runtime_argv_shermes() {
        let args = CompileRunArgs::new("a.js", "/bin")
            .with_shermes(true)
            .with_extra_args(ExtraCompileVmArgs::new(strings(&["-Xcompile"]), Vec::new()));
        assert_eq!(
            runtime_argv(Path::new("a.js.out"), &args),
            strings(&[
                "a.js.out",
                "-Xes6-promise",
                "-Xes6-proxy",
                "-Xhermes-internal-test-methods",
                "-Xmicrotask-queue",
            ])
        );
    }

    #[test]
    fn test_runtime_invocation_sets_locale() {
        let args = CompileRunArgs::new("a.js", "/bin");
        let inv = runtime_invocation(Path::new("a.js.out"), &args);
        let env = inv.env.unwrap();
        assert_eq!(env["LC_ALL"], "en_US.UTF-8");
    }

    #[test]
    fn test_classify_run_outcome_messages() {
        let args = CompileRunArgs::new("suite/a.js", "/bin")
            .with_expected_failure(Some(ExpectedFailure::new(FailurePhase::Runtime)));
        let file = Path::new("/t/a.js.out");
        let inv = runtime_invocation(file, &args);

        let expected = classify_run_outcome(
            "a.js",
            file,
            &args,
            &inv,
            &ProcessOutcome::Completed(ProcessOutput::new(3).with_stderr("Uncaught TypeError")),
        )
        .unwrap();
        assert_eq!(expected.code, TestResultCode::TestPassed);
        assert_eq!(expected.message, "PASS: Execution of a.js threw an error as expected");
        assert_eq!(expected.output, None);

        let missing = classify_run_outcome(
            "a.js",
            file,
            &args,
            &inv,
            &ProcessOutcome::Completed(ProcessOutput::new(0)),
        )
        .unwrap();
        assert_eq!(missing.code, TestResultCode::ExecuteFailed);
        assert_eq!(missing.message, "FAIL: Expected execution of a.js to throw");
        assert!(missing.output.unwrap().starts_with("Run command: /bin/hermes /t/a.js.out"));

        let timeout =
            classify_run_outcome("a.js", file, &args, &inv, &ProcessOutcome::TimedOut).unwrap();
        assert_eq!(timeout.code, TestResultCode::ExecuteTimeout);
        assert_eq!(timeout.test_name, "suite/a.js");
        assert_eq!(
            timeout.message,
            "FAIL: Execution of binary timed out for /t/a.js.out"
        );
    }
}
