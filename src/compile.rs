//! Ahead-of-time compile phase
//!
//! Drives `hermes -emit-binary` (or `shermes`) and decides whether the
//! compiler's exit status matches what the test expected.

use crate::binaries::compiler_path;
use crate::config::CompileRunArgs;
use crate::error::Result;
use crate::result::{TestCaseResult, TestResultCode};
use crate::supervisor::{Invocation, ProcessOutcome, Supervisor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Flags every compilation gets, in lazy mode too
pub const COMPILE_ARGS: &[&str] = &["-test262", "-fno-static-builtins"];

/// Where the compiled artifact for `source` is written
pub fn artifact_path(source: &Path) -> PathBuf {
    let mut path = source.as_os_str().to_os_string();
    path.push(".out");
    PathBuf::from(path)
}

/// Compiler argument vector for one source file
pub fn compiler_argv(source: &Path, args: &CompileRunArgs) -> Vec<String> {
    let mut argv = vec![
        compiler_path(&args.binary_directory, args.shermes)
            .display()
            .to_string(),
        source.display().to_string(),
        if args.shermes { "-o" } else { "-out" }.to_string(),
        artifact_path(source).display().to_string(),
    ];
    argv.extend(COMPILE_ARGS.iter().map(|arg| arg.to_string()));
    if !args.shermes {
        argv.push("-emit-binary".to_string());
    }
    argv.extend(args.extra_compile_args().iter().cloned());
    if args.is_strict() {
        argv.push("-strict".to_string());
    }
    argv.push(if args.opt { "-O" } else { "-O0" }.to_string());
    argv
}

/// Map a compiler outcome to a result; `None` means carry on.
///
/// A negative exit code is a crash, so it fails even when a compile error was
/// expected.
pub fn classify_compile(
    test_name: &str,
    expect_compile_failure: bool,
    invocation: &Invocation,
    outcome: &ProcessOutcome,
) -> Option<TestCaseResult> {
    let output = match outcome {
        ProcessOutcome::TimedOut => {
            return Some(
                TestCaseResult::new(
                    test_name,
                    TestResultCode::CompileTimeout,
                    format!("FAIL: Compilation timed out, args: {:?}", invocation.argv),
                )
                .with_output(format!("Run command: {}", invocation.command_line())),
            );
        }
        ProcessOutcome::Completed(output) => output,
    };

    let message = if output.signaled() {
        format!("FAIL: Compilation terminated with {}", output.exit_code)
    } else if output.exit_code != 0 && !expect_compile_failure {
        format!("FAIL: Compilation failed with command: {:?}", invocation.argv)
    } else if output.exit_code == 0 && expect_compile_failure {
        "FAIL: Compilation failure expected".to_string()
    } else {
        return None;
    };
    Some(
        TestCaseResult::new(test_name, TestResultCode::CompileFailed, message)
            .with_output(output.report(invocation)),
    )
}

/// Run the compiler with the given argument vector.
///
/// Returns `None` if compilation succeeded, or failed as expected.
pub async fn compile_with_args<S: Supervisor + ?Sized>(
    supervisor: &S,
    test_name: &str,
    expect_compile_failure: bool,
    argv: Vec<String>,
    deadline: Duration,
) -> Result<Option<TestCaseResult>> {
    let invocation = Invocation::new(argv);
    let outcome = supervisor.run(&invocation, deadline).await?;
    let result = classify_compile(test_name, expect_compile_failure, &invocation, &outcome);
    debug!(test = test_name, expect_compile_failure, failed = result.is_some(), "compile phase done");
    Ok(result)
}
