//! Compile-and-run sequencing
//!
//! A test case is one or more source files. Each file goes through the
//! compile phase and then the run phase; the first phase on any file that
//! produces a result ends the test case with that result.

use crate::compile::{artifact_path, compile_with_args, compiler_argv};
use crate::config::{CompileRunArgs, FailurePhase, Timeouts};
use crate::error::Result;
use crate::result::TestCaseResult;
use crate::run::run;
use crate::supervisor::{ProcessSupervisor, Supervisor};
use std::path::Path;
use tracing::{debug, info};

/// Drives the compile and run phases of test cases.
///
/// Holds no per-test state, so one orchestrator can serve many concurrent
/// test cases.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator<S = ProcessSupervisor> {
    supervisor: S,
    timeouts: Timeouts,
}

impl Orchestrator<ProcessSupervisor> {
    /// Orchestrator over real processes with the default deadlines
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Supervisor> Orchestrator<S> {
    pub fn with_supervisor(supervisor: S) -> Self {
        Self {
            supervisor,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Compile and run one source file.
    ///
    /// Returns `None` if the file passed, otherwise the result that ends the
    /// test case.
    pub async fn compile_and_run_single(
        &self,
        source: &Path,
        args: &CompileRunArgs,
    ) -> Result<Option<TestCaseResult>> {
        let base_file_name = base_file_name(source);

        if args.lazy {
            return run(
                &self.supervisor,
                &base_file_name,
                source,
                args,
                self.timeouts.run,
            )
            .await;
        }

        let expect_compile_failure = args.expected_failure_phase() == Some(&FailurePhase::Parse);
        let argv = compiler_argv(source, args);
        if let Some(result) = compile_with_args(
            &self.supervisor,
            &args.test_name,
            expect_compile_failure,
            argv,
            self.timeouts.compile,
        )
        .await?
        {
            return Ok(Some(result));
        }

        // Nothing to run when the compiler rejected the file as expected.
        if expect_compile_failure {
            return Ok(None);
        }
        run(
            &self.supervisor,
            &base_file_name,
            &artifact_path(source),
            args,
            self.timeouts.run,
        )
        .await
    }

    /// Compile and run every file of a test case, in order.
    ///
    /// Stops at the first file that produces a result; later files are never
    /// compiled or run.
    pub async fn compile_and_run<P: AsRef<Path>>(
        &self,
        sources: &[P],
        args: &CompileRunArgs,
    ) -> Result<TestCaseResult> {
        for source in sources {
            let source = source.as_ref();
            if let Some(result) = self.compile_and_run_single(source, args).await? {
                debug!(test = %args.test_name, file = %source.display(), code = %result.code, "stopping early");
                return Ok(result);
            }
        }
        info!(test = %args.test_name, files = sources.len(), "passed");
        Ok(TestCaseResult::passed(args.test_name.clone()))
    }
}

fn base_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
