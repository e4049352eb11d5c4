//! engine-testsuite: conformance test driver for an ahead-of-time compiled
//! JavaScript engine
//!
//! For every test case the driver invokes the engine's compiler and runtime
//! as external processes, bounds each invocation with a deadline, and decides
//! PASS / FAIL / TIMEOUT from the exit status, the execution mode and the
//! test's expected failure phase.
//!
//! # Quick Start
//!
//! ```no_run
//! use engine_testsuite::{CompileRunArgs, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> engine_testsuite::Result<()> {
//!     let orchestrator = Orchestrator::new();
//!     let args = CompileRunArgs::new("test262/test/a.js", "build/bin");
//!     let result = orchestrator
//!         .compile_and_run(&["test262/test/a.js"], &args)
//!         .await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! [`orchestrator`] sequences [`compile`] → [`run`] per file, both built on
//! [`supervisor`]. [`extract`] is the separate entry point for AST-dump tests.
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Phases** | [`compile`], [`run`], [`orchestrator`], [`extract`] |
//! | **Processes** | [`supervisor`] |
//! | **Data** | [`result`], [`config`], [`binaries`], [`error`](Error) |

pub mod binaries;
pub mod compile;
pub mod config;
pub mod extract;
pub mod orchestrator;
pub mod result;
pub mod run;
pub mod supervisor;

mod error;

pub use config::{
    CompileRunArgs, ExpectedFailure, ExtraCompileVmArgs, FailurePhase, RunnerConfig, StrictMode,
    Timeouts,
};
pub use error::{Error, Result};
pub use extract::Dialect;
pub use orchestrator::Orchestrator;
pub use result::{TestCaseResult, TestResultCode};
pub use supervisor::{Invocation, ProcessOutcome, ProcessOutput, ProcessSupervisor, Supervisor};

/// Driver version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
