//! Per-test configuration
//!
//! [`CompileRunArgs`] is the value object every orchestrator call receives.
//! [`RunnerConfig`] is the file-backed form of the same settings, shared by
//! all test cases of a run.

use crate::error::{Error, Result};
use bitflags::bitflags;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default deadline for a single compiler invocation
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(200);
/// Default deadline for a single runtime invocation
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(200);

bitflags! {
    /// Strictness variants a test is compiled and run with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StrictMode: u8 {
        const NO_STRICT = 0b01;
        const STRICT = 0b10;
    }
}

impl Default for StrictMode {
    fn default() -> Self {
        StrictMode::NO_STRICT
    }
}

/// Phase at which a test is expected to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum FailurePhase {
    /// Early error, reported by the compiler
    Parse,
    /// Module resolution error
    Resolution,
    /// Error thrown while executing
    Runtime,
    /// Any other phase name found in test metadata
    Other(String),
}

impl FailurePhase {
    pub fn as_str(&self) -> &str {
        match self {
            FailurePhase::Parse => "parse",
            FailurePhase::Resolution => "resolution",
            FailurePhase::Runtime => "runtime",
            FailurePhase::Other(name) => name,
        }
    }

    /// An empty phase name in test metadata means no failure is expected
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<&str> for FailurePhase {
    fn from(name: &str) -> Self {
        match name {
            "parse" => FailurePhase::Parse,
            "resolution" => FailurePhase::Resolution,
            "runtime" => FailurePhase::Runtime,
            other => FailurePhase::Other(other.to_string()),
        }
    }
}

impl From<String> for FailurePhase {
    fn from(name: String) -> Self {
        FailurePhase::from(name.as_str())
    }
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected failure from the test's `negative:` metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpectedFailure {
    pub phase: FailurePhase,
    /// Error constructor name (SyntaxError, TypeError, ...), informational only
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

impl ExpectedFailure {
    pub fn new(phase: impl Into<FailurePhase>) -> Self {
        Self {
            phase: phase.into(),
            error_type: None,
        }
    }

    /// Build an expectation from a raw phase name; an empty name means no
    /// failure is expected.
    pub fn from_phase_name(name: &str) -> Option<Self> {
        if name.is_empty() {
            None
        } else {
            Some(Self::new(name))
        }
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

/// Extra compiler and VM arguments some test suites need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraCompileVmArgs {
    pub compile_args: Vec<String>,
    pub vm_args: Vec<String>,
}

impl ExtraCompileVmArgs {
    pub fn new(compile_args: Vec<String>, vm_args: Vec<String>) -> Self {
        Self {
            compile_args,
            vm_args,
        }
    }
}

/// Everything needed to compile and run one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRunArgs {
    /// Succinct test name for printing
    pub test_name: String,
    /// Whether to compile/run with strict mode
    pub strict_mode: StrictMode,
    /// Directory holding the engine executables
    pub binary_directory: PathBuf,
    /// Expected failure, if any
    pub expected_failure: Option<ExpectedFailure>,
    /// Disable the GC handle sanitizer to improve speed
    pub disable_handle_san: bool,
    /// Run source directly instead of compiling ahead of time
    pub lazy: bool,
    /// Use the native `shermes` toolchain
    pub shermes: bool,
    /// Compile with `-O` instead of `-O0`
    pub opt: bool,
    /// Extra arguments given by specific test suites
    pub extra_compile_vm_args: Option<ExtraCompileVmArgs>,
}

impl CompileRunArgs {
    pub fn new(test_name: impl Into<String>, binary_directory: impl Into<PathBuf>) -> Self {
        Self {
            test_name: test_name.into(),
            strict_mode: StrictMode::default(),
            binary_directory: binary_directory.into(),
            expected_failure: None,
            disable_handle_san: false,
            lazy: false,
            shermes: false,
            opt: false,
            extra_compile_vm_args: None,
        }
    }

    pub fn with_strict_mode(mut self, strict_mode: StrictMode) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    pub fn with_expected_failure(mut self, expected_failure: Option<ExpectedFailure>) -> Self {
        self.expected_failure = expected_failure;
        self
    }

    pub fn with_disable_handle_san(mut self, disable: bool) -> Self {
        self.disable_handle_san = disable;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_shermes(mut self, shermes: bool) -> Self {
        self.shermes = shermes;
        self
    }

    pub fn with_opt(mut self, opt: bool) -> Self {
        self.opt = opt;
        self
    }

    pub fn with_extra_args(mut self, extra: ExtraCompileVmArgs) -> Self {
        self.extra_compile_vm_args = Some(extra);
        self
    }

    /// Phase the test is expected to fail at, if any
    pub fn expected_failure_phase(&self) -> Option<&FailurePhase> {
        self.expected_failure
            .as_ref()
            .map(|failure| &failure.phase)
            .filter(|phase| !phase.is_empty())
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode.contains(StrictMode::STRICT)
    }

    /// Extra compiler arguments, empty when none were configured
    pub fn extra_compile_args(&self) -> &[String] {
        self.extra_compile_vm_args
            .as_ref()
            .map(|extra| extra.compile_args.as_slice())
            .unwrap_or(&[])
    }

    /// Extra VM arguments, empty when none were configured
    pub fn extra_vm_args(&self) -> &[String] {
        self.extra_compile_vm_args
            .as_ref()
            .map(|extra| extra.vm_args.as_slice())
            .unwrap_or(&[])
    }
}

/// Independent deadlines for the compile and run phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub compile: Duration,
    pub run: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            compile: DEFAULT_COMPILE_TIMEOUT,
            run: DEFAULT_RUN_TIMEOUT,
        }
    }
}

/// Environment the runtime is launched with.
///
/// Replaces the parent environment entirely. `ICU_DATA` only matters on Linux,
/// where the engine is built against a bundled ICU.
pub fn engine_environment(binary_directory: &Path) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("LC_ALL".to_string(), "en_US.UTF-8".to_string());
    if cfg!(target_os = "linux") {
        env.insert(
            "ICU_DATA".to_string(),
            binary_directory.display().to_string(),
        );
    }
    env
}

/// Settings shared by every test case of a run, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub binary_directory: PathBuf,
    pub lazy: bool,
    pub shermes: bool,
    pub opt: bool,
    pub disable_handle_san: bool,
    pub strict: bool,
    pub extra_compile_args: Vec<String>,
    pub extra_vm_args: Vec<String>,
    pub compile_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary_directory: PathBuf::from("build/bin"),
            lazy: false,
            shermes: false,
            opt: false,
            disable_handle_san: false,
            strict: false,
            extra_compile_args: Vec::new(),
            extra_vm_args: Vec::new(),
            compile_timeout_secs: DEFAULT_COMPILE_TIMEOUT.as_secs(),
            run_timeout_secs: DEFAULT_RUN_TIMEOUT.as_secs(),
        }
    }
}

impl RunnerConfig {
    /// Parse a config from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: RunnerConfig = serde_json::from_str(text)?;
        if config.compile_timeout_secs == 0 || config.run_timeout_secs == 0 {
            return Err(Error::config("timeouts must be at least one second"));
        }
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
            .map_err(|err| Error::config(format!("{}: {}", path.display(), err)))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            compile: Duration::from_secs(self.compile_timeout_secs),
            run: Duration::from_secs(self.run_timeout_secs),
        }
    }

    /// Per-test arguments for one test case under this config
    pub fn to_compile_run_args(
        &self,
        test_name: impl Into<String>,
        expected_failure: Option<ExpectedFailure>,
    ) -> CompileRunArgs {
        let strict_mode = if self.strict {
            StrictMode::STRICT
        } else {
            StrictMode::NO_STRICT
        };
        let mut args = CompileRunArgs::new(test_name, self.binary_directory.clone())
            .with_strict_mode(strict_mode)
            .with_expected_failure(expected_failure)
            .with_disable_handle_san(self.disable_handle_san)
            .with_lazy(self.lazy)
            .with_shermes(self.shermes)
            .with_opt(self.opt);
        if !self.extra_compile_args.is_empty() || !self.extra_vm_args.is_empty() {
            args = args.with_extra_args(ExtraCompileVmArgs::new(
                self.extra_compile_args.clone(),
                self.extra_vm_args.clone(),
            ));
        }
        args
    }
}
