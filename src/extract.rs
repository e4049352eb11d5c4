//! AST dumps and derived test sources
//!
//! Parser tests compare the engine's AST dump against a reference. Some of
//! them (`*.source.js`) do not contain the program under test literally:
//! they are scripts that assign it to a `source` variable. Those are
//! evaluated with the engine first and the printed value is what gets parsed.

use crate::binaries::hermes_path;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::result::{TestCaseResult, TestResultCode};
use crate::supervisor::{Invocation, ProcessOutcome, Supervisor};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

/// File name suffix of source-generator tests
pub const SOURCE_GENERATOR_SUFFIX: &str = ".source.js";

/// Statement appended to a generator so that evaluating it prints the program
pub const PRINT_SOURCE: &str = "print(source);";

/// Syntax the parser has to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Plain JavaScript; JSX is enabled for files with `JSX` in their path
    #[default]
    JavaScript,
    /// Flow, including component syntax and JSX
    Flow,
}

/// Whether `path` follows the source-generator naming convention
pub fn is_source_generator(path: &Path) -> bool {
    path.to_string_lossy().ends_with(SOURCE_GENERATOR_SUFFIX)
}

/// Engine flags for dumping the AST of `test_file`
pub fn ast_dump_args(test_file: &Path, dialect: Dialect, transformed: bool) -> Vec<String> {
    let mut args: Vec<String> = match dialect {
        Dialect::Flow => vec![
            "-parse-flow",
            "-Xparse-component-syntax",
            "-parse-jsx",
            "-Xinclude-empty-ast-nodes",
        ],
        Dialect::JavaScript if test_file.to_string_lossy().contains("JSX") => {
            vec!["--parse-jsx"]
        }
        Dialect::JavaScript => Vec::new(),
    }
    .into_iter()
    .map(String::from)
    .collect();
    args.push(
        if transformed {
            "-dump-transformed-ast"
        } else {
            "-dump-ast"
        }
        .to_string(),
    );
    args
}

/// Run the engine on `args` without any expectation logic.
///
/// On success the result carries the trimmed stdout as its output, which is
/// either the value printed by a script or the dumped AST.
pub async fn run_hermes_simple<S: Supervisor + ?Sized>(
    supervisor: &S,
    hermes_exe: &Path,
    test_name: &str,
    args: Vec<String>,
    deadline: Duration,
) -> Result<TestCaseResult> {
    let mut argv = vec![hermes_exe.display().to_string()];
    argv.extend(args);
    let invocation = Invocation::new(argv);

    let output = match supervisor.run(&invocation, deadline).await? {
        ProcessOutcome::TimedOut => {
            return Ok(TestCaseResult::new(
                test_name,
                TestResultCode::CompileTimeout,
                "FAIL: Hermes timeout",
            )
            .with_output(format!("Run command: {}", invocation.command_line())));
        }
        ProcessOutcome::Completed(output) => output,
    };

    if output.exit_code != 0 {
        let details = format!(
            "Run command: {}\nReturn code: {}\nstdout:\n {}stderr:\n {}",
            invocation.command_line(),
            output.exit_code,
            output.stdout_string(),
            output.stderr_string()
        );
        return Ok(TestCaseResult::new(
            test_name,
            TestResultCode::ExecuteFailed,
            "FAIL: Hermes failed to run",
        )
        .with_output(details));
    }

    Ok(
        TestCaseResult::new(test_name, TestResultCode::TestPassed, "PASS: ")
            .with_output(output.stdout_string().trim()),
    )
}

/// Copy of the generator script with a trailing `print(source);`
fn evaluation_script(test_file: &Path) -> Result<NamedTempFile> {
    let original = std::fs::read(test_file)?;
    let mut script = tempfile::Builder::new().suffix(".js").tempfile()?;
    script.write_all(&original)?;
    script.write_all(b"\n")?;
    script.write_all(PRINT_SOURCE.as_bytes())?;
    script.flush()?;
    Ok(script)
}

fn derived_source(program: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".js").tempfile()?;
    file.write_all(program.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Dump the AST of `test_file`, evaluating it first if it is a source
/// generator.
///
/// Temporary files live only for the duration of the call.
pub async fn generate_ast<S: Supervisor + ?Sized>(
    supervisor: &S,
    test_name: &str,
    test_file: &Path,
    binary_directory: &Path,
    dialect: Dialect,
    transformed: bool,
    deadline: Duration,
) -> Result<TestCaseResult> {
    let mut args = ast_dump_args(test_file, dialect, transformed);
    let hermes = hermes_path(binary_directory);

    if !is_source_generator(test_file) {
        args.push(test_file.display().to_string());
        return run_hermes_simple(supervisor, &hermes, test_name, args, deadline).await;
    }

    let to_evaluate = evaluation_script(test_file)?;
    let evaluated = run_hermes_simple(
        supervisor,
        &hermes,
        test_name,
        vec![to_evaluate.path().display().to_string()],
        deadline,
    )
    .await?;
    if evaluated.code != TestResultCode::TestPassed {
        debug!(test = test_name, code = %evaluated.code, "source generator failed");
        return Ok(evaluated);
    }

    let derived = derived_source(evaluated.output.as_deref().unwrap_or_default())?;
    args.push(derived.path().display().to_string());
    run_hermes_simple(supervisor, &hermes, test_name, args, deadline).await
}

impl<S: Supervisor> Orchestrator<S> {
    /// [`run_hermes_simple`] with the compile deadline
    pub async fn run_hermes_simple(
        &self,
        hermes_exe: &Path,
        test_name: &str,
        args: Vec<String>,
    ) -> Result<TestCaseResult> {
        run_hermes_simple(
            self.supervisor(),
            hermes_exe,
            test_name,
            args,
            self.timeouts().compile,
        )
        .await
    }

    /// [`generate_ast`] with the compile deadline
    pub async fn generate_ast(
        &self,
        test_name: &str,
        test_file: &Path,
        binary_directory: &Path,
        dialect: Dialect,
        transformed: bool,
    ) -> Result<TestCaseResult> {
        generate_ast(
            self.supervisor(),
            test_name,
            test_file,
            binary_directory,
            dialect,
            transformed,
            self.timeouts().compile,
        )
        .await
    }
}
