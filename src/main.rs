//! engine-testsuite CLI
//!
//! Runs a single test case against an engine build and prints its result.

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine_testsuite::binaries::{check_engine_binaries, test_name_for};
use engine_testsuite::{
    Dialect, ExpectedFailure, Orchestrator, ProcessSupervisor, RunnerConfig, TestCaseResult,
    VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engine-testsuite")]
#[command(author, version, about = "Conformance test driver for the engine's compiler and VM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON runner config; command-line flags override it
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the engine executables
    #[arg(long, global = true, value_name = "DIR")]
    binary_dir: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run one test case made of one or more files
    Run {
        /// Source files, in execution order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Test name for reporting (defaults to the first file relative to its suite)
        #[arg(long)]
        name: Option<String>,
        /// Run the source directly instead of compiling ahead of time
        #[arg(long)]
        lazy: bool,
        /// Compile with the native toolchain
        #[arg(long)]
        shermes: bool,
        /// Enable the optimizer
        #[arg(long)]
        opt: bool,
        /// Compile and run in strict mode
        #[arg(long)]
        strict: bool,
        /// Disable the GC handle sanitizer
        #[arg(long)]
        disable_handle_san: bool,
        /// Phase the test is expected to fail at (parse, resolution, runtime)
        #[arg(long, value_name = "PHASE")]
        expect_phase: Option<String>,
        /// Extra compiler argument (repeatable)
        #[arg(long = "compile-arg", value_name = "ARG", allow_hyphen_values = true)]
        compile_args: Vec<String>,
        /// Extra VM argument (repeatable)
        #[arg(long = "vm-arg", value_name = "ARG", allow_hyphen_values = true)]
        vm_args: Vec<String>,
    },

    /// Dump the AST of a parser test, evaluating source generators first
    Ast {
        /// The test file
        file: PathBuf,
        /// Parse as Flow
        #[arg(long)]
        flow: bool,
        /// Dump the transformed AST
        #[arg(long)]
        transformed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run_cli(cli).await {
        Ok(result) if result.is_failure() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn setup_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = &cli.binary_dir {
        config.binary_directory = dir.clone();
    }
    Ok(config)
}

async fn run_cli(cli: Cli) -> anyhow::Result<TestCaseResult> {
    let mut config = load_config(&cli)?;
    info!(version = VERSION, binary_directory = %config.binary_directory.display(), "engine-testsuite");

    let result = match cli.command {
        Commands::Run {
            files,
            name,
            lazy,
            shermes,
            opt,
            strict,
            disable_handle_san,
            expect_phase,
            compile_args,
            vm_args,
        } => {
            config.lazy |= lazy;
            config.shermes |= shermes;
            config.opt |= opt;
            config.strict |= strict;
            config.disable_handle_san |= disable_handle_san;
            config.extra_compile_args.extend(compile_args);
            config.extra_vm_args.extend(vm_args);
            check_engine_binaries(&config.binary_directory, config.shermes)?;

            let test_name = name.unwrap_or_else(|| test_name_for(&files[0]));
            let expected_failure = expect_phase
                .as_deref()
                .and_then(ExpectedFailure::from_phase_name);
            let args = config.to_compile_run_args(test_name, expected_failure);
            let orchestrator = Orchestrator::with_supervisor(ProcessSupervisor::new())
                .with_timeouts(config.timeouts());
            orchestrator.compile_and_run(&files, &args).await?
        }
        Commands::Ast {
            file,
            flow,
            transformed,
        } => {
            check_engine_binaries(&config.binary_directory, false)?;
            let dialect = if flow { Dialect::Flow } else { Dialect::JavaScript };
            let orchestrator = Orchestrator::with_supervisor(ProcessSupervisor::new())
                .with_timeouts(config.timeouts());
            orchestrator
                .generate_ast(
                    &test_name_for(&file),
                    &file,
                    &config.binary_directory,
                    dialect,
                    transformed,
                )
                .await?
        }
    };

    print_result(&result, cli.json)?;
    Ok(result)
}

fn print_result(result: &TestCaseResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("{}", result);
    // failure diagnostics, or the AST dump of a passing `ast` run
    if let Some(output) = &result.output {
        println!("{}", output);
    }
    Ok(())
}
