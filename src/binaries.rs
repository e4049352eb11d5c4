//! Engine executable lookup and test-suite path helpers

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Compiler + VM executable
pub const HERMES: &str = "hermes";
/// Native ahead-of-time compiler
pub const SHERMES: &str = "shermes";

/// Test suites the driver knows how to name tests within
pub const KNOWN_SUITES: &[&str] = &["test262", "mjsunit", "CVEs", "esprima", "flow"];

/// Path of the `hermes` executable
pub fn hermes_path(binary_directory: &Path) -> PathBuf {
    binary_directory.join(HERMES)
}

/// Path of the ahead-of-time compiler for the selected toolchain
pub fn compiler_path(binary_directory: &Path, shermes: bool) -> PathBuf {
    binary_directory.join(if shermes { SHERMES } else { HERMES })
}

/// Check that the executables a run needs exist before any test is started.
///
/// `hermes` is always required (the lazy runner and the AST pipeline use it);
/// `shermes` only when the native toolchain is selected.
pub fn check_engine_binaries(binary_directory: &Path, shermes: bool) -> Result<()> {
    let mut required = vec![hermes_path(binary_directory)];
    if shermes {
        required.push(compiler_path(binary_directory, true));
    }
    for exe in required {
        if !exe.is_file() {
            return Err(Error::MissingBinary(exe));
        }
    }
    Ok(())
}

/// Root directory of the known test suite containing `path`, if any.
///
/// Suites are tried in [`KNOWN_SUITES`] order, so `/src/flow/test262/a.js`
/// gives `/src/flow/test262`.
pub fn suite_root(path: &Path) -> Option<PathBuf> {
    KNOWN_SUITES
        .iter()
        .find_map(|suite| directory_prefix(path, suite))
}

/// Path up to and including the first directory named `name`
fn directory_prefix(path: &Path, name: &str) -> Option<PathBuf> {
    let mut root = PathBuf::new();
    for component in path.components() {
        root.push(component);
        if root == path {
            break;
        }
        if matches!(component, Component::Normal(dir) if dir == name) {
            return Some(root);
        }
    }
    None
}

/// Test name relative to its suite's parent, or the path itself.
///
/// `/src/test262/test/a.js` gives `test262/test/a.js`.
pub fn test_name_for(path: &Path) -> String {
    let name = suite_root(path)
        .and_then(|root| root.parent().map(Path::to_path_buf))
        .and_then(|parent| path.strip_prefix(parent).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf());
    name.display().to_string()
}
