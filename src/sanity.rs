//! Pre-flight sanity checks for the host toolchain
//!
//! Verifies that every program named in the toolchain can be found on
//! `PATH` before a run touches the project. Used by the `check`
//! subcommand; `run` itself never calls it, so a missing program there
//! surfaces as a spawn failure of the step that needs it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::toolchain::Toolchain;

/// Optional helpers (reported but never fatal).
const OPTIONAL_BINARIES: &[&str] = &[
    "git", // composer falls back to it for source installs
];

/// Result of environment verification
#[derive(Debug, Default)]
pub struct SanityCheckResult {
    /// Program name to resolved path
    pub found: BTreeMap<String, PathBuf>,
    pub missing_binaries: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl SanityCheckResult {
    /// Returns true if all required programs were found
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty()
    }
}

/// Locate a program on `PATH`.
pub fn locate(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Check every program the toolchain needs.
pub fn verify_toolchain(toolchain: &Toolchain) -> SanityCheckResult {
    let mut result = SanityCheckResult::default();

    for program in toolchain.programs() {
        match locate(program) {
            Some(path) => {
                tracing::debug!("Found {} at {}", program, path.display());
                result.found.insert(program.to_string(), path);
            }
            None => result.missing_binaries.push(program.to_string()),
        }
    }

    for binary in OPTIONAL_BINARIES {
        if locate(binary).is_none() {
            tracing::debug!("Optional binary not found: {}", binary);
            result.missing_optional.push((*binary).to_string());
        }
    }

    result
}

/// Print the outcome of a check to stdout/stderr.
pub fn print_report(result: &SanityCheckResult) {
    for (program, path) in &result.found {
        println!("✓ {} ({})", program, path.display());
    }
    for program in &result.missing_binaries {
        eprintln!("✗ {} not found on PATH", program);
    }
    for program in &result.missing_optional {
        println!("- {} not found (optional)", program);
    }

    if result.is_ok() {
        println!("\n✓ All required tools are available");
    } else {
        eprintln!(
            "\n✗ Missing required tools: {}",
            result.missing_binaries.join(", ")
        );
    }
}
