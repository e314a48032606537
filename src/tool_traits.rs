//! Type-safe tool argument contracts.
//!
//! Every command the sequencer delegates is described by a struct that
//! implements `ToolArgs`. The struct definition is the contract: it names
//! the tool role, the exact arguments, the environment and the working
//! directory. Nothing builds raw argument vectors by hand.

use crate::tool_runner::Invocation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

/// The kind of external collaborator a command is delegated to.
///
/// Each role maps to one configured program in the toolchain file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolRole {
    /// Container orchestrator managing the backing services
    Services,
    /// Project dependency manager
    PackageManager,
    /// Front-end toolchain building the theme
    Theme,
    /// Downloads the remote database snapshot
    Fetcher,
    /// Database client (readiness probe and snapshot import)
    Database,
    /// Deployment tool applying updates and account changes
    Deploy,
}

/// Trait for typed tool arguments.
///
/// # Contract
///
/// - `role()`: which configured tool runs this command.
/// - `to_cli_args()`: arguments exactly as the tool expects them, appended
///   after the program and its configured prefix.
/// - `display_args()`: the same arguments with secrets masked, for logs,
///   plans and error messages.
///
/// # Example
///
/// ```
/// use siteprov::invocations::deploy::DeployArgs;
/// use siteprov::tool_traits::{ToolArgs, ToolRole};
///
/// let args = DeployArgs { project_root: "/proj".into() };
/// assert_eq!(args.role(), ToolRole::Deploy);
/// assert_eq!(args.to_cli_args(), ["deploy", "--yes"]);
/// ```
pub trait ToolArgs {
    /// The tool role that executes these arguments.
    fn role(&self) -> ToolRole;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Environment variables the command requires.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Directory the command must run in, if any.
    fn working_dir(&self) -> Option<&Path> {
        None
    }

    /// Arguments safe to print. Override when `to_cli_args` carries secrets.
    fn display_args(&self) -> Vec<String> {
        self.to_cli_args()
    }

    /// Input fed to the command on stdin. Keeps secrets off the argv.
    fn stdin_input(&self) -> Option<String> {
        None
    }

    /// Whether output should be discarded (probes).
    fn quiet(&self) -> bool {
        false
    }

    /// Build the invocation handed to an `ExternalTool`.
    fn invocation(&self) -> Invocation {
        Invocation {
            role: self.role(),
            args: self.to_cli_args(),
            env: self.get_env_vars(),
            working_dir: self.working_dir().map(Path::to_path_buf),
            display: self.display_args(),
            quiet: self.quiet(),
            stdin: self.stdin_input(),
        }
    }
}
