//! Type-safe arguments for the database snapshot and readiness commands.
//!
//! - `SnapshotFetchArgs` for the fetcher (curl-compatible flags)
//! - `SnapshotImportArgs` for `db-import <file>`
//! - `ReadinessProbeArgs` for the configured probe query
//!
//! Fetch credentials never reach the command line, where other local users
//! could read them. They are passed as a curl config on stdin (`--config -`).

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, ToolRole};

/// Download the remote snapshot, overwriting `output`.
#[derive(Clone)]
pub struct SnapshotFetchArgs {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Absolute destination path
    pub output: PathBuf,
}

impl ToolArgs for SnapshotFetchArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Fetcher
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--fail".to_string(),
            "--silent".to_string(),
            "--show-error".to_string(),
            "--location".to_string(),
            "--output".to_string(),
            self.output.display().to_string(),
        ];
        if self.user.is_some() {
            args.push("--config".to_string());
            args.push("-".to_string());
        }
        args.push(self.url.clone());
        args
    }

    fn stdin_input(&self) -> Option<String> {
        let user = self.user.as_ref()?;
        let credentials = match &self.password {
            Some(password) => format!("{}:{}", user, password),
            None => user.clone(),
        };
        Some(format!("user = \"{}\"\n", quote_config_value(&credentials)))
    }
}

/// Escape a value for a double-quoted curl config string.
fn quote_config_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted
}

impl std::fmt::Debug for SnapshotFetchArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotFetchArgs")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Load a snapshot into the project database.
#[derive(Debug, Clone)]
pub struct SnapshotImportArgs {
    pub project_root: PathBuf,
    /// Snapshot path as the database tool sees it (relative to the root)
    pub file: PathBuf,
}

impl ToolArgs for SnapshotImportArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Database
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["db-import".to_string(), self.file.display().to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}

/// Run the readiness query. Output is discarded.
#[derive(Debug, Clone)]
pub struct ReadinessProbeArgs {
    pub project_root: PathBuf,
    pub probe_args: Vec<String>,
}

impl ToolArgs for ReadinessProbeArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Database
    }

    fn to_cli_args(&self) -> Vec<String> {
        self.probe_args.clone()
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }

    fn quiet(&self) -> bool {
        true
    }
}
