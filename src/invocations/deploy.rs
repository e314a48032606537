//! Type-safe arguments for the deployment tool.
//!
//! - `DeployArgs` for `deploy --yes`
//! - `AdminPasswordArgs` for `user:password <name> <password>`
//! - `AdminUnblockArgs` for `user:unblock <name>`

use std::path::{Path, PathBuf};

use super::REDACTED;
use crate::tool_traits::{ToolArgs, ToolRole};

/// Apply pending database updates and import configuration.
#[derive(Debug, Clone)]
pub struct DeployArgs {
    pub project_root: PathBuf,
}

impl ToolArgs for DeployArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Deploy
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["deploy".to_string(), "--yes".to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}

/// Set an account's password.
#[derive(Clone)]
pub struct AdminPasswordArgs {
    pub project_root: PathBuf,
    pub user: String,
    pub password: String,
}

impl ToolArgs for AdminPasswordArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Deploy
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "user:password".to_string(),
            self.user.clone(),
            self.password.clone(),
        ]
    }

    fn display_args(&self) -> Vec<String> {
        vec![
            "user:password".to_string(),
            self.user.clone(),
            REDACTED.to_string(),
        ]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}

impl std::fmt::Debug for AdminPasswordArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminPasswordArgs")
            .field("project_root", &self.project_root)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Unblock an account.
#[derive(Debug, Clone)]
pub struct AdminUnblockArgs {
    pub project_root: PathBuf,
    pub user: String,
}

impl ToolArgs for AdminUnblockArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Deploy
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["user:unblock".to_string(), self.user.clone()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}
