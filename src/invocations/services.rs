//! Type-safe arguments for the service orchestrator.
//!
//! - `ServicesArgs` with `ServiceMode::Start` for `start`
//! - `ServicesArgs` with `ServiceMode::Rebuild` for `rebuild --yes`

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, ToolRole};

/// How to bring the backing services up.
///
/// `Rebuild` destroys and recreates the containers. It is only used when
/// the services are already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Fresh start of stopped services
    Start,
    /// Destructive recreate of running services
    Rebuild,
}

impl ServiceMode {
    /// Choose the mode from the "already running" flag.
    pub fn for_running(services_running: bool) -> Self {
        if services_running {
            Self::Rebuild
        } else {
            Self::Start
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Start => "start",
            ServiceMode::Rebuild => "rebuild",
        }
    }
}

/// Start or recreate the project's services.
#[derive(Debug, Clone)]
pub struct ServicesArgs {
    pub project_root: PathBuf,
    pub mode: ServiceMode,
}

impl ToolArgs for ServicesArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Services
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![self.mode.as_str().to_string()];
        if self.mode == ServiceMode::Rebuild {
            args.push("--yes".to_string());
        }
        args
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}
