//! Type-safe arguments for dependency installation and the theme build.
//!
//! - `DependencyInstallArgs` for the package manager `install`
//! - `ThemeInstallArgs` for the front-end toolchain `ci`
//! - `ThemeBuildArgs` for the front-end toolchain `run build`

use std::path::{Path, PathBuf};

use crate::tool_traits::{ToolArgs, ToolRole};

/// Install project dependencies from the lock file.
#[derive(Debug, Clone)]
pub struct DependencyInstallArgs {
    pub project_root: PathBuf,
}

impl ToolArgs for DependencyInstallArgs {
    fn role(&self) -> ToolRole {
        ToolRole::PackageManager
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["install".to_string(), "--no-interaction".to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.project_root)
    }
}

/// Install the theme's front-end dependencies from its lock file.
#[derive(Debug, Clone)]
pub struct ThemeInstallArgs {
    pub theme_dir: PathBuf,
}

impl ToolArgs for ThemeInstallArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Theme
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["ci".to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.theme_dir)
    }
}

/// Compile the theme's assets.
#[derive(Debug, Clone)]
pub struct ThemeBuildArgs {
    pub theme_dir: PathBuf,
}

impl ToolArgs for ThemeBuildArgs {
    fn role(&self) -> ToolRole {
        ToolRole::Theme
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["run".to_string(), "build".to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.theme_dir)
    }
}
