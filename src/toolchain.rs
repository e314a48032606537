//! Toolchain file handling.
//!
//! The toolchain file says which program serves each tool role, how long to
//! wait for the database, and where the settings templates live. Every field
//! is optional; missing ones fall back to the Lando + Composer + Drush stack.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::readiness::ReadinessPolicy;
use crate::tool_traits::ToolRole;

/// Default toolchain file location, relative to the project root.
pub const DEFAULT_TOOLCHAIN_FILE: &str = ".provision/toolchain.json";

/// A program plus the arguments that always precede an invocation's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Settings template locations, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsTemplates {
    /// Copied to `settings.local.php` when that file is absent
    pub default_template: PathBuf,
    /// Copied over `settings.development.php` on every development run
    pub development_template: PathBuf,
}

impl Default for SettingsTemplates {
    fn default() -> Self {
        Self {
            default_template: PathBuf::from(".provision/settings.local.php"),
            development_template: PathBuf::from(".provision/settings.development.php"),
        }
    }
}

/// Full toolchain description that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub services: ToolCommand,
    pub package_manager: ToolCommand,
    pub theme: ToolCommand,
    pub fetcher: ToolCommand,
    pub database: ToolCommand,
    pub deploy: ToolCommand,
    pub readiness: ReadinessPolicy,
    pub settings: SettingsTemplates,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            services: ToolCommand::new("lando", &[]),
            package_manager: ToolCommand::new("lando", &["composer"]),
            theme: ToolCommand::new("npm", &[]),
            fetcher: ToolCommand::new("curl", &[]),
            database: ToolCommand::new("lando", &[]),
            deploy: ToolCommand::new("lando", &["drush"]),
            readiness: ReadinessPolicy::default(),
            settings: SettingsTemplates::default(),
        }
    }
}

impl Toolchain {
    /// The command configured for `role`.
    pub fn command(&self, role: ToolRole) -> &ToolCommand {
        match role {
            ToolRole::Services => &self.services,
            ToolRole::PackageManager => &self.package_manager,
            ToolRole::Theme => &self.theme,
            ToolRole::Fetcher => &self.fetcher,
            ToolRole::Database => &self.database,
            ToolRole::Deploy => &self.deploy,
        }
    }

    /// Distinct program names across all roles.
    pub fn programs(&self) -> BTreeSet<&str> {
        [
            &self.services,
            &self.package_manager,
            &self.theme,
            &self.fetcher,
            &self.database,
            &self.deploy,
        ]
        .into_iter()
        .map(|c| c.program.as_str())
        .collect()
    }

    /// Save toolchain to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize toolchain to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write toolchain to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load toolchain from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read toolchain from {:?}", path.as_ref()))?;

        let toolchain: Self =
            serde_json::from_str(&content).context("Failed to parse toolchain JSON")?;

        toolchain.validate()?;
        Ok(toolchain)
    }

    /// Resolve the toolchain for a project.
    ///
    /// An explicit path must exist. Otherwise the default location under
    /// `project_root` is used when present, and built-in defaults when not.
    pub fn resolve(explicit: Option<&Path>, project_root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let default_path = project_root.join(DEFAULT_TOOLCHAIN_FILE);
        if default_path.is_file() {
            tracing::info!("Using toolchain file {}", default_path.display());
            Self::load_from_file(default_path)
        } else {
            tracing::debug!("No toolchain file, using built-in defaults");
            Ok(Self::default())
        }
    }

    /// Validate the toolchain
    pub fn validate(&self) -> Result<()> {
        for (role, command) in [
            (ToolRole::Services, &self.services),
            (ToolRole::PackageManager, &self.package_manager),
            (ToolRole::Theme, &self.theme),
            (ToolRole::Fetcher, &self.fetcher),
            (ToolRole::Database, &self.database),
            (ToolRole::Deploy, &self.deploy),
        ] {
            if command.program.trim().is_empty() {
                anyhow::bail!("Program for tool role '{}' must not be empty", role);
            }
        }

        if self.readiness.interval_secs == 0 {
            anyhow::bail!("Readiness interval must be at least one second");
        }
        if self.readiness.probe_args.is_empty() {
            anyhow::bail!("Readiness probe arguments must not be empty");
        }

        for template in [
            &self.settings.default_template,
            &self.settings.development_template,
        ] {
            if template.is_absolute() {
                anyhow::bail!(
                    "Settings template {:?} must be relative to the project root",
                    template
                );
            }
        }

        Ok(())
    }
}
