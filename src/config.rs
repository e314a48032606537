//! Configuration management module
//!
//! The process environment is read exactly once, into an `EnvSnapshot`.
//! `ProvisionConfig` is built from that snapshot and is immutable afterwards;
//! steps only ever see the config, never the ambient environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;
use crate::host::HostPlatform;
use crate::toolchain::Toolchain;

/// Environment variable names consumed by siteprov.
pub mod vars {
    pub const PROJECT_ROOT: &str = "PROJECT_ROOT";
    pub const DOCROOT: &str = "DOCROOT";
    pub const SITE_ENVIRONMENT: &str = "SITE_ENVIRONMENT";
    pub const VIRTUAL_HOST: &str = "VIRTUAL_HOST";
    pub const ADMIN_USER: &str = "ADMIN_USER";
    pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
    pub const DEFAULT_THEME: &str = "DEFAULT_THEME";
    pub const DUMP_URL: &str = "DUMP_URL";
    pub const DUMP_USER: &str = "DUMP_USER";
    pub const DUMP_PASSWORD: &str = "DUMP_PASSWORD";
    pub const DUMP_FILE: &str = "DUMP_FILE";
    pub const SKIP_DB_FETCH: &str = "SKIP_DB_FETCH";
    pub const SERVICES_RUNNING: &str = "SERVICES_RUNNING";
}

const DEFAULT_DOCROOT: &str = "web";
const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_DUMP_FILE: &str = ".provision/db.sql.gz";
const DEFAULT_ENVIRONMENT: &str = "production";

/// A point-in-time copy of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    values: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Build a snapshot from explicit pairs (fixtures, tests).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`, trimmed. Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn get_owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    /// Interpret `name` as a boolean flag.
    pub fn flag(&self, name: &str) -> bool {
        parse_flag(self.get(name))
    }
}

/// True for `1`, `true`, `yes`, `on` (case-insensitive).
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Site environment marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiteEnvironment {
    /// Local development: settings overlay refreshed, admin reset
    Development,
    /// Any other named environment
    Named(String),
}

impl SiteEnvironment {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "dev" | "development" | "local" => Self::Development,
            _ => Self::Named(trimmed.to_string()),
        }
    }

    #[inline]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for SiteEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Where the database snapshot comes from and where it is kept.
#[derive(Clone, PartialEq, Eq)]
pub struct DumpSource {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Local snapshot path, as configured (usually relative to the root)
    pub file: PathBuf,
}

impl fmt::Debug for DumpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpSource")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("file", &self.file)
            .finish()
    }
}

/// Complete, immutable configuration for one provisioning run.
#[derive(Clone)]
pub struct ProvisionConfig {
    pub project_root: PathBuf,
    /// Document root, relative to the project root
    pub docroot: PathBuf,
    pub environment: SiteEnvironment,
    pub virtual_host: Option<String>,
    pub admin_user: String,
    pub admin_password: Option<String>,
    pub default_theme: Option<String>,
    pub dump: DumpSource,
    pub skip_db_fetch: bool,
    pub services_running: bool,
    pub host: HostPlatform,
    pub toolchain: Toolchain,
}

impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("project_root", &self.project_root)
            .field("docroot", &self.docroot)
            .field("environment", &self.environment)
            .field("virtual_host", &self.virtual_host)
            .field("admin_user", &self.admin_user)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "****"))
            .field("default_theme", &self.default_theme)
            .field("dump", &self.dump)
            .field("skip_db_fetch", &self.skip_db_fetch)
            .field("services_running", &self.services_running)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl ProvisionConfig {
    /// Build the configuration from an environment snapshot.
    ///
    /// # Errors
    ///
    /// - `MissingRequired` if `PROJECT_ROOT` is unset or empty
    /// - `Invalid` if `DOCROOT` or `DUMP_FILE` escapes the project root
    /// - `Invalid` if `DEFAULT_THEME` is not a machine name
    pub fn from_env(env: &EnvSnapshot, host: HostPlatform) -> Result<Self, ConfigError> {
        let project_root = env
            .get(vars::PROJECT_ROOT)
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingRequired {
                name: vars::PROJECT_ROOT,
            })?;

        let docroot = PathBuf::from(env.get(vars::DOCROOT).unwrap_or(DEFAULT_DOCROOT));
        validate_relative(vars::DOCROOT, &docroot)?;

        let environment =
            SiteEnvironment::parse(env.get(vars::SITE_ENVIRONMENT).unwrap_or(DEFAULT_ENVIRONMENT));

        let dump_file = PathBuf::from(env.get(vars::DUMP_FILE).unwrap_or(DEFAULT_DUMP_FILE));
        validate_relative(vars::DUMP_FILE, &dump_file)?;

        let default_theme = env.get_owned(vars::DEFAULT_THEME);
        if let Some(theme) = &default_theme {
            if !is_machine_name(theme) {
                return Err(ConfigError::Invalid {
                    name: vars::DEFAULT_THEME,
                    reason: format!("'{}' is not a theme machine name", theme),
                });
            }
        }

        Ok(Self {
            project_root,
            docroot,
            environment,
            virtual_host: env.get_owned(vars::VIRTUAL_HOST),
            admin_user: env
                .get(vars::ADMIN_USER)
                .unwrap_or(DEFAULT_ADMIN_USER)
                .to_string(),
            admin_password: env.get_owned(vars::ADMIN_PASSWORD),
            default_theme,
            dump: DumpSource {
                url: env.get_owned(vars::DUMP_URL),
                user: env.get_owned(vars::DUMP_USER),
                password: env.get_owned(vars::DUMP_PASSWORD),
                file: dump_file,
            },
            skip_db_fetch: env.flag(vars::SKIP_DB_FETCH),
            services_running: env.flag(vars::SERVICES_RUNNING),
            host,
            toolchain: Toolchain::default(),
        })
    }

    /// Replace the toolchain (loaded after the project root is known).
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    #[inline]
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }

    /// `<root>/<docroot>`
    pub fn docroot_dir(&self) -> PathBuf {
        self.project_root.join(&self.docroot)
    }

    /// `<root>/<docroot>/sites/default`
    pub fn site_dir(&self) -> PathBuf {
        self.docroot_dir().join("sites").join("default")
    }

    /// `<root>/<docroot>/themes/custom/<theme>`, when a theme is configured.
    pub fn theme_dir(&self) -> Option<PathBuf> {
        self.default_theme
            .as_ref()
            .map(|theme| self.docroot_dir().join("themes").join("custom").join(theme))
    }

    /// Absolute path of the local database snapshot.
    pub fn dump_path(&self) -> PathBuf {
        self.project_root.join(&self.dump.file)
    }

    /// Resolve a path from the toolchain against the project root.
    pub fn project_path(&self, relative: &Path) -> PathBuf {
        self.project_root.join(relative)
    }
}

/// Letters, digits and underscores only.
fn is_machine_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_relative(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("{:?} must be a relative path inside the project", path),
        });
    }
    Ok(())
}
