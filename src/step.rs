//! The fixed provisioning step list.
//!
//! Steps run in declaration order. The discriminant is the 1-based ordinal
//! reported to the user and carried by `StepFailure`.

use std::fmt;
use strum::{EnumIter, EnumString, IntoStaticStr};

/// One named unit of provisioning work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Step {
    /// Create the site directory tree and make it writable
    FixPermissions = 1,
    /// Copy settings templates into the site directory
    InitSettings = 2,
    /// Start or recreate the backing services
    StartServices = 3,
    /// Wait until the database accepts queries
    AwaitDatabase = 4,
    /// Install project dependencies and build the theme
    InstallDependencies = 5,
    /// Refresh and load the database snapshot
    ImportDatabase = 6,
    /// Apply pending updates and configuration
    Deploy = 7,
    /// Reset the administrative account (development only)
    ResetAdmin = 8,
    /// Print hosts-file guidance for the detected platform
    HostHint = 9,
}

impl Step {
    /// Number of steps in a full run.
    pub const COUNT: usize = 9;

    /// Returns the 1-based position of this step.
    #[inline]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the step that follows this one, or None for the last step.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::FixPermissions => Some(Self::InitSettings),
            Self::InitSettings => Some(Self::StartServices),
            Self::StartServices => Some(Self::AwaitDatabase),
            Self::AwaitDatabase => Some(Self::InstallDependencies),
            Self::InstallDependencies => Some(Self::ImportDatabase),
            Self::ImportDatabase => Some(Self::Deploy),
            Self::Deploy => Some(Self::ResetAdmin),
            Self::ResetAdmin => Some(Self::HostHint),
            Self::HostHint => None,
        }
    }

    /// Returns a human-readable description of this step.
    pub const fn description(self) -> &'static str {
        match self {
            Self::FixPermissions => "Fixing site directory permissions",
            Self::InitSettings => "Initializing settings files",
            Self::StartServices => "Starting services",
            Self::AwaitDatabase => "Waiting for the database",
            Self::InstallDependencies => "Installing dependencies",
            Self::ImportDatabase => "Importing database snapshot",
            Self::Deploy => "Running deploy routines",
            Self::ResetAdmin => "Resetting administrator account",
            Self::HostHint => "Checking host configuration",
        }
    }

    /// Returns all steps in execution order.
    pub const fn all() -> &'static [Self] {
        &[
            Self::FixPermissions,
            Self::InitSettings,
            Self::StartServices,
            Self::AwaitDatabase,
            Self::InstallDependencies,
            Self::ImportDatabase,
            Self::Deploy,
            Self::ResetAdmin,
            Self::HostHint,
        ]
    }

    /// Short machine name, e.g. `install-dependencies`.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
