//! Site directory permissions and settings artifacts.
//!
//! Both filesystem steps are expressed as `FsAction` lists so that the same
//! list can be printed by `plan` and applied by `run`.
//!
//! Settings rules:
//! - `settings.local.php` is copied from its template only when absent
//! - `settings.development.php` is deleted and re-copied on every
//!   development run; other environments never touch it

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ProvisionConfig;
use crate::error::FailureCause;

pub const SITE_SETTINGS: &str = "settings.php";
pub const LOCAL_SETTINGS: &str = "settings.local.php";
pub const DEVELOPMENT_SETTINGS: &str = "settings.development.php";
const FILES_DIR: &str = "files";

/// One filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsAction {
    /// Create a directory and its parents
    EnsureDir(PathBuf),
    /// Add the owner write bit; no-op if the path does not exist
    AllowOwnerWrite(PathBuf),
    /// Copy only if `to` does not exist
    CopyIfAbsent { from: PathBuf, to: PathBuf },
    /// Delete `to`, then copy
    Replace { from: PathBuf, to: PathBuf },
    /// Delete a file; no-op if absent
    RemoveFile(PathBuf),
    /// Delete a directory tree; no-op if absent
    RemoveDir(PathBuf),
}

impl fmt::Display for FsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureDir(path) => write!(f, "create {}", path.display()),
            Self::AllowOwnerWrite(path) => write!(f, "make {} writable", path.display()),
            Self::CopyIfAbsent { from, to } => {
                write!(f, "copy {} -> {} (if absent)", from.display(), to.display())
            }
            Self::Replace { from, to } => {
                write!(f, "replace {} with {}", to.display(), from.display())
            }
            Self::RemoveFile(path) => write!(f, "remove {}", path.display()),
            Self::RemoveDir(path) => write!(f, "remove {}/", path.display()),
        }
    }
}

/// What applying an action actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEffect {
    Changed,
    Unchanged,
}

/// Actions for the permissions step.
pub fn permission_actions(config: &ProvisionConfig) -> Vec<FsAction> {
    let site_dir = config.site_dir();
    vec![
        FsAction::EnsureDir(config.project_root.clone()),
        FsAction::AllowOwnerWrite(site_dir.clone()),
        FsAction::EnsureDir(site_dir.join(FILES_DIR)),
        FsAction::AllowOwnerWrite(site_dir.join(SITE_SETTINGS)),
        FsAction::AllowOwnerWrite(site_dir.join(FILES_DIR)),
    ]
}

/// Actions for the settings step.
pub fn settings_actions(config: &ProvisionConfig) -> Vec<FsAction> {
    let site_dir = config.site_dir();
    let templates = &config.toolchain.settings;

    let mut actions = vec![FsAction::CopyIfAbsent {
        from: config.project_path(&templates.default_template),
        to: site_dir.join(LOCAL_SETTINGS),
    }];

    if config.is_development() {
        actions.push(FsAction::Replace {
            from: config.project_path(&templates.development_template),
            to: site_dir.join(DEVELOPMENT_SETTINGS),
        });
    }

    actions
}

/// Apply one action.
pub fn apply(action: &FsAction) -> Result<FsEffect, FailureCause> {
    match action {
        FsAction::EnsureDir(path) => {
            if path.is_dir() {
                return Ok(FsEffect::Unchanged);
            }
            fs::create_dir_all(path)
                .map_err(|e| FailureCause::filesystem(format!("Failed to create {}", path.display()), e))?;
            Ok(FsEffect::Changed)
        }
        FsAction::AllowOwnerWrite(path) => allow_owner_write(path)
            .map_err(|e| FailureCause::filesystem(format!("Failed to change permissions of {}", path.display()), e)),
        FsAction::CopyIfAbsent { from, to } => {
            if to.exists() {
                tracing::info!("Keeping existing {}", to.display());
                return Ok(FsEffect::Unchanged);
            }
            copy(from, to)?;
            Ok(FsEffect::Changed)
        }
        FsAction::Replace { from, to } => {
            remove_file_if_present(to)?;
            copy(from, to)?;
            Ok(FsEffect::Changed)
        }
        FsAction::RemoveFile(path) => remove_file_if_present(path),
        FsAction::RemoveDir(path) => match fs::remove_dir_all(path) {
            Ok(()) => Ok(FsEffect::Changed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FsEffect::Unchanged),
            Err(e) => Err(FailureCause::filesystem(format!("Failed to remove {}", path.display()), e)),
        },
    }
}

fn copy(from: &Path, to: &Path) -> Result<(), FailureCause> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| FailureCause::filesystem(format!("Failed to create {}", parent.display()), e))?;
    }
    fs::copy(from, to).map_err(|e| {
        FailureCause::filesystem(
            format!("Failed to copy {} to {}", from.display(), to.display()),
            e,
        )
    })?;
    tracing::info!("Copied {} to {}", from.display(), to.display());
    Ok(())
}

fn remove_file_if_present(path: &Path) -> Result<FsEffect, FailureCause> {
    match fs::remove_file(path) {
        Ok(()) => Ok(FsEffect::Changed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FsEffect::Unchanged),
        Err(e) => Err(FailureCause::filesystem(format!("Failed to remove {}", path.display()), e)),
    }
}

#[cfg(unix)]
fn allow_owner_write(path: &Path) -> io::Result<FsEffect> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = match fs::metadata(path) {
        Ok(metadata) => metadata.permissions(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FsEffect::Unchanged),
        Err(e) => return Err(e),
    };

    let mode = perms.mode();
    if mode & 0o200 != 0 {
        return Ok(FsEffect::Unchanged);
    }
    perms.set_mode(mode | 0o200);
    fs::set_permissions(path, perms)?;
    Ok(FsEffect::Changed)
}

#[cfg(not(unix))]
fn allow_owner_write(path: &Path) -> io::Result<FsEffect> {
    let mut perms = match fs::metadata(path) {
        Ok(metadata) => metadata.permissions(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FsEffect::Unchanged),
        Err(e) => return Err(e),
    };

    if !perms.readonly() {
        return Ok(FsEffect::Unchanged);
    }
    perms.set_readonly(false);
    fs::set_permissions(path, perms)?;
    Ok(FsEffect::Changed)
}
