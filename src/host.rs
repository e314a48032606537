//! Host platform detection
//!
//! Detected once at startup and stored in `ProvisionConfig`, so steps never
//! probe the host themselves. Only macOS needs manual hosts-file setup for
//! the project's virtual host.

use std::fmt;
use std::path::Path;

/// Operating system family of the machine running siteprov.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    /// Apple macOS
    MacOs,
    /// Linux running under Windows Subsystem for Linux
    Wsl,
    /// Native Linux
    Linux,
    /// Anything else
    Other,
}

impl HostPlatform {
    /// Detect the running platform.
    ///
    /// WSL is recognised by the "microsoft" marker the WSL kernel puts in
    /// its release string. Detection never fails: unreadable files fall back
    /// to plain Linux.
    pub fn detect() -> Self {
        let platform = if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            match std::fs::read_to_string(Path::new("/proc/sys/kernel/osrelease")) {
                Ok(release) => Self::from_kernel_release(&release),
                Err(e) => {
                    tracing::debug!("Could not read kernel release: {}", e);
                    Self::Linux
                }
            }
        } else {
            Self::Other
        };

        tracing::info!("Host platform detected: {}", platform);
        platform
    }

    /// Classify a Linux kernel release string.
    pub fn from_kernel_release(release: &str) -> Self {
        if release.to_lowercase().contains("microsoft") {
            Self::Wsl
        } else {
            Self::Linux
        }
    }

    /// Returns true if the virtual host must be added to the hosts file by hand.
    pub fn needs_hosts_entry(self) -> bool {
        matches!(self, Self::MacOs)
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macOS"),
            Self::Wsl => write!(f, "WSL"),
            Self::Linux => write!(f, "Linux"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Guidance lines for mapping `virtual_host` to the loopback address.
pub fn hosts_file_hint(virtual_host: &str) -> Vec<String> {
    vec![
        format!("Add the following line to /etc/hosts to reach {}:", virtual_host),
        format!("    127.0.0.1 {}", virtual_host),
        "For example: echo \"127.0.0.1 <host>\" | sudo tee -a /etc/hosts"
            .replace("<host>", virtual_host),
    ]
}
