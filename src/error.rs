//! Error handling module for siteprov
//!
//! Three kinds of outcome exist for a run:
//! - precondition failure: configuration rejected before any side effect
//! - step failure: a step (usually a delegated tool) failed, the run stops
//! - skip: not an error, reported through `StepOutcome::Skipped`

use crate::readiness::ReadinessTimeout;
use crate::run_state::TransitionError;
use crate::step::Step;
use crate::tool_traits::ToolRole;
use thiserror::Error;

/// Configuration errors raised while building `ProvisionConfig`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("Required configuration value '{name}' is not set")]
    MissingRequired { name: &'static str },

    /// A variable is set to an unusable value
    #[error("Configuration value '{name}' is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors from running an external tool (not its exit status).
#[derive(Error, Debug)]
pub enum ToolError {
    /// No tool is registered for the role
    #[error("No tool registered for role '{role}'")]
    Unregistered { role: ToolRole },

    /// The program could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Input could not be written to the program's stdin
    #[error("Failed writing input to {program}: {source}")]
    Stdin {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program started but waiting on it failed
    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a step failed.
#[derive(Error, Debug)]
pub enum FailureCause {
    /// A delegated command exited unsuccessfully
    #[error("`{command}` {}", describe_exit(.exit_code))]
    ToolExit {
        role: ToolRole,
        command: String,
        exit_code: Option<i32>,
    },

    /// A delegated command could not be run at all
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A filesystem operation failed
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The database never became ready
    #[error(transparent)]
    Readiness(#[from] ReadinessTimeout),

    /// A setting the step needs is missing
    #[error("Required setting '{0}' is not set")]
    MissingSetting(&'static str),

    /// Internal ordering violation
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl FailureCause {
    /// Create a filesystem error with context
    pub fn filesystem(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Terminal failure of a run: the step that failed and why.
#[derive(Error, Debug)]
#[error("Step {} ({step}) failed: {cause}", .step.ordinal())]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub cause: FailureCause,
}

impl StepFailure {
    pub fn new(step: Step, cause: impl Into<FailureCause>) -> Self {
        Self {
            step,
            cause: cause.into(),
        }
    }

    /// Process exit code for this failure.
    ///
    /// A failing tool's own exit code is propagated unchanged. Everything
    /// else, including a tool killed by a signal, maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self.cause {
            FailureCause::ToolExit {
                exit_code: Some(code),
                ..
            } if code != 0 => code,
            _ => 1,
        }
    }
}

/// Main error type for a provisioning run
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Configuration rejected before any step ran
    #[error("Precondition failed: {0}")]
    Precondition(#[from] ConfigError),

    /// A step failed and the run stopped
    #[error(transparent)]
    Step(#[from] StepFailure),
}

impl ProvisionError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Precondition(_) => 1,
            Self::Step(failure) => failure.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_failure(code: Option<i32>) -> StepFailure {
        StepFailure::new(
            Step::InstallDependencies,
            FailureCause::ToolExit {
                role: ToolRole::PackageManager,
                command: "lando composer install".to_string(),
                exit_code: code,
            },
        )
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::MissingRequired {
            name: "PROJECT_ROOT",
        };
        assert_eq!(
            err.to_string(),
            "Required configuration value 'PROJECT_ROOT' is not set"
        );

        let failure = tool_failure(Some(2));
        assert_eq!(
            failure.to_string(),
            "Step 5 (install-dependencies) failed: `lando composer install` exited with code 2"
        );
    }

    #[test]
    fn test_tool_exit_code_is_propagated() {
        assert_eq!(tool_failure(Some(127)).exit_code(), 127);
        assert_eq!(ProvisionError::from(tool_failure(Some(3))).exit_code(), 3);
    }

    #[test]
    fn test_signal_and_non_tool_failures_exit_one() {
        assert_eq!(tool_failure(None).exit_code(), 1);

        let missing = StepFailure::new(Step::ImportDatabase, FailureCause::MissingSetting("DUMP_URL"));
        assert_eq!(missing.exit_code(), 1);
    }

    #[test]
    fn test_precondition_exits_one() {
        let err: ProvisionError = ConfigError::MissingRequired {
            name: "PROJECT_ROOT",
        }
        .into();
        assert!(matches!(err, ProvisionError::Precondition(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cause = FailureCause::filesystem("Failed to copy settings", io_err);
        assert_eq!(cause.to_string(), "Failed to copy settings: file not found");
    }
}
