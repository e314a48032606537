//! siteprov Library
//!
//! Provisioning sequencer for a containerised CMS project: fixes site
//! permissions, lays down settings files, starts the service stack, waits
//! for the database, installs dependencies, imports a snapshot, deploys and
//! resets the admin account, all in a fixed order.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod invocations;
pub mod process_guard;
pub mod progress;
pub mod readiness;
pub mod run_state;
pub mod sanity;
pub mod sequencer;
pub mod settings;
pub mod step;
pub mod tool_runner;
pub mod tool_traits;
pub mod toolchain;

// Re-export main types for convenience
pub use config::{DumpSource, EnvSnapshot, ProvisionConfig, SiteEnvironment};
pub use error::{ConfigError, FailureCause, ProvisionError, StepFailure, ToolError};
pub use host::HostPlatform;
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressSink, RecordingProgress};
pub use readiness::{Pause, ReadinessPolicy, ReadinessTimeout, ThreadPause};
pub use run_state::{ProvisionContext, RunState, TransitionError};
pub use sequencer::{
    provision, Action, PlannedStep, RunReport, Sequencer, StepOutcome, StepPlan, StepRecord,
};
pub use step::Step;
pub use tool_runner::{CommandTool, ExitOutcome, ExternalTool, Invocation, Toolbox};
pub use tool_traits::{ToolArgs, ToolRole};
pub use toolchain::{ToolCommand, Toolchain};
