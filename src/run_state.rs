//! Provisioning Run State Machine
//!
//! `ProvisionContext` is the single source of truth for how far a run got.
//! It only allows moving to the immediately following step and refuses any
//! transition out of a terminal state.
//!
//! # State Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! Running(fix-permissions)
//!     ↓
//!    ...
//!     ↓
//! Running(host-hint)
//!     ↓
//! Succeeded
//!
//! (Any Running(step) can transition to Failed(step))
//! ```

use crate::step::Step;
use std::fmt;
use thiserror::Error;

/// Where a provisioning run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// No step has begun
    NotStarted,
    /// The given step is executing
    Running(Step),
    /// Every step completed or was skipped (terminal)
    Succeeded,
    /// The given step failed (terminal)
    Failed(Step),
}

impl RunState {
    /// Returns true for `Succeeded` and `Failed`.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// The step expected to begin next, if any.
    const fn expected_next(self) -> Option<Step> {
        match self {
            Self::NotStarted => Some(Step::FixPermissions),
            Self::Running(step) => step.next(),
            Self::Succeeded | Self::Failed(_) => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running(step) => write!(f, "running step {} ({})", step.ordinal(), step),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(step) => write!(f, "failed at step {} ({})", step.ordinal(), step),
        }
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Attempted to begin a step other than the next one
    #[error("Cannot begin {requested} while {from} (steps run strictly in order)")]
    OutOfOrder { from: RunState, requested: Step },

    /// Attempted to transition from a terminal state
    #[error("Cannot transition from terminal state: run {from}")]
    FromTerminalState { from: RunState },

    /// Attempted to finish before the last step ran
    #[error("Cannot finish a run that is {from}")]
    Incomplete { from: RunState },

    /// Attempted to fail a run that has not started
    #[error("Cannot fail a run that has not started")]
    NotRunning,
}

/// Tracks the state of one provisioning run.
///
/// # Example
///
/// ```
/// use siteprov::run_state::{ProvisionContext, RunState};
/// use siteprov::step::Step;
///
/// let mut ctx = ProvisionContext::new();
/// ctx.begin(Step::FixPermissions).unwrap();
/// assert_eq!(ctx.state(), RunState::Running(Step::FixPermissions));
///
/// // Cannot skip steps
/// assert!(ctx.begin(Step::Deploy).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    state: RunState,

    /// Every state entered, with seconds since UNIX_EPOCH
    history: Vec<(RunState, u64)>,
}

impl Default for ProvisionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionContext {
    /// Create a context in the `NotStarted` state.
    pub fn new() -> Self {
        Self {
            state: RunState::NotStarted,
            history: Vec::with_capacity(Step::COUNT + 1),
        }
    }

    /// Returns the current state
    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the step that failed, if any
    pub fn failed_at(&self) -> Option<Step> {
        match self.state {
            RunState::Failed(step) => Some(step),
            _ => None,
        }
    }

    /// Returns true once every step has completed
    #[inline]
    pub fn is_succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Returns the state history as (state, timestamp) pairs
    pub fn history(&self) -> &[(RunState, u64)] {
        &self.history
    }

    /// Begin `step`. It must be the step after the current one.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if the run already succeeded or failed
    /// - `OutOfOrder` if `step` is not the immediate next step
    pub fn begin(&mut self, step: Step) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.state });
        }

        if self.state.expected_next() != Some(step) {
            return Err(TransitionError::OutOfOrder {
                from: self.state,
                requested: step,
            });
        }

        self.enter(RunState::Running(step));
        Ok(())
    }

    /// Mark the current step as failed.
    pub fn fail(&mut self) -> Result<Step, TransitionError> {
        match self.state {
            RunState::Running(step) => {
                self.enter(RunState::Failed(step));
                Ok(step)
            }
            RunState::NotStarted => Err(TransitionError::NotRunning),
            terminal => Err(TransitionError::FromTerminalState { from: terminal }),
        }
    }

    /// Mark the run as succeeded. Only valid while the last step is running.
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.state });
        }

        match self.state {
            RunState::Running(step) if step.next().is_none() => {
                self.enter(RunState::Succeeded);
                Ok(())
            }
            from => Err(TransitionError::Incomplete { from }),
        }
    }

    fn enter(&mut self, state: RunState) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.history.push((state, timestamp));
        self.state = state;
    }
}
