//! Provisioning Sequencer
//!
//! Runs the nine provisioning steps strictly in order against one target
//! project. Each step is first *gated* against the configuration, which
//! either skips it or produces a list of `Action`s. `run` executes those
//! actions; `plan` only describes them.
//!
//! # Failure Policy
//!
//! The first failing action fails its step and ends the run. Nothing is
//! retried and nothing is rolled back.

use tracing::{error, info};

use crate::config::{EnvSnapshot, ProvisionConfig, vars};
use crate::error::{FailureCause, ProvisionError, StepFailure};
use crate::host::{HostPlatform, hosts_file_hint};
use crate::invocations::database::{ReadinessProbeArgs, SnapshotFetchArgs, SnapshotImportArgs};
use crate::invocations::deploy::{AdminPasswordArgs, AdminUnblockArgs, DeployArgs};
use crate::invocations::packages::{DependencyInstallArgs, ThemeBuildArgs, ThemeInstallArgs};
use crate::invocations::services::{ServiceMode, ServicesArgs};
use crate::progress::{ConsoleProgress, ProgressEvent, ProgressSink};
use crate::readiness::{Pause, ThreadPause, WaitError, wait_until_ready};
use crate::run_state::ProvisionContext;
use crate::settings::{self, FsAction};
use crate::step::Step;
use crate::tool_runner::{Invocation, Toolbox};
use crate::tool_traits::ToolArgs;

/// Theme build output removed after a successful build.
const THEME_BUILD_ARTIFACTS: &str = "node_modules";

/// One unit of work inside a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Fs(FsAction),
    Run(Invocation),
    /// Repeat the invocation until it succeeds or the readiness policy runs out
    AwaitReady(Invocation),
    Notice(String),
}

/// Result of evaluating a step's precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Gate {
    Run(Vec<Action>),
    Skip { reason: String, silent: bool },
}

/// How a step ended in a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
    /// Notices emitted while the step ran (e.g. theme build skipped)
    pub notes: Vec<String>,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub records: Vec<StepRecord>,
    /// Probe attempt on which the database answered
    pub readiness_attempts: Option<u32>,
}

impl RunReport {
    pub fn record(&self, step: Step) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.step == step)
    }

    pub fn skipped_steps(&self) -> Vec<Step> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Skipped(_)))
            .map(|r| r.step)
            .collect()
    }
}

/// Side-effect-free description of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub step: Step,
    pub plan: StepPlan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPlan {
    /// Printable description of each action
    Run(Vec<String>),
    Skip { reason: String, silent: bool },
    /// The step would fail before running anything
    Blocked(String),
}

/// Executes the provisioning steps for one project.
pub struct Sequencer {
    config: ProvisionConfig,
    toolbox: Toolbox,
    pause: Box<dyn Pause>,
    progress: Box<dyn ProgressSink>,
    context: ProvisionContext,
}

impl Sequencer {
    /// Create a sequencer that sleeps in real time and prints to the console.
    pub fn new(config: ProvisionConfig, toolbox: Toolbox) -> Self {
        Self {
            config,
            toolbox,
            pause: Box::new(ThreadPause),
            progress: Box::new(ConsoleProgress),
            context: ProvisionContext::new(),
        }
    }

    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn context(&self) -> &ProvisionContext {
        &self.context
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<RunReport, StepFailure> {
        info!(
            root = %self.config.project_root.display(),
            environment = %self.config.environment,
            "Provisioning started"
        );

        let mut report = RunReport::default();

        for &step in Step::all() {
            self.context
                .begin(step)
                .map_err(|e| StepFailure::new(step, e))?;

            if let Err(cause) = self.execute_step(step, &mut report) {
                self.context
                    .fail()
                    .map_err(|e| StepFailure::new(step, e))?;

                let failure = StepFailure::new(step, cause);
                error!("{}", failure);
                self.progress.emit(ProgressEvent::Failed {
                    step,
                    message: failure.cause.to_string(),
                });
                return Err(failure);
            }
        }

        self.context
            .finish()
            .map_err(|e| StepFailure::new(Step::HostHint, e))?;
        self.progress.emit(ProgressEvent::Finished);
        info!("Provisioning completed");

        Ok(report)
    }

    /// Describe what `run` would do, without side effects.
    pub fn plan(&self) -> Vec<PlannedStep> {
        Step::all()
            .iter()
            .map(|&step| {
                let plan = match self.gate(step) {
                    Ok(Gate::Run(actions)) => {
                        StepPlan::Run(actions.iter().map(|a| self.describe(a)).collect())
                    }
                    Ok(Gate::Skip { reason, silent }) => StepPlan::Skip { reason, silent },
                    Err(cause) => StepPlan::Blocked(cause.to_string()),
                };
                PlannedStep { step, plan }
            })
            .collect()
    }

    fn execute_step(&mut self, step: Step, report: &mut RunReport) -> Result<(), FailureCause> {
        match self.gate(step)? {
            Gate::Skip { reason, silent } => {
                info!(%step, "Skipped: {}", reason);
                if !silent {
                    self.progress.emit(ProgressEvent::Skipped {
                        step,
                        reason: reason.clone(),
                    });
                }
                report.records.push(StepRecord {
                    step,
                    outcome: StepOutcome::Skipped(reason),
                    notes: Vec::new(),
                });
            }
            Gate::Run(actions) => {
                info!(%step, "Step started");
                self.progress.emit(ProgressEvent::Started(step));

                let mut notes = Vec::new();
                for action in actions {
                    self.execute(action, &mut notes, report)?;
                }

                self.progress.emit(ProgressEvent::Completed(step));
                report.records.push(StepRecord {
                    step,
                    outcome: StepOutcome::Completed,
                    notes,
                });
            }
        }
        Ok(())
    }

    fn execute(
        &mut self,
        action: Action,
        notes: &mut Vec<String>,
        report: &mut RunReport,
    ) -> Result<(), FailureCause> {
        match action {
            Action::Fs(fs_action) => {
                settings::apply(&fs_action)?;
            }
            Action::Run(invocation) => {
                let outcome = self.toolbox.run_invocation(&invocation)?;
                if !outcome.success() {
                    return Err(FailureCause::ToolExit {
                        role: invocation.role,
                        command: self.toolbox.describe(&invocation),
                        exit_code: outcome.exit_code,
                    });
                }
            }
            Action::AwaitReady(invocation) => {
                let toolbox = &self.toolbox;
                let attempt = wait_until_ready(
                    &self.config.toolchain.readiness,
                    self.pause.as_ref(),
                    |_| toolbox.run_invocation(&invocation).map(|o| o.success()),
                )
                .map_err(|e| match e {
                    WaitError::Timeout(timeout) => FailureCause::from(timeout),
                    WaitError::Probe(tool_error) => FailureCause::from(tool_error),
                })?;
                report.readiness_attempts = Some(attempt);
            }
            Action::Notice(message) => {
                info!("{}", message);
                self.progress.emit(ProgressEvent::Notice(message.clone()));
                notes.push(message);
            }
        }
        Ok(())
    }

    fn describe(&self, action: &Action) -> String {
        match action {
            Action::Fs(fs_action) => fs_action.to_string(),
            Action::Run(invocation) => self.toolbox.describe(invocation),
            Action::AwaitReady(invocation) => format!(
                "poll `{}` every {}s for up to {}s",
                self.toolbox.describe(invocation),
                self.config.toolchain.readiness.interval_secs,
                self.config.toolchain.readiness.timeout_secs
            ),
            Action::Notice(message) => format!("note: {}", message),
        }
    }

    /// Evaluate `step` against the configuration.
    fn gate(&self, step: Step) -> Result<Gate, FailureCause> {
        let config = &self.config;
        let root = config.project_root.clone();

        let gate = match step {
            Step::FixPermissions => Gate::Run(
                settings::permission_actions(config)
                    .into_iter()
                    .map(Action::Fs)
                    .collect(),
            ),
            Step::InitSettings => Gate::Run(
                settings::settings_actions(config)
                    .into_iter()
                    .map(Action::Fs)
                    .collect(),
            ),
            Step::StartServices => Gate::Run(vec![run(&ServicesArgs {
                project_root: root,
                mode: ServiceMode::for_running(config.services_running),
            })]),
            Step::AwaitDatabase => Gate::Run(vec![Action::AwaitReady(
                ReadinessProbeArgs {
                    project_root: root,
                    probe_args: config.toolchain.readiness.probe_args.clone(),
                }
                .invocation(),
            )]),
            Step::InstallDependencies => Gate::Run(self.dependency_actions()),
            Step::ImportDatabase => Gate::Run(self.import_actions()?),
            Step::Deploy => Gate::Run(vec![run(&DeployArgs { project_root: root })]),
            Step::ResetAdmin => self.admin_gate(),
            Step::HostHint => match (&config.virtual_host, config.host.needs_hosts_entry()) {
                (Some(host), true) => Gate::Run(
                    hosts_file_hint(host)
                        .into_iter()
                        .map(Action::Notice)
                        .collect(),
                ),
                _ => Gate::Skip {
                    reason: format!("no hosts-file changes needed on {}", config.host),
                    silent: true,
                },
            },
        };

        Ok(gate)
    }

    fn dependency_actions(&self) -> Vec<Action> {
        let config = &self.config;
        let mut actions = vec![run(&DependencyInstallArgs {
            project_root: config.project_root.clone(),
        })];

        match config.theme_dir() {
            Some(theme_dir) if theme_dir.is_dir() => {
                actions.push(run(&ThemeInstallArgs {
                    theme_dir: theme_dir.clone(),
                }));
                actions.push(run(&ThemeBuildArgs {
                    theme_dir: theme_dir.clone(),
                }));
                actions.push(Action::Fs(FsAction::RemoveDir(
                    theme_dir.join(THEME_BUILD_ARTIFACTS),
                )));
            }
            Some(theme_dir) => actions.push(Action::Notice(format!(
                "Theme directory {} not found, skipping theme build",
                theme_dir.display()
            ))),
            None => actions.push(Action::Notice(
                "No default theme configured, skipping theme build".to_string(),
            )),
        }

        actions
    }

    fn import_actions(&self) -> Result<Vec<Action>, FailureCause> {
        let config = &self.config;
        let dump_path = config.dump_path();
        let mut actions = Vec::new();

        if config.skip_db_fetch {
            actions.push(Action::Notice(format!(
                "Remote snapshot refresh skipped, importing existing {}",
                config.dump.file.display()
            )));
        } else {
            let url = config
                .dump
                .url
                .clone()
                .ok_or(FailureCause::MissingSetting(vars::DUMP_URL))?;

            actions.push(Action::Fs(FsAction::RemoveFile(dump_path.clone())));
            if let Some(parent) = dump_path.parent() {
                actions.push(Action::Fs(FsAction::EnsureDir(parent.to_path_buf())));
            }
            actions.push(run(&SnapshotFetchArgs {
                url,
                user: config.dump.user.clone(),
                password: config.dump.password.clone(),
                output: dump_path,
            }));
        }

        actions.push(run(&SnapshotImportArgs {
            project_root: config.project_root.clone(),
            file: config.dump.file.clone(),
        }));

        Ok(actions)
    }

    fn admin_gate(&self) -> Gate {
        let config = &self.config;

        if !config.is_development() {
            return Gate::Skip {
                reason: format!("'{}' is not a development environment", config.environment),
                silent: false,
            };
        }

        let Some(password) = &config.admin_password else {
            return Gate::Skip {
                reason: format!("{} is not set", vars::ADMIN_PASSWORD),
                silent: false,
            };
        };

        Gate::Run(vec![
            run(&AdminPasswordArgs {
                project_root: config.project_root.clone(),
                user: config.admin_user.clone(),
                password: password.clone(),
            }),
            run(&AdminUnblockArgs {
                project_root: config.project_root.clone(),
                user: config.admin_user.clone(),
            }),
        ])
    }
}

fn run<T: ToolArgs>(args: &T) -> Action {
    Action::Run(args.invocation())
}

/// Build the configuration from `env` and run every step.
///
/// A missing `PROJECT_ROOT` is reported as `ProvisionError::Precondition`
/// before any tool is called or any file is written.
pub fn provision(
    env: &EnvSnapshot,
    host: HostPlatform,
    toolbox: Toolbox,
    pause: impl Pause + 'static,
    progress: impl ProgressSink + 'static,
) -> Result<RunReport, ProvisionError> {
    let config = ProvisionConfig::from_env(env, host)?;
    let mut sequencer = Sequencer::new(config, toolbox)
        .with_pause(pause)
        .with_progress(progress);
    Ok(sequencer.run()?)
}
