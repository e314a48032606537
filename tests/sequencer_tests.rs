//! Integration tests for the provisioning sequencer
//!
//! Every external tool is replaced by a recording fake so these tests
//! exercise step ordering, gating and failure handling against a real
//! temporary project tree without starting any containers.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strum::IntoEnumIterator;
use tempfile::TempDir;

use siteprov::error::{FailureCause, ProvisionError, ToolError};
use siteprov::{
    provision, EnvSnapshot, ExitOutcome, ExternalTool, HostPlatform, Invocation, Pause,
    ProgressEvent, ProvisionConfig, RecordingProgress, RunState, Sequencer, Step, StepOutcome,
    StepPlan, ToolRole, Toolbox, Toolchain,
};

// =============================================================================
// Test doubles
// =============================================================================

type Behaviour = Arc<dyn Fn(&Invocation) -> ExitOutcome + Send + Sync>;

/// Records every invocation and answers according to `behaviour`.
#[derive(Clone)]
struct FakeTool {
    calls: Arc<Mutex<Vec<Invocation>>>,
    behaviour: Behaviour,
}

impl ExternalTool for FakeTool {
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.behaviour)(invocation))
    }
}

/// Never sleeps.
struct NoPause;

impl Pause for NoPause {
    fn pause(&self, _duration: Duration) {}
}

fn always_succeed() -> Behaviour {
    Arc::new(|_| ExitOutcome::SUCCESS)
}

fn fail_role(role: ToolRole, code: i32) -> Behaviour {
    Arc::new(move |inv: &Invocation| {
        if inv.role == role {
            ExitOutcome::code(code)
        } else {
            ExitOutcome::SUCCESS
        }
    })
}

struct Harness {
    dir: TempDir,
    calls: Arc<Mutex<Vec<Invocation>>>,
    progress: RecordingProgress,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();

        fs::create_dir_all(root.join(".provision")).unwrap();
        fs::write(root.join(".provision/settings.local.php"), "<?php // local template\n").unwrap();
        fs::write(root.join(".provision/settings.development.php"), "<?php // dev template\n").unwrap();
        fs::create_dir_all(root.join("web/sites/default")).unwrap();
        fs::write(root.join("web/sites/default/settings.php"), "<?php\n").unwrap();

        Self {
            dir,
            calls: Arc::new(Mutex::new(Vec::new())),
            progress: RecordingProgress::new(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn with_theme(self, name: &str) -> Self {
        let theme = self.root().join("web/themes/custom").join(name);
        fs::create_dir_all(theme.join("node_modules/pkg")).unwrap();
        fs::write(theme.join("package.json"), "{}").unwrap();
        self
    }

    fn env(&self, extra: &[(&str, &str)]) -> EnvSnapshot {
        let mut pairs = vec![("PROJECT_ROOT".to_string(), self.root().display().to_string())];
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        EnvSnapshot::from_pairs(pairs)
    }

    fn toolbox(&self, behaviour: Behaviour) -> Toolbox {
        let tool = FakeTool {
            calls: Arc::clone(&self.calls),
            behaviour,
        };
        ToolRole::iter().fold(Toolbox::new(), |toolbox, role| toolbox.with(role, tool.clone()))
    }

    fn sequencer(&self, extra: &[(&str, &str)], host: HostPlatform, behaviour: Behaviour) -> Sequencer {
        let config = ProvisionConfig::from_env(&self.env(extra), host).expect("config");
        self.sequencer_for(config, behaviour)
    }

    fn sequencer_for(&self, config: ProvisionConfig, behaviour: Behaviour) -> Sequencer {
        Sequencer::new(config, self.toolbox(behaviour))
            .with_pause(NoPause)
            .with_progress(self.progress.clone())
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    fn roles(&self) -> Vec<ToolRole> {
        self.calls().iter().map(|c| c.role).collect()
    }

    fn args(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().map(|c| c.args).collect()
    }

    fn site(&self, name: &str) -> std::path::PathBuf {
        self.root().join("web/sites/default").join(name)
    }
}

const DEV_ENV: &[(&str, &str)] = &[
    ("SITE_ENVIRONMENT", "dev"),
    ("ADMIN_PASSWORD", "letmein"),
    ("DUMP_URL", "https://dumps.example.com/site.sql.gz"),
    ("DEFAULT_THEME", "mytheme"),
];

// =============================================================================
// Full runs
// =============================================================================

#[test]
fn test_development_run_calls_tools_in_order() {
    let h = Harness::new().with_theme("mytheme");
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, always_succeed());

    let report = seq.run().expect("run should succeed");

    assert_eq!(
        h.roles(),
        vec![
            ToolRole::Services,
            ToolRole::Database,
            ToolRole::PackageManager,
            ToolRole::Theme,
            ToolRole::Theme,
            ToolRole::Fetcher,
            ToolRole::Database,
            ToolRole::Deploy,
            ToolRole::Deploy,
            ToolRole::Deploy,
        ]
    );

    let args = h.args();
    assert_eq!(args[0], ["start"]);
    assert_eq!(args[2], ["install", "--no-interaction"]);
    assert_eq!(args[3], ["ci"]);
    assert_eq!(args[4], ["run", "build"]);
    assert_eq!(args[6], ["db-import", ".provision/db.sql.gz"]);
    assert_eq!(args[7], ["deploy", "--yes"]);
    assert_eq!(args[8], ["user:password", "admin", "letmein"]);
    assert_eq!(args[9], ["user:unblock", "admin"]);

    let theme_dir = h.root().join("web/themes/custom/mytheme");
    assert_eq!(h.calls()[3].working_dir.as_deref(), Some(theme_dir.as_path()));
    assert!(!theme_dir.join("node_modules").exists());
    assert!(theme_dir.join("package.json").exists());

    assert!(h.site("settings.local.php").is_file());
    assert!(h.site("settings.development.php").is_file());
    assert!(h.site("files").is_dir());

    assert_eq!(seq.context().state(), RunState::Succeeded);
    assert_eq!(report.readiness_attempts, Some(1));
    assert_eq!(report.skipped_steps(), vec![Step::HostHint]);
    assert_eq!(h.progress.events().last(), Some(&ProgressEvent::Finished));
}

#[test]
fn test_host_hint_is_silent_off_macos() {
    let h = Harness::new();
    let mut extra = DEV_ENV.to_vec();
    extra.push(("VIRTUAL_HOST", "site.lndo.site"));
    let mut seq = h.sequencer(&extra, HostPlatform::Linux, always_succeed());

    seq.run().expect("run");

    let events = h.progress.events();
    assert!(!events.contains(&ProgressEvent::Started(Step::HostHint)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Skipped { step: Step::HostHint, .. })));
}

#[test]
fn test_host_hint_on_macos() {
    let h = Harness::new();
    let mut extra = DEV_ENV.to_vec();
    extra.push(("VIRTUAL_HOST", "site.lndo.site"));
    let mut seq = h.sequencer(&extra, HostPlatform::MacOs, always_succeed());

    let report = seq.run().expect("run");

    let record = report.record(Step::HostHint).expect("host hint record");
    assert_eq!(record.outcome, StepOutcome::Completed);
    assert!(record.notes.iter().any(|n| n.contains("127.0.0.1 site.lndo.site")));
}

// =============================================================================
// Step gating
// =============================================================================

#[test]
fn test_running_services_are_rebuilt() {
    let h = Harness::new();
    let mut extra = DEV_ENV.to_vec();
    extra.push(("SERVICES_RUNNING", "1"));
    let mut seq = h.sequencer(&extra, HostPlatform::Linux, always_succeed());

    seq.run().expect("run");

    assert_eq!(h.args()[0], ["rebuild", "--yes"]);
}

#[test]
fn test_skip_fetch_imports_existing_snapshot() {
    let h = Harness::new();
    fs::write(h.root().join(".provision/db.sql.gz"), "existing").unwrap();
    let mut seq = h.sequencer(
        &[("SITE_ENVIRONMENT", "dev"), ("SKIP_DB_FETCH", "yes")],
        HostPlatform::Linux,
        always_succeed(),
    );

    seq.run().expect("run");

    assert!(!h.roles().contains(&ToolRole::Fetcher));
    assert!(h.args().contains(&vec!["db-import".to_string(), ".provision/db.sql.gz".to_string()]));
    assert_eq!(
        fs::read_to_string(h.root().join(".provision/db.sql.gz")).unwrap(),
        "existing"
    );
}

#[test]
fn test_stale_snapshot_is_removed_before_fetch() {
    let h = Harness::new();
    fs::write(h.root().join(".provision/db.sql.gz"), "stale").unwrap();
    let root = h.root().to_path_buf();
    let stale_seen = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&stale_seen);
    let behaviour: Behaviour = Arc::new(move |inv: &Invocation| {
        if inv.role == ToolRole::Fetcher {
            *seen.lock().unwrap() = Some(root.join(".provision/db.sql.gz").exists());
        }
        ExitOutcome::SUCCESS
    });
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, behaviour);

    seq.run().expect("run");

    assert_eq!(*stale_seen.lock().unwrap(), Some(false));
}

#[test]
fn test_fetch_credentials_are_not_on_the_command_line() {
    let h = Harness::new();
    let mut extra = DEV_ENV.to_vec();
    extra.push(("DUMP_USER", "ops"));
    extra.push(("DUMP_PASSWORD", "dump-secret"));
    let mut seq = h.sequencer(&extra, HostPlatform::Linux, always_succeed());

    seq.run().expect("run");

    let fetch = h
        .calls()
        .into_iter()
        .find(|c| c.role == ToolRole::Fetcher)
        .expect("fetch call");
    assert!(!fetch.args.iter().any(|a| a.contains("dump-secret")));
    assert!(fetch.args.windows(2).any(|w| w == ["--config", "-"]));
    assert_eq!(fetch.stdin.as_deref(), Some("user = \"ops:dump-secret\"\n"));
}

#[test]
fn test_non_development_run_leaves_settings_alone() {
    let h = Harness::new();
    fs::write(h.site("settings.local.php"), "<?php // customised\n").unwrap();
    let mut seq = h.sequencer(
        &[("SITE_ENVIRONMENT", "stage"), ("SKIP_DB_FETCH", "1")],
        HostPlatform::Linux,
        always_succeed(),
    );

    let report = seq.run().expect("run");

    assert_eq!(
        fs::read_to_string(h.site("settings.local.php")).unwrap(),
        "<?php // customised\n"
    );
    assert!(!h.site("settings.development.php").exists());
    assert!(!h.args().iter().any(|a| a[0].starts_with("user:")));
    assert!(matches!(
        report.record(Step::ResetAdmin).map(|r| &r.outcome),
        Some(StepOutcome::Skipped(_))
    ));
    assert!(h
        .progress
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::Skipped { step: Step::ResetAdmin, .. })));
}

#[test]
fn test_development_overlay_is_refreshed() {
    let h = Harness::new();
    fs::write(h.site("settings.development.php"), "<?php // hand edit\n").unwrap();
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, always_succeed());

    seq.run().expect("run");

    assert_eq!(
        fs::read_to_string(h.site("settings.development.php")).unwrap(),
        "<?php // dev template\n"
    );
}

#[test]
fn test_development_without_password_skips_admin_reset() {
    let h = Harness::new();
    let mut seq = h.sequencer(
        &[("SITE_ENVIRONMENT", "local"), ("SKIP_DB_FETCH", "1")],
        HostPlatform::Linux,
        always_succeed(),
    );

    let report = seq.run().expect("run");

    assert!(!h.args().iter().any(|a| a[0] == "user:password"));
    match report.record(Step::ResetAdmin).map(|r| &r.outcome) {
        Some(StepOutcome::Skipped(reason)) => assert!(reason.contains("ADMIN_PASSWORD")),
        other => panic!("expected skipped admin reset, got {:?}", other),
    }
}

#[test]
fn test_missing_theme_directory_is_a_notice() {
    let h = Harness::new();
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, always_succeed());

    let report = seq.run().expect("run");

    assert!(!h.roles().contains(&ToolRole::Theme));
    let record = report.record(Step::InstallDependencies).unwrap();
    assert_eq!(record.outcome, StepOutcome::Completed);
    assert!(record.notes.iter().any(|n| n.contains("skipping theme build")));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_dependency_failure_stops_the_run() {
    let h = Harness::new().with_theme("mytheme");
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, fail_role(ToolRole::PackageManager, 2));

    let failure = seq.run().expect_err("run should fail");

    assert_eq!(failure.step, Step::InstallDependencies);
    assert_eq!(failure.exit_code(), 2);
    assert!(matches!(
        failure.cause,
        FailureCause::ToolExit { role: ToolRole::PackageManager, exit_code: Some(2), .. }
    ));
    assert_eq!(seq.context().failed_at(), Some(Step::InstallDependencies));
    assert_eq!(
        h.roles(),
        vec![ToolRole::Services, ToolRole::Database, ToolRole::PackageManager]
    );
    assert!(h.progress.events().iter().any(|e| matches!(
        e,
        ProgressEvent::Failed { step: Step::InstallDependencies, .. }
    )));
    assert!(!h.progress.events().contains(&ProgressEvent::Finished));
}

#[test]
fn test_failure_message_names_step_and_command() {
    let h = Harness::new();
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, fail_role(ToolRole::Deploy, 1));

    let failure = seq.run().expect_err("run should fail");

    let message = failure.to_string();
    assert!(message.contains("Step 7"), "{}", message);
    assert!(message.contains("deploy --yes"), "{}", message);
}

#[test]
fn test_readiness_timeout_fails_step_four() {
    let h = Harness::new();
    let mut toolchain = Toolchain::default();
    toolchain.readiness.timeout_secs = 4;
    toolchain.readiness.interval_secs = 2;
    let config = ProvisionConfig::from_env(&h.env(DEV_ENV), HostPlatform::Linux)
        .unwrap()
        .with_toolchain(toolchain);
    let mut seq = h.sequencer_for(config, fail_role(ToolRole::Database, 1));

    let failure = seq.run().expect_err("run should fail");

    assert_eq!(failure.step, Step::AwaitDatabase);
    assert_eq!(failure.exit_code(), 1);
    assert!(matches!(failure.cause, FailureCause::Readiness(ref t) if t.attempts == 3));
    assert_eq!(h.roles(), vec![ToolRole::Services, ToolRole::Database, ToolRole::Database, ToolRole::Database]);
}

#[test]
fn test_readiness_retries_until_database_answers() {
    let h = Harness::new();
    let probes = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&probes);
    let behaviour: Behaviour = Arc::new(move |inv: &Invocation| {
        if inv.role == ToolRole::Database && inv.quiet {
            let mut n = counter.lock().unwrap();
            *n += 1;
            if *n < 3 {
                return ExitOutcome::code(1);
            }
        }
        ExitOutcome::SUCCESS
    });
    let mut seq = h.sequencer(DEV_ENV, HostPlatform::Linux, behaviour);

    let report = seq.run().expect("run");

    assert_eq!(report.readiness_attempts, Some(3));
}

#[test]
fn test_missing_dump_url_fails_import() {
    let h = Harness::new();
    let mut seq = h.sequencer(&[("SITE_ENVIRONMENT", "dev")], HostPlatform::Linux, always_succeed());

    let failure = seq.run().expect_err("run should fail");

    assert_eq!(failure.step, Step::ImportDatabase);
    assert_eq!(failure.exit_code(), 1);
    assert!(matches!(failure.cause, FailureCause::MissingSetting("DUMP_URL")));
    assert!(!h.roles().contains(&ToolRole::Fetcher));
}

#[test]
fn test_unregistered_tool_fails_its_step() {
    let h = Harness::new();
    let config = ProvisionConfig::from_env(&h.env(DEV_ENV), HostPlatform::Linux).unwrap();
    let toolbox = Toolbox::new().with(
        ToolRole::Services,
        FakeTool {
            calls: Arc::clone(&h.calls),
            behaviour: always_succeed(),
        },
    );
    let mut seq = Sequencer::new(config, toolbox).with_pause(NoPause);

    let failure = seq.run().expect_err("run should fail");

    assert_eq!(failure.step, Step::AwaitDatabase);
    assert!(matches!(
        failure.cause,
        FailureCause::Tool(ToolError::Unregistered { role: ToolRole::Database })
    ));
}

#[test]
fn test_missing_project_root_is_a_precondition_error() {
    let h = Harness::new();
    let env = EnvSnapshot::from_pairs([("SITE_ENVIRONMENT", "dev")]);

    let err = provision(
        &env,
        HostPlatform::Linux,
        h.toolbox(always_succeed()),
        NoPause,
        h.progress.clone(),
    )
    .expect_err("should fail");

    assert!(matches!(err, ProvisionError::Precondition(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(h.calls().is_empty());
    assert!(h.progress.events().is_empty());
}

#[test]
fn test_provision_reports_step_failure() {
    let h = Harness::new();

    let err = provision(
        &h.env(DEV_ENV),
        HostPlatform::Linux,
        h.toolbox(fail_role(ToolRole::Services, 3)),
        NoPause,
        h.progress.clone(),
    )
    .expect_err("should fail");

    assert!(matches!(&err, ProvisionError::Step(f) if f.step == Step::StartServices));
    assert_eq!(err.exit_code(), 3);
}

// =============================================================================
// Plan
// =============================================================================

#[test]
fn test_plan_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("not-yet-created");
    let env = EnvSnapshot::from_pairs([
        ("PROJECT_ROOT", root.display().to_string()),
        ("SITE_ENVIRONMENT", "dev".to_string()),
        ("DUMP_URL", "https://dumps.example.com/site.sql.gz".to_string()),
    ]);
    let config = ProvisionConfig::from_env(&env, HostPlatform::Linux).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let tool = FakeTool {
        calls: Arc::clone(&calls),
        behaviour: always_succeed(),
    };
    let toolbox = ToolRole::iter().fold(Toolbox::new(), |tb, role| tb.with(role, tool.clone()));
    let seq = Sequencer::new(config, toolbox);

    let plan = seq.plan();

    assert_eq!(plan.len(), Step::COUNT);
    assert!(!root.exists());
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(seq.context().state(), RunState::NotStarted);
    match &plan[5].plan {
        StepPlan::Run(commands) => {
            assert!(commands[0].starts_with("remove "));
            assert!(commands.last().unwrap().contains("db-import"));
        }
        other => panic!("expected import plan, got {:?}", other),
    }
}
