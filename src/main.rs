//! siteprov - Main entry point

use std::path::Path;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use siteprov::cli::{Cli, Commands};
use siteprov::error::ProvisionError;
use siteprov::{
    process_guard, sanity, EnvSnapshot, HostPlatform, PlannedStep, ProcessGuard,
    ProvisionConfig, Sequencer, Step, StepPlan, Toolbox, Toolchain,
};

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load variables from an env file into the process environment.
///
/// An explicit file must exist; the implicit `.env` is optional.
fn load_env_file(path: Option<&Path>) -> Result<(), dotenvy::Error> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)?;
            debug!("Loaded environment from {}", path.display());
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                debug!("Loaded environment from {}", path.display());
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse_args();
    init_tracing();
    info!("siteprov starting up");

    // Children are terminated on SIGINT/SIGTERM as well as on normal exit
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let code = {
        let _guard = ProcessGuard::new();
        run_cli(&cli)
    };

    std::process::exit(code);
}

/// Execute the requested subcommand and return the process exit code.
fn run_cli(cli: &Cli) -> i32 {
    if let Err(e) = load_env_file(cli.env_file.as_deref()) {
        eprintln!("✗ Failed to load environment file: {}", e);
        return 1;
    }

    let env = EnvSnapshot::from_process();
    let config = match ProvisionConfig::from_env(&env, HostPlatform::detect()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            let err = ProvisionError::from(e);
            eprintln!("✗ {}", err);
            return err.exit_code();
        }
    };

    let toolchain = match Toolchain::resolve(cli.toolchain.as_deref(), &config.project_root) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            error!("Failed to load toolchain: {:#}", e);
            eprintln!("✗ Failed to load toolchain: {:#}", e);
            return 1;
        }
    };
    let toolbox = Toolbox::from_toolchain(&toolchain);
    let config = config.with_toolchain(toolchain.clone());
    debug!("Effective configuration: {:?}", config);

    match cli.subcommand() {
        Commands::Run => {
            let mut sequencer = Sequencer::new(config, toolbox);
            match sequencer.run() {
                Ok(report) => {
                    debug!("Run report: {:?}", report);
                    0
                }
                Err(failure) => failure.exit_code(),
            }
        }
        Commands::Plan => {
            let sequencer = Sequencer::new(config, toolbox);
            let plan = sequencer.plan();
            for planned in &plan {
                print_planned_step(planned);
            }
            0
        }
        Commands::Check => {
            let result = sanity::verify_toolchain(&toolchain);
            sanity::print_report(&result);
            if result.is_ok() { 0 } else { 1 }
        }
        Commands::DumpToolchain { path } => match toolchain.save_to_file(&path) {
            Ok(()) => {
                println!("✓ Toolchain written to {}", path.display());
                0
            }
            Err(e) => {
                eprintln!("✗ {:#}", e);
                1
            }
        },
    }
}

fn print_planned_step(planned: &PlannedStep) {
    let step = planned.step;
    let header = format!("[{}/{}] {} ({})", step.ordinal(), Step::COUNT, step.description(), step);

    match &planned.plan {
        StepPlan::Run(commands) => {
            println!("{}", header);
            for command in commands {
                println!("    {}", command);
            }
        }
        StepPlan::Skip { reason, .. } => println!("{}\n    skip: {}", header, reason),
        StepPlan::Blocked(reason) => println!("{}\n    would fail: {}", header, reason),
    }
}
