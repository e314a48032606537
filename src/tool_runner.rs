//! External tool execution.
//!
//! `ExternalTool` is the capability the sequencer delegates to. `CommandTool`
//! is the real adapter; tests substitute recording fakes. All real process
//! spawning goes through `CommandTool::run` so that every child:
//!
//! - runs in its own process group
//! - is registered with `ChildRegistry::global()` for signal cleanup
//! - is waited on before the next step starts

use crate::error::ToolError;
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::tool_traits::ToolRole;
use crate::toolchain::{ToolCommand, Toolchain};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

/// One delegated command, ready to run.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub role: ToolRole,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    /// Arguments with secrets masked
    pub display: Vec<String>,
    /// Discard stdout/stderr
    pub quiet: bool,
    /// Written to the child's stdin, then closed. May carry secrets.
    pub stdin: Option<String>,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("role", &self.role)
            .field("display", &self.display)
            .field("env", &self.env)
            .field("working_dir", &self.working_dir)
            .field("quiet", &self.quiet)
            .field("stdin", &self.stdin.as_ref().map(|_| "****"))
            .finish_non_exhaustive()
    }
}

/// How a delegated command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ExitOutcome {
    pub const SUCCESS: Self = Self { exit_code: Some(0) };

    pub fn code(code: i32) -> Self {
        Self {
            exit_code: Some(code),
        }
    }

    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability interface for an external collaborator.
pub trait ExternalTool {
    /// Run the invocation to completion.
    ///
    /// A non-zero exit is an `Ok` outcome; `Err` means the command could not
    /// be run at all.
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, ToolError>;

    /// Printable command line for `invocation`.
    fn describe(&self, invocation: &Invocation) -> String {
        invocation.display.join(" ")
    }
}

/// Runs a configured program as a child process.
#[derive(Debug, Clone)]
pub struct CommandTool {
    command: ToolCommand,
}

impl CommandTool {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl ExternalTool for CommandTool {
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, ToolError> {
        let program = &self.command.program;

        info!(
            role = %invocation.role,
            cwd = ?invocation.working_dir,
            "Running: {}",
            self.describe(invocation)
        );

        let mut cmd = Command::new(program);
        cmd.args(&self.command.args)
            .args(&invocation.args)
            .in_new_process_group();

        if invocation.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        if invocation.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let fed = feed_stdin(&mut child, invocation.stdin.as_deref());
        if fed.is_err() {
            let _ = child.kill();
        }
        let status = child.wait();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        fed.map_err(|source| ToolError::Stdin {
            program: program.clone(),
            source,
        })?;
        let status = status.map_err(|source| ToolError::Wait {
            program: program.clone(),
            source,
        })?;

        let outcome = ExitOutcome {
            exit_code: status.code(),
        };
        if outcome.success() {
            debug!("{} exited successfully", program);
        } else {
            warn!("{} failed with exit code {:?}", program, outcome.exit_code);
        }
        Ok(outcome)
    }

    fn describe(&self, invocation: &Invocation) -> String {
        std::iter::once(self.command.program.as_str())
            .chain(self.command.args.iter().map(String::as_str))
            .chain(invocation.display.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Write `input` to the child's stdin and close it.
///
/// A child that exits without reading is not an error here; its exit
/// status reports the failure.
fn feed_stdin(child: &mut Child, input: Option<&str>) -> io::Result<()> {
    let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

/// Maps each tool role to the tool that serves it.
#[derive(Default)]
pub struct Toolbox {
    tools: BTreeMap<ToolRole, Box<dyn ExternalTool>>,
}

impl Toolbox {
    /// Create an empty toolbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toolbox with a `CommandTool` for every role.
    pub fn from_toolchain(toolchain: &Toolchain) -> Self {
        ToolRole::iter().fold(Self::new(), |toolbox, role| {
            toolbox.with(role, CommandTool::new(toolchain.command(role).clone()))
        })
    }

    /// Register `tool` for `role`, replacing any previous one.
    pub fn with(mut self, role: ToolRole, tool: impl ExternalTool + 'static) -> Self {
        self.tools.insert(role, Box::new(tool));
        self
    }

    fn tool(&self, role: ToolRole) -> Result<&dyn ExternalTool, ToolError> {
        self.tools
            .get(&role)
            .map(|tool| tool.as_ref())
            .ok_or(ToolError::Unregistered { role })
    }

    pub fn run_invocation(&self, invocation: &Invocation) -> Result<ExitOutcome, ToolError> {
        self.tool(invocation.role)?.run(invocation)
    }

    /// Printable command line, falling back to the role name when no tool
    /// is registered.
    pub fn describe(&self, invocation: &Invocation) -> String {
        match self.tool(invocation.role) {
            Ok(tool) => tool.describe(invocation),
            Err(_) => format!("<{}> {}", invocation.role, invocation.display.join(" ")),
        }
    }
}
