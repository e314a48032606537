//! Progress reporting.
//!
//! The sequencer emits `ProgressEvent`s; a `ProgressSink` decides how they
//! reach the user. `ConsoleProgress` prints them to stdout, logs go to
//! stderr through `tracing`.

use std::sync::{Arc, Mutex};

use crate::step::Step;

/// Something worth telling the user about a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started(Step),
    Completed(Step),
    Skipped { step: Step, reason: String },
    Notice(String),
    Failed { step: Step, message: String },
    Finished,
}

pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Prints progress lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started(step) => {
                println!(
                    "==> [{}/{}] {}",
                    step.ordinal(),
                    Step::COUNT,
                    step.description()
                );
            }
            ProgressEvent::Completed(step) => println!("✓ {}", step),
            ProgressEvent::Skipped { step, reason } => {
                println!("- [{}/{}] Skipping {}: {}", step.ordinal(), Step::COUNT, step, reason);
            }
            ProgressEvent::Notice(message) => println!("  {}", message),
            ProgressEvent::Failed { step, message } => {
                eprintln!("✗ Step {} ({}) failed: {}", step.ordinal(), step, message);
            }
            ProgressEvent::Finished => println!("\n✓ Provisioning completed successfully!"),
        }
    }
}

/// Collects events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&mut self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
