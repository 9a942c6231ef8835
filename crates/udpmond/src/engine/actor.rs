//! Engine actor - owns the `MonitorEngine` and processes commands.
//!
//! Commands are handled one at a time on a single task, which makes the
//! actor the one mutual-exclusion domain for both registries. A sweep can
//! never observe a session halfway through teardown, and a join can never
//! land in the middle of one.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller stopped waiting)

use std::ops::ControlFlow;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::commands::EngineCommand;
use super::monitor::MonitorEngine;

/// The engine actor.
pub struct EngineActor {
    /// Command receiver
    receiver: mpsc::Receiver<EngineCommand>,

    /// Both registries, owned exclusively by this task
    engine: MonitorEngine,
}

impl EngineActor {
    pub fn new(receiver: mpsc::Receiver<EngineCommand>, engine: MonitorEngine) -> Self {
        Self { receiver, engine }
    }

    /// Runs until `Shutdown` arrives or every sender is dropped.
    pub async fn run(mut self) {
        info!(
            liveness_timeout_ms = self.engine.liveness_timeout().as_millis() as u64,
            "Engine actor starting"
        );

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle_command(cmd).is_break() {
                info!("Engine actor stopped");
                return;
            }
        }

        let summary = self.engine.shutdown();
        info!(
            machines = summary.machines,
            online = summary.online,
            sessions = summary.sessions,
            "Engine actor stopped: all handles dropped"
        );
    }

    /// Dispatches a command. Breaks on `Shutdown`.
    fn handle_command(&mut self, cmd: EngineCommand) -> ControlFlow<()> {
        match cmd {
            EngineCommand::Ingest { payload } => {
                debug!(bytes = payload.len(), "Datagram received");
                let line = String::from_utf8_lossy(&payload);
                self.engine.handle_message(&line, Utc::now());
            }
            EngineCommand::HandleMessage { line, respond_to } => {
                let outcome = self.engine.handle_message(&line, Utc::now());
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(outcome);
            }
            EngineCommand::Tick => {
                self.engine.tick(Utc::now());
            }
            EngineCommand::Sweep { respond_to } => {
                let report = self.engine.tick(Utc::now());
                let _ = respond_to.send(report);
            }
            EngineCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.engine.snapshot(Utc::now()));
            }
            EngineCommand::GetMachine {
                machine_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.engine.machine(&machine_id).cloned());
            }
            EngineCommand::GetSession {
                session,
                respond_to,
            } => {
                let _ = respond_to.send(self.engine.session(&session).map(<[_]>::to_vec));
            }
            EngineCommand::Shutdown { respond_to } => {
                let summary = self.engine.shutdown();
                info!(
                    machines = summary.machines,
                    online = summary.online,
                    sessions = summary.sessions,
                    "Engine shutting down"
                );
                self.receiver.close();
                let _ = respond_to.send(summary);
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }
}
