//! Client interface for the engine actor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `EngineError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use udpmon_core::{Machine, MachineId, SessionName, StatusSnapshot};

use super::commands::{EngineCommand, EngineError};
use super::monitor::{Outcome, ShutdownSummary};
use crate::liveness::SweepReport;

/// Cheap-to-clone handle to the engine actor.
///
/// ```ignore
/// let engine = spawn_engine(EngineConfig::default(), cancel.clone());
/// engine.ingest(b"MACHINE|m2|roomA".to_vec()).await?;
/// let snapshot = engine.snapshot().await?;
/// ```
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(sender: mpsc::Sender<EngineCommand>) -> Self {
        Self { sender }
    }

    /// Hands a raw datagram to the engine without waiting for the outcome.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor has shut down
    pub async fn ingest(&self, payload: Vec<u8>) -> Result<(), EngineError> {
        self.sender
            .send(EngineCommand::Ingest { payload })
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Applies one line and returns what happened.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor has shut down
    pub async fn handle_message(&self, line: impl Into<String>) -> Result<Outcome, EngineError> {
        self.request(|respond_to| EngineCommand::HandleMessage {
            line: line.into(),
            respond_to,
        })
        .await
    }

    /// Requests a liveness sweep without waiting for it.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor has shut down
    pub async fn tick(&self) -> Result<(), EngineError> {
        self.sender
            .send(EngineCommand::Tick)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Runs a liveness sweep and returns what it changed.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor has shut down
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        self.request(|respond_to| EngineCommand::Sweep { respond_to })
            .await
    }

    /// Current status snapshot.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor has shut down
    pub async fn snapshot(&self) -> Result<StatusSnapshot, EngineError> {
        self.request(|respond_to| EngineCommand::Snapshot { respond_to })
            .await
    }

    /// Looks up a machine. Returns `None` if unknown or if the actor is gone.
    pub async fn machine(&self, machine_id: impl Into<MachineId>) -> Option<Machine> {
        self.request(|respond_to| EngineCommand::GetMachine {
            machine_id: machine_id.into(),
            respond_to,
        })
        .await
        .ok()?
    }

    /// Looks up a session roster. Returns `None` if absent or if the actor is gone.
    pub async fn session(&self, session: impl Into<SessionName>) -> Option<Vec<MachineId>> {
        self.request(|respond_to| EngineCommand::GetSession {
            session: session.into(),
            respond_to,
        })
        .await
        .ok()?
    }

    /// Releases the registries and stops the actor.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the actor was already gone
    pub async fn shutdown(&self) -> Result<ShutdownSummary, EngineError> {
        self.request(|respond_to| EngineCommand::Shutdown { respond_to })
            .await
    }

    /// Whether the actor is still accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;

        rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}
