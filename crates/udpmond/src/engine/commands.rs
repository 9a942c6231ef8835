//! Engine actor commands and errors.
//!
//! Every request that needs an answer carries a oneshot `respond_to`
//! channel. `Ingest` and `Tick` are fire-and-forget.

use thiserror::Error;
use tokio::sync::oneshot;

use udpmon_core::{Machine, MachineId, SessionName, StatusSnapshot};

use super::monitor::{Outcome, ShutdownSummary};
use crate::liveness::SweepReport;

// ============================================================================
// Engine Commands
// ============================================================================

/// Commands sent to the engine actor.
#[derive(Debug)]
pub enum EngineCommand {
    /// A raw datagram payload from the transport.
    ///
    /// Decoded lossily as UTF-8 and applied. Nobody waits for the outcome.
    Ingest { payload: Vec<u8> },

    /// Apply a single text line and report what happened.
    HandleMessage {
        line: String,
        respond_to: oneshot::Sender<Outcome>,
    },

    /// Run a liveness sweep. Sent by the sweep task and the intake loop.
    Tick,

    /// Run a liveness sweep and report what it changed.
    Sweep {
        respond_to: oneshot::Sender<SweepReport>,
    },

    /// Build a status snapshot.
    Snapshot {
        respond_to: oneshot::Sender<StatusSnapshot>,
    },

    /// Look up one machine, online or not.
    GetMachine {
        machine_id: MachineId,
        respond_to: oneshot::Sender<Option<Machine>>,
    },

    /// Look up one session roster.
    GetSession {
        session: SessionName,
        respond_to: oneshot::Sender<Option<Vec<MachineId>>>,
    },

    /// Release the registries and stop the actor.
    Shutdown {
        respond_to: oneshot::Sender<ShutdownSummary>,
    },
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Errors surfaced by `EngineHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The actor is gone, or dropped the request without answering.
    #[error("engine channel closed")]
    ChannelClosed,
}
