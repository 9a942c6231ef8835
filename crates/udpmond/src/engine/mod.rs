//! Monitor engine and the actor that owns it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  EngineCommand  ┌─────────────────┐
//! │  intake loop    │────────────────▶│   EngineActor   │
//! │  report task    │  (mpsc channel) │ ┌─────────────┐ │
//! │  sweep task     │◀────────────────│ │MonitorEngine│ │
//! └─────────────────┘    oneshot      │ └─────────────┘ │
//!                                     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod actor;
mod commands;
mod handle;
mod monitor;

pub use actor::EngineActor;
pub use commands::{EngineCommand, EngineError};
pub use handle::EngineHandle;
pub use monitor::{MonitorEngine, Outcome, ShutdownSummary};

use crate::liveness::{spawn_sweep_task, DEFAULT_LIVENESS_TIMEOUT, DEFAULT_SWEEP_INTERVAL};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Engine timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Silence after which a machine is marked offline
    pub liveness_timeout: Duration,
    /// Period of the background sweep
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Spawns the engine actor plus its sweep task and returns a handle.
///
/// The sweep task stops when `cancel_token` fires. The actor stops on
/// `EngineHandle::shutdown`, or once every handle is dropped and the sweep
/// task has stopped.
pub fn spawn_engine(config: EngineConfig, cancel_token: CancellationToken) -> EngineHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = EngineActor::new(cmd_rx, MonitorEngine::new(config.liveness_timeout));
    tokio::spawn(actor.run());

    spawn_sweep_task(cmd_tx.clone(), config.sweep_interval, cancel_token);

    EngineHandle::new(cmd_tx)
}
