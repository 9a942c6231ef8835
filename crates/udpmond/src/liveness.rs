//! Liveness monitor - times out silent machines and tears down their sessions.
//!
//! The only cascading rule in the system: losing a master destroys its
//! session, taking every member out of it. Losing a slave only marks that
//! one machine offline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use udpmon_core::{MachineId, SessionName};

use crate::engine::EngineCommand;
use crate::registry::{MachineRegistry, SessionRegistry};

/// Default liveness threshold.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Default period of the background sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// What a single sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Machines marked offline by this sweep
    pub timed_out: Vec<MachineId>,
    /// Sessions destroyed because their master timed out
    pub sessions_removed: Vec<SessionName>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.timed_out.is_empty() && self.sessions_removed.is_empty()
    }
}

/// Runs one liveness sweep over both registries.
///
/// Every online machine silent for longer than `timeout` goes offline. For
/// each of those that was a master, the session it belongs to is removed.
pub fn sweep(
    machines: &mut MachineRegistry,
    sessions: &mut SessionRegistry,
    now: DateTime<Utc>,
    timeout: Duration,
) -> SweepReport {
    let outcome = machines.sweep_timeouts(now, timeout);
    let mut report = SweepReport::default();

    for machine in &outcome.timed_out {
        info!(
            machine_id = %machine.machine_id,
            session = %machine.session,
            was_master = machine.was_master,
            "Machine timed out"
        );
        report.timed_out.push(machine.machine_id.clone());
    }

    for master in outcome.masters() {
        if sessions.remove_session(machines, &master.session).is_some() {
            info!(
                machine_id = %master.machine_id,
                session = %master.session,
                "Master lost, session torn down"
            );
            report.sessions_removed.push(master.session.clone());
        }
    }

    report
}

/// Spawns the background task that requests a sweep every `period`.
///
/// Runs independently of inbound traffic. Stops when the engine channel
/// closes or `cancel_token` fires.
pub fn spawn_sweep_task(
    sender: mpsc::Sender<EngineCommand>,
    period: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Sweep task shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    // Fire-and-forget sweep command
                    if sender.send(EngineCommand::Tick).await.is_err() {
                        debug!("Sweep task stopping: engine channel closed");
                        break;
                    }
                }
            }
        }
    })
}
