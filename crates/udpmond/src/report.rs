//! Status reporter - read-only snapshots of registry state.
//!
//! `build_snapshot` never mutates anything. The periodic report task asks the
//! engine for a snapshot on its own cadence and hands it to a renderer; it
//! never formats output itself.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use udpmon_core::{MachineReport, SessionReport, StatusSnapshot};

use crate::engine::EngineHandle;
use crate::registry::{MachineRegistry, SessionRegistry};
use crate::render::Render;

/// Builds a point-in-time report of every online machine and every session.
///
/// Rows are sorted by machine id and sessions by name, so two snapshots of
/// the same state are identical.
pub fn build_snapshot(
    machines: &MachineRegistry,
    sessions: &SessionRegistry,
    now: DateTime<Utc>,
) -> StatusSnapshot {
    let mut machine_rows: Vec<MachineReport> = machines
        .iter()
        .filter(|(_, machine)| machine.is_online())
        .map(|(id, machine)| MachineReport::from_machine(id, machine))
        .collect();
    machine_rows.sort_by(|a, b| a.id.cmp(&b.id));

    let mut session_rows: Vec<SessionReport> = sessions
        .iter()
        .map(|(name, members)| SessionReport {
            name: name.clone(),
            members: members.to_vec(),
        })
        .collect();
    session_rows.sort_by(|a, b| a.name.cmp(&b.name));

    StatusSnapshot {
        taken_at: now,
        machines: machine_rows,
        sessions: session_rows,
    }
}

/// Spawns the task that renders a snapshot every `period`.
///
/// Render failures are logged and the task keeps going. Stops when the
/// engine is gone or `cancel_token` fires.
pub fn spawn_report_task<R>(
    engine: EngineHandle,
    mut renderer: R,
    period: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    R: Render + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Report task shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let snapshot = match engine.snapshot().await {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            debug!(error = %e, "Report task stopping: engine unavailable");
                            break;
                        }
                    };

                    if let Err(e) = renderer.render(&snapshot) {
                        warn!(error = %e, "Failed to render status report");
                    }
                }
            }
        }
    })
}
