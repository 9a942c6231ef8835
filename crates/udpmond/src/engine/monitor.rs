//! Monitor engine - applies decoded commands to the registries.
//!
//! Synchronous and clock-free: every operation takes `now` from the caller.
//! The actor supplies the wall clock, tests supply fixed instants.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use udpmon_core::{DomainError, Machine, MachineId, SessionName, StatusSnapshot};
use udpmon_protocol::{decode, Command, DecodeError};

use crate::liveness::{self, SweepReport};
use crate::registry::{MachineRegistry, SessionRegistry, Upsert};
use crate::report;

/// What `handle_message` did with one line.
///
/// None of these is fatal. The engine stays usable after every outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A master announced (or re-announced) a session roster.
    SessionAnnounced {
        session: SessionName,
        creator: MachineId,
        members: usize,
    },

    /// A slave announced itself.
    MachineJoined { machine_id: MachineId, upsert: Upsert },

    /// Status metrics recorded.
    HeartbeatApplied { machine_id: MachineId },

    /// Heartbeat from a machine that never announced itself. Dropped.
    UnknownMachine { machine_id: MachineId },

    /// Unknown tag or wrong field count. Dropped.
    Unrecognized { tag: String, field_count: usize },

    /// The line could not be decoded. Dropped.
    DecodeFailed(DecodeError),
}

impl Outcome {
    /// Whether the registries were changed.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            Self::SessionAnnounced { .. } | Self::MachineJoined { .. } | Self::HeartbeatApplied { .. }
        )
    }
}

/// Registry sizes at the moment the engine was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownSummary {
    pub machines: usize,
    pub online: usize,
    pub sessions: usize,
}

/// Owner of both registries.
#[derive(Debug)]
pub struct MonitorEngine {
    machines: MachineRegistry,
    sessions: SessionRegistry,
    liveness_timeout: Duration,
}

impl MonitorEngine {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            machines: MachineRegistry::new(),
            sessions: SessionRegistry::new(),
            liveness_timeout,
        }
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Decodes one line and applies it.
    pub fn handle_message(&mut self, line: &str, now: DateTime<Utc>) -> Outcome {
        match decode(line) {
            Ok(command) => self.handle_command(command, now),
            Err(e) => {
                warn!(error = %e, line = %line.escape_debug(), "Dropping undecodable message");
                Outcome::DecodeFailed(e)
            }
        }
    }

    /// Applies an already decoded command.
    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) -> Outcome {
        debug!(kind = command.kind(), "Applying command");

        match command {
            Command::SessionAnnounce {
                session,
                creator,
                members,
            } => {
                self.machines
                    .upsert_as_participant(&creator, true, &session, now);
                let count = self
                    .sessions
                    .replace_roster(&mut self.machines, &session, &members, now);

                info!(
                    session = %session,
                    creator = %creator,
                    members = count,
                    "Session announced"
                );
                Outcome::SessionAnnounced {
                    session,
                    creator,
                    members: count,
                }
            }

            Command::MachineJoin {
                machine_id,
                session,
            } => {
                let upsert = self
                    .machines
                    .upsert_as_participant(&machine_id, false, &session, now);
                info!(machine_id = %machine_id, session = %session, "Machine joined");
                Outcome::MachineJoined { machine_id, upsert }
            }

            Command::Heartbeat {
                machine_id,
                version,
                fps,
            } => match self.machines.apply_heartbeat(&machine_id, version, fps, now) {
                Ok(()) => {
                    debug!(machine_id = %machine_id, version, fps, "Heartbeat");
                    Outcome::HeartbeatApplied { machine_id }
                }
                Err(DomainError::MachineNotFound { .. }) => {
                    warn!(machine_id = %machine_id, "Heartbeat from unknown machine");
                    Outcome::UnknownMachine { machine_id }
                }
                Err(e) => {
                    warn!(machine_id = %machine_id, error = %e, "Heartbeat rejected");
                    Outcome::UnknownMachine { machine_id }
                }
            },

            Command::Unrecognized { tag, field_count } => {
                warn!(tag = %tag.escape_debug(), field_count, "Unrecognized message");
                Outcome::Unrecognized { tag, field_count }
            }
        }
    }

    /// Runs one liveness sweep.
    pub fn tick(&mut self, now: DateTime<Utc>) -> SweepReport {
        let report = liveness::sweep(
            &mut self.machines,
            &mut self.sessions,
            now,
            self.liveness_timeout,
        );
        if report.is_empty() {
            debug!("Sweep found nothing to time out");
        }
        report
    }

    /// Point-in-time report of online machines and sessions.
    pub fn snapshot(&self, now: DateTime<Utc>) -> StatusSnapshot {
        report::build_snapshot(&self.machines, &self.sessions, now)
    }

    pub fn machine(&self, machine_id: &MachineId) -> Option<&Machine> {
        self.machines.get(machine_id)
    }

    pub fn session(&self, session: &SessionName) -> Option<&[MachineId]> {
        self.sessions.roster(session)
    }

    /// Releases both registries and returns their sizes just before.
    pub fn shutdown(&mut self) -> ShutdownSummary {
        let summary = ShutdownSummary {
            machines: self.machines.len(),
            online: self.machines.online_count(),
            sessions: self.sessions.len(),
        };
        self.sessions.clear();
        self.machines.clear();
        summary
    }
}
