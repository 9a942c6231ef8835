//! Machine registry - owns the canonical state of every known machine.
//!
//! Machines are created on first mention and never deleted; they are only
//! marked offline. All machine mutation in the daemon goes through here.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use udpmon_core::{DomainError, DomainResult, Machine, MachineId, SessionName};

/// Whether an upsert created a new machine or refreshed a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// A machine that the sweep just marked offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedOutMachine {
    pub machine_id: MachineId,
    pub session: SessionName,
    pub was_master: bool,
}

/// Result of a timeout sweep over the machine registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Every machine marked offline by this sweep
    pub timed_out: Vec<TimedOutMachine>,
}

impl SweepOutcome {
    /// Machines among the timed out ones that were session masters.
    pub fn masters(&self) -> impl Iterator<Item = &TimedOutMachine> {
        self.timed_out.iter().filter(|m| m.was_master)
    }

    pub fn is_empty(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// Registry of machines keyed by identity.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: HashMap<MachineId, Machine>,
}

impl MachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Looks up a machine. Never creates one.
    pub fn get(&self, machine_id: &MachineId) -> Option<&Machine> {
        self.machines.get(machine_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MachineId, &Machine)> {
        self.machines.iter()
    }

    /// Number of machines currently online.
    pub fn online_count(&self) -> usize {
        self.machines.values().filter(|m| m.is_online()).count()
    }

    /// Registers or refreshes a machine that announced itself directly.
    ///
    /// A new machine starts online with unset status, in its session only
    /// if it is a master. A known machine gets a fresh heartbeat, the new
    /// role and session, loses its status and is forced back online. Its
    /// `in_session` flag is left as is.
    pub fn upsert_as_participant(
        &mut self,
        machine_id: &MachineId,
        is_master: bool,
        session: &SessionName,
        now: DateTime<Utc>,
    ) -> Upsert {
        match self.machines.get_mut(machine_id) {
            Some(machine) => {
                machine.record_heartbeat(now);
                machine.set_master(is_master);
                machine.set_session_name(session.clone());
                machine.invalidate_status();
                machine.mark_online();

                debug!(
                    machine_id = %machine_id,
                    session = %session,
                    is_master,
                    "Machine rejoined"
                );
                Upsert::Updated
            }
            None => {
                self.machines.insert(
                    machine_id.clone(),
                    Machine::participant(session.clone(), is_master, now),
                );

                info!(
                    machine_id = %machine_id,
                    session = %session,
                    is_master,
                    total_machines = self.machines.len(),
                    "Machine registered"
                );
                Upsert::Created
            }
        }
    }

    /// Places a machine in a session roster.
    ///
    /// An unknown machine is created offline and non-master under `session`,
    /// standing for a slave the master mentioned but that has not been heard
    /// from yet. A known machine keeps its online, master and heartbeat
    /// state. In both cases the machine ends up `in_session`.
    pub fn upsert_as_roster_member(
        &mut self,
        machine_id: &MachineId,
        session: &SessionName,
        now: DateTime<Utc>,
    ) -> Upsert {
        match self.machines.get_mut(machine_id) {
            Some(machine) => {
                machine.set_in_session(true);
                Upsert::Updated
            }
            None => {
                let mut machine = Machine::roster_member(session.clone(), now);
                machine.set_in_session(true);
                self.machines.insert(machine_id.clone(), machine);

                debug!(
                    machine_id = %machine_id,
                    session = %session,
                    "Pre-registered roster member"
                );
                Upsert::Created
            }
        }
    }

    /// Records a heartbeat with fresh status metrics.
    ///
    /// # Errors
    ///
    /// - `DomainError::MachineNotFound` if the machine was never announced.
    ///   Heartbeats never create machines.
    pub fn apply_heartbeat(
        &mut self,
        machine_id: &MachineId,
        version: f32,
        fps: i32,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or_else(|| DomainError::MachineNotFound {
                machine_id: machine_id.clone(),
            })?;

        machine.record_heartbeat(now);
        machine.update_status(version, fps);
        Ok(())
    }

    /// Clears the `in_session` flag of a machine, if known.
    pub fn leave_session(&mut self, machine_id: &MachineId) {
        if let Some(machine) = self.machines.get_mut(machine_id) {
            machine.set_in_session(false);
        }
    }

    /// Marks offline every online machine whose last heartbeat is older
    /// than `timeout`.
    ///
    /// Machines that are already offline are skipped, so running the sweep
    /// twice with the same `now` marks nothing the second time.
    pub fn sweep_timeouts(&mut self, now: DateTime<Utc>, timeout: Duration) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for (machine_id, machine) in self.machines.iter_mut() {
            if !machine.is_online() || !machine.is_heartbeat_expired(now, timeout) {
                continue;
            }

            if machine.mark_offline() {
                outcome.timed_out.push(TimedOutMachine {
                    machine_id: machine_id.clone(),
                    session: machine.session_name().clone(),
                    was_master: machine.is_master(),
                });
            }
        }

        outcome
    }

    /// Drops every machine. Used on shutdown.
    pub fn clear(&mut self) {
        self.machines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn id(s: &str) -> MachineId {
        MachineId::new(s)
    }

    fn session(s: &str) -> SessionName {
        SessionName::new(s)
    }

    #[test]
    fn test_participant_created_online() {
        let mut reg = MachineRegistry::new();
        let result = reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());
        assert_eq!(result, Upsert::Created);

        let m = reg.get(&id("m1")).unwrap();
        assert!(m.is_online());
        assert!(m.is_master());
        assert!(m.in_session());
        assert!(!m.has_valid_status());
    }

    #[test]
    fn test_participant_refresh_forces_online_and_invalidates() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), false, &session("roomA"), t0());
        reg.apply_heartbeat(&id("m1"), 1.0, 60, t0()).unwrap();
        reg.sweep_timeouts(t0() + secs(5), TIMEOUT);
        assert!(!reg.get(&id("m1")).unwrap().is_online());

        let result = reg.upsert_as_participant(&id("m1"), true, &session("roomB"), t0() + secs(6));
        assert_eq!(result, Upsert::Updated);

        let m = reg.get(&id("m1")).unwrap();
        assert!(m.is_online());
        assert!(m.is_master());
        assert_eq!(m.session_name().as_str(), "roomB");
        assert_eq!(m.last_heartbeat_at(), t0() + secs(6));
        assert!(!m.has_valid_status());
    }

    #[test]
    fn test_participant_refresh_discards_valid_status() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());
        reg.apply_heartbeat(&id("m1"), 2.0, 30, t0()).unwrap();
        assert!(reg.get(&id("m1")).unwrap().has_valid_status());

        reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());
        assert!(!reg.get(&id("m1")).unwrap().has_valid_status());
    }

    #[test]
    fn test_roster_member_unknown_created_offline_in_session() {
        let mut reg = MachineRegistry::new();
        let result = reg.upsert_as_roster_member(&id("m2"), &session("roomA"), t0());
        assert_eq!(result, Upsert::Created);

        let m = reg.get(&id("m2")).unwrap();
        assert!(!m.is_online());
        assert!(!m.is_master());
        assert!(m.in_session());
        assert_eq!(m.session_name().as_str(), "roomA");
    }

    #[test]
    fn test_roster_member_known_keeps_state() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m2"), false, &session("roomA"), t0());
        reg.apply_heartbeat(&id("m2"), 1.0, 60, t0()).unwrap();

        let result = reg.upsert_as_roster_member(&id("m2"), &session("roomZ"), t0() + secs(3));
        assert_eq!(result, Upsert::Updated);

        let m = reg.get(&id("m2")).unwrap();
        assert!(m.is_online());
        assert!(!m.is_master());
        assert!(m.in_session());
        assert!(m.has_valid_status());
        assert_eq!(m.last_heartbeat_at(), t0());
        assert_eq!(m.session_name().as_str(), "roomA");
    }

    #[test]
    fn test_heartbeat_unknown_machine() {
        let mut reg = MachineRegistry::new();
        let result = reg.apply_heartbeat(&id("ghost"), 1.0, 60, t0());
        assert_eq!(
            result,
            Err(DomainError::MachineNotFound {
                machine_id: id("ghost")
            })
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_heartbeat_updates_status_and_timestamp() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());
        reg.apply_heartbeat(&id("m1"), 2.0, 30, t0() + secs(1)).unwrap();

        let m = reg.get(&id("m1")).unwrap();
        assert_eq!(m.version(), 2.0);
        assert_eq!(m.fps(), 30);
        assert_eq!(m.last_heartbeat_at(), t0() + secs(1));
    }

    #[test]
    fn test_sweep_marks_expired_offline_and_reports_masters() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("master"), true, &session("roomA"), t0());
        reg.upsert_as_participant(&id("slave"), false, &session("roomA"), t0());
        reg.upsert_as_participant(&id("fresh"), false, &session("roomA"), t0() + secs(5));
        reg.apply_heartbeat(&id("master"), 2.0, 30, t0()).unwrap();

        let outcome = reg.sweep_timeouts(t0() + secs(5), TIMEOUT);
        assert_eq!(outcome.timed_out.len(), 2);

        let masters: Vec<_> = outcome.masters().collect();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].machine_id, id("master"));
        assert_eq!(masters[0].session, session("roomA"));

        let master = reg.get(&id("master")).unwrap();
        assert!(!master.is_online());
        assert!(!master.has_valid_status());
        assert!(reg.get(&id("fresh")).unwrap().is_online());
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());

        let first = reg.sweep_timeouts(t0() + secs(2), TIMEOUT);
        assert_eq!(first.timed_out.len(), 1);

        let second = reg.sweep_timeouts(t0() + secs(2), TIMEOUT);
        assert!(second.is_empty());
    }

    #[test]
    fn test_sweep_boundary_is_strictly_greater() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), false, &session("roomA"), t0());

        assert!(reg.sweep_timeouts(t0() + secs(1), TIMEOUT).is_empty());
        assert!(reg.get(&id("m1")).unwrap().is_online());
    }

    #[test]
    fn test_sweep_skips_offline_roster_members() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_roster_member(&id("m2"), &session("roomA"), t0());

        let outcome = reg.sweep_timeouts(t0() + secs(10), TIMEOUT);
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_leave_session() {
        let mut reg = MachineRegistry::new();
        reg.upsert_as_participant(&id("m1"), true, &session("roomA"), t0());
        reg.leave_session(&id("m1"));
        assert!(!reg.get(&id("m1")).unwrap().in_session());

        // Unknown ids are ignored
        reg.leave_session(&id("ghost"));
        assert_eq!(reg.len(), 1);
    }
}
