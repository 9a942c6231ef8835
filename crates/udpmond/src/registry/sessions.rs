//! Session registry - groups machine identities under session names.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use udpmon_core::{MachineId, SessionName};

use super::machines::MachineRegistry;

/// Registry of session rosters keyed by session name.
///
/// A roster is the ordered, duplicate-free list of member identities from
/// the latest announcement for that session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionName, Vec<MachineId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns the current roster of a session.
    pub fn roster(&self, session: &SessionName) -> Option<&[MachineId]> {
        self.sessions.get(session).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionName, &[MachineId])> {
        self.sessions.iter().map(|(name, members)| (name, members.as_slice()))
    }

    /// Replaces the roster of `session` wholesale.
    ///
    /// Every listed machine is obtained (or pre-registered offline) through
    /// the machine registry and flagged `in_session`. Duplicates collapse to
    /// their first position. Members of the previous roster that are missing
    /// from the new one are not touched: they keep their `in_session` flag.
    ///
    /// Returns the number of members in the new roster.
    pub fn replace_roster(
        &mut self,
        machines: &mut MachineRegistry,
        session: &SessionName,
        members: &[MachineId],
        now: DateTime<Utc>,
    ) -> usize {
        let mut roster: Vec<MachineId> = Vec::with_capacity(members.len());
        for machine_id in members {
            if roster.contains(machine_id) {
                continue;
            }
            machines.upsert_as_roster_member(machine_id, session, now);
            roster.push(machine_id.clone());
        }

        let count = roster.len();
        match self.sessions.insert(session.clone(), roster) {
            Some(previous) => debug!(
                session = %session,
                previous_members = previous.len(),
                members = count,
                "Session roster replaced"
            ),
            None => info!(
                session = %session,
                members = count,
                total_sessions = self.sessions.len(),
                "Session created"
            ),
        }

        count
    }

    /// Removes a session and takes every member out of it.
    ///
    /// Returns the removed roster, or `None` if no such session exists.
    pub fn remove_session(
        &mut self,
        machines: &mut MachineRegistry,
        session: &SessionName,
    ) -> Option<Vec<MachineId>> {
        let roster = self.sessions.remove(session)?;

        for machine_id in &roster {
            machines.leave_session(machine_id);
        }

        info!(
            session = %session,
            members = roster.len(),
            remaining_sessions = self.sessions.len(),
            "Session removed"
        );

        Some(roster)
    }

    /// Drops every roster. Used on shutdown.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
