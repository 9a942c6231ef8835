//! Read-only report types produced from registry state.
//!
//! These carry data only. Turning them into text is the job of a renderer.

use crate::{Machine, MachineId, MachineStatus, Role, SessionName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short description of where a machine stands in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    /// In a session and reporting a valid status.
    InSession,
    /// In a session but no heartbeat metrics yet.
    JustJoined,
    /// Not yet admitted to a session roster.
    WaitingToJoin,
}

impl Qualifier {
    pub fn for_machine(machine: &Machine) -> Self {
        match (machine.in_session(), machine.has_valid_status()) {
            (false, _) => Self::WaitingToJoin,
            (true, false) => Self::JustJoined,
            (true, true) => Self::InSession,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InSession => "in",
            Self::JustJoined => "just joined",
            Self::WaitingToJoin => "waiting to join",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineReport {
    pub id: MachineId,
    pub session: SessionName,

    /// Present only while the machine is in a session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    pub qualifier: Qualifier,

    /// Present only when both version and fps are valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MachineStatus>,
}

impl MachineReport {
    pub fn from_machine(id: &MachineId, machine: &Machine) -> Self {
        Self {
            id: id.clone(),
            session: machine.session_name().clone(),
            role: machine.in_session().then(|| machine.role()),
            qualifier: Qualifier::for_machine(machine),
            status: machine.has_valid_status().then(|| machine.status()),
        }
    }
}

/// A session and its current roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub name: SessionName,
    pub members: Vec<MachineId>,
}

/// Point-in-time view of all online machines and live sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub taken_at: DateTime<Utc>,
    pub machines: Vec<MachineReport>,
    pub sessions: Vec<SessionReport>,
}

impl StatusSnapshot {
    pub fn machine(&self, id: &str) -> Option<&MachineReport> {
        self.machines.iter().find(|m| m.id.as_str() == id)
    }

    pub fn session(&self, name: &str) -> Option<&SessionReport> {
        self.sessions.iter().find(|s| s.name.as_str() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}
