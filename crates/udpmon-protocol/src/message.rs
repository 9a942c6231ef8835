//! Command types carried by the wire protocol.

use udpmon_core::{MachineId, SessionName};

/// Field separator.
pub const SEPARATOR: char = '|';

/// Tag of a master's session announcement.
pub const SESSION_ANNOUNCE_TAG: &str = "SESSION2";

/// Tag of a slave's join request.
pub const MACHINE_JOIN_TAG: &str = "MACHINE";

/// Tag of a status heartbeat.
pub const HEARTBEAT_TAG: &str = "MACHINESTATUS";

/// A decoded inbound message.
///
/// Closed set: the engine matches on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `SESSION2|<session>|<creator>|<member>*`
    ///
    /// `members` is every field from the creator onwards, so the creator
    /// is always `members[0]`.
    SessionAnnounce {
        session: SessionName,
        creator: MachineId,
        members: Vec<MachineId>,
    },

    /// `MACHINE|<machine>|<session>`
    MachineJoin {
        machine_id: MachineId,
        session: SessionName,
    },

    /// `MACHINESTATUS|<machine>|<version>|<fps>`
    Heartbeat {
        machine_id: MachineId,
        version: f32,
        fps: i32,
    },

    /// Unknown tag, or a known tag with the wrong number of fields.
    Unrecognized { tag: String, field_count: usize },
}

impl Command {
    /// Builds a session announcement whose roster starts with the creator.
    pub fn session_announce(
        session: impl Into<SessionName>,
        creator: impl Into<MachineId>,
        others: impl IntoIterator<Item = MachineId>,
    ) -> Self {
        let creator = creator.into();
        let mut members = vec![creator.clone()];
        members.extend(others);
        Self::SessionAnnounce {
            session: session.into(),
            creator,
            members,
        }
    }

    pub fn machine_join(machine_id: impl Into<MachineId>, session: impl Into<SessionName>) -> Self {
        Self::MachineJoin {
            machine_id: machine_id.into(),
            session: session.into(),
        }
    }

    pub fn heartbeat(machine_id: impl Into<MachineId>, version: f32, fps: i32) -> Self {
        Self::Heartbeat {
            machine_id: machine_id.into(),
            version,
            fps,
        }
    }

    /// Short name of the command kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionAnnounce { .. } => "session_announce",
            Self::MachineJoin { .. } => "machine_join",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Encodes the command as a wire line.
    ///
    /// Returns `None` for `Unrecognized`, which has no wire form.
    pub fn encode(&self) -> Option<String> {
        let sep = SEPARATOR.to_string();
        match self {
            Self::SessionAnnounce {
                session, members, ..
            } => {
                let mut fields = vec![SESSION_ANNOUNCE_TAG, session.as_str()];
                fields.extend(members.iter().map(MachineId::as_str));
                Some(fields.join(&sep))
            }
            Self::MachineJoin {
                machine_id,
                session,
            } => Some([MACHINE_JOIN_TAG, machine_id.as_str(), session.as_str()].join(&sep)),
            Self::Heartbeat {
                machine_id,
                version,
                fps,
            } => Some(format!(
                "{HEARTBEAT_TAG}{SEPARATOR}{machine_id}{SEPARATOR}{version:?}{SEPARATOR}{fps}"
            )),
            Self::Unrecognized { .. } => None,
        }
    }
}
