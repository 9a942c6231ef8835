//! Machine domain entity and value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identity of a monitored machine.
///
/// Supplied by the machine itself in every message. Case-sensitive and
/// never generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MachineId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MachineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a session announced by a master machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Status Metrics
// ============================================================================

/// Last metrics reported by a machine heartbeat.
///
/// Both fields carry an "unset" sentinel. They are always reset together,
/// so a status is either fully valid or fully unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub version: f32,
    pub fps: i32,
}

impl MachineStatus {
    /// Sentinel for a version that has not been reported.
    pub const UNSET_VERSION: f32 = 0.0;

    /// Sentinel for an fps value that has not been reported.
    pub const UNSET_FPS: i32 = -1;

    /// Status with both sentinels set.
    pub const UNSET: MachineStatus = MachineStatus {
        version: Self::UNSET_VERSION,
        fps: Self::UNSET_FPS,
    };

    pub const fn new(version: f32, fps: i32) -> Self {
        Self { version, fps }
    }

    /// A status is valid only when neither field holds its sentinel.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.version != Self::UNSET_VERSION && self.fps != Self::UNSET_FPS
    }
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self::UNSET
    }
}

/// Role a machine plays within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub fn from_is_master(is_master: bool) -> Self {
        if is_master {
            Self::Master
        } else {
            Self::Slave
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Slave => "SLAVE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Machine Entity
// ============================================================================

/// Canonical state of one machine identity.
///
/// # State machine
///
/// ```text
///            mark_online()                 mark_offline()
///   offline ──────────────▶ online ──────────────────────▶ offline
///                                   (status reset to UNSET)
/// ```
///
/// Going offline always discards the last-known status. Coming back online
/// does not restore it; a fresh heartbeat is required.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    last_heartbeat_at: DateTime<Utc>,
    session_name: SessionName,
    status: MachineStatus,
    is_master: bool,
    in_session: bool,
    is_online: bool,
}

impl Machine {
    /// Creates a machine that announced itself directly (join or session announce).
    ///
    /// Masters are in their session immediately; slaves wait for a roster.
    pub fn participant(session_name: SessionName, is_master: bool, now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat_at: now,
            session_name,
            status: MachineStatus::UNSET,
            is_master,
            in_session: is_master,
            is_online: true,
        }
    }

    /// Creates a machine that so far is only known from a master's roster.
    ///
    /// It stays offline until it sends its own join message.
    pub fn roster_member(session_name: SessionName, now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat_at: now,
            session_name,
            status: MachineStatus::UNSET,
            is_master: false,
            in_session: false,
            is_online: false,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn last_heartbeat_at(&self) -> DateTime<Utc> {
        self.last_heartbeat_at
    }

    pub fn session_name(&self) -> &SessionName {
        &self.session_name
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn version(&self) -> f32 {
        self.status.version
    }

    pub fn fps(&self) -> i32 {
        self.status.fps
    }

    pub fn is_master(&self) -> bool {
        self.is_master
    }

    pub fn role(&self) -> Role {
        Role::from_is_master(self.is_master)
    }

    pub fn in_session(&self) -> bool {
        self.in_session
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    #[must_use]
    pub fn has_valid_status(&self) -> bool {
        self.status.is_valid()
    }

    /// Returns true if more than `timeout` has passed since the last heartbeat.
    ///
    /// A heartbeat stamped in the future (clock skew) never counts as expired.
    pub fn is_heartbeat_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat_at)
            .to_std()
            .map(|elapsed| elapsed > timeout)
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    pub fn record_heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat_at = now;
    }

    pub fn set_master(&mut self, is_master: bool) {
        self.is_master = is_master;
    }

    pub fn set_session_name(&mut self, session_name: SessionName) {
        self.session_name = session_name;
    }

    pub fn set_in_session(&mut self, in_session: bool) {
        self.in_session = in_session;
    }

    pub fn update_status(&mut self, version: f32, fps: i32) {
        self.status = MachineStatus::new(version, fps);
    }

    /// Resets version and fps to their sentinels together.
    pub fn invalidate_status(&mut self) {
        self.status = MachineStatus::UNSET;
    }

    /// Marks the machine online. Status is left untouched.
    pub fn mark_online(&mut self) {
        self.is_online = true;
    }

    /// Marks the machine offline and discards its status.
    ///
    /// Returns `true` if the machine was online before the call, `false` if
    /// it was already offline (in which case nothing changes).
    pub fn mark_offline(&mut self) -> bool {
        if !self.is_online {
            return false;
        }
        self.is_online = false;
        self.invalidate_status();
        true
    }
}
