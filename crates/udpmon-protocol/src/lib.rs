//! udpmon Protocol - Wire protocol spoken by monitored machines
//!
//! Every datagram is one self-contained line of pipe-delimited fields:
//!
//! ```text
//! SESSION2|<session>|<creator>|<member>*      master announces a session roster
//! MACHINE|<machine>|<session>                 slave asks to join a session
//! MACHINESTATUS|<machine>|<version>|<fps>     heartbeat with status metrics
//! ```

pub mod message;
pub mod parse;

pub use message::{Command, HEARTBEAT_TAG, MACHINE_JOIN_TAG, SEPARATOR, SESSION_ANNOUNCE_TAG};
pub use parse::{decode, split_fields, DecodeError};
