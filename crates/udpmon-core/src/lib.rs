//! udpmon Core - Shared types for machine and session monitoring
//!
//! This crate provides the domain types shared between the wire
//! decoder (udpmon-protocol) and the monitor daemon (udpmond).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod machine;
pub mod view;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use machine::{Machine, MachineId, MachineStatus, Role, SessionName};
pub use view::{MachineReport, Qualifier, SessionReport, StatusSnapshot};
