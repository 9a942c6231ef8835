//! Machine and session registries.
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────────┐
//! │     MachineRegistry      │◀───────│       SessionRegistry        │
//! │ HashMap<MachineId,       │ lookup │ HashMap<SessionName,         │
//! │         Machine>         │ by id  │         Vec<MachineId>>      │
//! └──────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! Sessions hold machine identities only, never references into machine
//! storage. Every session operation that touches a machine goes through
//! the machine registry.

mod machines;
mod sessions;

pub use machines::{MachineRegistry, SweepOutcome, TimedOutMachine, Upsert};
pub use sessions::SessionRegistry;
