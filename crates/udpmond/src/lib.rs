//! udpmon Daemon - machine registry, session registry and UDP intake
//!
//! This crate provides the monitoring infrastructure:
//! - `registry` - Machine and session registries (canonical state)
//! - `liveness` - Heartbeat timeout sweep and session teardown cascade
//! - `report` - Point-in-time status snapshots and the periodic report task
//! - `engine` - Monitor engine and the actor that owns it
//! - `transport` - UDP sockets behind a readiness-polling interface
//! - `intake` - Loop feeding received datagrams into the engine
//! - `render` - Console and JSON presentation of snapshots
//! - `config` - Daemon configuration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  datagrams  ┌─────────────────────────────────────┐
//! │ UdpTransport │────────────▶│            EngineActor              │
//! │ (intake loop)│             │  ┌───────────────┐ ┌─────────────┐  │
//! └──────────────┘             │  │MachineRegistry│ │SessionRegis.│  │
//!                              │  └───────────────┘ └─────────────┘  │
//! ┌──────────────┐    Tick     │          MonitorEngine              │
//! │  sweep task  │────────────▶│                                     │
//! └──────────────┘             └──────────────────┬──────────────────┘
//!                                                 │ StatusSnapshot
//!                                       ┌─────────▼─────────┐
//!                                       │    report task    │──▶ Render
//!                                       └───────────────────┘
//! ```
//!
//! All registry mutation happens on the actor task, so the two registries
//! share one mutual-exclusion domain without locks.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod engine;
pub mod intake;
pub mod liveness;
pub mod registry;
pub mod render;
pub mod report;
pub mod transport;
