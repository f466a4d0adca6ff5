//! # IQL Core
//!
//! Shared value types and host contracts for the IQL delay-tolerant routing
//! stack.
//!
//! The routing and learning crates never own network state themselves. A
//! discrete-event host (a simulator, or a real contact layer) owns the
//! message buffer, the active links and the clock, and exposes them through
//! the traits in [`host`]. This crate defines those contracts so that the
//! same routing policy runs unchanged against the in-memory
//! [`MemoryHost`] used by tests and against any other host.
//!
//! ## Key Traits
//!
//! - [`NodeIdentity`]: Abstraction over node identification
//! - [`DtnMessage`]: Read-only view of a buffered message
//! - [`NodeHost`]: Clock + message buffer + contacts, as seen by one node
//!
//! ## Key Types
//!
//! - [`SimNodeId`]: Index-based identity for simulation and tests
//! - [`MessageId`]: Unique message identifier
//! - [`SimTime`]: Monotonic simulation time in seconds
//! - [`LinkId`]: Identity of one active connection
//! - [`TransferOutcome`]: Host answer to a transfer-start request

pub mod error;
pub mod host;
pub mod identity;
pub mod memory_host;
pub mod message;
pub mod time;

// Re-export main types
pub use error::*;
pub use host::*;
pub use identity::*;
pub use memory_host::*;
pub use message::*;
pub use time::*;
