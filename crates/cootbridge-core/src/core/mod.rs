//! # Core Module
//!
//! This module provides the building blocks shared by every part of the bridge: the
//! representation of the engine's native object graph, the virtual filesystem the engine
//! reads from and writes to, and the plain data that leaves the worker.
//!
//! ## Architecture
//!
//! - **Native Object Graph** ([`native`]) - Engine-allocated nodes, the handle arena that
//!   tracks every live reference, and the [`native::Owned`] guard that releases a handle
//!   exactly once
//! - **Virtual Filesystem** ([`vfs`]) - The engine's private file namespace used for
//!   staging payloads into path-based operations
//! - **Transfer Models** ([`models`]) - Plain records and flat geometry buffers with no
//!   ties to engine memory
//! - **Utilities** ([`utils`]) - Collision-resistant staging names
//!
//! ## Key Capabilities
//!
//! - **Leak-free traversal** of arbitrarily nested native results
//! - **Acquire/release accounting** with an optional ordered journal for verification
//! - **Serializable output types** ready for structured message passing

pub mod models;
pub mod native;
pub mod utils;
pub mod vfs;
