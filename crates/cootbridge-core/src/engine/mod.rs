//! # Engine Module
//!
//! This module implements the worker side of the command bridge: everything that touches a
//! loaded engine module, from staging host payloads into its filesystem to turning its
//! native result trees into plain records and flat geometry buffers.
//!
//! ## Overview
//!
//! A worker owns one [`context::WorkerContext`] for its whole lifetime. The context holds the
//! startup configuration and one engine instance per [`module::ModuleKind`]. Commands reach
//! the engine through the [`router::CommandRouter`], which either forwards them directly or
//! runs a registered shim, and then hands the native result to the materializer named by the
//! command's return-type tag.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Startup settings and their validating builder
//! - **Modules** ([`module`]) - The engine seam and the loader that constructs engines
//! - **Context** ([`context`]) - Per-worker module slots and startup configuration
//! - **Staging** ([`staging`]) - Scoped guards for files placed into the engine filesystem
//! - **Shims** ([`shims`]) - Composite and payload-staging operations keyed by name
//! - **Materialization** ([`materialize`]) - Return-type tags and the conversions behind them
//! - **Routing** ([`router`]) - Command execution and the worker-level operations
//! - **In-memory engine** ([`memory`]) - A self-contained engine for hosts and tests
//! - **Error Handling** ([`error`]) - Engine, protocol and bridge error types
//!
//! ## Key Capabilities
//!
//! - **Scoped native ownership** so every acquired engine object is released exactly once
//! - **Guaranteed staging cleanup** on success and on every error path
//! - **Table-driven dispatch** with registries validated before the first command
//! - **Per-module availability** so a failed companion module never stops the worker

pub mod config;
pub mod context;
pub mod error;
pub mod materialize;
pub mod memory;
pub mod module;
pub mod router;
pub mod shims;
pub mod staging;
