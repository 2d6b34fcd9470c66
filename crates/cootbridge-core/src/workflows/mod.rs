//! # Workflows Module
//!
//! This module provides the public entry points of the bridge: the wire protocol spoken
//! between a host and its worker, and the worker thread itself.
//!
//! ## Overview
//!
//! A host spawns a [`worker::Worker`], posts JSON messages to it and reads replies back in
//! the same order. Inside the worker, a [`protocol::Dispatcher`] decodes each message,
//! routes engine commands and worker-level requests, and builds exactly one reply per
//! message, including for messages it cannot decode.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]) - Inbound message kinds, reply envelopes, command lists and
//!   per-command diagnostics
//! - **Worker** ([`worker`]) - The dedicated engine thread and its host-side handle

pub mod protocol;
pub mod worker;
