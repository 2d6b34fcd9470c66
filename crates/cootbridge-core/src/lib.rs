//! # cootbridge Core Library
//!
//! A worker-isolated command bridge that lets a UI thread drive a stateful
//! molecular-modeling and crystallography engine, and receive back render-ready geometry
//! and structured validation data.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture so that the ownership rules of
//! the engine's native object graph are enforced in exactly one place.
//!
//! - **[`core`]: The Foundation.** The native heap and its single-owner handle guard,
//!   the engine's private virtual filesystem, and the plain, ownership-independent
//!   record and geometry types that cross the worker boundary.
//!
//! - **[`engine`]: The Logic Core.** The engine surface, the staging adapter for
//!   path-based operations, the result materializers and geometry assembler, the
//!   command router, and the worker context that owns the engine for its lifetime.
//!
//! - **[`workflows`]: The Public API.** The inbound/outbound wire protocol and the
//!   worker thread that processes host messages strictly one at a time.

pub mod core;
pub mod engine;
pub mod workflows;
