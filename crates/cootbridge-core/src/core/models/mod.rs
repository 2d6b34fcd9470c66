//! # Core Models Module
//!
//! This module contains the plain, ownership-independent data that leaves the worker.
//!
//! ## Overview
//!
//! Everything produced by the result materializers is expressed with the types defined
//! here. None of them refer back to engine memory, so they can be serialized into an
//! outbound message and handed to the host without any further bookkeeping. These models
//! are designed to:
//!
//! - **Mirror the host's wire vocabulary** - Field names serialize exactly as the host's
//!   viewer code reads them
//! - **Stay renderer-ready** - Geometry is flattened into contiguous index and float buffers
//! - **Check their own invariants** - Geometry buffers validate index ranges and per-element
//!   component counts before they are emitted
//!
//! ## Key Components
//!
//! - [`records`] - Residue, atom, validation, symmetry and other tabular records
//! - [`geometry`] - Flat geometry buffers, instancing data and layered mesh results

pub mod geometry;
pub mod records;
