//! The engine's native object graph and its ownership discipline.
//!
//! Engine results are trees of [`NativeNode`]s. Inspecting any node requires a handle
//! registered in the engine's [`NativeHeap`]; the [`Owned`] guard is the only way to hold
//! one, and it returns the handle to the heap exactly once.

mod error;
mod handle;
mod heap;
mod node;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::NativeError;
pub use handle::Owned;
pub use heap::{HandleId, HeapEvent, HeapStats, NativeHeap};
pub use node::{NativeNode, ObjectBuilder};
