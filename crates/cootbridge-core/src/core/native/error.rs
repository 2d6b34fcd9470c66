use thiserror::Error;

/// Errors raised while walking the native object graph.
///
/// These describe a mismatch between the shape a materializer expects and the shape the
/// engine actually returned. They never leave a handle behind: every guard that was live
/// when the error was raised is released as the error propagates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NativeError {
    /// The handle is not (or is no longer) registered in the heap.
    #[error("Stale native handle for class '{class}'")]
    StaleHandle { class: String },

    #[error("Native '{class}' has no field named '{field}'")]
    MissingField { class: String, field: String },

    #[error("Expected {expected} but native value is '{found}'")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Index {index} is out of range for native '{class}' of size {len}")]
    IndexOutOfRange {
        class: String,
        index: usize,
        len: usize,
    },

    #[error("Key of class '{class}' is not present in the native map")]
    KeyNotFound { class: String },

    #[error("Value array for '{field}' has {found} components, expected {expected}")]
    Arity {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}
