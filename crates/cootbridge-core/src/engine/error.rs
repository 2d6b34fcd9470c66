use thiserror::Error;

use super::module::ModuleKind;
use crate::core::native::NativeError;
use crate::core::vfs::FsError;

/// A named engine operation rejected its arguments or its input.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Engine operation '{operation}' failed: {message}")]
pub struct EngineFault {
    pub operation: String,
    pub message: String,
}

impl EngineFault {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolFault {
    #[error("Unrecognized message kind '{0}'")]
    UnknownMessage(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown return type '{0}'")]
    UnknownReturnType(String),

    #[error("Invalid argument for '{context}': {reason}")]
    InvalidArgument { context: String, reason: String },

    #[error("Malformed '{kind}' message: {reason}")]
    Malformed { kind: String, reason: String },
}

impl ProtocolFault {
    pub fn invalid_argument(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolFault::InvalidArgument {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Every failure a single command can end in.
///
/// None of these terminate the worker: the command router turns each one into an
/// `Exception` response for the command that caused it.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Staging failed for '{path}': {source}")]
    Staging {
        path: String,
        #[source]
        source: FsError,
    },

    #[error(transparent)]
    Engine(#[from] EngineFault),

    #[error(transparent)]
    Protocol(#[from] ProtocolFault),

    #[error("Unexpected native result shape: {0}")]
    Native(#[from] NativeError),

    #[error("Module '{module}' is not available: {reason}")]
    ModuleUnavailable { module: ModuleKind, reason: String },

    #[error("Registry validation failed: {0}")]
    Registry(String),
}

impl BridgeError {
    pub fn staging(path: impl Into<String>, source: FsError) -> Self {
        BridgeError::Staging {
            path: path.into(),
            source,
        }
    }
}
