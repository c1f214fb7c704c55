//! Error types for the impex transcoding and pipeline engine.
//!
//! One error enum per subsystem:
//!
//! - [`DecodeError`] - tabular to nested-record decoding
//! - [`EncodeError`] - nested-record to tabular encoding
//! - [`ModelError`] - host model layer failures
//! - [`CommandError`] - command init/process failures
//! - [`ScriptError`] - impex script parsing and chain construction
//! - [`ImpexError`] - top-level orchestration errors
//!
//! Conversion is automatic via `From` implementations, so `?` works
//! across subsystem boundaries.

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors while decoding CSV rows into nested records.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Underlying CSV reader failure.
    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to read input bytes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Encode Errors
// =============================================================================

/// Errors while encoding nested records into CSV rows.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Underlying CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to write output bytes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Model Errors
// =============================================================================

/// Errors from the host-facing model layer.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model registered under the given name.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// Model lacks a capability a command requires.
    #[error("model '{model}' does not support {capability}")]
    MissingCapability { model: String, capability: String },

    /// No stored record with the given identifier.
    #[error("no record with id '{0}'")]
    NotFound(String),

    /// Attribute could not be applied.
    #[error("attribute '{attribute}': {message}")]
    Attribute { attribute: String, message: String },

    /// Persistence failure reported by the host backend.
    #[error("storage error: {0}")]
    Storage(String),
}

// =============================================================================
// Command Errors
// =============================================================================

/// Errors raised by pipeline commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Model layer failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A required command argument was not supplied.
    #[error("{command}: missing required argument '{argument}'")]
    MissingArgument { command: String, argument: String },

    /// Command received an input it cannot work with.
    #[error("{command}: {message}")]
    BadInput { command: String, message: String },

    /// Media content could not be fetched or read.
    #[error("media '{uri}': {message}")]
    Media { uri: String, message: String },
}

// =============================================================================
// Script Errors
// =============================================================================

/// Errors while parsing an impex script or building a command chain.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Command name not present in the registry.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// A script line contained no runnable commands.
    #[error("no commands for CSV data processing")]
    EmptyChain,

    /// A command name is already registered.
    #[error("command '{0}' already registered")]
    DuplicateCommand(String),

    /// Unregistering a command that was never registered.
    #[error("command '{0}' is not registered")]
    NotRegistered(String),

    /// Chain construction aborted by a command's init.
    #[error("command init failed: {0}")]
    Init(#[from] CommandError),
}

// =============================================================================
// Top-level Errors
// =============================================================================

/// Top-level import/export orchestration errors.
#[derive(Debug, Error)]
pub enum ImpexError {
    /// Decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Encoding error.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Script or chain construction error.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// Model layer error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// One or more records failed inside a data block.
    #[error("{0} error(s) while processing")]
    BlockErrors(usize),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for encode operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for command operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Result type for top-level impex operations.
pub type ImpexResult<T> = Result<T, ImpexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ModelError -> CommandError -> ScriptError -> ImpexError
        let model_err = ModelError::UnknownModel("product".into());
        let cmd_err: CommandError = model_err.into();
        let script_err: ScriptError = cmd_err.into();
        let impex_err: ImpexError = script_err.into();
        assert!(impex_err.to_string().contains("product"));
    }

    #[test]
    fn test_block_errors_format() {
        let err = ImpexError::BlockErrors(3);
        assert_eq!(err.to_string(), "3 error(s) while processing");
    }

    #[test]
    fn test_media_error_format() {
        let err = CommandError::Media {
            uri: "http://cdn.example.com/a.png".into(),
            message: "timeout".into(),
        };
        assert!(err.to_string().contains("a.png"));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_missing_capability_format() {
        let err = ModelError::MissingCapability {
            model: "page".into(),
            capability: "media".into(),
        };
        assert!(err.to_string().contains("page"));
        assert!(err.to_string().contains("media"));
    }
}
