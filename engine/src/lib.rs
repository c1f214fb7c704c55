//! # Impex - CSV import/export engine for e-commerce data
//!
//! Impex moves structured store data (products with options, CMS pages,
//! blog posts) in and out of flat CSV files, and runs uploaded "impex
//! scripts" whose rows carry both commands and data.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Decoder   │────▶│  Commands   │────▶│   Models    │
//! │ (any enc.)  │     │ (col specs) │     │ (pipeline)  │     │ (storage)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Column headers are small specs (`product.name`, `^options.color`,
//! `@sku`, `?price <float>`) that drive the flat-to-nested mapping; the
//! encoder inverts it for export.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use impex::command::CommandRegistry;
//! use impex::model::ModelRegistry;
//! use impex::script::ScriptRunner;
//!
//! let models = ModelRegistry::new();
//! let commands = CommandRegistry::with_builtins();
//! let runner = ScriptRunner::new(&commands, &models);
//! let summary = runner.run_script(std::fs::File::open("import.csv")?)?;
//! println!("{} record(s) imported", summary.records);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`record`] - Nested record values, dotted paths, type coercion
//! - [`column`] - Column spec parsing (flags, paths, memo directives)
//! - [`decode`] - Tabular to nested-record decoding
//! - [`encode`] - Nested-record to tabular encoding
//! - [`model`] - Host model traits and registry
//! - [`command`] - Import commands (INSERT, UPDATE, MEDIA, ...)
//! - [`script`] - Impex script execution
//! - [`input`] - Upload encoding detection
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod record;

// Transcoding
pub mod column;
pub mod decode;
pub mod encode;

// Host model layer
pub mod model;

// Pipeline
pub mod command;
pub mod script;

// Uploads
pub mod input;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CommandError, DecodeError, EncodeError, ImpexError, ImpexResult, ModelError, ScriptError,
};

// =============================================================================
// Re-exports - Records and columns
// =============================================================================

pub use column::{ColumnDescriptor, ColumnFlag, MemoDirective, MemoKind, PathSegment};
pub use record::{Record, TypeHint};

// =============================================================================
// Re-exports - Transcoding
// =============================================================================

pub use decode::{decode_all, decode_block, MemoTable, ValueTransform};
pub use encode::{encode_records, encode_to_string};

// =============================================================================
// Re-exports - Model layer
// =============================================================================

pub use model::{
    memory::MemoryModel, AttributeInfo, Capabilities, Instance, MediaHolder, Model, ModelRegistry,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use command::{CommandRegistry, Exchange, ExchangeValue, ImportCommand, SharedInstance};
pub use script::{ScriptRunner, ScriptSummary};

// =============================================================================
// Re-exports - Uploads
// =============================================================================

pub use input::{decode_content, detect_encoding, normalize};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ImportResponse, ImportStatus, ModelInfo};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
