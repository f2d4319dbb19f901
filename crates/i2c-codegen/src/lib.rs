//! Build-time compiler from I2C topology documents to runtime access tables.
//!
//! A build script hands a TOML topology document and a set of
//! [`Disposition`]s to [`codegen_from_env`]; the document is parsed into a
//! [`Document`], cross-checked into a [`ResolvedTopology`], and emitted as a
//! Rust module the task then `include!`s.
//!
//! ```no_run
//! use i2c_codegen::{codegen_from_env, Disposition, EmitOptions};
//!
//! fn main() -> Result<(), i2c_codegen::CodegenError> {
//!     codegen_from_env(
//!         &[Disposition::Devices, Disposition::Sensors],
//!         &EmitOptions::default(),
//!     )?;
//!     Ok(())
//! }
//! ```

use clap as _;
use env_logger as _;
#[cfg(test)]
use proptest as _;

/// Build-script pipeline and environment entry point.
pub mod codegen;
pub use codegen::{codegen, codegen_from_env, generate, ARTIFACT_FILE, CONFIG_ENV};

/// Typed topology document and its parser.
pub mod document;
pub use document::{parse_document, Document};

/// Artifact IR, Rust renderer, and runtime descriptor builder.
pub mod emit;
pub use emit::runtime::RuntimeTables;
pub use emit::{emit, Artifact, Disposition, EmitOptions};

/// Build-time error taxonomy.
pub mod errors;
pub use errors::{CodegenError, EmitError, SchemaError, TopologyError};

/// Cross-reference resolution.
pub mod resolve;
pub use resolve::resolve;

/// Resolved topology model.
pub mod topology;
pub use topology::ResolvedTopology;
