//! Build-time error taxonomy.
//!
//! Every error here is fatal to the build: no artifact, partial or
//! otherwise, is written once one is raised.

use std::path::PathBuf;

use thiserror::Error;

/// The input document is malformed or uses fields outside the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation: {message}")]
pub struct SchemaError {
    /// Parser diagnostic, including the offending location.
    pub message: String,
}

impl From<toml::de::Error> for SchemaError {
    fn from(err: toml::de::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Cross-reference and uniqueness failures found while resolving a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Two controllers share a numeric id.
    #[error("controller I2C{controller} is declared twice")]
    DuplicateController {
        /// Repeated controller id.
        controller: u8,
    },
    /// Two ports declare the same bus name.
    #[error("bus \"{name}\" is declared twice")]
    DuplicateBusName {
        /// Repeated bus name.
        name: String,
    },
    /// A device names a bus, controller, port, mux, or segment that does not exist.
    #[error("{device}: unknown {reference}")]
    UnknownBusReference {
        /// Device label.
        device: String,
        /// What could not be found.
        reference: String,
    },
    /// A device's bus cannot be determined unambiguously.
    #[error("{device}: {reason}")]
    AmbiguousBusReference {
        /// Device label.
        device: String,
        /// Why the reference is ambiguous.
        reason: &'static str,
    },
    /// A device names a mux without a segment or a segment without a mux.
    #[error("{device}: mux and segment must be given together")]
    IncompleteMuxReference {
        /// Device label.
        device: String,
    },
    /// Two devices of one driver kind share a name or reference designator.
    #[error("duplicate {field} \"{identifier}\" for device kind {kind}")]
    DuplicateDeviceIdentity {
        /// Driver kind.
        kind: String,
        /// `"name"` or `"refdes"`.
        field: &'static str,
        /// Repeated identifier.
        identifier: String,
    },
    /// Address is reserved by the I2C specification or wider than 7 bits.
    #[error("{what}: address {address:#04x} is not a usable 7-bit address")]
    InvalidAddress {
        /// Device or mux label.
        what: String,
        /// Offending address.
        address: u8,
    },
    /// Mux declares zero segments or more than its part provides.
    #[error("{mux}: {segments} segments declared, part supports 1 to {max}")]
    InvalidSegmentCount {
        /// Mux label.
        mux: String,
        /// Declared count.
        segments: u8,
        /// Part maximum.
        max: u8,
    },
    /// Two muxes on one port, or a mux and a device on its port, share an address.
    #[error("{what}: address {address:#04x} is already taken by a mux on I2C{controller} port {port}")]
    MuxAddressConflict {
        /// Label of the later claimant.
        what: String,
        /// Controller id.
        controller: u8,
        /// Port key.
        port: String,
        /// Contested address.
        address: u8,
    },
    /// Two devices share a full identity tuple and the later is not an alias.
    #[error("{device} has the same bus, route, and address as {other}")]
    AddressConflict {
        /// Later device label.
        device: String,
        /// Earlier device label.
        other: String,
    },
    /// `phases` does not have one entry per rail.
    #[error("{device}: {rails} rails but {phases} phase lists")]
    RailPhaseMismatch {
        /// Device label.
        device: String,
        /// Rail count.
        rails: usize,
        /// Phase list count.
        phases: usize,
    },
    /// A rail is claimed twice within one driver kind without multiphase flags.
    #[error("rail {rail} is claimed twice by device kind {kind}")]
    DuplicateRail {
        /// Driver kind.
        kind: String,
        /// Rail name.
        rail: String,
    },
    /// Pin number outside the GPIO port.
    #[error("I2C{controller} port {port}: pin {pin} does not exist on a 16-pin GPIO port")]
    InvalidPin {
        /// Controller id.
        controller: u8,
        /// Port key.
        port: String,
        /// Offending pin.
        pin: u8,
    },
    /// More items than an 8-bit runtime identifier can number.
    #[error("too many {what}: {count}")]
    TooMany {
        /// What overflowed.
        what: &'static str,
        /// How many were declared.
        count: usize,
    },
}

/// Failures while turning a resolved topology into an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// Writing into the in-memory artifact failed.
    #[error("formatting failed")]
    Fmt(#[from] std::fmt::Error),
    /// The topology violated an invariant the resolver should have enforced.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
    /// Target disposition needs exactly one target controller.
    #[error("found {found} target I2C controller(s); expected exactly one")]
    TargetCount {
        /// Target controllers found.
        found: usize,
    },
    /// Initiator and target setup cannot share one artifact.
    #[error("initiator and target dispositions cannot be emitted together")]
    ConflictingDispositions,
    /// A validation arm names a check with no runtime function registered.
    #[error("no check registered for {kind} (artifact calls {path})")]
    UnregisteredCheck {
        /// Driver kind of the device.
        kind: String,
        /// Check path the rendered artifact calls.
        path: String,
    },
}

/// Any failure of the end-to-end build-script pipeline.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Document failed to parse.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Document failed to resolve.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// Artifact failed to render.
    #[error(transparent)]
    Emit(#[from] EmitError),
    /// A required environment variable is unset.
    #[error("environment variable {var} is not set")]
    Env {
        /// Variable name.
        var: &'static str,
    },
    /// Reading the document or writing the artifact failed.
    #[error("{}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
