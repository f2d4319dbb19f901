//! Artifact emission.
//!
//! [`ir::build`] turns a resolved topology and a set of dispositions into an
//! [`ir::ArtifactIr`]; [`rust::render`] writes it out as Rust source and
//! [`runtime::RuntimeTables`] builds the same tables as live runtime values.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::errors::EmitError;
use crate::topology::ResolvedTopology;

pub mod ident;
pub mod ir;
pub mod runtime;
pub mod rust;

/// Category of generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Disposition {
    /// Controller, pin, port, and mux descriptors for the bus master.
    Initiator,
    /// Controller, pin, and port descriptors for the single target controller.
    Target,
    /// Device handle accessors.
    Devices,
    /// Sensor-id tables.
    Sensors,
    /// Per-device validation routine.
    Validation,
}

impl Disposition {
    /// Every disposition, in emission order.
    pub const ALL: [Self; 5] = [
        Self::Initiator,
        Self::Target,
        Self::Devices,
        Self::Sensors,
        Self::Validation,
    ];

    /// Name used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Target => "target",
            Self::Devices => "devices",
            Self::Sensors => "sensors",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown disposition `{s}`"))
    }
}

/// Whether the artifact is for a full application or a lone task build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Artifact {
    /// Real tables from the topology.
    #[default]
    Dist,
    /// One mock device and one mock port in place of the real tables.
    Standalone,
}

/// Emission settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Full or standalone artifact.
    pub artifact: Artifact,
    /// Name of the generated module.
    pub module: String,
    /// Path to the runtime crate from the including crate.
    pub core_path: String,
    /// Extra driver-specific checks: driver kind to function path.
    pub checks: IndexMap<String, String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            artifact: Artifact::Dist,
            module: "i2c_config".to_string(),
            core_path: "i2c_core".to_string(),
            checks: IndexMap::new(),
        }
    }
}

/// Renders the Rust artifact for `dispositions`.
///
/// Output depends only on the inputs; disposition order and repeats do not
/// matter.
///
/// # Errors
///
/// Returns [`EmitError`] for conflicting dispositions, a bad target
/// controller count, identifier collisions, and formatting failures.
pub fn emit(
    topology: &ResolvedTopology,
    dispositions: &[Disposition],
    options: &EmitOptions,
) -> Result<String, EmitError> {
    let ir = ir::build(topology, dispositions, options)?;
    rust::render(&ir)
}
