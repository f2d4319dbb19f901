//! Typed form of a parsed topology document.
//!
//! The schema is closed: every table rejects unknown keys, so a misspelled
//! field can never silently fall back to a default.

use i2c_core::{MuxDriverKind, SensorKind};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::errors::SchemaError;

/// Root of a topology document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// Controllers, in declaration order.
    #[serde(default)]
    pub controllers: Vec<ControllerDecl>,
    /// Devices, in declaration order.
    #[serde(default)]
    pub devices: Vec<DeviceDecl>,
}

/// One `[[controllers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerDecl {
    /// Peripheral number.
    pub controller: u8,
    /// Controller operates as a target rather than an initiator.
    #[serde(default)]
    pub target: bool,
    /// Ports keyed by port name; declaration order fixes the port index.
    pub ports: IndexMap<String, PortDecl>,
}

/// One pin mapping of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortDecl {
    /// Bus name devices may refer to.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Clock and data pin sets.
    pub pins: Vec<PinSetDecl>,
    /// Multiplexers hanging off this port.
    #[serde(default)]
    pub muxes: Vec<MuxDecl>,
}

/// Pins on one GPIO port muxed to one alternate function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinSetDecl {
    /// GPIO port; defaults to the I2C port's key.
    pub gpio_port: Option<String>,
    /// Pin numbers within the GPIO port.
    pub pins: Vec<u8>,
    /// Alternate function number.
    pub af: u8,
}

/// One multiplexer on a port.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MuxDecl {
    /// Part family.
    pub driver: MuxDriverKind,
    /// 7-bit address.
    pub address: u8,
    /// Wired segment count; defaults to what the part provides.
    pub segments: Option<u8>,
    /// Active-low reset pin.
    pub nreset: Option<PinSetDecl>,
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDecl {
    /// Driver kind, e.g. `tmp117`.
    pub device: String,
    /// Declared names; a single string or a list.
    #[serde(default, rename = "name", deserialize_with = "one_or_many")]
    pub names: Vec<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Named bus, instead of `controller`.
    pub bus: Option<String>,
    /// Controller number, instead of `bus`.
    pub controller: Option<u8>,
    /// Port key on `controller`.
    pub port: Option<String>,
    /// Device address.
    pub address: u8,
    /// 1-based index of the mux within the port.
    pub mux: Option<u8>,
    /// 1-based segment number on that mux.
    pub segment: Option<u8>,
    /// Reference designator.
    pub refdes: Option<String>,
    /// Device may be absent.
    #[serde(default)]
    pub removable: bool,
    /// Intentionally shares an identity tuple with an earlier device.
    #[serde(default)]
    pub alias: bool,
    /// Sensor counts by kind.
    #[serde(default)]
    pub sensors: SensorDecl,
    /// Power-rail metadata.
    pub power: Option<PowerDecl>,
}

/// Number of sensors of each kind a device exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorDecl {
    /// Temperature sensors.
    pub temperature: u32,
    /// Output power sensors.
    pub power: u32,
    /// Output current sensors.
    pub current: u32,
    /// Output voltage sensors.
    pub voltage: u32,
    /// Input current sensors.
    pub input_current: u32,
    /// Input voltage sensors.
    pub input_voltage: u32,
    /// Fan speed sensors.
    pub speed: u32,
}

impl SensorDecl {
    /// Declared count for `kind`.
    #[must_use]
    pub const fn count(&self, kind: SensorKind) -> u32 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Power => self.power,
            SensorKind::Current => self.current,
            SensorKind::Voltage => self.voltage,
            SensorKind::InputCurrent => self.input_current,
            SensorKind::InputVoltage => self.input_voltage,
            SensorKind::Speed => self.speed,
        }
    }
}

/// Power rails a device regulates or monitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerDecl {
    /// Rail names; empty names are placeholders and skipped.
    #[serde(default)]
    pub rails: Vec<String>,
    /// Phase numbers per rail, one list per rail.
    pub phases: Option<Vec<Vec<u8>>>,
    /// Device speaks PMBus.
    #[serde(default)]
    pub pmbus: bool,
    /// Device is one phase controller of a rail shared with siblings.
    #[serde(default)]
    pub multiphase: bool,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

/// Parses TOML text into a [`Document`].
///
/// # Errors
///
/// Returns [`SchemaError`] for syntax errors, unknown keys, wrong types, and
/// unknown enumerated values.
pub fn parse_document(text: &str) -> Result<Document, SchemaError> {
    Ok(toml::from_str(text)?)
}
