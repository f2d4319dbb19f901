//! Sensor kinds and per-device sensor-id bindings.

use std::fmt;

use crate::SensorId;

/// Kind of measurement stream a device exposes.
///
/// Declaration order here is the canonical kind order used when assigning
/// sensor ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum SensorKind {
    /// Temperature.
    Temperature,
    /// Output power.
    Power,
    /// Output current.
    Current,
    /// Output voltage.
    Voltage,
    /// Input current.
    InputCurrent,
    /// Input voltage.
    InputVoltage,
    /// Fan speed.
    Speed,
}

impl SensorKind {
    /// Every kind, in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Temperature,
        Self::Power,
        Self::Current,
        Self::Voltage,
        Self::InputCurrent,
        Self::InputVoltage,
        Self::Speed,
    ];

    /// Name as written in topology documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Power => "power",
            Self::Current => "current",
            Self::Voltage => "voltage",
            Self::InputCurrent => "input_current",
            Self::InputVoltage => "input_voltage",
            Self::Speed => "speed",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous run of sensor ids of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SensorRange {
    /// Measurement kind.
    pub kind: SensorKind,
    /// First id of the run.
    pub first: SensorId,
    /// Number of ids in the run; never zero.
    pub count: u32,
}

impl SensorRange {
    /// Iterates the ids of the run.
    pub fn ids(&self) -> impl Iterator<Item = SensorId> {
        let first = self.first.0;
        (first..first + self.count).map(SensorId)
    }
}

/// All sensor ids belonging to one device, grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SensorBinding {
    /// Resolved device index.
    pub device: usize,
    /// Per-kind runs, in canonical kind order.
    pub ranges: Vec<SensorRange>,
}

impl SensorBinding {
    /// Ids of `kind` on this device; empty when the device has none.
    pub fn ids(&self, kind: SensorKind) -> impl Iterator<Item = SensorId> + '_ {
        self.ranges
            .iter()
            .filter(move |r| r.kind == kind)
            .flat_map(SensorRange::ids)
    }

    /// Total sensors on this device.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.ranges.iter().map(|r| r.count).sum()
    }
}
