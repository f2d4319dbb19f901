//! Runtime descriptor builder: the artifact's tables as live `i2c-core`
//! values, for hosted use and tests.

use i2c_core::{
    BusDriver, BusServer, CheckFn, CheckRegistry, ControllerDescriptor, DeviceHandle,
    MuxDescriptor, PinDescriptor, SensorBinding, TaskId, ValidationEntry, Validator,
};

use super::ir::{ArtifactIr, HandleTemplate};
use crate::errors::EmitError;

/// Descriptor tables built from an [`ArtifactIr`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeTables {
    controllers: Vec<ControllerDescriptor>,
    pins: Vec<PinDescriptor>,
    muxes: Vec<MuxDescriptor>,
    devices: Vec<HandleTemplate>,
    validation: Vec<(HandleTemplate, Option<CheckFn>)>,
    sensors: Vec<SensorBinding>,
}

impl RuntimeTables {
    /// Builds the tables. Each validation arm that names a check is resolved
    /// through `registry` by the device's driver kind; arms without one fall
    /// back to the raw probe. Without a validation section the validator is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::UnregisteredCheck`] when an arm names a check
    /// `registry` lacks, and [`EmitError::Invariant`] when an arm names a
    /// device the IR does not hold.
    pub fn build(ir: &ArtifactIr, registry: &CheckRegistry) -> Result<Self, EmitError> {
        let (controllers, pins, muxes) = ir.bus.as_ref().map_or_else(Default::default, |bus| {
            (bus.controllers.clone(), bus.pins.clone(), bus.muxes.clone())
        });
        let validation = ir
            .validation
            .iter()
            .flatten()
            .map(|record| {
                let device = ir.devices.get(record.device).ok_or_else(|| {
                    EmitError::Invariant(format!("validation arm for device {}", record.device))
                })?;
                let check = match &record.check {
                    None => None,
                    Some(path) => Some(registry.get(&device.kind).ok_or_else(|| {
                        EmitError::UnregisteredCheck {
                            kind: device.kind.clone(),
                            path: path.clone(),
                        }
                    })?),
                };
                Ok((device.template, check))
            })
            .collect::<Result<_, EmitError>>()?;
        Ok(Self {
            controllers,
            pins,
            muxes,
            devices: ir.devices.iter().map(|d| d.template).collect(),
            validation,
            sensors: ir
                .sensors
                .as_ref()
                .map(|s| s.bindings.clone())
                .unwrap_or_default(),
        })
    }

    /// Controller descriptors.
    #[must_use]
    pub fn controllers(&self) -> &[ControllerDescriptor] {
        &self.controllers
    }

    /// Pin descriptors.
    #[must_use]
    pub fn pins(&self) -> &[PinDescriptor] {
        &self.pins
    }

    /// Mux descriptors.
    #[must_use]
    pub fn muxes(&self) -> &[MuxDescriptor] {
        &self.muxes
    }

    /// Sensor bindings, one per device.
    #[must_use]
    pub fn sensors(&self) -> &[SensorBinding] {
        &self.sensors
    }

    /// Handle for device `index`, owned by `owner`.
    #[must_use]
    pub fn handle(&self, owner: TaskId, index: usize) -> Option<DeviceHandle> {
        self.devices.get(index).map(|t| t.bind(owner))
    }

    /// Handles for every device, owned by `owner`, in device-index order.
    #[must_use]
    pub fn handles(&self, owner: TaskId) -> Vec<DeviceHandle> {
        self.devices.iter().map(|t| t.bind(owner)).collect()
    }

    /// Validator with one entry per validation arm, owned by `owner`.
    #[must_use]
    pub fn validator(&self, owner: TaskId) -> Validator {
        Validator::new(
            self.validation
                .iter()
                .map(|(t, check)| ValidationEntry {
                    device: t.bind(owner),
                    check: *check,
                })
                .collect(),
        )
    }

    /// Bus-owning server over these descriptors.
    #[must_use]
    pub fn server<D: BusDriver>(&self, driver: D) -> BusServer<D> {
        BusServer::new(driver, self.controllers.clone(), self.muxes.clone())
    }
}
