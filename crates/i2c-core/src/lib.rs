//! Runtime addressing model for generated I2C topologies.
//!
//! Generated tables hand each task immutable [`DeviceHandle`]s. Every
//! operation on a handle is a [`Request`] delivered over a [`Transport`] to the
//! single [`BusServer`] owning the bus, which checks the request against its
//! descriptors, makes the handle's mux route live through a per-bus
//! [`MuxTracker`], and runs the transaction on the platform [`BusDriver`].

/// Identifier newtypes and address rules.
pub mod ids;
pub use ids::{
    is_assignable_address, is_reserved_address, Controller, MuxId, PortIndex, Route, SegmentId,
    SensorId, TaskId, MAX_ADDRESS,
};

/// Wire faults and runtime error taxonomy.
pub mod fault;
pub use fault::{BusFault, DriverError, I2cError};

/// Mux routing state tracking and select encodings.
pub mod mux;
pub use mux::driver::{MuxCommand, MuxDriverKind};
pub use mux::{MuxRoutingState, MuxSelect, MuxTracker, RouteAction};

/// Controller, pin, and mux descriptors.
pub mod descriptor;
pub use descriptor::{ControllerDescriptor, ControllerMode, MuxDescriptor, PinDescriptor};

/// Physical bus driver contract.
pub mod bus;
pub use bus::BusDriver;

/// Device handles and the transport contract.
pub mod device;
pub use device::{DeviceHandle, Op, Request, Transport};

/// Bus-owning server and in-process client transport.
pub mod server;
pub use server::{BusServer, Client};

/// Sensor kinds and per-device id bindings.
pub mod sensor;
pub use sensor::{SensorBinding, SensorKind, SensorRange};

/// Per-device validation.
pub mod validate;
pub use validate::{
    raw_probe, run_check, CheckFn, CheckRegistry, ValidateError, ValidationEntry,
    ValidationOutcome, Validator,
};

/// Built-in driver-specific checks.
pub mod checks;

/// Scripted bus driver for hosted tests.
pub mod mock;

#[cfg(test)]
use proptest as _;
