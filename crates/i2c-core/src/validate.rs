//! Per-device validation against the resolved device table.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::{checks, DeviceHandle, I2cError, Transport};

/// Driver-specific check: `Ok(true)` when the part identifies correctly.
pub type CheckFn = fn(&DeviceHandle, &dyn Transport) -> Result<bool, I2cError>;

/// Result of validating one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ValidationOutcome {
    /// Driver-specific check passed.
    Good,
    /// Driver-specific check ran and the part did not identify correctly.
    Bad,
    /// No driver-specific check exists; a raw read succeeded.
    RawReadOk,
}

/// Validation could not produce an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidateError {
    /// Index is past the device table.
    #[error("no device at index {0}")]
    NoDevice(usize),
    /// Communication with the device failed.
    #[error(transparent)]
    Bus(#[from] I2cError),
}

/// Raw communication probe: a single-byte read with no register write.
///
/// # Errors
///
/// Returns [`I2cError`] if the read fails.
pub fn raw_probe(device: &DeviceHandle, transport: &dyn Transport) -> Result<(), I2cError> {
    let mut byte = [0u8; 1];
    device.read(transport, &mut byte).map(|_| ())
}

/// Validates one device: its check if it has one, a raw probe otherwise.
///
/// A device with a check never falls back to the raw probe.
///
/// # Errors
///
/// Returns [`I2cError`] when either path fails to communicate.
pub fn run_check(
    device: &DeviceHandle,
    check: Option<CheckFn>,
    transport: &dyn Transport,
) -> Result<ValidationOutcome, I2cError> {
    match check {
        Some(check) => Ok(if check(device, transport)? {
            ValidationOutcome::Good
        } else {
            ValidationOutcome::Bad
        }),
        None => raw_probe(device, transport).map(|()| ValidationOutcome::RawReadOk),
    }
}

/// Driver-kind name to check function.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, CheckFn>,
}

impl CheckRegistry {
    /// Registry with no checks; every device gets the raw probe.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the checks shipped in [`crate::checks`].
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (kind, check, _) in checks::BUILTIN {
            registry.register(kind, check);
        }
        registry
    }

    /// Adds or replaces the check for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, check: CheckFn) {
        self.checks.insert(kind.into(), check);
    }

    /// Check for `kind`, if registered.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<CheckFn> {
        self.checks.get(kind).copied()
    }
}

/// One row of the validation table.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEntry {
    /// Device to validate.
    pub device: DeviceHandle,
    /// Driver-specific check, if the driver kind has one.
    pub check: Option<CheckFn>,
}

/// Validation routines indexed by resolved device index.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    entries: Vec<ValidationEntry>,
}

impl Validator {
    /// Builds a validator over `entries`, indexed in order.
    #[must_use]
    pub const fn new(entries: Vec<ValidationEntry>) -> Self {
        Self { entries }
    }

    /// Number of devices covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the table has no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table rows.
    #[must_use]
    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    /// Validates the device at `index` through `transport`.
    ///
    /// The transport carries the caller's capability; a caller other than
    /// the device's owner is refused there.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::NoDevice`] for an out-of-range index and
    /// [`ValidateError::Bus`] for communication failures.
    pub fn validate(
        &self,
        transport: &dyn Transport,
        index: usize,
    ) -> Result<ValidationOutcome, ValidateError> {
        let entry = self.entries.get(index).ok_or(ValidateError::NoDevice(index))?;
        let outcome = run_check(&entry.device, entry.check, transport)?;
        debug!("device {index} validated: {outcome:?}");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{CheckRegistry, ValidateError, ValidationEntry, ValidationOutcome, Validator};
    use crate::{
        mock::{MockBus, MockDevice},
        BusFault, BusServer, Client, Controller, ControllerDescriptor, ControllerMode,
        DeviceHandle, I2cError, PortIndex, TaskId,
    };

    const OWNER: TaskId = TaskId(2);

    fn device(address: u8) -> DeviceHandle {
        DeviceHandle::new(OWNER, Controller(3), PortIndex(0), None, address)
    }

    fn server() -> Mutex<BusServer<MockBus>> {
        let mut bus = MockBus::new([]);
        // Answers any read, but reports the wrong manufacturer id.
        bus.add_device(
            MockDevice::new(Controller(3), PortIndex(0), None, 0x4C).with_register(0xFE, &[0x00]),
        );
        bus.add_device(MockDevice::new(Controller(3), PortIndex(0), None, 0x50));
        Mutex::new(BusServer::new(
            bus,
            [ControllerDescriptor {
                controller: Controller(3),
                mode: ControllerMode::Initiator,
                ports: 1,
            }],
            [],
        ))
    }

    fn validator() -> Validator {
        let registry = CheckRegistry::builtin();
        Validator::new(vec![
            ValidationEntry {
                device: device(0x4C),
                check: registry.get("tmp451"),
            },
            ValidationEntry {
                device: device(0x50),
                check: registry.get("at24csw080"),
            },
            ValidationEntry {
                device: device(0x60),
                check: None,
            },
        ])
    }

    #[test]
    fn failed_driver_check_is_bad_not_raw_read_ok() {
        let server = server();
        let client = Client::new(OWNER, &server);
        assert_eq!(validator().validate(&client, 0), Ok(ValidationOutcome::Bad));
    }

    #[test]
    fn devices_without_a_check_get_the_raw_probe() {
        let server = server();
        let client = Client::new(OWNER, &server);
        assert_eq!(
            validator().validate(&client, 1),
            Ok(ValidationOutcome::RawReadOk)
        );
    }

    #[test]
    fn communication_failure_is_a_bus_error() {
        let server = server();
        let client = Client::new(OWNER, &server);
        assert_eq!(
            validator().validate(&client, 2),
            Err(ValidateError::Bus(I2cError::BusCommunication(BusFault::NoAck)))
        );
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let server = server();
        let client = Client::new(OWNER, &server);
        assert_eq!(
            validator().validate(&client, 3),
            Err(ValidateError::NoDevice(3))
        );
    }

    #[test]
    fn caller_must_own_the_device() {
        let server = server();
        let client = Client::new(TaskId(5), &server);
        assert!(matches!(
            validator().validate(&client, 1),
            Err(ValidateError::Bus(I2cError::CapabilityDenied { .. }))
        ));
    }

    #[test]
    fn registry_can_be_extended() {
        fn always(_: &DeviceHandle, _: &dyn crate::Transport) -> Result<bool, I2cError> {
            Ok(true)
        }
        let mut registry = CheckRegistry::empty();
        assert!(registry.get("tmp117").is_none());
        registry.register("custom", always);
        assert!(registry.get("custom").is_some());
        assert!(CheckRegistry::builtin().get("tmp117").is_some());
    }
}
