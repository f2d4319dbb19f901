//! Device handles: immutable, address-bound references to one peripheral.
//!
//! A [`DeviceHandle`] carries everything needed to reach its device: the
//! owning task, controller, port, optional mux route, and address. Nothing
//! on it is mutable, so a handle can never be redirected at another part.
//! Operations are expressed as [`Request`]s handed to a [`Transport`], which
//! stands in for the IPC path to the bus-owning server.

use crate::{Controller, I2cError, PortIndex, Route, TaskId};

/// Kind of wire transaction requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Plain write, read, or write then repeated-start read.
    WriteRead,
    /// Write then SMBus block read.
    WriteReadBlock,
}

/// One transaction request, as marshalled to the bus-owning server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Task the handle is bound to.
    pub owner: TaskId,
    /// Controller to drive.
    pub controller: Controller,
    /// Port of that controller.
    pub port: PortIndex,
    /// Mux route that must be live before the transaction.
    pub route: Option<Route>,
    /// 7-bit target address.
    pub address: u8,
    /// Transaction shape.
    pub op: Op,
    /// Bytes written before any read.
    pub write: &'a [u8],
}

/// IPC collaborator delivering requests to the bus-owning server.
pub trait Transport {
    /// Runs `request` to completion, filling `read`.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] for capability, configuration, routing, or wire
    /// failures.
    fn send(&self, request: &Request<'_>, read: &mut [u8]) -> Result<usize, I2cError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request<'_>, read: &mut [u8]) -> Result<usize, I2cError> {
        (**self).send(request, read)
    }
}

/// Immutable reference to one physical device.
///
/// Equality and hashing cover the whole bound tuple, so two handles are
/// interchangeable exactly when they reach the same device for the same task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    owner: TaskId,
    controller: Controller,
    port: PortIndex,
    route: Option<Route>,
    address: u8,
}

impl DeviceHandle {
    /// Binds a handle to a task and a full device address.
    #[must_use]
    pub const fn new(
        owner: TaskId,
        controller: Controller,
        port: PortIndex,
        route: Option<Route>,
        address: u8,
    ) -> Self {
        Self {
            owner,
            controller,
            port,
            route,
            address,
        }
    }

    /// Placeholder handle for builds of a single task outside a full
    /// application. It addresses the reserved general-call address, so no
    /// real device answers it.
    #[must_use]
    pub const fn mock(owner: TaskId) -> Self {
        Self::new(owner, Controller(0), PortIndex(0), None, 0x00)
    }

    /// Task this handle is bound to.
    #[must_use]
    pub const fn owner(&self) -> TaskId {
        self.owner
    }

    /// Controller the device hangs off.
    #[must_use]
    pub const fn controller(&self) -> Controller {
        self.controller
    }

    /// Port of that controller.
    #[must_use]
    pub const fn port(&self) -> PortIndex {
        self.port
    }

    /// Mux route, if the device sits behind a mux.
    #[must_use]
    pub const fn route(&self) -> Option<Route> {
        self.route
    }

    /// 7-bit device address.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Returns a copy of this handle bound to another task.
    ///
    /// Generated tables hold owner-less templates; the owning task rebinds
    /// them at start-up.
    #[must_use]
    pub const fn for_task(self, owner: TaskId) -> Self {
        Self { owner, ..self }
    }

    const fn request<'a>(&self, op: Op, write: &'a [u8]) -> Request<'a> {
        Request {
            owner: self.owner,
            controller: self.controller,
            port: self.port,
            route: self.route,
            address: self.address,
            op,
            write,
        }
    }

    /// Reads `buf.len()` bytes with no preceding write.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn read<T>(&self, transport: &T, buf: &mut [u8]) -> Result<usize, I2cError>
    where
        T: Transport + ?Sized,
    {
        transport.send(&self.request(Op::WriteRead, &[]), buf)
    }

    /// Writes `bytes` with no read phase.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn write<T>(&self, transport: &T, bytes: &[u8]) -> Result<(), I2cError>
    where
        T: Transport + ?Sized,
    {
        transport.send(&self.request(Op::WriteRead, bytes), &mut []).map(|_| ())
    }

    /// Writes `bytes`, then reads into `buf` after a repeated start.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn write_read<T>(&self, transport: &T, bytes: &[u8], buf: &mut [u8]) -> Result<usize, I2cError>
    where
        T: Transport + ?Sized,
    {
        transport.send(&self.request(Op::WriteRead, bytes), buf)
    }

    /// Reads `buf.len()` bytes starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn read_reg<T>(&self, transport: &T, register: u8, buf: &mut [u8]) -> Result<usize, I2cError>
    where
        T: Transport + ?Sized,
    {
        self.write_read(transport, &[register], buf)
    }

    /// Reads a single-byte register.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn read_reg_u8<T>(&self, transport: &T, register: u8) -> Result<u8, I2cError>
    where
        T: Transport + ?Sized,
    {
        let mut buf = [0u8; 1];
        self.read_reg(transport, register, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads a big-endian 16-bit register.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn read_reg_u16_be<T>(&self, transport: &T, register: u8) -> Result<u16, I2cError>
    where
        T: Transport + ?Sized,
    {
        let mut buf = [0u8; 2];
        self.read_reg(transport, register, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Writes `value` to `register` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn write_reg<T>(&self, transport: &T, register: u8, value: &[u8]) -> Result<(), I2cError>
    where
        T: Transport + ?Sized,
    {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.push(register);
        bytes.extend_from_slice(value);
        self.write(transport, &bytes)
    }

    /// SMBus block read of `register`; returns the data byte count.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] from the transport.
    pub fn read_block<T>(&self, transport: &T, register: u8, buf: &mut [u8]) -> Result<usize, I2cError>
    where
        T: Transport + ?Sized,
    {
        transport.send(&self.request(Op::WriteReadBlock, &[register]), buf)
    }
}

/// Declares a nominal wrapper around a [`DeviceHandle`] for one device role.
///
/// Drivers take the wrapper rather than a bare handle, so a handle for one
/// logical device cannot be passed where another is expected.
///
/// ```
/// i2c_core::device_role! {
///     /// Inlet air temperature sensor.
///     pub struct InletSensor;
/// }
///
/// let handle = i2c_core::DeviceHandle::new(
///     i2c_core::TaskId(1),
///     i2c_core::Controller(2),
///     i2c_core::PortIndex(0),
///     None,
///     0x48,
/// );
/// let inlet = InletSensor::from_handle(handle);
/// assert_eq!(inlet.handle().address(), 0x48);
/// ```
#[macro_export]
macro_rules! device_role {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name($crate::DeviceHandle);

        impl $name {
            /// Wraps the handle for this role.
            #[must_use]
            pub const fn from_handle(handle: $crate::DeviceHandle) -> Self {
                Self(handle)
            }

            /// Underlying device handle.
            #[must_use]
            pub const fn handle(&self) -> &$crate::DeviceHandle {
                &self.0
            }
        }
    };
}
