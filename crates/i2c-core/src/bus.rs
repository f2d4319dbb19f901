//! Physical transaction contract consumed by the bus-owning server.

use crate::{BusFault, Controller, PortIndex};

/// Deterministic bus transaction contract implemented by the platform driver.
///
/// The driver owns clocking, ACK/NACK handling, and electrical retries. Port
/// switching on a controller is the driver's concern: the server passes the
/// port with every transaction.
pub trait BusDriver {
    /// Writes `write` then, if `read` is non-empty, issues a repeated start
    /// and reads `read.len()` bytes. Either buffer may be empty.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns the [`BusFault`] observed on the wire.
    fn write_read(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault>;

    /// Writes `write` then performs an SMBus block read: the first byte read
    /// is a count, and that many bytes follow into `read`.
    ///
    /// Returns the number of data bytes read, excluding the count.
    ///
    /// # Errors
    ///
    /// Returns the [`BusFault`] observed on the wire.
    fn write_read_block(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault>;
}

impl<D: BusDriver + ?Sized> BusDriver for &mut D {
    fn write_read(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault> {
        (**self).write_read(controller, port, address, write, read)
    }

    fn write_read_block(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault> {
        (**self).write_read_block(controller, port, address, write, read)
    }
}
