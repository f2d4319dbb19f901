//! Scripted bus driver for hosted tests.
//!
//! [`MockBus`] models the electrical picture a [`crate::BusServer`] sees:
//! muxes latch the segment last written to them, and a device answers only
//! while its segment is connected. Every transaction is logged.

use std::collections::BTreeMap;

use crate::{BusDriver, BusFault, Controller, MuxDescriptor, MuxId, PortIndex, Route, SegmentId};

/// One logged transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Controller driven.
    pub controller: Controller,
    /// Port driven.
    pub port: PortIndex,
    /// Target address.
    pub address: u8,
    /// Bytes written.
    pub write: Vec<u8>,
    /// Bytes requested.
    pub read_len: usize,
    /// SMBus block read.
    pub block: bool,
}

/// A register-mapped device living somewhere on the mock wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    controller: Controller,
    port: PortIndex,
    route: Option<Route>,
    address: u8,
    pointer: u8,
    registers: BTreeMap<u8, u8>,
    blocks: BTreeMap<u8, Vec<u8>>,
}

impl MockDevice {
    /// Places a device on a bus, behind `route` if given.
    #[must_use]
    pub const fn new(
        controller: Controller,
        port: PortIndex,
        route: Option<Route>,
        address: u8,
    ) -> Self {
        Self {
            controller,
            port,
            route,
            address,
            pointer: 0,
            registers: BTreeMap::new(),
            blocks: BTreeMap::new(),
        }
    }

    /// Presets consecutive byte registers starting at `register`.
    #[must_use]
    pub fn with_register(mut self, register: u8, bytes: &[u8]) -> Self {
        for (offset, byte) in (0u8..).zip(bytes) {
            self.registers.insert(register.wrapping_add(offset), *byte);
        }
        self
    }

    /// Presets the SMBus block returned for `register`.
    #[must_use]
    pub fn with_block(mut self, register: u8, bytes: &[u8]) -> Self {
        self.blocks.insert(register, bytes.to_vec());
        self
    }

    /// Current value of a byte register; unwritten registers read as zero.
    #[must_use]
    pub fn register(&self, register: u8) -> u8 {
        self.registers.get(&register).copied().unwrap_or(0)
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer;
        for (offset, byte) in (0u8..).zip(data) {
            self.registers.insert(pointer.wrapping_add(offset), *byte);
        }
    }

    fn read(&mut self, read: &mut [u8]) -> usize {
        for slot in read.iter_mut() {
            *slot = self.register(self.pointer);
            self.pointer = self.pointer.wrapping_add(1);
        }
        read.len()
    }

    fn read_block(&self, read: &mut [u8]) -> usize {
        let block = self.blocks.get(&self.pointer).map_or(&[][..], Vec::as_slice);
        let n = read.len().min(block.len());
        read[..n].copy_from_slice(&block[..n]);
        n
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MockMux {
    descriptor: MuxDescriptor,
    selected: Option<SegmentId>,
}

/// Scripted [`BusDriver`] with mux-aware device visibility.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    muxes: Vec<MockMux>,
    devices: Vec<MockDevice>,
    faults: Vec<(u8, BusFault)>,
    log: Vec<Transaction>,
}

impl MockBus {
    /// Creates a bus with `muxes` wired and every segment disconnected.
    #[must_use]
    pub fn new(muxes: impl IntoIterator<Item = MuxDescriptor>) -> Self {
        Self {
            muxes: muxes
                .into_iter()
                .map(|descriptor| MockMux {
                    descriptor,
                    selected: None,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Adds a device; returns its index for [`MockBus::device`].
    pub fn add_device(&mut self, device: MockDevice) -> usize {
        self.devices.push(device);
        self.devices.len() - 1
    }

    /// Device by insertion index.
    #[must_use]
    pub fn device(&self, index: usize) -> Option<&MockDevice> {
        self.devices.get(index)
    }

    /// Makes the next transaction addressed to `address` fail with `fault`.
    pub fn fail_next(&mut self, address: u8, fault: BusFault) {
        self.faults.push((address, fault));
    }

    /// Segment the mux hardware currently connects.
    #[must_use]
    pub fn selected(&self, mux: MuxId) -> Option<SegmentId> {
        self.muxes
            .iter()
            .find(|m| m.descriptor.id == mux)
            .and_then(|m| m.selected)
    }

    /// All transactions so far, in order.
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Number of transactions addressed to `address`.
    #[must_use]
    pub fn hits(&self, address: u8) -> usize {
        self.log.iter().filter(|t| t.address == address).count()
    }

    fn take_fault(&mut self, address: u8) -> Option<BusFault> {
        let index = self.faults.iter().position(|(a, _)| *a == address)?;
        Some(self.faults.remove(index).1)
    }

    fn is_visible(&self, device: &MockDevice) -> bool {
        device.route.is_none_or(|route| {
            self.muxes.iter().any(|m| {
                m.descriptor.id == route.mux && m.selected == Some(route.segment)
            })
        })
    }

    fn transact(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
        block: bool,
    ) -> Result<usize, BusFault> {
        self.log.push(Transaction {
            controller,
            port,
            address,
            write: write.to_vec(),
            read_len: read.len(),
            block,
        });
        if let Some(fault) = self.take_fault(address) {
            return Err(fault);
        }

        if let Some(mux) = self
            .muxes
            .iter_mut()
            .find(|m| m.descriptor.is_on(controller, port) && m.descriptor.address == address)
        {
            if !write.is_empty() {
                mux.selected = mux
                    .descriptor
                    .driver
                    .decode_command(write)
                    .ok_or(BusFault::NoAck)?;
            }
            read.fill(0);
            return Ok(read.len());
        }

        let visible: Vec<usize> = self
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.controller == controller && d.port == port && d.address == address)
            .filter(|(_, d)| self.is_visible(d))
            .map(|(i, _)| i)
            .collect();
        let index = match visible.as_slice() {
            [] => return Err(BusFault::NoAck),
            [index] => *index,
            _ => return Err(BusFault::ArbitrationLost),
        };

        let device = &mut self.devices[index];
        device.write(write);
        Ok(if block {
            device.read_block(read)
        } else {
            device.read(read)
        })
    }
}

impl BusDriver for MockBus {
    fn write_read(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault> {
        self.transact(controller, port, address, write, read, false)
    }

    fn write_read_block(
        &mut self,
        controller: Controller,
        port: PortIndex,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize, BusFault> {
        self.transact(controller, port, address, write, read, true)
    }
}

#[cfg(test)]
mod tests {
    use super::{MockBus, MockDevice};
    use crate::{
        BusDriver, BusFault, Controller, MuxDescriptor, MuxDriverKind, MuxId, PortIndex, Route,
        SegmentId,
    };

    const C: Controller = Controller(0);
    const P: PortIndex = PortIndex(0);

    fn ltc() -> MuxDescriptor {
        MuxDescriptor {
            id: MuxId(0),
            controller: C,
            port: P,
            driver: MuxDriverKind::Ltc4306,
            address: 0x44,
            segments: 4,
            nreset: None,
        }
    }

    #[test]
    fn routed_device_answers_only_while_its_segment_is_live() {
        let mut bus = MockBus::new([ltc()]);
        let route = Route::new(MuxId(0), SegmentId(3));
        bus.add_device(MockDevice::new(C, P, Some(route), 0x50).with_register(0, &[0xAB]));

        let mut byte = [0u8; 1];
        assert_eq!(bus.write_read(C, P, 0x50, &[0], &mut byte), Err(BusFault::NoAck));

        bus.write_read(C, P, 0x44, &[0x03, 0x20], &mut []).unwrap();
        assert_eq!(bus.selected(MuxId(0)), Some(SegmentId(3)));
        assert_eq!(bus.write_read(C, P, 0x50, &[0], &mut byte), Ok(1));
        assert_eq!(byte, [0xAB]);
    }

    #[test]
    fn two_visible_devices_at_one_address_collide() {
        let mut bus = MockBus::new([]);
        bus.add_device(MockDevice::new(C, P, None, 0x20));
        bus.add_device(MockDevice::new(C, P, None, 0x20));
        assert_eq!(
            bus.write_read(C, P, 0x20, &[], &mut [0u8; 1]),
            Err(BusFault::ArbitrationLost)
        );
    }

    #[test]
    fn writes_land_in_registers_and_blocks_read_back() {
        let mut bus = MockBus::new([]);
        let index = bus.add_device(MockDevice::new(C, P, None, 0x58).with_block(0x99, b"MFR"));

        bus.write_read(C, P, 0x58, &[0x10, 1, 2], &mut []).unwrap();
        let device = bus.device(index).unwrap();
        assert_eq!((device.register(0x10), device.register(0x11)), (1, 2));

        let mut buf = [0u8; 8];
        assert_eq!(bus.write_read_block(C, P, 0x58, &[0x99], &mut buf), Ok(3));
        assert_eq!(&buf[..3], b"MFR");
    }

    #[test]
    fn injected_faults_fire_once() {
        let mut bus = MockBus::new([]);
        bus.add_device(MockDevice::new(C, P, None, 0x20));
        bus.fail_next(0x20, BusFault::Timeout);

        assert_eq!(bus.write_read(C, P, 0x20, &[], &mut []), Err(BusFault::Timeout));
        assert_eq!(bus.write_read(C, P, 0x20, &[], &mut []), Ok(0));
        assert_eq!(bus.hits(0x20), 2);
    }
}
