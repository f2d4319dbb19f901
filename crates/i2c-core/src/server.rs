//! The single owning context for a set of physical buses.
//!
//! [`BusServer`] serializes every transaction on its buses: one request,
//! including any mux re-route, completes before the next starts. [`Client`]
//! is the in-process transport that enforces handle ownership and blocks on
//! the server until the bus is free.

use std::sync::Mutex;

use log::{debug, warn};

use crate::{
    BusDriver, Controller, ControllerDescriptor, ControllerMode, I2cError, MuxDescriptor, MuxId,
    MuxRoutingState, MuxSelect, MuxTracker, Op, PortIndex, Request, Route, TaskId, Transport,
};

#[derive(Debug)]
struct Bus {
    controller: Controller,
    port: PortIndex,
    tracker: MuxTracker,
}

/// Bus-owning server: descriptors, per-bus routing state, and the driver.
#[derive(Debug)]
pub struct BusServer<D> {
    driver: D,
    controllers: Vec<ControllerDescriptor>,
    muxes: Vec<MuxDescriptor>,
    buses: Vec<Bus>,
}

impl<D: BusDriver> BusServer<D> {
    /// Builds a server from generated descriptors.
    ///
    /// One routing tracker is created per initiator (controller, port) bus,
    /// each starting in [`MuxRoutingState::NoSegmentActive`].
    #[must_use]
    pub fn new(
        driver: D,
        controllers: impl IntoIterator<Item = ControllerDescriptor>,
        muxes: impl IntoIterator<Item = MuxDescriptor>,
    ) -> Self {
        let controllers: Vec<ControllerDescriptor> = controllers.into_iter().collect();
        let muxes: Vec<MuxDescriptor> = muxes.into_iter().collect();

        let buses = controllers
            .iter()
            .filter(|c| c.mode == ControllerMode::Initiator)
            .flat_map(|c| (0..c.ports).map(move |p| (c.controller, PortIndex(p))))
            .map(|(controller, port)| Bus {
                controller,
                port,
                tracker: MuxTracker::new(
                    muxes
                        .iter()
                        .filter(|m| m.is_on(controller, port))
                        .map(|m| m.id),
                ),
            })
            .collect();

        Self {
            driver,
            controllers,
            muxes,
            buses,
        }
    }

    /// Physical driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Physical driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Routing state of one bus, or `None` if the bus is not served here.
    #[must_use]
    pub fn routing_state(&self, controller: Controller, port: PortIndex) -> Option<MuxRoutingState> {
        self.buses
            .iter()
            .find(|b| b.controller == controller && b.port == port)
            .map(|b| b.tracker.state())
    }

    /// Marks every bus `Unknown`, so each bus re-selects on its next routed
    /// access.
    pub fn discard_routing(&mut self) {
        for bus in &mut self.buses {
            bus.tracker.mark_unknown();
        }
    }

    /// Runs one request to completion.
    ///
    /// Routed requests first make their route live; a failed select is a
    /// [`I2cError::RoutingFailure`] and the device transaction is not
    /// attempted. A routed transaction that fails on the wire leaves the bus
    /// in [`MuxRoutingState::Unknown`]. Unrouted requests leave the routing
    /// state untouched.
    ///
    /// Ownership is not checked here; that is the transport's job.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for unknown controllers, ports, muxes,
    /// and segments, and wire errors from the driver.
    pub fn handle(&mut self, request: &Request<'_>, read: &mut [u8]) -> Result<usize, I2cError> {
        self.check(request)?;

        let Self {
            driver,
            muxes,
            buses,
            ..
        } = self;
        let bus = buses
            .iter_mut()
            .find(|b| b.controller == request.controller && b.port == request.port)
            .ok_or(I2cError::BadPort {
                controller: request.controller,
                port: request.port,
            })?;

        if let Some(route) = request.route {
            let mut selector = Selector {
                driver: &mut *driver,
                muxes: muxes.as_slice(),
                controller: request.controller,
                port: request.port,
                target: route,
            };
            bus.tracker.route(route, &mut selector)?;
        }

        let result = match request.op {
            Op::WriteRead => driver.write_read(
                request.controller,
                request.port,
                request.address,
                request.write,
                read,
            ),
            Op::WriteReadBlock => driver.write_read_block(
                request.controller,
                request.port,
                request.address,
                request.write,
                read,
            ),
        };

        result.map_err(|fault| {
            debug!(
                "{} port {} address {:#04x}: {fault}",
                request.controller, request.port.0, request.address
            );
            if request.route.is_some() {
                bus.tracker.mark_unknown();
            }
            I2cError::BusCommunication(fault)
        })
    }

    fn check(&self, request: &Request<'_>) -> Result<(), I2cError> {
        let controller = self
            .controllers
            .iter()
            .find(|c| c.controller == request.controller)
            .ok_or(I2cError::BadController(request.controller))?;
        if controller.mode != ControllerMode::Initiator {
            return Err(I2cError::NotInitiator(request.controller));
        }
        if !controller.has_port(request.port) {
            return Err(I2cError::BadPort {
                controller: request.controller,
                port: request.port,
            });
        }
        if let Some(Route { mux, segment }) = request.route {
            let descriptor = self
                .muxes
                .iter()
                .find(|m| m.id == mux && m.is_on(request.controller, request.port))
                .ok_or(I2cError::MuxNotFound { mux })?;
            if !descriptor.has_segment(segment) {
                return Err(I2cError::SegmentNotFound { mux, segment });
            }
        }
        Ok(())
    }
}

struct Selector<'a, D> {
    driver: &'a mut D,
    muxes: &'a [MuxDescriptor],
    controller: Controller,
    port: PortIndex,
    target: Route,
}

impl<D: BusDriver> Selector<'_, D> {
    fn mux(&self, id: MuxId) -> Result<&MuxDescriptor, I2cError> {
        self.muxes
            .iter()
            .find(|m| m.id == id)
            .ok_or(I2cError::MuxNotFound { mux: id })
    }

    // Wire faults on any control write count against the route being made.
    fn send(&mut self, address: u8, bytes: &[u8]) -> Result<(), I2cError> {
        self.driver
            .write_read(self.controller, self.port, address, bytes, &mut [])
            .map(|_| ())
            .map_err(|fault| I2cError::RoutingFailure {
                route: self.target,
                fault,
            })
    }
}

impl<D: BusDriver> MuxSelect for Selector<'_, D> {
    type Error = I2cError;

    fn select(&mut self, route: Route) -> Result<(), I2cError> {
        let mux = self.mux(route.mux)?;
        let command = mux
            .driver
            .select_command(route.segment)
            .ok_or(I2cError::SegmentNotFound {
                mux: route.mux,
                segment: route.segment,
            })?;
        let address = mux.address;
        self.send(address, command.as_bytes())
    }

    fn deselect(&mut self, id: MuxId) -> Result<(), I2cError> {
        let mux = self.mux(id)?;
        let command = mux.driver.deselect_command();
        let address = mux.address;
        self.send(address, command.as_bytes())
    }
}

/// In-process transport bound to one calling task.
#[derive(Debug)]
pub struct Client<'a, D> {
    task: TaskId,
    server: &'a Mutex<BusServer<D>>,
}

impl<'a, D> Client<'a, D> {
    /// Binds a client for `task` to a shared server.
    #[must_use]
    pub const fn new(task: TaskId, server: &'a Mutex<BusServer<D>>) -> Self {
        Self { task, server }
    }

    /// Calling task.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }
}

impl<D: BusDriver> Transport for Client<'_, D> {
    fn send(&self, request: &Request<'_>, read: &mut [u8]) -> Result<usize, I2cError> {
        if request.owner != self.task {
            warn!(
                "task {} denied access to a device owned by task {}",
                self.task.0, request.owner.0
            );
            return Err(I2cError::CapabilityDenied {
                owner: request.owner,
                caller: self.task,
            });
        }
        let mut server = match self.server.lock() {
            Ok(server) => server,
            Err(poisoned) => {
                // A holder panicked, possibly between control writes.
                let mut server = poisoned.into_inner();
                server.discard_routing();
                self.server.clear_poison();
                server
            }
        };
        server.handle(request, read)
    }
}
