use thiserror::Error;

use crate::{Controller, MuxId, PortIndex, Route, SegmentId, TaskId};

/// Transport-level faults reported by the physical bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BusFault {
    /// Addressed target did not acknowledge.
    #[error("no acknowledge from target")]
    NoAck,
    /// Another initiator won arbitration.
    #[error("bus arbitration lost")]
    ArbitrationLost,
    /// Transaction did not complete in time.
    #[error("transaction timed out")]
    Timeout,
    /// Bus was held low and had to be reset.
    #[error("bus locked up and was reset")]
    BusLocked,
}

/// Runtime errors surfaced by device operations.
///
/// Nothing here is swallowed or retried by the core; retry policy belongs to
/// the calling driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum I2cError {
    /// The device's own transaction failed on the wire.
    #[error("bus communication error: {0}")]
    BusCommunication(BusFault),
    /// The mux-select transaction preceding the device transaction failed.
    #[error("routing to {route} failed: {fault}")]
    RoutingFailure {
        /// Route that could not be established.
        route: Route,
        /// Fault observed on the mux-select write.
        fault: BusFault,
    },
    /// Caller is not the task the handle is bound to.
    #[error("task {} may not use a device owned by task {}", .caller.0, .owner.0)]
    CapabilityDenied {
        /// Task the handle was created for.
        owner: TaskId,
        /// Task that issued the request.
        caller: TaskId,
    },
    /// Controller is not configured on this server.
    #[error("controller {0} is not configured")]
    BadController(Controller),
    /// Port index does not exist on the controller.
    #[error("port {} does not exist on {controller}", .port.0)]
    BadPort {
        /// Controller addressed.
        controller: Controller,
        /// Port index requested.
        port: PortIndex,
    },
    /// Controller is configured in target mode and cannot initiate.
    #[error("controller {0} is configured as a target")]
    NotInitiator(Controller),
    /// Mux is not attached to the requested bus.
    #[error("mux {} is not attached to the requested bus", .mux.0)]
    MuxNotFound {
        /// Mux requested.
        mux: MuxId,
    },
    /// Segment number is outside the mux's segment range.
    #[error("segment {} does not exist on mux {}", .segment.0, .mux.0)]
    SegmentNotFound {
        /// Mux addressed.
        mux: MuxId,
        /// Segment requested.
        segment: SegmentId,
    },
}

impl I2cError {
    /// Returns the wire fault behind this error, if it was a bus-level failure.
    #[must_use]
    pub const fn bus_fault(&self) -> Option<BusFault> {
        match self {
            Self::BusCommunication(fault) | Self::RoutingFailure { fault, .. } => Some(*fault),
            Self::CapabilityDenied { .. }
            | Self::BadController(_)
            | Self::BadPort { .. }
            | Self::NotInitiator(_)
            | Self::MuxNotFound { .. }
            | Self::SegmentNotFound { .. } => None,
        }
    }
}

/// Error type for drivers layered on a [`crate::DeviceHandle`]: either the
/// bus failed, or the device answered with something the protocol rejects.
#[derive(Debug, Error)]
pub enum DriverError<E> {
    /// Bus-level or routing failure from the core.
    #[error(transparent)]
    Bus(#[from] I2cError),
    /// Device-protocol failure reported by the driver.
    #[error("device protocol error: {0}")]
    Protocol(E),
}
