//! Driver registry.
//!
//! Establishes one serial-bus connection and one PWM-controller handle
//! per physical driver chip, keyed by a caller-assigned integer id.

use crate::hal::Hardware;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Connection description for one PWM driver chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSpec {
    /// GPIO line carrying the serial clock.
    pub scl: u8,
    /// GPIO line carrying the serial data.
    pub sda: u8,
    /// I2C address of the chip (7-bit).
    pub address: u8,
}

/// Initialized PWM controllers, keyed by driver id.
pub struct Drivers<C> {
    controllers: BTreeMap<u8, C>,
}

impl<C> Drivers<C> {
    /// Number of initialized drivers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Driver ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.controllers.keys().copied()
    }

    /// Mutable access to one driver's controller handle.
    pub fn get_mut(&mut self, id: u8) -> Option<&mut C> {
        self.controllers.get_mut(&id)
    }
}

/// Opens a bus connection and attaches a PWM controller for every spec.
///
/// Every controller is configured to the shared `frequency_hz`. Channel
/// duty cycles are not touched here; that happens during topology
/// resolution. Fails on the first driver whose bus cannot be claimed or
/// whose address does not respond.
pub fn initialize_drivers<H: Hardware>(
    hw: &mut H,
    specs: &BTreeMap<u8, DriverSpec>,
    frequency_hz: u32,
) -> Result<Drivers<H::Controller>> {
    let mut controllers = BTreeMap::new();
    for (&id, spec) in specs {
        let controller = hw.open_controller(spec.scl, spec.sda, spec.address, frequency_hz)?;
        info!(
            id,
            address = spec.address,
            scl = spec.scl,
            sda = spec.sda,
            frequency_hz,
            "driver initialized"
        );
        controllers.insert(id, controller);
    }
    Ok(Drivers { controllers })
}
