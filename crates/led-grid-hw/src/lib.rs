//! LED Grid Hardware Library
//!
//! Drives a multiplexed LED grid from a single-board computer: cathode
//! rows (or columns) on directly-wired GPIO lines, anodes on PCA9685
//! PWM channels over I2C. The core is the topology resolution layer:
//! an unordered wiring description is classified into roles, sorted
//! into physical order, and turned into a dense 1-based LED index that
//! the on/off/PWM primitives operate on.

pub mod array;
pub mod driver;
pub mod error;
pub mod hal;
pub mod linux;
pub mod topology;

#[cfg(test)]
mod mock;

pub use array::{LedArray, DUTY_MAX};
pub use driver::{initialize_drivers, DriverSpec, Drivers};
pub use error::{Error, Result};
pub use hal::{Direction, GpioPin, Hardware, PwmChannel, PwmController};
pub use topology::{resolve, Orientation, PinSpec, Topology};

/// Default shared PWM frequency applied to every driver, in Hz.
pub const DEFAULT_FREQUENCY_HZ: u32 = 60;
