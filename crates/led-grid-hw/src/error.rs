//! Error types for the LED grid hardware library.

use crate::topology::Orientation;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while initializing drivers, resolving the
/// topology, or driving the array.
#[derive(Error, Debug)]
pub enum Error {
    /// No I2C bus is routed over the given clock/data line pair.
    #[error("no I2C bus registered for SCL {scl}/SDA {sda}")]
    UnknownBus { scl: u8, sda: u8 },

    /// The I2C bus exists but could not be opened or claimed.
    #[error("I2C bus unavailable on SCL {scl}/SDA {sda}: {reason}")]
    BusUnavailable { scl: u8, sda: u8, reason: String },

    /// The PWM controller did not come up at the given bus address.
    #[error("PWM controller at address {address:#04x} did not respond: {reason}")]
    ControllerInit { address: u8, reason: String },

    /// PWM frequency outside the controller's supported range.
    #[error("unsupported PWM frequency: {0} Hz")]
    InvalidFrequency(u32),

    /// A duty-cycle write to an already-initialized controller failed.
    #[error("PWM write to controller {address:#04x} failed: {reason}")]
    ControllerWrite { address: u8, reason: String },

    /// GPIO character device could not be opened.
    #[error("GPIO chip {path} unavailable: {reason}")]
    GpioChip { path: String, reason: String },

    /// GPIO line could not be claimed or written.
    #[error("GPIO line {line} error: {reason}")]
    Gpio { line: u8, reason: String },

    /// The pin map contains no anode specs, so orientation cannot be
    /// inferred and no LED can be addressed.
    #[error("pin map contains no anode pins")]
    NoAnodes,

    /// A pin spec has both row and column set, or neither, so its live
    /// coordinate cannot be determined.
    #[error("{role} pin {pin}: exactly one of row/col must be nonzero (got row {row}, col {col})")]
    AmbiguousCoordinate {
        role: &'static str,
        pin: u8,
        row: u16,
        col: u16,
    },

    /// A pin spec disagrees with the orientation inferred from the
    /// first anode.
    #[error("{role} pin {pin} does not match the {orientation} orientation")]
    MixedOrientation {
        role: &'static str,
        pin: u8,
        orientation: Orientation,
    },

    /// An anode spec references a driver id that was never initialized.
    #[error("anode channel {channel} references unknown driver {driver}")]
    UnknownDriver { driver: u8, channel: u8 },

    /// A channel number beyond what the controller provides.
    #[error("PWM controller has no channel {0}")]
    UnknownChannel(u8),

    /// An LED index outside the resolved array.
    #[error("no LED with index {index} (array has {count} LEDs)")]
    UnknownLed { index: u16, count: usize },
}
