//! Hardware seam traits.
//!
//! The core only ever sees "a PWM channel with a settable duty cycle"
//! and "a GPIO pin whose direction can be flipped". Production code
//! plugs in the Linux backend from [`crate::linux`]; tests plug in a
//! recording mock.

use crate::Result;

/// GPIO pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// High impedance; the pin neither sources nor sinks current.
    Input,
    /// Actively driven to the latched value.
    Output,
}

/// One PWM output channel on a driver chip.
pub trait PwmChannel {
    /// Sets the duty cycle over the full 16-bit range (0 = off,
    /// 0xFFFF = always on).
    fn set_duty_cycle(&mut self, duty: u16) -> Result<()>;
}

/// A PWM controller chip exposing an indexed set of channels.
///
/// Channel handles share the chip; writes to distinct channels are
/// independent at the protocol level but serialized by the bus.
pub trait PwmController {
    type Channel: PwmChannel;

    /// Returns a handle to the given channel, or
    /// [`Error::UnknownChannel`](crate::Error::UnknownChannel) if the
    /// chip has no such channel.
    fn channel(&mut self, index: u8) -> Result<Self::Channel>;
}

/// A configurable GPIO pin.
///
/// A value set while in input mode is latched and driven on the next
/// switch to output.
pub trait GpioPin {
    fn set_direction(&mut self, direction: Direction) -> Result<()>;
    fn set_value(&mut self, value: bool) -> Result<()>;
}

/// Provider of bus-attached PWM controllers and GPIO pins.
pub trait Hardware {
    type Controller: PwmController;
    type Pin: GpioPin;

    /// Opens the two-wire serial bus on the given clock/data lines and
    /// attaches a PWM controller at `address`, configured to
    /// `frequency_hz`. The bus handle is owned by the returned
    /// controller for its lifetime.
    fn open_controller(
        &mut self,
        scl: u8,
        sda: u8,
        address: u8,
        frequency_hz: u32,
    ) -> Result<Self::Controller>;

    /// Claims exclusive ownership of a GPIO line by number. The pin
    /// starts in input mode.
    fn claim_pin(&mut self, gpio: u8) -> Result<Self::Pin>;
}
