//! Linux backend: GPIO character device cathodes and PCA9685 anodes.
//!
//! Buses are resolved through a static route table instead of building
//! device names at runtime: the Raspberry Pi's hardware I2C pairs are
//! built in, and `i2c-gpio` overlay buses on other pins can be
//! registered explicitly.

use crate::hal::{Direction, GpioPin, Hardware, PwmChannel, PwmController};
use crate::{Error, Result};
use gpio_cdev::{Chip, Line, LineHandle, LineRequestFlags};
use linux_embedded_hal::I2cdev;
use pwm_pca9685::{Address, Channel, Pca9685};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Default GPIO character device on Raspberry Pi OS.
pub const DEFAULT_GPIOCHIP: &str = "/dev/gpiochip0";

/// Consumer label shown in `gpioinfo` for claimed lines.
const CONSUMER: &str = "led-grid";

/// Internal oscillator frequency of the PCA9685.
const OSCILLATOR_HZ: u32 = 25_000_000;

/// Hardware I2C line pairs on the 40-pin header: (SCL, SDA, device).
const BUILTIN_ROUTES: &[(u8, u8, &str)] = &[(1, 0, "/dev/i2c-0"), (3, 2, "/dev/i2c-1")];

/// All sixteen PCA9685 output channels, indexed by channel number.
const CHANNELS: [Channel; 16] = [
    Channel::C0,
    Channel::C1,
    Channel::C2,
    Channel::C3,
    Channel::C4,
    Channel::C5,
    Channel::C6,
    Channel::C7,
    Channel::C8,
    Channel::C9,
    Channel::C10,
    Channel::C11,
    Channel::C12,
    Channel::C13,
    Channel::C14,
    Channel::C15,
];

fn channel_for(index: u8) -> Option<Channel> {
    CHANNELS.get(usize::from(index)).copied()
}

/// Converts a PWM frequency to the chip's prescale value:
/// round(25 MHz / (4096 * freq)) - 1, valid range 3..=255.
fn prescale_for(frequency_hz: u32) -> Result<u8> {
    let divisor = 4096u32
        .checked_mul(frequency_hz)
        .filter(|&d| d != 0)
        .ok_or(Error::InvalidFrequency(frequency_hz))?;
    let rounded = (OSCILLATOR_HZ + divisor / 2) / divisor;
    let prescale = rounded
        .checked_sub(1)
        .filter(|p| (3..=255).contains(p))
        .ok_or(Error::InvalidFrequency(frequency_hz))?;
    Ok(prescale as u8)
}

/// An extra (SCL, SDA) to I2C device route.
#[derive(Debug, Clone)]
struct BusRoute {
    scl: u8,
    sda: u8,
    path: String,
}

/// Hardware provider backed by the Linux GPIO character device and
/// `/dev/i2c-*` buses.
pub struct LinuxHardware {
    chip: Chip,
    routes: Vec<BusRoute>,
}

impl LinuxHardware {
    /// Opens the default GPIO chip.
    pub fn new() -> Result<Self> {
        Self::with_gpiochip(DEFAULT_GPIOCHIP)
    }

    /// Opens a specific GPIO character device.
    pub fn with_gpiochip(path: &str) -> Result<Self> {
        let chip = Chip::new(path).map_err(|e| Error::GpioChip {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            chip,
            routes: Vec::new(),
        })
    }

    /// Registers an additional (SCL, SDA) to I2C device route, e.g.
    /// `/dev/i2c-3` created by a `dtoverlay=i2c-gpio` entry. Registered
    /// routes take precedence over the built-in hardware pairs.
    pub fn register_bus(&mut self, scl: u8, sda: u8, path: impl Into<String>) {
        self.routes.push(BusRoute {
            scl,
            sda,
            path: path.into(),
        });
    }

    fn bus_path(&self, scl: u8, sda: u8) -> Option<&str> {
        route_lookup(&self.routes, scl, sda)
    }
}

fn route_lookup(routes: &[BusRoute], scl: u8, sda: u8) -> Option<&str> {
    routes
        .iter()
        .find(|r| r.scl == scl && r.sda == sda)
        .map(|r| r.path.as_str())
        .or_else(|| {
            BUILTIN_ROUTES
                .iter()
                .find(|(s, d, _)| *s == scl && *d == sda)
                .map(|(_, _, path)| *path)
        })
}

impl Hardware for LinuxHardware {
    type Controller = Pca9685Controller;
    type Pin = LinuxPin;

    fn open_controller(
        &mut self,
        scl: u8,
        sda: u8,
        address: u8,
        frequency_hz: u32,
    ) -> Result<Pca9685Controller> {
        let path = self
            .bus_path(scl, sda)
            .ok_or(Error::UnknownBus { scl, sda })?
            .to_string();
        let prescale = prescale_for(frequency_hz)?;

        let i2c = I2cdev::new(&path).map_err(|e| Error::BusUnavailable {
            scl,
            sda,
            reason: e.to_string(),
        })?;

        let mut pca = Pca9685::new(i2c, Address::from(address)).map_err(|e| {
            Error::ControllerInit {
                address,
                reason: format!("{e:?}"),
            }
        })?;
        // The chip powers up asleep; prescale can only change in that
        // state, so set it before enabling.
        pca.set_prescale(prescale)
            .and_then(|()| pca.enable())
            .map_err(|e| Error::ControllerInit {
                address,
                reason: format!("{e:?}"),
            })?;

        debug!(scl, sda, address, frequency_hz, bus = %path, "PWM controller attached");
        Ok(Pca9685Controller {
            pca: Rc::new(RefCell::new(pca)),
            address,
        })
    }

    fn claim_pin(&mut self, gpio: u8) -> Result<LinuxPin> {
        let line = self
            .chip
            .get_line(u32::from(gpio))
            .map_err(|e| gpio_error(gpio, &e))?;
        // Claim as input immediately: high impedance, and the line
        // stays reserved for the process lifetime.
        let handle = line
            .request(LineRequestFlags::INPUT, 0, CONSUMER)
            .map_err(|e| gpio_error(gpio, &e))?;
        debug!(gpio, "cathode line claimed");
        Ok(LinuxPin {
            line,
            offset: gpio,
            direction: Direction::Input,
            value: false,
            handle: Some(handle),
        })
    }
}

fn gpio_error(line: u8, err: &gpio_cdev::errors::Error) -> Error {
    Error::Gpio {
        line,
        reason: err.to_string(),
    }
}

type SharedPca = Rc<RefCell<Pca9685<I2cdev>>>;

/// One PCA9685 chip. Channel handles share the chip over a reference
/// count; the library is single-threaded, so no lock is taken.
pub struct Pca9685Controller {
    pca: SharedPca,
    address: u8,
}

impl PwmController for Pca9685Controller {
    type Channel = Pca9685Channel;

    fn channel(&mut self, index: u8) -> Result<Pca9685Channel> {
        let channel = channel_for(index).ok_or(Error::UnknownChannel(index))?;
        Ok(Pca9685Channel {
            pca: Rc::clone(&self.pca),
            channel,
            address: self.address,
        })
    }
}

/// One output channel on a shared PCA9685.
pub struct Pca9685Channel {
    pca: SharedPca,
    channel: Channel,
    address: u8,
}

/// Register-level write for one duty request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DutyWrite {
    /// Full-off bit set; the output is truly idle.
    FullOff,
    /// Full-on bit set; no PWM edge at all.
    FullOn,
    /// Regular on/off counts over the 12-bit cycle.
    OnOff(u16),
}

/// Maps the 16-bit duty to the chip's 12-bit counts. The two
/// extremes use the dedicated full-off/full-on bits.
fn duty_write(duty: u16) -> DutyWrite {
    match duty {
        0 => DutyWrite::FullOff,
        crate::array::DUTY_MAX => DutyWrite::FullOn,
        _ => DutyWrite::OnOff(duty >> 4),
    }
}

impl PwmChannel for Pca9685Channel {
    fn set_duty_cycle(&mut self, duty: u16) -> Result<()> {
        let mut pca = self.pca.borrow_mut();
        let result = match duty_write(duty) {
            DutyWrite::FullOff => pca.set_channel_full_off(self.channel),
            DutyWrite::FullOn => pca.set_channel_full_on(self.channel, 0),
            DutyWrite::OnOff(off) => pca.set_channel_on_off(self.channel, 0, off),
        };
        result.map_err(|e| Error::ControllerWrite {
            address: self.address,
            reason: format!("{e:?}"),
        })
    }
}

/// A cathode GPIO line.
///
/// The character device fixes a line's direction at request time, so
/// direction flips release and re-request the line. The latched value
/// becomes the default driven level when switching to output.
pub struct LinuxPin {
    line: Line,
    offset: u8,
    direction: Direction,
    value: bool,
    handle: Option<LineHandle>,
}

impl GpioPin for LinuxPin {
    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let flags = match direction {
            Direction::Input => LineRequestFlags::INPUT,
            Direction::Output => LineRequestFlags::OUTPUT,
        };
        // Drop the old request before taking the new one.
        self.handle = None;
        let handle = self
            .line
            .request(flags, u8::from(self.value), CONSUMER)
            .map_err(|e| gpio_error(self.offset, &e))?;
        self.handle = Some(handle);
        self.direction = direction;
        Ok(())
    }

    fn set_value(&mut self, value: bool) -> Result<()> {
        self.value = value;
        if self.direction == Direction::Output {
            if let Some(handle) = &self.handle {
                handle
                    .set_value(u8::from(value))
                    .map_err(|e| gpio_error(self.offset, &e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescale_for_common_frequencies() {
        // Datasheet example: 60 Hz -> round(25e6 / (4096 * 60)) - 1.
        assert_eq!(prescale_for(60).unwrap(), 101);
        assert_eq!(prescale_for(200).unwrap(), 30);
        assert_eq!(prescale_for(1526).unwrap(), 3);
    }

    #[test]
    fn test_prescale_rejects_out_of_range() {
        assert!(matches!(
            prescale_for(0),
            Err(Error::InvalidFrequency(0))
        ));
        // Too fast: prescale would fall below 3.
        assert!(prescale_for(2000).is_err());
        // Too slow: prescale would exceed 255.
        assert!(prescale_for(20).is_err());
        // Frequencies whose 4096x divisor exceeds u32 must error, not
        // wrap.
        assert!(matches!(
            prescale_for(2_000_000),
            Err(Error::InvalidFrequency(2_000_000))
        ));
        assert!(prescale_for(u32::MAX).is_err());
    }

    #[test]
    fn test_duty_write_extremes_use_full_bits() {
        assert_eq!(duty_write(0), DutyWrite::FullOff);
        assert_eq!(duty_write(crate::array::DUTY_MAX), DutyWrite::FullOn);
        assert_eq!(duty_write(0x8000), DutyWrite::OnOff(0x0800));
        assert_eq!(duty_write(1), DutyWrite::OnOff(0));
        assert_eq!(duty_write(0xFFFE), DutyWrite::OnOff(0x0FFF));
    }

    #[test]
    fn test_channel_lookup_table() {
        assert!(matches!(channel_for(0), Some(Channel::C0)));
        assert!(matches!(channel_for(15), Some(Channel::C15)));
        assert!(channel_for(16).is_none());
    }

    #[test]
    fn test_registered_routes_override_builtins() {
        let routes = vec![BusRoute {
            scl: 3,
            sda: 2,
            path: "/dev/i2c-9".to_string(),
        }];
        assert_eq!(route_lookup(&routes, 3, 2), Some("/dev/i2c-9"));
        assert_eq!(route_lookup(&[], 3, 2), Some("/dev/i2c-1"));
        assert_eq!(route_lookup(&[], 1, 0), Some("/dev/i2c-0"));
        assert_eq!(route_lookup(&[], 21, 20), None);
    }
}
