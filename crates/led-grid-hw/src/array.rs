//! Array controller.
//!
//! On/off/PWM primitives over the resolved LED index, with the
//! electrical sequencing that keeps a common-cathode scanned grid free
//! of ghosting: anodes are PWM channels, cathodes sink current only
//! while driven low in output mode and float otherwise.

use crate::hal::{Direction, GpioPin, PwmChannel};
use crate::topology::Topology;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Full-scale 16-bit duty cycle.
pub const DUTY_MAX: u16 = 0xFFFF;

/// Hold-off after returning a cathode to input mode. Suppresses the
/// visible glitching caused by rapid cathode state changes.
const SETTLE_DELAY: Duration = Duration::from_micros(7500);

/// One addressable LED: slots into the sorted anode and cathode handle
/// lists. Handles are shared across the cross product, so LEDs carry
/// positions rather than owning pins.
#[derive(Debug, Clone, Copy)]
struct Led {
    anode: usize,
    cathode: usize,
}

/// A resolved, driveable LED grid.
///
/// Owns the activated anode channels and cathode pins in ascending
/// coordinate order, plus the dense 1-based LED index over their cross
/// product. Built by [`resolve`](crate::topology::resolve); lives for
/// the process duration and is only ever toggled, never rebuilt.
pub struct LedArray<Ch, P> {
    topology: Topology,
    anodes: Vec<Ch>,
    cathodes: Vec<P>,
    leds: BTreeMap<u16, Led>,
}

impl<Ch: PwmChannel, P: GpioPin> LedArray<Ch, P> {
    pub(crate) fn new(topology: Topology, anodes: Vec<Ch>, cathodes: Vec<P>) -> Self {
        debug_assert_eq!(anodes.len(), topology.anodes().len());
        debug_assert_eq!(cathodes.len(), topology.cathodes().len());
        let leds = topology
            .led_paths()
            .into_iter()
            .enumerate()
            .map(|(i, (anode, cathode))| (i as u16 + 1, Led { anode, cathode }))
            .collect();
        Self {
            topology,
            anodes,
            cathodes,
            leds,
        }
    }

    /// Number of addressable LEDs.
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    /// The wiring plan this array was resolved from.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The anode channel and cathode pin behind one LED index.
    pub fn led(&self, index: u16) -> Option<(&Ch, &P)> {
        let led = self.leds.get(&index)?;
        Some((&self.anodes[led.anode], &self.cathodes[led.cathode]))
    }

    /// Turns every LED off.
    ///
    /// Zeroes every anode duty cycle, then drives each cathode low once
    /// and returns it to input mode so it neither sinks current nor
    /// floats in a driven state. Idempotent; safe from any prior state.
    /// Aborts on the first failed write, leaving later pins untouched.
    pub fn all_off(&mut self) -> Result<()> {
        for anode in &mut self.anodes {
            anode.set_duty_cycle(0)?;
        }
        for cathode in &mut self.cathodes {
            cathode.set_direction(Direction::Output)?;
            cathode.set_value(false)?;
            cathode.set_direction(Direction::Input)?;
        }
        debug!("array off");
        Ok(())
    }

    /// Turns every LED on at the given brightness.
    ///
    /// Brightness wraps modulo 1 when above 1, and a resulting 0 is
    /// promoted to full brightness: this path never turns the array
    /// off. Cathodes are left driven low (active).
    pub fn all_on(&mut self, brightness: f32) -> Result<()> {
        let duty = duty_cycle(wrap_on(brightness));
        for anode in &mut self.anodes {
            anode.set_duty_cycle(duty)?;
        }
        for cathode in &mut self.cathodes {
            cathode.set_direction(Direction::Output)?;
            cathode.set_value(false)?;
        }
        debug!(duty, "array on");
        Ok(())
    }

    /// Lights a single LED for `duration`, then restores the off state.
    ///
    /// Unlike [`all_on`](Self::all_on), an exact 0 brightness is kept
    /// as a true off; only values above 1 wrap. Blocks the calling
    /// thread for `duration` plus a fixed settle delay after the
    /// cathode returns to input mode.
    pub fn pwm(&mut self, index: u16, brightness: f32, duration: Duration) -> Result<()> {
        let led = *self.leds.get(&index).ok_or(Error::UnknownLed {
            index,
            count: self.leds.len(),
        })?;
        let duty = duty_cycle(wrap_pwm(brightness));
        let anode = &mut self.anodes[led.anode];
        let cathode = &mut self.cathodes[led.cathode];

        cathode.set_direction(Direction::Output)?;
        cathode.set_value(false)?;
        anode.set_duty_cycle(duty)?;
        thread::sleep(duration);

        anode.set_duty_cycle(0)?;
        cathode.set_direction(Direction::Input)?;
        thread::sleep(SETTLE_DELAY);

        debug!(index, duty, "pwm pulse complete");
        Ok(())
    }
}

/// Whole-array brightness rule: wrap above 1, promote 0 to full.
/// Negative input clamps to 0 before the wrap rules apply.
fn wrap_on(brightness: f32) -> f32 {
    let mut b = brightness.max(0.0);
    if b > 1.0 {
        b %= 1.0;
    }
    if b == 0.0 {
        1.0
    } else {
        b
    }
}

/// Single-LED brightness rule: an exact 0 stays 0 (true off).
fn wrap_pwm(brightness: f32) -> f32 {
    if brightness <= 0.0 {
        0.0
    } else {
        wrap_on(brightness)
    }
}

fn duty_cycle(brightness: f32) -> u16 {
    (brightness * f32::from(DUTY_MAX)).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{initialize_drivers, DriverSpec};
    use crate::hal::Direction;
    use crate::mock::{MockChannel, MockHardware, MockPin, PinEvent};
    use crate::topology::{resolve, PinSpec};
    use std::collections::BTreeMap;

    fn reference_pins() -> Vec<PinSpec> {
        let cathodes = [(16, 6), (15, 5), (17, 4), (18, 3), (1, 2), (2, 1)];
        let anodes = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)];
        let mut pins = Vec::new();
        for (pin, row) in cathodes {
            pins.push(PinSpec {
                pin,
                row,
                col: 0,
                driver: 0,
            });
        }
        for (pin, col) in anodes {
            pins.push(PinSpec {
                pin,
                row: 0,
                col,
                driver: 1,
            });
        }
        pins
    }

    fn reference_array() -> LedArray<MockChannel, MockPin> {
        let mut hw = MockHardware::default();
        let specs = BTreeMap::from([(
            1,
            DriverSpec {
                scl: 21,
                sda: 20,
                address: 0x40,
            },
        )]);
        let mut drivers = initialize_drivers(&mut hw, &specs, 60).unwrap();
        resolve(&mut hw, &reference_pins(), &mut drivers).unwrap()
    }

    #[test]
    fn test_resolve_reference_grid_end_to_end() {
        let array = reference_array();
        assert_eq!(array.len(), 30);
        assert!(array.led(0).is_none());
        assert!(array.led(31).is_none());
        for index in 1..=30 {
            assert!(array.led(index).is_some());
        }

        // Row 1 comes first after the ascending sort, so LED 1 pairs
        // column 1 (channel 0) with the row-1 cathode on GPIO 2.
        let (anode, cathode) = array.led(1).unwrap();
        assert_eq!(anode.index, 0);
        assert_eq!(cathode.gpio, 2);

        let (anode, cathode) = array.led(30).unwrap();
        assert_eq!(anode.index, 4);
        assert_eq!(cathode.gpio, 16);

        // Indices 1..5 stay within row 1, walking every column once.
        for (offset, channel) in (1u16..=5).zip(0u8..) {
            let (anode, cathode) = array.led(offset).unwrap();
            assert_eq!(anode.index, channel);
            assert_eq!(cathode.gpio, 2);
        }

        // Resolution leaves everything off: duty 0, cathodes floating.
        for index in 1..=30 {
            let (anode, cathode) = array.led(index).unwrap();
            assert_eq!(anode.duty(), 0);
            assert_eq!(cathode.direction(), Direction::Input);
        }
    }

    #[test]
    fn test_all_on_full_brightness() {
        let mut array = reference_array();
        array.all_on(1.0).unwrap();
        for index in 1..=30 {
            let (anode, cathode) = array.led(index).unwrap();
            assert_eq!(anode.duty(), DUTY_MAX);
            assert_eq!(cathode.direction(), Direction::Output);
            assert!(!cathode.value());
        }
    }

    #[test]
    fn test_all_on_zero_wraps_to_full() {
        let mut array = reference_array();
        array.all_on(0.0).unwrap();
        let (anode, _) = array.led(1).unwrap();
        assert_eq!(anode.duty(), DUTY_MAX);
    }

    #[test]
    fn test_all_on_wraps_above_one() {
        let mut array = reference_array();
        array.all_on(1.5).unwrap();
        let (anode, _) = array.led(1).unwrap();
        assert_eq!(anode.duty(), duty_cycle(0.5));
    }

    #[test]
    fn test_all_off_idempotent() {
        let mut array = reference_array();
        array.all_on(0.75).unwrap();

        array.all_off().unwrap();
        let snapshot: Vec<_> = (1..=30)
            .map(|i| {
                let (anode, cathode) = array.led(i).unwrap();
                (anode.duty(), cathode.direction(), cathode.value())
            })
            .collect();

        array.all_off().unwrap();
        for (i, &(duty, direction, value)) in snapshot.iter().enumerate() {
            let (anode, cathode) = array.led(i as u16 + 1).unwrap();
            assert_eq!(anode.duty(), duty);
            assert_eq!(cathode.direction(), direction);
            assert_eq!(cathode.value(), value);
            assert_eq!(duty, 0);
            assert_eq!(direction, Direction::Input);
        }
    }

    #[test]
    fn test_pwm_sequencing() {
        let mut array = reference_array();
        array.pwm(1, 0.5, Duration::ZERO).unwrap();

        let (anode, cathode) = array.led(1).unwrap();
        // Duty: 0 at activation, on-value during the window, 0 after.
        assert_eq!(anode.history(), vec![0, duty_cycle(0.5), 0]);
        // Cathode: claimed as input, driven low for the window, then
        // floated again.
        assert_eq!(
            cathode.events(),
            vec![
                PinEvent::Direction(Direction::Input),
                PinEvent::Direction(Direction::Output),
                PinEvent::Value(false),
                PinEvent::Direction(Direction::Input),
            ]
        );
        assert_eq!(cathode.direction(), Direction::Input);
    }

    #[test]
    fn test_pwm_zero_brightness_is_true_off() {
        let mut array = reference_array();
        array.pwm(1, 0.0, Duration::ZERO).unwrap();
        let (anode, _) = array.led(1).unwrap();
        // The active window drives duty 0, unlike all_on's wrap rule.
        assert_eq!(anode.history(), vec![0, 0, 0]);
    }

    #[test]
    fn test_pwm_unknown_index_fails() {
        let mut array = reference_array();
        let err = array.pwm(31, 1.0, Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownLed {
                index: 31,
                count: 30
            }
        ));
    }

    #[test]
    fn test_pwm_touches_only_its_own_cathode() {
        let mut array = reference_array();
        // LED 7 sits in row 2 (GPIO 1); the row-1 cathode on GPIO 2
        // must keep nothing but its activation event.
        array.pwm(7, 1.0, Duration::ZERO).unwrap();
        let (_, row_one) = array.led(1).unwrap();
        assert_eq!(row_one.gpio, 2);
        assert_eq!(
            row_one.events(),
            vec![PinEvent::Direction(Direction::Input)]
        );
        let (_, row_two) = array.led(7).unwrap();
        assert_eq!(row_two.gpio, 1);
        assert_eq!(row_two.events().len(), 4);
    }

    #[test]
    fn test_wrap_on_rules() {
        assert_eq!(wrap_on(1.0), 1.0);
        assert_eq!(wrap_on(0.25), 0.25);
        assert_eq!(wrap_on(0.0), 1.0);
        assert_eq!(wrap_on(2.0), 1.0);
        assert_eq!(wrap_on(1.5), 0.5);
        assert_eq!(wrap_on(-3.0), 1.0);
    }

    #[test]
    fn test_wrap_pwm_rules() {
        assert_eq!(wrap_pwm(0.0), 0.0);
        assert_eq!(wrap_pwm(-1.0), 0.0);
        assert_eq!(wrap_pwm(0.25), 0.25);
        assert_eq!(wrap_pwm(1.5), 0.5);
        assert_eq!(wrap_pwm(2.0), 1.0);
    }

    #[test]
    fn test_duty_cycle_scaling() {
        assert_eq!(duty_cycle(1.0), DUTY_MAX);
        assert_eq!(duty_cycle(0.0), 0);
        assert_eq!(duty_cycle(0.5), 32768);
    }
}
