//! Recording hardware provider for unit tests.
//!
//! Channels and pins log every write so tests can assert on both final
//! state and sequencing. Interior mutability mirrors the library's
//! single-threaded model.

use crate::hal::{Direction, GpioPin, Hardware, PwmChannel, PwmController};
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

const CHANNEL_COUNT: u8 = 16;

type DutyLog = Rc<RefCell<BTreeMap<u8, Vec<u16>>>>;

#[derive(Default)]
pub(crate) struct MockHardware {
    pub(crate) claimed_pins: Vec<u8>,
}

impl Hardware for MockHardware {
    type Controller = MockController;
    type Pin = MockPin;

    fn open_controller(
        &mut self,
        scl: u8,
        sda: u8,
        address: u8,
        frequency_hz: u32,
    ) -> Result<MockController> {
        Ok(MockController {
            scl,
            sda,
            address,
            frequency_hz,
            duties: Rc::default(),
        })
    }

    fn claim_pin(&mut self, gpio: u8) -> Result<MockPin> {
        self.claimed_pins.push(gpio);
        Ok(MockPin {
            gpio,
            state: Rc::new(RefCell::new(PinState {
                direction: Direction::Input,
                value: false,
                events: Vec::new(),
            })),
        })
    }
}

pub(crate) struct MockController {
    pub(crate) scl: u8,
    pub(crate) sda: u8,
    pub(crate) address: u8,
    pub(crate) frequency_hz: u32,
    duties: DutyLog,
}

impl PwmController for MockController {
    type Channel = MockChannel;

    fn channel(&mut self, index: u8) -> Result<MockChannel> {
        if index >= CHANNEL_COUNT {
            return Err(Error::UnknownChannel(index));
        }
        Ok(MockChannel {
            index,
            duties: Rc::clone(&self.duties),
        })
    }
}

pub(crate) struct MockChannel {
    pub(crate) index: u8,
    duties: DutyLog,
}

impl MockChannel {
    /// Most recent duty-cycle write, or 0 if none happened.
    pub(crate) fn duty(&self) -> u16 {
        self.history().last().copied().unwrap_or(0)
    }

    /// Every duty-cycle write in order.
    pub(crate) fn history(&self) -> Vec<u16> {
        self.duties
            .borrow()
            .get(&self.index)
            .cloned()
            .unwrap_or_default()
    }
}

impl PwmChannel for MockChannel {
    fn set_duty_cycle(&mut self, duty: u16) -> Result<()> {
        self.duties
            .borrow_mut()
            .entry(self.index)
            .or_default()
            .push(duty);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PinEvent {
    Direction(Direction),
    Value(bool),
}

struct PinState {
    direction: Direction,
    value: bool,
    events: Vec<PinEvent>,
}

pub(crate) struct MockPin {
    pub(crate) gpio: u8,
    state: Rc<RefCell<PinState>>,
}

impl MockPin {
    pub(crate) fn direction(&self) -> Direction {
        self.state.borrow().direction
    }

    pub(crate) fn value(&self) -> bool {
        self.state.borrow().value
    }

    pub(crate) fn events(&self) -> Vec<PinEvent> {
        self.state.borrow().events.clone()
    }
}

impl GpioPin for MockPin {
    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.direction = direction;
        state.events.push(PinEvent::Direction(direction));
        Ok(())
    }

    fn set_value(&mut self, value: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.value = value;
        state.events.push(PinEvent::Value(value));
        Ok(())
    }
}
