//! Wiring topology resolution.
//!
//! Consumes an ordered list of loosely-structured pin descriptions,
//! partitions them into anode/cathode roles, infers whether anodes
//! address rows or columns, sorts each role into ascending physical
//! order, and produces a dense 1-based LED index over the full
//! anode × cathode cross product.

use crate::array::LedArray;
use crate::driver::Drivers;
use crate::hal::{Direction, GpioPin, Hardware, PwmChannel, PwmController};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single physical connection description.
///
/// Exactly one of `row`/`col` carries the real grid coordinate; the
/// other holds the 0 sentinel. `driver` 0 marks a cathode wired
/// straight to a GPIO line; any other value marks an anode on that
/// driver's channel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    /// GPIO number for cathodes, driver channel number for anodes.
    pub pin: u8,
    /// Row this pin addresses, or 0 if it addresses a column.
    #[serde(default)]
    pub row: u16,
    /// Column this pin addresses, or 0 if it addresses a row.
    #[serde(default)]
    pub col: u16,
    /// Owning driver id for anodes; 0 marks a cathode.
    #[serde(default)]
    pub driver: u8,
}

impl PinSpec {
    /// True if this pin is an anode (has an associated driver).
    pub fn is_anode(&self) -> bool {
        self.driver != 0
    }
}

/// Which role the anode pins play in the grid.
///
/// Inferred from the first anode encountered and applied uniformly:
/// an anode whose `row` field holds the 0 sentinel carries its live
/// coordinate in the column slot, so anodes address columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Anodes address columns; cathodes address rows.
    ColumnAnodes,
    /// Anodes address rows; cathodes address columns.
    RowAnodes,
}

impl Orientation {
    /// True if anodes address columns.
    pub fn anodes_are_columns(self) -> bool {
        matches!(self, Orientation::ColumnAnodes)
    }

    fn infer(first_anode: &PinSpec) -> Result<Self> {
        match (first_anode.row, first_anode.col) {
            (0, col) if col > 0 => Ok(Orientation::ColumnAnodes),
            (row, 0) if row > 0 => Ok(Orientation::RowAnodes),
            (row, col) => Err(Error::AmbiguousCoordinate {
                role: "anode",
                pin: first_anode.pin,
                row,
                col,
            }),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::ColumnAnodes => write!(f, "column-anodes"),
            Orientation::RowAnodes => write!(f, "row-anodes"),
        }
    }
}

/// One anode connection after role classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnodePin {
    /// Driver id owning the channel.
    pub driver: u8,
    /// Channel number on that driver.
    pub channel: u8,
    /// Grid coordinate (column if anodes are columns, else row).
    pub coordinate: u16,
}

/// One cathode connection after role classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CathodePin {
    /// GPIO line number.
    pub gpio: u8,
    /// Grid coordinate (row if anodes are columns, else column).
    pub coordinate: u16,
}

/// The classified, sorted wiring plan for one LED grid.
///
/// Purely descriptive: building a plan touches no hardware, so the
/// addressing algebra can be inspected (and tested) before any bus or
/// GPIO line is claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    orientation: Orientation,
    anodes: Vec<AnodePin>,
    cathodes: Vec<CathodePin>,
}

impl Topology {
    /// Classifies and sorts `pins` into a wiring plan.
    ///
    /// Pins are partitioned by driver reference, orientation is
    /// inferred from the first anode in slice order, and each role is
    /// stably sorted by ascending coordinate (ties keep encounter
    /// order). Every pin must agree with the inferred orientation.
    pub fn plan(pins: &[PinSpec]) -> Result<Self> {
        let anode_specs: Vec<&PinSpec> = pins.iter().filter(|p| p.is_anode()).collect();
        let cathode_specs: Vec<&PinSpec> = pins.iter().filter(|p| !p.is_anode()).collect();

        let first = *anode_specs.first().ok_or(Error::NoAnodes)?;
        let orientation = Orientation::infer(first)?;

        let mut anodes = anode_specs
            .iter()
            .map(|spec| anode_entry(orientation, spec))
            .collect::<Result<Vec<_>>>()?;
        let mut cathodes = cathode_specs
            .iter()
            .map(|spec| cathode_entry(orientation, spec))
            .collect::<Result<Vec<_>>>()?;

        anodes.sort_by_key(|a| a.coordinate);
        cathodes.sort_by_key(|c| c.coordinate);

        debug!(
            %orientation,
            anodes = anodes.len(),
            cathodes = cathodes.len(),
            "wiring plan built"
        );

        Ok(Self {
            orientation,
            anodes,
            cathodes,
        })
    }

    /// The inferred anode orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Anode connections in ascending coordinate order.
    pub fn anodes(&self) -> &[AnodePin] {
        &self.anodes
    }

    /// Cathode connections in ascending coordinate order.
    pub fn cathodes(&self) -> &[CathodePin] {
        &self.cathodes
    }

    /// Number of addressable LEDs (full cross product).
    pub fn led_count(&self) -> usize {
        self.anodes.len() * self.cathodes.len()
    }

    /// LED paths in index-assignment order.
    ///
    /// Each entry is a `(anode slot, cathode slot)` pair into the
    /// sorted role lists; entry `i` belongs to LED index `i + 1`. The
    /// outer loop iterates the role that does *not* match the anode
    /// orientation, so consecutive indices trace one grid row before
    /// advancing to the next.
    pub fn led_paths(&self) -> Vec<(usize, usize)> {
        let mut paths = Vec::with_capacity(self.led_count());
        if self.orientation.anodes_are_columns() {
            for cathode in 0..self.cathodes.len() {
                for anode in 0..self.anodes.len() {
                    paths.push((anode, cathode));
                }
            }
        } else {
            for anode in 0..self.anodes.len() {
                for cathode in 0..self.cathodes.len() {
                    paths.push((anode, cathode));
                }
            }
        }
        paths
    }
}

fn anode_entry(orientation: Orientation, spec: &PinSpec) -> Result<AnodePin> {
    let coordinate = match orientation {
        Orientation::ColumnAnodes if spec.row == 0 && spec.col > 0 => spec.col,
        Orientation::RowAnodes if spec.col == 0 && spec.row > 0 => spec.row,
        _ => {
            return Err(Error::MixedOrientation {
                role: "anode",
                pin: spec.pin,
                orientation,
            })
        }
    };
    Ok(AnodePin {
        driver: spec.driver,
        channel: spec.pin,
        coordinate,
    })
}

fn cathode_entry(orientation: Orientation, spec: &PinSpec) -> Result<CathodePin> {
    // Cathodes carry the coordinate complementary to the anodes'.
    let coordinate = match orientation {
        Orientation::ColumnAnodes if spec.col == 0 && spec.row > 0 => spec.row,
        Orientation::RowAnodes if spec.row == 0 && spec.col > 0 => spec.col,
        _ => {
            return Err(Error::MixedOrientation {
                role: "cathode",
                pin: spec.pin,
                orientation,
            })
        }
    };
    Ok(CathodePin {
        gpio: spec.pin,
        coordinate,
    })
}

/// Resolves `pins` against initialized `drivers` into a live
/// [`LedArray`].
///
/// Builds the wiring plan, then acquires one PWM channel per anode
/// (duty cycle forced to 0) and one GPIO line per cathode (direction
/// forced to input, the grid's off state). Anode channels are looked
/// up on the driver each spec references; a missing driver id fails
/// before any cathode line is claimed.
pub fn resolve<H: Hardware>(
    hw: &mut H,
    pins: &[PinSpec],
    drivers: &mut Drivers<H::Controller>,
) -> Result<LedArray<<H::Controller as PwmController>::Channel, H::Pin>> {
    let topology = Topology::plan(pins)?;

    let mut channels = Vec::with_capacity(topology.anodes().len());
    for anode in topology.anodes() {
        let controller = drivers.get_mut(anode.driver).ok_or(Error::UnknownDriver {
            driver: anode.driver,
            channel: anode.channel,
        })?;
        let mut channel = controller.channel(anode.channel)?;
        channel.set_duty_cycle(0)?;
        channels.push(channel);
    }

    let mut pins_out = Vec::with_capacity(topology.cathodes().len());
    for cathode in topology.cathodes() {
        let mut pin = hw.claim_pin(cathode.gpio)?;
        pin.set_direction(Direction::Input)?;
        pins_out.push(pin);
    }

    debug!(leds = topology.led_count(), "topology resolved");
    Ok(LedArray::new(topology, channels, pins_out))
}
