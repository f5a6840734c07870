//! Wiring configuration.

use anyhow::{bail, Context, Result};
use led_grid_hw::{DriverSpec, PinSpec, DEFAULT_FREQUENCY_HZ};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Wiring description for one LED grid.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Shared PWM frequency applied to every driver, in Hz.
    #[serde(default = "default_frequency")]
    pub frequency: u32,

    /// GPIO character device carrying the cathode lines.
    #[serde(default = "default_gpiochip")]
    pub gpiochip: String,

    /// Extra (SCL, SDA) to I2C device routes, e.g. for i2c-gpio
    /// overlay buses.
    #[serde(default, rename = "bus")]
    pub buses: Vec<BusConfig>,

    /// PWM driver chips.
    #[serde(default, rename = "driver")]
    pub drivers: Vec<DriverConfig>,

    /// Pin descriptions in wiring-list order. Order matters: the first
    /// anode decides the grid orientation.
    #[serde(rename = "pin")]
    pub pins: Vec<PinSpec>,
}

/// One additional bus route.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub scl: u8,
    pub sda: u8,
    pub path: String,
}

/// One PWM driver chip entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Caller-assigned id; anode pin entries reference it.
    pub id: u8,
    pub scl: u8,
    pub sda: u8,
    pub address: u8,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeMap::new();
        for driver in &self.drivers {
            if driver.id == 0 {
                bail!("driver id 0 is reserved for cathodes");
            }
            if seen.insert(driver.id, ()).is_some() {
                bail!("duplicate driver id {}", driver.id);
            }
        }
        Ok(())
    }

    /// Driver specs keyed by id, for the registry.
    pub fn driver_specs(&self) -> BTreeMap<u8, DriverSpec> {
        self.drivers
            .iter()
            .map(|d| {
                (
                    d.id,
                    DriverSpec {
                        scl: d.scl,
                        sda: d.sda,
                        address: d.address,
                    },
                )
            })
            .collect()
    }
}

fn default_frequency() -> u32 {
    DEFAULT_FREQUENCY_HZ
}

fn default_gpiochip() -> String {
    led_grid_hw::linux::DEFAULT_GPIOCHIP.to_string()
}
