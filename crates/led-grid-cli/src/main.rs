//! LED Grid Control Tool
//!
//! Loads a TOML wiring description, resolves it into an addressable
//! LED array, and drives it: whole-array on/off, single-LED pulses,
//! or a full scan walking every index.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use led_grid_hw::linux::LinuxHardware;
use led_grid_hw::{initialize_drivers, resolve, Topology};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledgrid")]
#[command(about = "Drive a GPIO/PCA9685 multiplexed LED grid")]
#[command(version)]
struct Cli {
    /// Path to the wiring configuration
    #[arg(short, long, default_value = "ledgrid.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn every LED on
    On {
        /// Brightness factor; values above 1 wrap, 0 means full
        #[arg(long, default_value_t = 1.0)]
        brightness: f32,
    },
    /// Turn every LED off
    Off,
    /// Light a single LED for a while
    Pwm {
        /// 1-based LED index
        index: u16,

        /// Brightness factor; 0 keeps the LED dark
        #[arg(long, default_value_t = 1.0)]
        brightness: f32,

        /// Seconds to keep the LED lit
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },
    /// Walk every LED in index order
    Scan {
        #[arg(long, default_value_t = 1.0)]
        brightness: f32,

        /// Seconds per LED
        #[arg(long, default_value_t = 0.25)]
        duration: f64,
    },
    /// Print the resolved wiring plan without touching hardware
    Topology,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // The wiring report needs no hardware at all.
    if matches!(cli.command, Commands::Topology) {
        return print_topology(&config);
    }

    let mut hw = LinuxHardware::with_gpiochip(&config.gpiochip)?;
    for bus in &config.buses {
        hw.register_bus(bus.scl, bus.sda, bus.path.clone());
    }

    let mut drivers = initialize_drivers(&mut hw, &config.driver_specs(), config.frequency)?;
    let mut array = resolve(&mut hw, &config.pins, &mut drivers)?;
    info!(
        leds = array.len(),
        orientation = %array.topology().orientation(),
        "array resolved"
    );

    match cli.command {
        Commands::On { brightness } => array.all_on(brightness)?,
        Commands::Off => array.all_off()?,
        Commands::Pwm {
            index,
            brightness,
            duration,
        } => {
            array.pwm(index, brightness, Duration::from_secs_f64(duration))?;
        }
        Commands::Scan {
            brightness,
            duration,
        } => {
            let duration = Duration::from_secs_f64(duration);
            for index in 1..=array.len() as u16 {
                array.pwm(index, brightness, duration)?;
            }
        }
        Commands::Topology => unreachable!("handled before hardware setup"),
    }

    Ok(())
}

fn print_topology(config: &Config) -> Result<()> {
    let topology = Topology::plan(&config.pins)?;

    println!("orientation: {}", topology.orientation());
    println!("anodes ({}):", topology.anodes().len());
    for anode in topology.anodes() {
        println!(
            "  coord {:>3}  driver {} channel {}",
            anode.coordinate, anode.driver, anode.channel
        );
    }
    println!("cathodes ({}):", topology.cathodes().len());
    for cathode in topology.cathodes() {
        println!("  coord {:>3}  GPIO {}", cathode.coordinate, cathode.gpio);
    }
    println!("LEDs: {}", topology.led_count());
    for (i, (anode_slot, cathode_slot)) in topology.led_paths().into_iter().enumerate() {
        let anode = &topology.anodes()[anode_slot];
        let cathode = &topology.cathodes()[cathode_slot];
        println!(
            "  {:>3}: driver {} channel {:>2} / GPIO {:>2}",
            i + 1,
            anode.driver,
            anode.channel,
            cathode.gpio
        );
    }
    Ok(())
}
