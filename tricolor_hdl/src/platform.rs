//! Capabilities an elaboration context can offer a module.
//!
//! Every backend hands the module a [`Platform`]. The synthesis backend's
//! platform also carries a [`ResourceBinder`] that maps logical requests to
//! package pins; simulation and formal contexts carry none, and modules leave
//! their outputs as internal signals.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource unavailable: {name}#{number} is not in the platform's resource table")]
    Unavailable { name: String, number: u32 },
    #[error("Resource {name}#{number} has no subsignal '{subsignal}'")]
    MissingSubsignal {
        name: String,
        number: u32,
        subsignal: String,
    },
}

/// One physical package pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    /// Package ball or pin name, e.g. `C5`.
    pub name: String,
    /// The pin is active-low.
    pub invert: bool,
}

impl Pin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invert: false,
        }
    }

    pub fn inverted(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invert: true,
        }
    }
}

/// The pins a resource request resolved to. Single-pin resources use the
/// subsignal name `io`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinBinding {
    pub name: String,
    pub number: u32,
    pub subsignals: IndexMap<String, Pin>,
}

impl PinBinding {
    pub fn subsignal(&self, subsignal: &str) -> Result<&Pin, ResourceError> {
        self.subsignals
            .get(subsignal)
            .ok_or_else(|| ResourceError::MissingSubsignal {
                name: self.name.clone(),
                number: self.number,
                subsignal: subsignal.to_string(),
            })
    }

    /// Prefix for port names derived from this binding, e.g. `rgb_led_0`.
    pub fn port_prefix(&self) -> String {
        format!("{}_{}", self.name, self.number)
    }
}

/// Maps named logical resources to physical pins.
pub trait ResourceBinder {
    fn request(&self, name: &str, number: u32) -> Result<PinBinding, ResourceError>;

    /// Name of the resource that carries the primary clock.
    fn default_clock(&self) -> &str;
}

/// What a backend offers a module during elaboration.
pub trait Platform {
    /// Frequency of the clock the design will run from, if the platform has
    /// one.
    fn clock_frequency(&self) -> Option<u64>;

    /// Pin binder, if the design is going to real hardware.
    fn resources(&self) -> Option<&dyn ResourceBinder> {
        None
    }
}

/// No platform at all: default clock, no pins.
impl Platform for () {
    fn clock_frequency(&self) -> Option<u64> {
        None
    }
}

/// Platform for simulation and formal runs: a known clock and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualPlatform {
    clock_frequency: u64,
}

impl VirtualPlatform {
    pub fn new(clock_frequency: u64) -> Self {
        Self { clock_frequency }
    }
}

impl Platform for VirtualPlatform {
    fn clock_frequency(&self) -> Option<u64> {
        Some(self.clock_frequency)
    }
}
