//! Fomu resource tables and the synthesis platform built on them.
//!
//! Only the pins the blinker can ask for are listed. Both revisions carry an
//! iCE40UP5K in the UWG30 package with a 48 MHz oscillator; they differ in
//! where the clock and the LED are wired.

use indexmap::IndexMap;
use tricolor_common::BoardRevision;
use tricolor_hdl::{Pin, PinBinding, Platform, ResourceBinder, ResourceError};

/// A (subsignal, pin, active-low) triple.
type PinSpec = (&'static str, &'static str, bool);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub name: &'static str,
    pub number: u32,
    pub pins: &'static [PinSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub revision: BoardRevision,
    pub device: &'static str,
    /// Device flag for nextpnr-ice40, without the leading dashes.
    pub nextpnr_device: &'static str,
    pub package: &'static str,
    pub clock_frequency: u64,
    pub default_clock: &'static str,
    pub resources: &'static [Resource],
}

static FOMU_PVT: Board = Board {
    revision: BoardRevision::Pvt,
    device: "iCE40UP5K",
    nextpnr_device: "up5k",
    package: "uwg30",
    clock_frequency: 48_000_000,
    default_clock: "clk48",
    resources: &[
        Resource {
            name: "clk48",
            number: 0,
            pins: &[("io", "F4", false)],
        },
        Resource {
            name: "rgb_led",
            number: 0,
            pins: &[("r", "C5", true), ("g", "B5", true), ("b", "A5", true)],
        },
    ],
};

static FOMU_HACKER: Board = Board {
    revision: BoardRevision::Hacker,
    device: "iCE40UP5K",
    nextpnr_device: "up5k",
    package: "uwg30",
    clock_frequency: 48_000_000,
    default_clock: "clk48",
    resources: &[
        Resource {
            name: "clk48",
            number: 0,
            pins: &[("io", "F5", false)],
        },
        Resource {
            name: "rgb_led",
            number: 0,
            pins: &[("r", "A5", true), ("g", "B5", true), ("b", "C5", true)],
        },
    ],
};

impl Board {
    #[must_use]
    pub fn for_revision(revision: BoardRevision) -> &'static Self {
        match revision {
            BoardRevision::Pvt => &FOMU_PVT,
            BoardRevision::Hacker => &FOMU_HACKER,
        }
    }

    pub fn resource(&self, name: &str, number: u32) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.name == name && r.number == number)
    }
}

/// Synthesis platform: a board table plus an optional clock override.
///
/// The override only changes what the design assumes about its clock (and so
/// its divisor); the physical oscillator is whatever the board has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FomuPlatform {
    board: &'static Board,
    frequency: Option<u64>,
}

impl FomuPlatform {
    pub fn new(revision: BoardRevision) -> Self {
        Self {
            board: Board::for_revision(revision),
            frequency: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Option<u64>) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn board(&self) -> &'static Board {
        self.board
    }
}

impl Platform for FomuPlatform {
    fn clock_frequency(&self) -> Option<u64> {
        Some(self.frequency.unwrap_or(self.board.clock_frequency))
    }

    fn resources(&self) -> Option<&dyn ResourceBinder> {
        Some(self)
    }
}

impl ResourceBinder for FomuPlatform {
    fn request(&self, name: &str, number: u32) -> Result<PinBinding, ResourceError> {
        let resource =
            self.board
                .resource(name, number)
                .ok_or_else(|| ResourceError::Unavailable {
                    name: name.to_string(),
                    number,
                })?;

        let subsignals: IndexMap<String, Pin> = resource
            .pins
            .iter()
            .map(|&(sub, pin, invert)| {
                let pin = if invert {
                    Pin::inverted(pin)
                } else {
                    Pin::new(pin)
                };
                (sub.to_string(), pin)
            })
            .collect();

        tracing::debug!(
            "{} board: {}#{} -> {:?}",
            self.board.revision,
            name,
            number,
            subsignals.values().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );

        Ok(PinBinding {
            name: name.to_string(),
            number,
            subsignals,
        })
    }

    fn default_clock(&self) -> &str {
        self.board.default_clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_wire_the_clock_differently() {
        let pvt = FomuPlatform::new(BoardRevision::Pvt);
        let hacker = FomuPlatform::new(BoardRevision::Hacker);
        let pin = |p: &FomuPlatform| p.request("clk48", 0).unwrap().subsignals["io"].name.clone();
        assert_eq!(pin(&pvt), "F4");
        assert_eq!(pin(&hacker), "F5");
    }

    #[test]
    fn boards_list_only_resources_the_blinker_binds() {
        for revision in [BoardRevision::Pvt, BoardRevision::Hacker] {
            let board = Board::for_revision(revision);
            let names: Vec<_> = board.resources.iter().map(|r| r.name).collect();
            assert_eq!(names, vec![board.default_clock, "rgb_led"]);
            assert!(board.resource("usb", 0).is_none());
        }
    }

    #[test]
    fn unknown_resource_is_unavailable() {
        let err = FomuPlatform::new(BoardRevision::Pvt)
            .request("rgb_led", 1)
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::Unavailable {
                name: "rgb_led".to_string(),
                number: 1
            }
        );
    }

    #[test]
    fn frequency_override_replaces_board_clock() {
        let platform = FomuPlatform::new(BoardRevision::Pvt).with_frequency(Some(12_000_000));
        assert_eq!(platform.clock_frequency(), Some(12_000_000));
        assert_eq!(
            FomuPlatform::new(BoardRevision::Pvt).clock_frequency(),
            Some(48_000_000)
        );
    }
}
