//! Run configuration for the build, simulate and verify flows.
//!
//! Every backend receives its configuration explicitly. Nothing in here reads
//! process-wide state; the CLI is the only place that looks at the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clock assumed when the elaboration context has no platform clock.
pub const DEFAULT_CLOCK_FREQUENCY: u64 = 48_000_000;
/// Roughly a two hertz colour cycle on real hardware.
pub const DEFAULT_BLINK_RATE: u64 = 2;
/// Fast rate used for simulation and formal runs to keep traces short.
pub const FAST_BLINK_RATE: u64 = 24_000_000;
/// Number of rising edges simulated when no count is given.
pub const DEFAULT_SIM_STEPS: u64 = 10;
/// Bound handed to the model checker when no depth is given.
pub const DEFAULT_FORMAL_DEPTH: u32 = 20;

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The board revision string did not name a known board.
    #[error("Unknown board revision '{0}' (expected 'pvt' or 'hacker')")]
    UnknownBoardRevision(String),
}

/// Physical board revision. Only the synthesis backend looks at this; it
/// selects the pin and package table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum BoardRevision {
    /// Production Fomu.
    #[default]
    #[value(name = "pvt")]
    Pvt,
    /// Early "hacker" Fomu.
    #[value(name = "hacker")]
    Hacker,
}

impl BoardRevision {
    /// Environment variable the CLI consults to pick the board.
    pub const ENV_VAR: &'static str = "FOMU_REV";

    /// Lowercase name used on the command line and in the environment.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pvt => "pvt",
            Self::Hacker => "hacker",
        }
    }
}

impl fmt::Display for BoardRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardRevision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pvt" => Ok(Self::Pvt),
            "hacker" => Ok(Self::Hacker),
            _ => Err(ConfigError::UnknownBoardRevision(s.to_string())),
        }
    }
}

/// Parameters of the blinker module itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlinkConfig {
    /// Colour changes per second.
    pub blink_rate: u64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            blink_rate: DEFAULT_BLINK_RATE,
        }
    }
}

impl BlinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blink_rate(mut self, blink_rate: u64) -> Self {
        self.blink_rate = blink_rate;
        self
    }
}

/// Options for the synthesis backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildConfig {
    pub blink: BlinkConfig,
    pub board: BoardRevision,
    /// Overrides the board's default clock frequency in the divisor calculation.
    pub frequency: Option<u64>,
    /// Program the board over DFU once the bitstream is built.
    pub program: bool,
    pub output_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            blink: BlinkConfig::default(),
            board: BoardRevision::default(),
            frequency: None,
            program: false,
            output_dir: PathBuf::from("build"),
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blink_rate(mut self, blink_rate: u64) -> Self {
        self.blink.blink_rate = blink_rate;
        self
    }

    pub fn with_board(mut self, board: BoardRevision) -> Self {
        self.board = board;
        self
    }

    pub fn with_frequency(mut self, frequency: Option<u64>) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_program(mut self, program: bool) -> Self {
        self.program = program;
        self
    }

    pub fn with_output_dir<P: AsRef<Path>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }
}

/// Options for the simulation backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimConfig {
    pub blink: BlinkConfig,
    /// Frequency of the virtual clock; also drives the divisor.
    pub clock_frequency: u64,
    /// Exact number of rising edges to run.
    pub steps: u64,
    /// Where the VCD goes. The GTKWave layout is written next to it.
    pub trace_path: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            blink: BlinkConfig::new().with_blink_rate(FAST_BLINK_RATE),
            clock_frequency: DEFAULT_CLOCK_FREQUENCY,
            steps: DEFAULT_SIM_STEPS,
            trace_path: PathBuf::from("test.vcd"),
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blink_rate(mut self, blink_rate: u64) -> Self {
        self.blink.blink_rate = blink_rate;
        self
    }

    pub fn with_clock_frequency(mut self, clock_frequency: u64) -> Self {
        self.clock_frequency = clock_frequency;
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_trace_path<P: AsRef<Path>>(mut self, trace_path: P) -> Self {
        self.trace_path = trace_path.as_ref().to_path_buf();
        self
    }

    /// Path of the GTKWave save file that accompanies the trace.
    #[must_use]
    pub fn layout_path(&self) -> PathBuf {
        self.trace_path.with_extension("gtkw")
    }
}

/// Options for the formal backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormalConfig {
    pub blink: BlinkConfig,
    /// Search depth passed through to the model checker.
    pub depth: u32,
    /// Verilog output. The `.sby` script is written next to it.
    pub output: PathBuf,
}

impl Default for FormalConfig {
    fn default() -> Self {
        Self {
            blink: BlinkConfig::new().with_blink_rate(FAST_BLINK_RATE),
            depth: DEFAULT_FORMAL_DEPTH,
            output: PathBuf::from("toplevel.v"),
        }
    }
}

impl FormalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blink_rate(mut self, blink_rate: u64) -> Self {
        self.blink.blink_rate = blink_rate;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = output.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.output.with_extension("sby")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_revision_round_trips_through_display() {
        for board in [BoardRevision::Pvt, BoardRevision::Hacker] {
            assert_eq!(board.to_string().parse::<BoardRevision>(), Ok(board));
        }
    }

    #[test]
    fn companion_paths_follow_primary_output() {
        let sim = SimConfig::new().with_trace_path("out/blink.vcd");
        assert_eq!(sim.layout_path(), PathBuf::from("out/blink.gtkw"));

        let formal = FormalConfig::new().with_output("out/toplevel.v");
        assert_eq!(formal.script_path(), PathBuf::from("out/toplevel.sby"));
    }
}
