use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tricolor_common::*;

/// Tri-colour blinker for the Fomu: build a bitstream, simulate, or emit a
/// formal check
#[derive(Parser, Debug)]
#[command(name = "tricolor")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Synthesise, place and route for a Fomu board
    Build {
        /// Board revision
        #[arg(long, value_enum, env = "FOMU_REV", default_value = "pvt")]
        board: BoardRevision,

        /// Clock frequency the design assumes, in Hz (defaults to the board's)
        #[arg(long)]
        frequency: Option<u64>,

        /// Colour changes per second
        #[arg(long, default_value_t = DEFAULT_BLINK_RATE)]
        blink_rate: u64,

        /// Load the bitstream with dfu-util after building
        #[arg(long, default_value_t = false)]
        program: bool,

        /// Directory the build artifacts are copied to
        #[arg(short, long, default_value = "build")]
        output: PathBuf,
    },

    /// Run the design on a virtual clock and write a VCD trace
    Simulate {
        /// Colour changes per second
        #[arg(long, default_value_t = FAST_BLINK_RATE)]
        blink_rate: u64,

        /// Virtual clock frequency, in Hz
        #[arg(long, default_value_t = DEFAULT_CLOCK_FREQUENCY)]
        clock_frequency: u64,

        /// Number of rising edges to simulate
        #[arg(long, default_value_t = DEFAULT_SIM_STEPS)]
        steps: u64,

        /// VCD output; a GTKWave layout is written next to it
        #[arg(short, long, default_value = "test.vcd")]
        output: PathBuf,
    },

    /// Emit Verilog with cover statements and a SymbiYosys script
    Verify {
        /// Colour changes per second
        #[arg(long, default_value_t = FAST_BLINK_RATE)]
        blink_rate: u64,

        /// Search depth for the model checker
        #[arg(long, default_value_t = DEFAULT_FORMAL_DEPTH)]
        depth: u32,

        /// Run sby on the generated files and report the verdict
        #[arg(long, default_value_t = false)]
        check: bool,

        /// Verilog output; the `.sby` script is written next to it
        #[arg(short, long, default_value = "toplevel.v")]
        output: PathBuf,
    },
}

impl Command {
    pub fn build_config(&self) -> Option<BuildConfig> {
        match self {
            Self::Build {
                board,
                frequency,
                blink_rate,
                program,
                output,
            } => Some(
                BuildConfig::new()
                    .with_board(*board)
                    .with_frequency(*frequency)
                    .with_blink_rate(*blink_rate)
                    .with_program(*program)
                    .with_output_dir(output),
            ),
            _ => None,
        }
    }

    pub fn sim_config(&self) -> Option<SimConfig> {
        match self {
            Self::Simulate {
                blink_rate,
                clock_frequency,
                steps,
                output,
            } => Some(
                SimConfig::new()
                    .with_blink_rate(*blink_rate)
                    .with_clock_frequency(*clock_frequency)
                    .with_steps(*steps)
                    .with_trace_path(output),
            ),
            _ => None,
        }
    }

    pub fn formal_config(&self) -> Option<FormalConfig> {
        match self {
            Self::Verify {
                blink_rate,
                depth,
                output,
                ..
            } => Some(
                FormalConfig::new()
                    .with_blink_rate(*blink_rate)
                    .with_depth(*depth)
                    .with_output(output),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(argv: &[&str]) -> Command {
        Args::try_parse_from(std::iter::once("tricolor").chain(argv.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn simulate_defaults_match_the_fast_blinker() {
        let config = parse(&["simulate"]).sim_config().unwrap();
        assert_eq!(config, SimConfig::new());
        assert_eq!(config.blink.blink_rate, 24_000_000);
        assert_eq!(config.steps, 10);
        assert_eq!(config.layout_path(), PathBuf::from("test.gtkw"));
    }

    #[test]
    fn build_flags_reach_the_config() {
        let config = parse(&[
            "build",
            "--board",
            "hacker",
            "--frequency",
            "12000000",
            "--blink-rate",
            "4",
            "--program",
            "-o",
            "out",
        ])
        .build_config()
        .unwrap();
        assert_eq!(config.board, BoardRevision::Hacker);
        assert_eq!(config.frequency, Some(12_000_000));
        assert_eq!(config.blink.blink_rate, 4);
        assert!(config.program);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn verify_writes_toplevel_by_default() {
        let command = parse(&["verify"]);
        let config = command.formal_config().unwrap();
        assert_eq!(config.output, PathBuf::from("toplevel.v"));
        assert_eq!(config.script_path(), PathBuf::from("toplevel.sby"));
        assert!(command.build_config().is_none());
    }

    #[rstest]
    #[case("rev3")]
    #[case("")]
    fn unknown_board_is_rejected(#[case] board: &str) {
        let argv = ["tricolor", "build", "--board", board];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
