//! Elaboration backends for the tricolor blinker.
//!
//! Each backend elaborates a module on its own terms and drives the result to
//! an artifact:
//!
//! - [`synth`]: bind to a Fomu board, emit Verilog and pin constraints, run
//!   the iCE40 toolchain, optionally program the board.
//! - [`sim`]: run the design on a virtual clock and write a VCD trace.
//! - [`formal`]: emit Verilog with cover statements and a SymbiYosys script,
//!   and parse the checker's verdict.
//!
//! Backends share nothing but the module description they are given.

pub mod board;
pub mod error;
pub mod formal;
pub mod sim;
pub mod synth;

pub use board::{Board, FomuPlatform};
pub use error::DriverError;
pub use formal::{CoverHit, CoverVerdict, FormalArtifacts, FormalBackend, FormalOutcome, SbyStatus};
pub use sim::{Change, SimArtifacts, SimulationBackend, Simulator, Trace};
pub use synth::{BuildArtifacts, SynthesisBackend};
