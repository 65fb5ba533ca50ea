//! Synthesis backend for the Fomu (iCE40UP5K).
//!
//! Flow: elaborate against the board → Verilog + PCF → `yosys synth_ice40` →
//! `nextpnr-ice40` → `icepack` → optionally `dfu-util`. Everything runs in a
//! scratch directory; artifacts are copied to the output directory only after
//! the whole toolchain succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use tricolor_common::{BuildConfig, ExternalTool, scratch_dir, write_atomic};
use tricolor_hdl::{Design, Elaboratable, PortDirection, verilog};

use crate::DriverError;
use crate::board::{Board, FomuPlatform};

const VERILOG: &str = "design.v";
const PCF: &str = "design.pcf";
const NETLIST: &str = "design.json";
const ASC: &str = "design.asc";
const BITSTREAM: &str = "design.bin";

/// What a successful build left in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifacts {
    pub verilog: PathBuf,
    pub pcf: PathBuf,
    pub netlist: PathBuf,
    pub bitstream: PathBuf,
    /// Cell type → count, from the Yosys netlist.
    pub cell_usage: BTreeMap<String, usize>,
    pub programmed: bool,
}

/// The external tools a build needs, located up front so a missing one is
/// reported before any work starts.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub yosys: ExternalTool,
    pub nextpnr: ExternalTool,
    pub icepack: ExternalTool,
    pub dfu_util: Option<ExternalTool>,
}

impl Toolchain {
    pub fn locate(program: bool) -> Result<Self, DriverError> {
        Ok(Self {
            yosys: ExternalTool::locate("yosys")?,
            nextpnr: ExternalTool::locate("nextpnr-ice40")?,
            icepack: ExternalTool::locate("icepack")?,
            dfu_util: if program {
                Some(ExternalTool::locate("dfu-util")?)
            } else {
                None
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisBackend {
    config: BuildConfig,
}

impl SynthesisBackend {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The board context handed to modules. Built from configuration on each
    /// call; nothing is read from the environment here.
    pub fn platform(&self) -> FomuPlatform {
        FomuPlatform::new(self.config.board).with_frequency(self.config.frequency)
    }

    pub fn board(&self) -> &'static Board {
        self.platform().board()
    }

    pub fn elaborate<M: Elaboratable>(&self, module: &M) -> Result<Design, DriverError> {
        Ok(module.elaborate(&self.platform())?)
    }

    /// Pin constraints for every port that is bound to a pin.
    pub fn pcf(design: &Design) -> String {
        let mut lines = design
            .ports()
            .iter()
            .filter_map(|p| p.pin.as_ref().map(|pin| format!("set_io {} {}", p.signal, pin)))
            .collect::<Vec<_>>();
        lines.push(String::new());
        lines.join("\n")
    }

    pub fn yosys_args(design: &Design, verilog: &str, netlist: &str) -> Vec<String> {
        vec![
            "-q".to_string(),
            "-p".to_string(),
            format!("read_verilog {verilog}"),
            "-p".to_string(),
            format!("synth_ice40 -top {} -json {netlist}", design.name()),
        ]
    }

    pub fn nextpnr_args(board: &Board, design: &Design) -> Vec<String> {
        // nextpnr wants the physical clock in MHz.
        let mhz = board.clock_frequency as f64 / 1e6;
        vec![
            format!("--{}", board.nextpnr_device),
            "--package".to_string(),
            board.package.to_string(),
            "--json".to_string(),
            NETLIST.to_string(),
            "--pcf".to_string(),
            PCF.to_string(),
            "--asc".to_string(),
            ASC.to_string(),
            "--freq".to_string(),
            format!("{mhz}"),
            "--top".to_string(),
            design.name().to_string(),
        ]
    }

    /// Count cells by type in a Yosys JSON netlist.
    pub fn cell_usage(netlist: &str, top: &str) -> Result<BTreeMap<String, usize>, DriverError> {
        let json: serde_json::Value =
            serde_json::from_str(netlist).map_err(|e| DriverError::Netlist(e.to_string()))?;
        let cells = json
            .get("modules")
            .and_then(|m| m.get(top))
            .and_then(|m| m.get("cells"))
            .and_then(|c| c.as_object())
            .ok_or_else(|| DriverError::Netlist(format!("module '{top}' has no cells table")))?;

        Ok(cells
            .values()
            .filter_map(|cell| cell.get("type").and_then(|t| t.as_str()))
            .map(str::to_string)
            .counts()
            .into_iter()
            .collect())
    }

    /// Elaborate, run the toolchain and copy the results out.
    pub fn build<M: Elaboratable>(&self, module: &M) -> Result<BuildArtifacts, DriverError> {
        // Resource problems surface before any tool is looked up.
        let design = self.elaborate(module)?;
        let tools = Toolchain::locate(self.config.program)?;
        self.build_with(&tools, &design)
    }

    pub fn build_with(
        &self,
        tools: &Toolchain,
        design: &Design,
    ) -> Result<BuildArtifacts, DriverError> {
        let board = self.board();
        let scratch = scratch_dir("tricolor_build_")?;
        let work = scratch.path();

        info!(
            "building '{}' for {} ({} {}), outputs on {:?}",
            design.name(),
            board.revision,
            board.device,
            board.package,
            bound_outputs(design)
        );

        std::fs::write(work.join(VERILOG), verilog::emit(design))?;
        std::fs::write(work.join(PCF), Self::pcf(design))?;

        tools
            .yosys
            .run(Self::yosys_args(design, VERILOG, NETLIST), Some(work))?;
        let cell_usage =
            Self::cell_usage(&std::fs::read_to_string(work.join(NETLIST))?, design.name())?;
        for (cell, count) in &cell_usage {
            info!("  {:>6} {}", count, cell);
        }

        tools
            .nextpnr
            .run(Self::nextpnr_args(board, design), Some(work))?;
        tools.icepack.run([ASC, BITSTREAM], Some(work))?;

        let out = &self.config.output_dir;
        let copy = |name: &str| -> Result<PathBuf, DriverError> {
            let dest = out.join(name);
            write_atomic(&dest, &std::fs::read(work.join(name))?)?;
            Ok(dest)
        };
        let verilog = copy(VERILOG)?;
        let pcf = copy(PCF)?;
        let netlist = copy(NETLIST)?;
        // Last, so a bitstream in the output directory means the build finished.
        let bitstream = copy(BITSTREAM)?;
        info!("bitstream written to {}", bitstream.display());

        let programmed = match &tools.dfu_util {
            Some(dfu) => {
                program(dfu, &bitstream)?;
                true
            }
            None => false,
        };

        Ok(BuildArtifacts {
            verilog,
            pcf,
            netlist,
            bitstream,
            cell_usage,
            programmed,
        })
    }
}

/// Load a bitstream onto the board over USB DFU.
pub fn program(dfu: &ExternalTool, bitstream: &Path) -> Result<(), DriverError> {
    info!("programming {} with {}", bitstream.display(), dfu.name());
    let bitstream = bitstream.to_string_lossy();
    dfu.run(["-D", bitstream.as_ref()], None)?;
    Ok(())
}

/// `port=pin` for every output bound to a board pin, in port order.
pub fn bound_outputs(design: &Design) -> Vec<String> {
    design
        .ports()
        .iter()
        .filter(|p| p.direction == PortDirection::Output)
        .filter_map(|p| p.pin.as_ref().map(|pin| format!("{}={}", p.signal, pin)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_usage_counts_by_type() {
        let netlist = r#"{
            "modules": {
                "blink": {
                    "cells": {
                        "a": { "type": "SB_LUT4" },
                        "b": { "type": "SB_DFF" },
                        "c": { "type": "SB_LUT4" }
                    }
                }
            }
        }"#;
        let usage = SynthesisBackend::cell_usage(netlist, "blink").unwrap();
        assert_eq!(usage.get("SB_LUT4"), Some(&2));
        assert_eq!(usage.get("SB_DFF"), Some(&1));
    }

    #[test]
    fn cell_usage_rejects_missing_module() {
        let err = SynthesisBackend::cell_usage(r#"{"modules": {}}"#, "blink").unwrap_err();
        assert!(err.to_string().contains("blink"));
    }
}
