//! Formal backend: cover checks through SymbiYosys.
//!
//! The backend only produces the artifact (Verilog plus a `.sby` script) and
//! reads the checker's log. The bounded search itself belongs to `sby`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tricolor_common::{DEFAULT_CLOCK_FREQUENCY, ExternalTool, FormalConfig, write_atomic};
use tricolor_hdl::{Design, Elaboratable, VirtualPlatform, verilog};

use crate::DriverError;

/// Overall result line of an `sby` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SbyStatus {
    Pass,
    Fail,
    Error,
    Timeout,
    Unknown,
}

impl SbyStatus {
    fn parse(word: &str) -> Self {
        match word {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "ERROR" => Self::Error,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Unknown,
        }
    }
}

/// A cover statement the checker reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverHit {
    /// Label or source location as reported by the checker.
    pub location: String,
    pub step: u32,
}

/// What a cover run established.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverVerdict {
    /// Every cover was reached; the earliest witness ends at `step`.
    Covered { step: u32 },
    /// The bounded search ended without a witness for some cover. This is
    /// not a proof of unreachability.
    NotReached { depth: u32, unreached: Vec<String> },
    /// The checker did not produce a usable answer.
    Inconclusive(SbyStatus),
}

/// Parsed `sby` log.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormalOutcome {
    pub status: Option<SbyStatus>,
    pub return_code: Option<i32>,
    pub reached: Vec<CoverHit>,
    pub unreached: Vec<String>,
    /// Witness traces, relative to the run directory.
    pub traces: Vec<PathBuf>,
}

fn reached_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Reached cover statement (?:at )?(?P<loc>.+?) in step (?P<step>\d+)")
            .expect("valid regex")
    })
}

fn unreached_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Unreached cover statement (?:at )?(?P<loc>.+?)\.?\s*$").expect("valid regex")
    })
}

fn trace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Writing trace to VCD file: (?P<path>\S+)").expect("valid regex")
    })
}

fn done_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"DONE \((?P<status>[A-Z]+), rc=(?P<rc>-?\d+)\)").expect("valid regex")
    })
}

impl FormalOutcome {
    /// Read the interesting lines out of an `sby` log.
    pub fn parse(log: &str) -> Self {
        let mut outcome = Self::default();
        for line in log.lines() {
            if let Some(caps) = reached_re().captures(line) {
                if let Ok(step) = caps["step"].parse() {
                    outcome.reached.push(CoverHit {
                        location: caps["loc"].trim().to_string(),
                        step,
                    });
                }
            } else if let Some(caps) = unreached_re().captures(line) {
                outcome.unreached.push(caps["loc"].trim().to_string());
            } else if let Some(caps) = trace_re().captures(line) {
                outcome.traces.push(PathBuf::from(&caps["path"]));
            } else if let Some(caps) = done_re().captures(line) {
                outcome.status = Some(SbyStatus::parse(&caps["status"]));
                outcome.return_code = caps["rc"].parse().ok();
            }
        }
        outcome
    }

    pub fn verdict(&self, depth: u32) -> CoverVerdict {
        match self.status {
            Some(SbyStatus::Pass) if !self.reached.is_empty() => CoverVerdict::Covered {
                step: self.reached.iter().map(|h| h.step).min().unwrap_or(0),
            },
            Some(SbyStatus::Fail) if !self.unreached.is_empty() => CoverVerdict::NotReached {
                depth,
                unreached: self.unreached.clone(),
            },
            Some(status) => CoverVerdict::Inconclusive(status),
            None => CoverVerdict::Inconclusive(SbyStatus::Unknown),
        }
    }
}

/// Files produced by [`FormalBackend::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalArtifacts {
    pub verilog: PathBuf,
    pub script: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FormalBackend {
    config: FormalConfig,
}

impl FormalBackend {
    pub fn new(config: FormalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormalConfig {
        &self.config
    }

    pub fn platform(&self) -> VirtualPlatform {
        VirtualPlatform::new(DEFAULT_CLOCK_FREQUENCY)
    }

    /// Elaborate for formal use. A design without covers has nothing to check.
    pub fn elaborate<M: Elaboratable>(&self, module: &M) -> Result<Design, DriverError> {
        let design = module.elaborate(&self.platform())?;
        if design.covers().is_empty() {
            return Err(DriverError::NoCovers(design.name().to_string()));
        }
        Ok(design)
    }

    /// SymbiYosys script running every cover in `verilog_file` up to the
    /// configured depth.
    pub fn sby_script(&self, design: &Design, verilog_file: &str) -> String {
        [
            "[options]".to_string(),
            "mode cover".to_string(),
            format!("depth {}", self.config.depth),
            String::new(),
            "[engines]".to_string(),
            "smtbmc".to_string(),
            String::new(),
            "[script]".to_string(),
            format!("read -formal {verilog_file}"),
            format!("prep -top {}", design.name()),
            String::new(),
            "[files]".to_string(),
            verilog_file.to_string(),
            String::new(),
        ]
        .join("\n")
    }

    /// Write the Verilog and `.sby` script.
    pub fn generate<M: Elaboratable>(&self, module: &M) -> Result<FormalArtifacts, DriverError> {
        let design = self.elaborate(module)?;
        let verilog_path = self.config.output.clone();
        let script_path = self.config.script_path();
        let verilog_file = verilog_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "toplevel.v".to_string());

        write_atomic(&verilog_path, verilog::emit(&design).as_bytes())?;
        write_atomic(&script_path, self.sby_script(&design, &verilog_file).as_bytes())?;

        info!(
            "wrote {} cover(s) to {} with script {}",
            design.covers().len(),
            verilog_path.display(),
            script_path.display()
        );
        Ok(FormalArtifacts {
            verilog: verilog_path,
            script: script_path,
        })
    }

    /// Run `sby` on previously generated artifacts and parse its verdict.
    ///
    /// `sby` exits non-zero for unreached covers, so the exit status alone is
    /// not treated as a failure; only a log with no result line is.
    pub fn check(&self, artifacts: &FormalArtifacts) -> Result<FormalOutcome, DriverError> {
        let sby = ExternalTool::locate("sby")?;
        self.check_with(&sby, artifacts)
    }

    pub fn check_with(
        &self,
        sby: &ExternalTool,
        artifacts: &FormalArtifacts,
    ) -> Result<FormalOutcome, DriverError> {
        let dir = artifacts
            .script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let script = artifacts
            .script
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| artifacts.script.clone());

        let mut args = vec![std::ffi::OsString::from("-f")];
        args.push(script.into_os_string());
        let output = sby.run_unchecked(args, Some(dir))?;

        let outcome = FormalOutcome::parse(&output.stdout);
        if outcome.status.is_none() {
            tracing::event!(
                tracing::Level::ERROR,
                "sby produced no result: status={:?}\n{}",
                output.code,
                output.stderr
            );
            return Err(tricolor_common::ToolError::Failed {
                name: sby.name().to_string(),
                status: output
                    .code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: output.stderr,
            }
            .into());
        }

        match outcome.verdict(self.config.depth) {
            CoverVerdict::Covered { step } => info!("all covers reached by step {}", step),
            CoverVerdict::NotReached { depth, ref unreached } => {
                warn!("not reached within depth {}: {:?}", depth, unreached)
            }
            CoverVerdict::Inconclusive(status) => warn!("sby finished with {:?}", status),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASS_LOG: &str = "\
SBY 10:00:00 [toplevel] Copy 'toplevel.v' to 'toplevel/src/toplevel.v'.
SBY 10:00:00 [toplevel] engine_0: smtbmc
SBY 10:00:01 [toplevel] engine_0: ##   0:00:00  Checking cover reachability in step 0..
SBY 10:00:01 [toplevel] engine_0: ##   0:00:00  Reached cover statement at toplevel.v:38.25-38.97 in step 2.
SBY 10:00:01 [toplevel] engine_0: ##   0:00:00  Writing trace to VCD file: engine_0/trace0.vcd
SBY 10:00:01 [toplevel] engine_0: finished (returncode=0)
SBY 10:00:01 [toplevel] DONE (PASS, rc=0)
";

    const FAIL_LOG: &str = "\
SBY 10:00:01 [toplevel] engine_0: ##   0:00:00  Unreached cover statement at toplevel.v:38.25-38.97.
SBY 10:00:01 [toplevel] DONE (FAIL, rc=2)
";

    #[test]
    fn parses_reached_cover() {
        let outcome = FormalOutcome::parse(PASS_LOG);
        assert_eq!(outcome.status, Some(SbyStatus::Pass));
        assert_eq!(outcome.return_code, Some(0));
        assert_eq!(
            outcome.reached,
            vec![CoverHit {
                location: "toplevel.v:38.25-38.97".to_string(),
                step: 2
            }]
        );
        assert_eq!(outcome.traces, vec![PathBuf::from("engine_0/trace0.vcd")]);
        assert_eq!(outcome.verdict(20), CoverVerdict::Covered { step: 2 });
    }

    #[test]
    fn unreached_is_not_reached_rather_than_unreachable() {
        let outcome = FormalOutcome::parse(FAIL_LOG);
        assert_eq!(outcome.status, Some(SbyStatus::Fail));
        assert_eq!(outcome.return_code, Some(2));
        assert_eq!(
            outcome.verdict(5),
            CoverVerdict::NotReached {
                depth: 5,
                unreached: vec!["toplevel.v:38.25-38.97".to_string()]
            }
        );
    }

    #[test]
    fn empty_log_is_inconclusive() {
        let outcome = FormalOutcome::parse("");
        assert_eq!(outcome.status, None);
        assert_eq!(
            outcome.verdict(20),
            CoverVerdict::Inconclusive(SbyStatus::Unknown)
        );
    }
}
