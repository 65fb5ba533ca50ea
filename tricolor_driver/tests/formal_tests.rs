#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

mod common;

use tricolor_common::FormalConfig;
use tricolor_driver::{DriverError, FormalBackend, FormalOutcome, CoverVerdict};
use tricolor_hdl::{Blink, CoverProperty, Covered};

use common::init_test_logger;

fn covered_blink(config: &FormalConfig) -> Covered<Blink> {
    Covered::new(Blink::from_config(&config.blink).unwrap())
        .with_cover(CoverProperty::none_to_red("state"))
}

#[test]
fn generate_writes_verilog_and_script() {
    init_test_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = FormalConfig::new()
        .with_output(dir.path().join("toplevel.v"))
        .with_depth(12);
    let backend = FormalBackend::new(config.clone());
    let artifacts = backend.generate(&covered_blink(&config)).unwrap();

    assert_eq!(artifacts.verilog, dir.path().join("toplevel.v"));
    assert_eq!(artifacts.script, dir.path().join("toplevel.sby"));

    let verilog = std::fs::read_to_string(&artifacts.verilog).unwrap();
    assert!(verilog.contains("`ifdef FORMAL"));
    assert!(verilog.contains("if (past_valid) none_to_red: cover ("));
    assert!(verilog.contains("$past(state)"));

    let script = std::fs::read_to_string(&artifacts.script).unwrap();
    assert!(script.contains("mode cover"));
    assert!(script.contains("depth 12"));
    assert!(script.contains("read -formal toplevel.v"));
    assert!(script.contains("prep -top blink"));
    assert!(script.trim_end().ends_with("toplevel.v"));
}

#[test]
fn design_without_covers_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = FormalConfig::new().with_output(dir.path().join("toplevel.v"));
    let blink = Blink::from_config(&config.blink).unwrap();
    let err = FormalBackend::new(config).generate(&blink).unwrap_err();
    assert!(matches!(err, DriverError::NoCovers(ref name) if name == "blink"));
    assert!(!dir.path().join("toplevel.v").exists());
}

#[test]
fn formal_design_has_no_pins() {
    let config = FormalConfig::new();
    let design = FormalBackend::new(config.clone())
        .elaborate(&covered_blink(&config))
        .unwrap();
    assert!(design.ports().iter().all(|p| p.pin.is_none()));
    assert_eq!(design.covers().len(), 1);
    // Reset stays a free input for the solver.
    assert!(design.port(design.reset()).is_some());
}

#[test]
fn verdict_reports_earliest_reached_step() {
    let log = "\
SBY [toplevel] engine_0: ##   0:00:00  Reached cover statement at none_to_red in step 3.
SBY [toplevel] engine_0: ##   0:00:00  Reached cover statement at other in step 1.
SBY [toplevel] DONE (PASS, rc=0)
";
    let outcome = FormalOutcome::parse(log);
    assert_eq!(outcome.reached.len(), 2);
    assert_eq!(outcome.reached[0].location, "none_to_red");
    assert_eq!(outcome.verdict(20), CoverVerdict::Covered { step: 1 });
}
