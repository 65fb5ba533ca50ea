#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::io::Write;
use std::path::PathBuf;

use rstest::rstest;
use tricolor_common::*;

mod common;

#[test]
fn test_build_config_default() {
    let config = BuildConfig::default();
    assert_eq!(config.board, BoardRevision::Pvt);
    assert_eq!(config.blink.blink_rate, DEFAULT_BLINK_RATE);
    assert_eq!(config.frequency, None);
    assert!(!config.program);
}

#[test]
fn test_build_config_builder() {
    let config = BuildConfig::new()
        .with_board(BoardRevision::Hacker)
        .with_frequency(Some(12_000_000))
        .with_program(true)
        .with_output_dir("out");

    assert_eq!(config.board, BoardRevision::Hacker);
    assert_eq!(config.frequency, Some(12_000_000));
    assert!(config.program);
    assert_eq!(config.output_dir, PathBuf::from("out"));
}

#[test]
fn test_sim_config_defaults_run_fast() {
    let config = SimConfig::default();
    assert_eq!(config.blink.blink_rate, FAST_BLINK_RATE);
    assert_eq!(config.clock_frequency, DEFAULT_CLOCK_FREQUENCY);
    assert_eq!(config.steps, DEFAULT_SIM_STEPS);
    assert_eq!(config.layout_path(), PathBuf::from("test.gtkw"));
}

#[rstest]
#[case("pvt", BoardRevision::Pvt)]
#[case("PVT", BoardRevision::Pvt)]
#[case("hacker", BoardRevision::Hacker)]
#[case(" hacker ", BoardRevision::Hacker)]
fn test_board_revision_parse(#[case] input: &str, #[case] expected: BoardRevision) {
    assert_eq!(input.parse::<BoardRevision>(), Ok(expected));
}

#[rstest]
#[case("evt3")]
#[case("")]
#[case("pvt2")]
fn test_board_revision_rejects_unknown(#[case] input: &str) {
    let err = input.parse::<BoardRevision>().unwrap_err();
    assert_with_context!(
        err.to_string().contains(input),
        format!("diagnostic should name '{input}': {err}")
    );
}

#[test]
fn test_write_atomic_creates_parent_and_replaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.txt");

    write_atomic(&path, b"first").unwrap();
    write_atomic(&path, b"second").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_write_atomic_with_streams_and_leaves_target_on_failure() {
    common::init_test_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.vcd");

    write_atomic_with(&path, |out| {
        for edge in 0..1_000 {
            writeln!(out, "#{edge}")?;
        }
        Ok(())
    })
    .unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written.lines().count(), 1_000);
    assert!(written.ends_with("#999\n"));

    let err = write_atomic_with(&path, |out| {
        out.write_all(b"partial")?;
        Err(std::io::Error::other("interrupted"))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "interrupted");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_external_tool_reports_missing_program() {
    common::init_test_logger();
    let err = ExternalTool::locate("tricolor-no-such-tool").unwrap_err();
    assert_with_context!(
        err.to_string().contains("tricolor-no-such-tool"),
        format!("diagnostic should name the program: {err}")
    );
}

#[test]
fn test_scratch_dir_is_removed_on_drop() {
    let dir = scratch_dir("tricolor_test_").unwrap();
    let path = dir.path().to_path_buf();
    assert!(path.exists());
    drop(dir);
    assert!(!path.exists());
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::quickcheck;

    quickcheck! {
        fn prop_builder_keeps_blink_rate(rate: u64) -> bool {
            BuildConfig::new().with_blink_rate(rate).blink.blink_rate == rate
                && SimConfig::new().with_blink_rate(rate).blink.blink_rate == rate
                && FormalConfig::new().with_blink_rate(rate).blink.blink_rate == rate
        }
    }
}
