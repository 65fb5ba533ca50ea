//! Tricolor CLI
//!
//! Builds, simulates or formally checks the tri-colour blinker. Each
//! subcommand elaborates the same module through a different backend.

mod args;

use clap::Parser;
use tracing::info;
use tricolor_driver::{CoverVerdict, FormalBackend, SimulationBackend, SynthesisBackend};
use tricolor_hdl::{Blink, CoverProperty, Covered, State, divider};

use args::{Args, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Some(config) = args.command.build_config() {
        let blink = Blink::from_config(&config.blink)?;
        let artifacts = SynthesisBackend::new(config).build(&blink)?;
        for (cell, count) in &artifacts.cell_usage {
            println!("{count:>6} {cell}");
        }
        println!("{}", artifacts.bitstream.display());
        if artifacts.programmed {
            println!("programmed");
        }
    } else if let Some(config) = args.command.sim_config() {
        let blink = Blink::from_config(&config.blink)?;
        let artifacts = SimulationBackend::new(config).run(&blink)?;
        for (edge, bits) in artifacts.trace.transitions(divider::STATE) {
            if let Ok(state) = State::decode(bits) {
                info!("edge {:>3}: {}", edge, state);
            }
        }
        println!("{}", artifacts.trace_path.display());
        println!("{}", artifacts.layout_path.display());
    } else if let Some(config) = args.command.formal_config() {
        let blink = Blink::from_config(&config.blink)?;
        let module = Covered::new(blink).with_cover(CoverProperty::none_to_red(divider::STATE));
        let backend = FormalBackend::new(config);
        let artifacts = backend.generate(&module)?;
        println!("{}", artifacts.verilog.display());
        println!("{}", artifacts.script.display());

        if matches!(args.command, Command::Verify { check: true, .. }) {
            let outcome = backend.check(&artifacts)?;
            match outcome.verdict(backend.config().depth) {
                CoverVerdict::Covered { step } => println!("covered (step {step})"),
                CoverVerdict::NotReached { depth, unreached } => {
                    return Err(format!(
                        "not reached within depth {depth}: {}",
                        unreached.join(", ")
                    )
                    .into());
                }
                CoverVerdict::Inconclusive(status) => {
                    return Err(format!("sby was inconclusive: {status:?}").into());
                }
            }
        }
    }

    Ok(())
}
