//! Cycle-accurate simulation on a virtual clock.
//!
//! Time advances in half-period steps of a single clock. On each rising edge
//! every register's next value is computed from the pre-edge values, all
//! registers commit together, and the combinational wires settle in one pass.
//! Only then does the observer see the edge, so edge `n` is fully settled
//! before the observer runs and before edge `n + 1` starts.
//!
//! The trace keeps the values at reset plus a log of value changes, so its
//! size follows how often the observed signals change, not how many edges
//! were run.

mod vcd;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tricolor_common::{SimConfig, write_atomic, write_atomic_with};
use tricolor_hdl::{Assign, Design, Elaboratable, Sample, SignalKind, State, VirtualPlatform};

use crate::DriverError;

pub use vcd::{gtkw_layout, vcd_trace, write_vcd};

/// Clock period in picoseconds for a frequency in hertz, rounded to nearest.
#[must_use]
pub fn period_ps(clock_frequency: u64) -> u64 {
    let f = u128::from(clock_frequency.max(1));
    let period = (1_000_000_000_000u128 + f / 2) / f;
    u64::try_from(period).unwrap_or(u64::MAX)
}

/// A traced signal taking a new value on a rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Change {
    pub edge: u64,
    /// Index into [`Trace::signals`].
    pub signal: usize,
    pub value: u64,
}

/// Observed signal values at reset and every change after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    design: String,
    clock: String,
    half_period_ps: u64,
    /// (name, width) of every traced signal, in declaration order.
    signals: Vec<(String, u32)>,
    /// Values at reset, indexed like `signals`.
    initial: Vec<u64>,
    /// Values after the last recorded edge.
    current: Vec<u64>,
    /// Ordered by edge, then by signal index.
    changes: Vec<Change>,
    edges: u64,
}

impl Trace {
    fn new(design: &Design, half_period_ps: u64) -> Self {
        let signals = design
            .observables()
            .iter()
            .filter_map(|name| design.signal(name))
            .map(|s| (s.name.clone(), s.width))
            .collect();
        Self {
            design: design.name().to_string(),
            clock: design.clock().to_string(),
            half_period_ps,
            signals,
            initial: Vec::new(),
            current: Vec::new(),
            changes: Vec::new(),
            edges: 0,
        }
    }

    fn row(&self, values: &Sample) -> Vec<u64> {
        self.signals
            .iter()
            .map(|(name, _)| values.get(name).copied().unwrap_or(0))
            .collect()
    }

    fn start(&mut self, values: &Sample) {
        self.initial = self.row(values);
        self.current.clone_from(&self.initial);
        self.changes.clear();
        self.edges = 0;
    }

    fn record(&mut self, values: &Sample) {
        self.edges += 1;
        for (index, (name, _)) in self.signals.iter().enumerate() {
            let value = values.get(name).copied().unwrap_or(0);
            if self.current[index] != value {
                self.current[index] = value;
                self.changes.push(Change {
                    edge: self.edges,
                    signal: index,
                    value,
                });
            }
        }
    }

    fn to_sample(&self, row: &[u64]) -> Sample {
        self.signals
            .iter()
            .zip(row)
            .map(|((name, _), &value)| (name.clone(), value))
            .collect()
    }

    pub fn design(&self) -> &str {
        &self.design
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }

    pub fn half_period_ps(&self) -> u64 {
        self.half_period_ps
    }

    pub fn signals(&self) -> &[(String, u32)] {
        &self.signals
    }

    pub fn initial(&self) -> &[u64] {
        &self.initial
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Number of rising edges recorded.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    fn index(&self, signal: &str) -> Option<usize> {
        self.signals.iter().position(|(name, _)| name == signal)
    }

    /// Value of `signal` after edge `edge` (0 is reset).
    pub fn value(&self, edge: u64, signal: &str) -> Option<u64> {
        if edge > self.edges {
            return None;
        }
        let index = self.index(signal)?;
        let end = self.changes.partition_point(|c| c.edge <= edge);
        self.changes[..end]
            .iter()
            .rev()
            .find(|c| c.signal == index)
            .map(|c| c.value)
            .or_else(|| self.initial.get(index).copied())
    }

    /// Every sample from reset to the last edge, rebuilt one at a time.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        let mut row = self.initial.clone();
        let mut cursor = 0;
        (0..=self.edges).map(move |edge| {
            while let Some(change) = self.changes.get(cursor).filter(|c| c.edge == edge) {
                row[change.signal] = change.value;
                cursor += 1;
            }
            self.to_sample(&row)
        })
    }

    /// `(edge, value)` for the reset value of `signal` and each change of it.
    pub fn transitions(&self, signal: &str) -> Vec<(u64, u64)> {
        let Some(index) = self.index(signal) else {
            return Vec::new();
        };
        std::iter::once((0, self.initial[index]))
            .chain(
                self.changes
                    .iter()
                    .filter(|c| c.signal == index)
                    .map(|c| (c.edge, c.value)),
            )
            .collect()
    }

    /// Decoded colour state after each edge, starting at reset.
    pub fn states(&self, signal: &str) -> Vec<Option<State>> {
        self.samples()
            .map(|s| s.get(signal).and_then(|&v| State::decode(v).ok()))
            .collect()
    }

    /// Timestamp of rising edge `edge`; edge 0 is time zero.
    pub fn rise_time(&self, edge: u64) -> u64 {
        match edge {
            0 => 0,
            n => (2 * n - 1) * self.half_period_ps,
        }
    }
}

fn eval(design: &Design, values: &Sample, assign: &Assign) -> Result<u64, DriverError> {
    let target = &assign.target;
    let mask = design
        .signal(target)
        .map(|s| s.mask())
        .ok_or_else(|| DriverError::Simulation(format!("unknown signal '{target}'")))?;
    assign
        .expr
        .eval(values)
        .map(|v| v & mask)
        .ok_or_else(|| DriverError::Simulation(format!("'{target}' reads a signal with no value")))
}

fn commit(values: &mut Sample, target: &str, value: u64) {
    if let Some(slot) = values.get_mut(target) {
        *slot = value;
    }
}

/// Executes one elaborated design.
#[derive(Debug, Clone)]
pub struct Simulator {
    design: Design,
    values: Sample,
    edges: u64,
    trace: Trace,
}

impl Simulator {
    pub fn new(design: Design) -> Result<Self, DriverError> {
        let half_period_ps = (period_ps(design.clock_frequency()) / 2).max(1);
        let trace = Trace::new(&design, half_period_ps);
        let mut sim = Self {
            values: design.reset_values(),
            design,
            edges: 0,
            trace,
        };
        sim.reset()?;
        Ok(sim)
    }

    /// Return to time zero: every signal takes its initial value and the
    /// trace starts over.
    #[contracts::debug_ensures(ret.is_err() || (self.edges == 0 && self.trace.edges == 0))]
    pub fn reset(&mut self) -> Result<(), DriverError> {
        self.values = self.design.reset_values();
        self.edges = 0;
        self.settle()?;
        self.trace.start(&self.values);
        Ok(())
    }

    fn settle(&mut self) -> Result<(), DriverError> {
        let Self { design, values, .. } = self;
        for assign in design.comb() {
            let value = eval(design, values, assign)?;
            commit(values, &assign.target, value);
        }
        Ok(())
    }

    /// Drive an input other than the clock. The new value is seen by the
    /// next edge; wires settle immediately.
    pub fn poke(&mut self, signal: &str, value: u64) -> Result<(), DriverError> {
        let mask = match self.design.signal(signal) {
            Some(s) if s.kind == SignalKind::Input && signal != self.design.clock() => s.mask(),
            Some(_) => {
                return Err(DriverError::Simulation(format!(
                    "'{signal}' is not a drivable input"
                )));
            }
            None => return Err(DriverError::Simulation(format!("unknown signal '{signal}'"))),
        };
        commit(&mut self.values, signal, value & mask);
        self.settle()
    }

    /// Apply one rising edge and return the settled values.
    pub fn step(&mut self) -> Result<&Sample, DriverError> {
        let next = self
            .design
            .sync()
            .iter()
            .map(|a| eval(&self.design, &self.values, a))
            .collect::<Result<Vec<_>, DriverError>>()?;
        // All registers commit together, after every next value is known.
        for (assign, value) in self.design.sync().iter().zip(next) {
            commit(&mut self.values, &assign.target, value);
        }
        self.settle()?;
        self.edges += 1;
        self.trace.record(&self.values);
        Ok(&self.values)
    }

    /// Run exactly `steps` edges, handing each settled edge to `observer`.
    pub fn run<F>(&mut self, steps: u64, mut observer: F) -> Result<(), DriverError>
    where
        F: FnMut(u64, &Sample),
    {
        for _ in 0..steps {
            self.step()?;
            observer(self.edges, &self.values);
        }
        debug!("simulated {} edges of '{}'", steps, self.design.name());
        Ok(())
    }

    pub fn peek(&self, signal: &str) -> Option<u64> {
        self.values.get(signal).copied()
    }

    pub fn state(&self) -> Option<State> {
        self.peek("state").and_then(|v| State::decode(v).ok())
    }

    pub fn edges(&self) -> u64 {
        self.edges
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }
}

/// Files written by a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimArtifacts {
    pub trace_path: PathBuf,
    pub layout_path: PathBuf,
    pub trace: Trace,
}

/// Elaborates a module on a virtual clock and records its waveform.
#[derive(Debug, Clone)]
pub struct SimulationBackend {
    config: SimConfig,
}

impl SimulationBackend {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn platform(&self) -> VirtualPlatform {
        VirtualPlatform::new(self.config.clock_frequency)
    }

    pub fn simulator<M: Elaboratable>(&self, module: &M) -> Result<Simulator, DriverError> {
        let design = module.elaborate(&self.platform())?;
        Simulator::new(design)
    }

    /// Run the configured number of edges in memory.
    pub fn simulate<M: Elaboratable>(&self, module: &M) -> Result<Trace, DriverError> {
        let mut sim = self.simulator(module)?;
        sim.run(self.config.steps, |_, _| {})?;
        Ok(sim.into_trace())
    }

    /// Simulate and write the VCD trace and its GTKWave layout.
    pub fn run<M: Elaboratable>(&self, module: &M) -> Result<SimArtifacts, DriverError> {
        let trace = self.simulate(module)?;
        let trace_path = self.config.trace_path.clone();
        let layout_path = self.config.layout_path();

        write_atomic_with(&trace_path, |out| write_vcd(&trace, out))?;
        write_atomic(&layout_path, gtkw_layout(&trace, &trace_path).as_bytes())?;

        info!(
            "wrote {} edges ({} changes) to {} (layout {})",
            trace.edges(),
            trace.changes().len(),
            trace_path.display(),
            layout_path.display()
        );
        Ok(SimArtifacts {
            trace_path,
            layout_path,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blink(clock_frequency: u64, blink_rate: u64) -> Simulator {
        let design = tricolor_hdl::Blink::new(blink_rate)
            .unwrap()
            .elaborate(&VirtualPlatform::new(clock_frequency))
            .unwrap();
        Simulator::new(design).unwrap()
    }

    #[test]
    fn trace_serializes_in_declaration_order() {
        let mut sim = blink(1, 1);
        sim.run(1, |_, _| {}).unwrap();
        let json = serde_json::to_string(sim.trace()).unwrap();
        let state = json.find("\"state\"").unwrap();
        let red = json.find("\"r\"").unwrap();
        assert!(state < red);
        let back: Trace = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, sim.trace());
    }

    #[test]
    fn trace_grows_with_changes_not_edges() {
        let mut sim = blink(1_000, 1);
        sim.run(2_500, |_, _| {}).unwrap();
        let trace = sim.trace();
        assert_eq!(trace.edges(), 2_500);
        // state and r at edge 1000, then state, r and g at edge 2000.
        assert_eq!(trace.changes().len(), 5);
        assert_eq!(trace.value(999, "state"), Some(State::None.encode()));
        assert_eq!(trace.value(1_000, "state"), Some(State::Red.encode()));
        assert_eq!(trace.value(2_500, "g"), Some(1));
        assert_eq!(trace.value(2_501, "g"), None);
        assert_eq!(
            trace.transitions("state"),
            vec![(0, 0), (1_000, 1), (2_000, 2)]
        );
    }

    #[test]
    fn samples_rebuild_every_edge() {
        let mut sim = blink(2, 1);
        sim.run(4, |_, _| {}).unwrap();
        let states: Vec<u64> = sim.trace().samples().map(|s| s["state"]).collect();
        assert_eq!(states, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn only_non_clock_inputs_can_be_driven() {
        let mut sim = blink(2, 1);
        assert!(sim.poke("clk", 1).is_err());
        assert!(sim.poke("state", 1).is_err());
        assert!(sim.poke("nope", 1).is_err());
        sim.poke("rst", 1).unwrap();
        assert_eq!(sim.peek("rst"), Some(1));
    }

    #[test]
    fn period_rounds_to_nearest_picosecond() {
        assert_eq!(period_ps(48_000_000), 20_833);
        assert_eq!(period_ps(1_000_000), 1_000_000);
        assert_eq!(period_ps(3), 333_333_333_333);
    }
}
