//! Backend-neutral structural IR.
//!
//! A [`Design`] is a flat table of named signals with two assignment
//! domains: `sync` (registers, updated on the rising edge of the design's
//! clock) and `comb` (wires, recomputed from registers, inputs and earlier
//! wires). The builder enforces that combinational assignments are listed in
//! dependency order, so one in-order pass settles every wire.
//!
//! The clock domain also has a synchronous, active-high reset. While it is
//! asserted, every register in the domain loads its reset value on the next
//! edge. The reset is an input unless the builder generates it on chip with
//! [`DesignBuilder::power_on_reset`].

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::ElaborationError;
use crate::property::CoverProperty;

/// Signal values at one instant, keyed by signal name.
pub type Sample = IndexMap<String, u64>;

/// How a signal gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Driven from outside the design (the clock, the reset).
    Input,
    /// Updated on the clock edge; takes `reset` at time zero.
    Register { reset: u64 },
    /// Combinational.
    Wire,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub width: u32,
    pub kind: SignalKind,
}

impl Signal {
    /// Mask selecting the bits that fit in this signal.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        width_mask(self.width)
    }

    #[must_use]
    pub const fn is_register(&self) -> bool {
        matches!(self.kind, SignalKind::Register { .. })
    }
}

pub(crate) const fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Expression tree over named signals. Arithmetic wraps; the result is
/// truncated to the width of whatever it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Const { value: u64, width: u32 },
    Signal(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    /// One-bit equality.
    Eq(Box<Expr>, Box<Expr>),
    /// One-bit logical and.
    And(Box<Expr>, Box<Expr>),
    /// One-bit logical not.
    Not(Box<Expr>),
    Mux {
        sel: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn constant(value: u64, width: u32) -> Self {
        Self::Const { value, width }
    }

    pub fn signal(name: &str) -> Self {
        Self::Signal(name.to_string())
    }

    pub fn plus(self, rhs: Self) -> Self {
        Self::Add(Box::new(self), Box::new(rhs))
    }

    pub fn minus(self, rhs: Self) -> Self {
        Self::Sub(Box::new(self), Box::new(rhs))
    }

    pub fn equals(self, rhs: Self) -> Self {
        Self::Eq(Box::new(self), Box::new(rhs))
    }

    pub fn and(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }

    pub fn invert(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn mux(sel: Self, then: Self, otherwise: Self) -> Self {
        Self::Mux {
            sel: Box::new(sel),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Every signal name this expression reads, in first-use order.
    pub fn references(&self) -> IndexSet<&str> {
        let mut out = IndexSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut IndexSet<&'a str>) {
        match self {
            Self::Const { .. } => {}
            Self::Signal(name) => {
                out.insert(name.as_str());
            }
            Self::Add(a, b) | Self::Sub(a, b) | Self::Eq(a, b) | Self::And(a, b) => {
                a.collect_references(out);
                b.collect_references(out);
            }
            Self::Not(a) => a.collect_references(out),
            Self::Mux {
                sel,
                then,
                otherwise,
            } => {
                sel.collect_references(out);
                then.collect_references(out);
                otherwise.collect_references(out);
            }
        }
    }

    /// Evaluate against the current signal values. `None` means a referenced
    /// signal has no value.
    pub fn eval(&self, values: &Sample) -> Option<u64> {
        Some(match self {
            Self::Const { value, width } => value & width_mask(*width),
            Self::Signal(name) => *values.get(name)?,
            Self::Add(a, b) => a.eval(values)?.wrapping_add(b.eval(values)?),
            Self::Sub(a, b) => a.eval(values)?.wrapping_sub(b.eval(values)?),
            Self::Eq(a, b) => u64::from(a.eval(values)? == b.eval(values)?),
            Self::And(a, b) => u64::from(a.eval(values)? != 0 && b.eval(values)? != 0),
            Self::Not(a) => u64::from(a.eval(values)? == 0),
            Self::Mux {
                sel,
                then,
                otherwise,
            } => {
                if sel.eval(values)? != 0 {
                    then.eval(values)?
                } else {
                    otherwise.eval(values)?
                }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assign {
    pub target: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// A top-level port, optionally bound to a physical pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub signal: String,
    pub direction: PortDirection,
    pub pin: Option<String>,
}

/// The elaborated design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    name: String,
    clock: String,
    reset: String,
    clock_frequency: u64,
    signals: IndexMap<String, Signal>,
    sync: Vec<Assign>,
    comb: Vec<Assign>,
    ports: Vec<Port>,
    observables: Vec<String>,
    covers: Vec<CoverProperty>,
}

impl Design {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the clock input that drives every register.
    pub fn clock(&self) -> &str {
        &self.clock
    }

    /// Name of the synchronous reset of the clock domain.
    pub fn reset(&self) -> &str {
        &self.reset
    }

    /// Clock frequency the design was elaborated for, in hertz.
    pub fn clock_frequency(&self) -> u64 {
        self.clock_frequency
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    pub fn sync(&self) -> &[Assign] {
        &self.sync
    }

    pub fn comb(&self) -> &[Assign] {
        &self.comb
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, signal: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.signal == signal)
    }

    /// Signals the module declared as worth tracing.
    pub fn observables(&self) -> &[String] {
        &self.observables
    }

    pub fn covers(&self) -> &[CoverProperty] {
        &self.covers
    }

    /// Values every signal holds at time zero, before any wire has settled.
    pub fn reset_values(&self) -> Sample {
        self.signals
            .values()
            .map(|s| {
                let value = match s.kind {
                    SignalKind::Register { reset } => reset & s.mask(),
                    SignalKind::Input | SignalKind::Wire => 0,
                };
                (s.name.clone(), value)
            })
            .collect()
    }

    /// Attach cover statements, checking that they only talk about signals
    /// this design has.
    pub fn with_covers<I>(mut self, covers: I) -> Result<Self, ElaborationError>
    where
        I: IntoIterator<Item = CoverProperty>,
    {
        for cover in covers {
            if let Some(missing) = cover
                .predicate()
                .references()
                .into_iter()
                .find(|name| !self.signals.contains_key(*name))
            {
                return Err(ElaborationError::UnknownSignal(missing.to_string()));
            }
            self.covers.push(cover);
        }
        Ok(self)
    }
}

/// Incrementally assembles a [`Design`] and validates it on [`build`].
///
/// [`build`]: DesignBuilder::build
#[derive(Debug, Clone)]
pub struct DesignBuilder {
    name: String,
    clock: String,
    reset: String,
    clock_frequency: u64,
    signals: IndexMap<String, Signal>,
    sync: Vec<Assign>,
    comb: Vec<Assign>,
    ports: Vec<Port>,
    observables: Vec<String>,
    /// Registers outside the reset domain.
    unreset: IndexSet<String>,
}

impl DesignBuilder {
    /// Start a design whose registers are clocked by a one-bit input named
    /// `clock` and synchronously reset by a one-bit input named `reset`.
    #[contracts::debug_requires(!name.is_empty() && !clock.is_empty() && clock != reset)]
    pub fn new(name: &str, clock: &str, reset: &str, clock_frequency: u64) -> Self {
        let signals = [clock, reset]
            .into_iter()
            .map(|s| {
                let signal = Signal {
                    name: s.to_string(),
                    width: 1,
                    kind: SignalKind::Input,
                };
                (s.to_string(), signal)
            })
            .collect();
        Self {
            name: name.to_string(),
            clock: clock.to_string(),
            reset: reset.to_string(),
            clock_frequency,
            signals,
            sync: Vec::new(),
            comb: Vec::new(),
            ports: Vec::new(),
            observables: Vec::new(),
            unreset: IndexSet::new(),
        }
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }

    pub fn reset(&self) -> &str {
        &self.reset
    }

    pub fn clock_frequency(&self) -> u64 {
        self.clock_frequency
    }

    /// Drive the reset from an on-chip counter instead of an input: `reset`
    /// is held high for the first `cycles` edges after configuration, then
    /// stays low. The counter register `counter` is not itself reset.
    #[contracts::debug_requires(cycles > 0)]
    pub fn power_on_reset(&mut self, counter: &str, cycles: u64) -> Result<(), ElaborationError> {
        match self.signals.get_mut(&self.reset) {
            Some(signal) if signal.kind == SignalKind::Input => signal.kind = SignalKind::Wire,
            _ => return Err(ElaborationError::MultipleDrivers(self.reset.clone())),
        }

        let width = (u64::BITS - cycles.leading_zeros()).max(1);
        self.register(counter, width, 0)?;
        self.unreset.insert(counter.to_string());

        let done = || Expr::signal(counter).equals(Expr::constant(cycles, width));
        self.sync(
            counter,
            Expr::mux(
                done(),
                Expr::signal(counter),
                Expr::signal(counter).plus(Expr::constant(1, width)),
            ),
        )?;
        let reset = self.reset.clone();
        self.comb(&reset, done().invert())
    }

    fn declare(&mut self, name: &str, width: u32, kind: SignalKind) -> Result<(), ElaborationError> {
        if width == 0 || width > 64 {
            return Err(ElaborationError::UnsupportedWidth {
                signal: name.to_string(),
                width,
            });
        }
        if self.signals.contains_key(name) {
            return Err(ElaborationError::DuplicateSignal(name.to_string()));
        }
        self.signals.insert(
            name.to_string(),
            Signal {
                name: name.to_string(),
                width,
                kind,
            },
        );
        Ok(())
    }

    pub fn register(&mut self, name: &str, width: u32, reset: u64) -> Result<(), ElaborationError> {
        self.declare(name, width, SignalKind::Register { reset })
    }

    pub fn wire(&mut self, name: &str, width: u32) -> Result<(), ElaborationError> {
        self.declare(name, width, SignalKind::Wire)
    }

    fn check_references(&self, expr: &Expr) -> Result<(), ElaborationError> {
        match expr
            .references()
            .into_iter()
            .find(|name| !self.signals.contains_key(*name))
        {
            Some(missing) => Err(ElaborationError::UnknownSignal(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Register update on the rising clock edge.
    pub fn sync(&mut self, target: &str, expr: Expr) -> Result<(), ElaborationError> {
        let signal = self
            .signals
            .get(target)
            .ok_or_else(|| ElaborationError::UnknownSignal(target.to_string()))?;
        if !signal.is_register() {
            return Err(ElaborationError::InvalidTarget {
                signal: target.to_string(),
                reason: "only registers take synchronous assignments".to_string(),
            });
        }
        if self.sync.iter().any(|a| a.target == target) {
            return Err(ElaborationError::MultipleDrivers(target.to_string()));
        }
        self.check_references(&expr)?;
        self.sync.push(Assign {
            target: target.to_string(),
            expr,
        });
        Ok(())
    }

    /// Continuous assignment. Wires read by `expr` must already be driven.
    pub fn comb(&mut self, target: &str, expr: Expr) -> Result<(), ElaborationError> {
        let signal = self
            .signals
            .get(target)
            .ok_or_else(|| ElaborationError::UnknownSignal(target.to_string()))?;
        if signal.kind != SignalKind::Wire {
            return Err(ElaborationError::InvalidTarget {
                signal: target.to_string(),
                reason: "only wires take combinational assignments".to_string(),
            });
        }
        if self.comb.iter().any(|a| a.target == target) {
            return Err(ElaborationError::MultipleDrivers(target.to_string()));
        }
        self.check_references(&expr)?;
        for name in expr.references() {
            let is_wire = self
                .signals
                .get(name)
                .is_some_and(|s| s.kind == SignalKind::Wire);
            if is_wire && !self.comb.iter().any(|a| a.target == name) {
                return Err(ElaborationError::InvalidTarget {
                    signal: target.to_string(),
                    reason: format!("reads wire '{name}' before it is driven"),
                });
            }
        }
        self.comb.push(Assign {
            target: target.to_string(),
            expr,
        });
        Ok(())
    }

    pub fn port(
        &mut self,
        signal: &str,
        direction: PortDirection,
        pin: Option<&str>,
    ) -> Result<(), ElaborationError> {
        if !self.signals.contains_key(signal) {
            return Err(ElaborationError::UnknownSignal(signal.to_string()));
        }
        self.ports.push(Port {
            signal: signal.to_string(),
            direction,
            pin: pin.map(str::to_string),
        });
        Ok(())
    }

    pub fn observe(&mut self, signal: &str) -> Result<(), ElaborationError> {
        if !self.signals.contains_key(signal) {
            return Err(ElaborationError::UnknownSignal(signal.to_string()));
        }
        if !self.observables.iter().any(|s| s == signal) {
            self.observables.push(signal.to_string());
        }
        Ok(())
    }

    /// Validate the design and fold the reset into every register update in
    /// the reset domain: `target <= reset ? reset_value : next`.
    pub fn build(self) -> Result<Design, ElaborationError> {
        let Self {
            name,
            clock,
            reset,
            clock_frequency,
            signals,
            sync,
            comb,
            ports,
            observables,
            unreset,
        } = self;

        for signal in signals.values() {
            let driven = match signal.kind {
                SignalKind::Input => true,
                SignalKind::Register { .. } => sync.iter().any(|a| a.target == signal.name),
                SignalKind::Wire => comb.iter().any(|a| a.target == signal.name),
            };
            if !driven {
                return Err(ElaborationError::InvalidTarget {
                    signal: signal.name.clone(),
                    reason: "signal is never driven".to_string(),
                });
            }
        }

        let sync: Vec<Assign> = sync
            .into_iter()
            .map(|assign| match signals.get(&assign.target) {
                Some(signal) if !unreset.contains(&assign.target) => {
                    let SignalKind::Register { reset: value } = signal.kind else {
                        return assign;
                    };
                    Assign {
                        expr: Expr::mux(
                            Expr::signal(&reset),
                            Expr::constant(value & signal.mask(), signal.width),
                            assign.expr,
                        ),
                        target: assign.target,
                    }
                }
                _ => assign,
            })
            .collect();

        tracing::debug!(
            "built design '{}': {} signals, {} sync, {} comb",
            name,
            signals.len(),
            sync.len(),
            comb.len()
        );

        Ok(Design {
            name,
            clock,
            reset,
            clock_frequency,
            signals,
            sync,
            comb,
            ports,
            observables,
            covers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> DesignBuilder {
        let mut b = DesignBuilder::new("counter", "clk", "rst", 1);
        b.register("count", 3, 5).unwrap();
        b
    }

    #[test]
    fn register_needs_a_driver() {
        let err = counter().build().unwrap_err();
        assert!(matches!(err, ElaborationError::InvalidTarget { ref signal, .. } if signal == "count"));
    }

    #[test]
    fn reset_values_are_masked_to_width() {
        let mut b = DesignBuilder::new("counter", "clk", "rst", 1);
        b.register("count", 2, 7).unwrap();
        b.sync("count", Expr::signal("count").plus(Expr::constant(1, 2)))
            .unwrap();
        let design = b.build().unwrap();
        assert_eq!(design.reset_values()["count"], 3);
    }

    #[test]
    fn wires_must_be_driven_in_dependency_order() {
        let mut b = counter();
        b.wire("a", 1).unwrap();
        b.wire("b", 1).unwrap();
        let err = b.comb("b", Expr::signal("a").invert()).unwrap_err();
        assert!(matches!(err, ElaborationError::InvalidTarget { .. }));

        b.comb("a", Expr::signal("count").equals(Expr::constant(0, 3)))
            .unwrap();
        b.comb("b", Expr::signal("a").invert()).unwrap();
    }

    #[test]
    fn sync_rejects_wires_and_double_drivers() {
        let mut b = counter();
        b.wire("w", 1).unwrap();
        assert!(matches!(
            b.sync("w", Expr::constant(0, 1)),
            Err(ElaborationError::InvalidTarget { .. })
        ));
        b.sync("count", Expr::constant(0, 3)).unwrap();
        assert_eq!(
            b.sync("count", Expr::constant(1, 3)),
            Err(ElaborationError::MultipleDrivers("count".to_string()))
        );
    }

    #[test]
    fn duplicate_and_unknown_signals_are_rejected() {
        let mut b = counter();
        assert_eq!(
            b.register("count", 1, 0),
            Err(ElaborationError::DuplicateSignal("count".to_string()))
        );
        assert_eq!(
            b.sync("count", Expr::signal("missing")),
            Err(ElaborationError::UnknownSignal("missing".to_string()))
        );
    }

    #[test]
    fn eval_follows_mux_and_wraps() {
        let mut values = Sample::new();
        values.insert("t".to_string(), 0);
        let expr = Expr::mux(
            Expr::signal("t").equals(Expr::constant(0, 4)),
            Expr::constant(9, 4),
            Expr::signal("t").minus(Expr::constant(1, 4)),
        );
        assert_eq!(expr.eval(&values), Some(9));
        values.insert("t".to_string(), 4);
        assert_eq!(expr.eval(&values), Some(3));
        assert_eq!(Expr::signal("nope").eval(&values), None);
    }

    #[test]
    fn registers_load_reset_value_while_reset_is_high() {
        let mut b = counter();
        b.sync("count", Expr::signal("count").plus(Expr::constant(1, 3)))
            .unwrap();
        let design = b.build().unwrap();
        assert_eq!(design.reset(), "rst");
        assert_eq!(design.signal("rst").map(|s| s.kind), Some(SignalKind::Input));

        let next = &design.sync()[0].expr;
        let mut values = design.reset_values();
        values.insert("count".to_string(), 2);
        assert_eq!(next.eval(&values), Some(3));
        values.insert("rst".to_string(), 1);
        assert_eq!(next.eval(&values), Some(5));
    }

    #[test]
    fn power_on_reset_releases_after_the_delay() {
        let mut b = counter();
        b.sync("count", Expr::signal("count").plus(Expr::constant(1, 3)))
            .unwrap();
        b.power_on_reset("por", 2).unwrap();
        assert_eq!(
            b.power_on_reset("por2", 2),
            Err(ElaborationError::MultipleDrivers("rst".to_string()))
        );
        let design = b.build().unwrap();
        assert_eq!(design.signal("rst").map(|s| s.kind), Some(SignalKind::Wire));

        // One edge at a time: registers from pre-edge values, then wires.
        let mut values = design.reset_values();
        let settle = |values: &mut Sample| {
            for a in design.comb() {
                let v = a.expr.eval(values).unwrap();
                values.insert(a.target.clone(), v);
            }
        };
        settle(&mut values);
        let mut resets = Vec::new();
        for _ in 0..4 {
            resets.push(values["rst"]);
            let next: Vec<_> = design
                .sync()
                .iter()
                .map(|a| (a.target.clone(), a.expr.eval(&values).unwrap() & design.signal(&a.target).unwrap().mask()))
                .collect();
            values.extend(next);
            settle(&mut values);
        }
        assert_eq!(resets, vec![1, 1, 0, 0]);
        assert_eq!(values["por"], 2);
        // Held at 5 for two edges, then counting.
        assert_eq!(values["count"], 7);
    }
}
