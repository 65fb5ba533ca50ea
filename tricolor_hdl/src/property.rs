//! Cover properties over current and one-step-past signal values.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::ir::Sample;
use crate::state::State;

/// Boolean predicate over the design's signals. [`PropExpr::Past`] reads the
/// value the signal had at the previous clock step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropExpr {
    Signal(String),
    Past(String),
    Const { value: u64, width: u32 },
    Eq(Box<PropExpr>, Box<PropExpr>),
    And(Box<PropExpr>, Box<PropExpr>),
    Not(Box<PropExpr>),
}

impl PropExpr {
    pub fn signal(name: &str) -> Self {
        Self::Signal(name.to_string())
    }

    pub fn past(name: &str) -> Self {
        Self::Past(name.to_string())
    }

    pub fn constant(value: u64, width: u32) -> Self {
        Self::Const { value, width }
    }

    pub fn state(state: State) -> Self {
        Self::constant(state.encode(), State::WIDTH)
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

    /// Signal names read, with or without history.
    pub fn references(&self) -> IndexSet<&str> {
        let mut out = IndexSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut IndexSet<&'a str>) {
        match self {
            Self::Signal(name) | Self::Past(name) => {
                out.insert(name.as_str());
            }
            Self::Const { .. } => {}
            Self::Eq(a, b) | Self::And(a, b) => {
                a.collect_references(out);
                b.collect_references(out);
            }
            Self::Not(a) => a.collect_references(out),
        }
    }

    /// Does the predicate use the history operator anywhere?
    pub fn uses_past(&self) -> bool {
        match self {
            Self::Past(_) => true,
            Self::Signal(_) | Self::Const { .. } => false,
            Self::Eq(a, b) | Self::And(a, b) => a.uses_past() || b.uses_past(),
            Self::Not(a) => a.uses_past(),
        }
    }

    /// Evaluate with `previous` standing in for the past. Without a previous
    /// sample any `Past` term makes the whole predicate unknown (`None`).
    pub fn eval(&self, current: &Sample, previous: Option<&Sample>) -> Option<u64> {
        Some(match self {
            Self::Signal(name) => *current.get(name)?,
            Self::Past(name) => *previous?.get(name)?,
            Self::Const { value, .. } => *value,
            Self::Eq(a, b) => u64::from(a.eval(current, previous)? == b.eval(current, previous)?),
            Self::And(a, b) => {
                u64::from(a.eval(current, previous)? != 0 && b.eval(current, previous)? != 0)
            }
            Self::Not(a) => u64::from(a.eval(current, previous)? == 0),
        })
    }
}

/// "Is there a trace on which `predicate` holds?"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverProperty {
    name: String,
    predicate: PropExpr,
}

impl CoverProperty {
    #[contracts::debug_requires(!name.is_empty())]
    pub fn new(name: &str, predicate: PropExpr) -> Self {
        Self {
            name: name.to_string(),
            predicate,
        }
    }

    /// The colour cycle leaves the dark state: previous state NONE, current
    /// state RED.
    pub fn none_to_red(state_signal: &str) -> Self {
        Self::new(
            "none_to_red",
            PropExpr::past(state_signal)
                .equals(PropExpr::state(State::None))
                .and(PropExpr::signal(state_signal).equals(PropExpr::state(State::Red))),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> &PropExpr {
        &self.predicate
    }

    /// Whether the predicate holds at `index` of a sampled trace.
    pub fn holds_at(&self, samples: &[Sample], index: usize) -> bool {
        let Some(current) = samples.get(index) else {
            return false;
        };
        let previous = index.checked_sub(1).and_then(|i| samples.get(i));
        self.predicate
            .eval(current, previous)
            .is_some_and(|v| v != 0)
    }

    /// First sample index at which the predicate holds, if any. This is a
    /// witness on one concrete trace, not a reachability proof.
    pub fn first_witness(&self, samples: &[Sample]) -> Option<usize> {
        (0..samples.len()).find(|&i| self.holds_at(samples, i))
    }
}
