//! Combinational state → colour decoding.

use serde::{Deserialize, Serialize};

use crate::error::ElaborationError;
use crate::ir::{DesignBuilder, Expr};
use crate::state::State;

/// Drive levels of the three colour outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Outputs {
    pub r: bool,
    pub g: bool,
    pub b: bool,
}

impl Outputs {
    /// How many colours are lit. Never more than one.
    #[must_use]
    pub fn asserted(&self) -> usize {
        [self.r, self.g, self.b].into_iter().filter(|&on| on).count()
    }
}

/// NONE lights nothing; every other state lights exactly its own colour.
#[must_use]
pub const fn outputs(state: State) -> Outputs {
    match state {
        State::None => Outputs {
            r: false,
            g: false,
            b: false,
        },
        State::Red => Outputs {
            r: true,
            g: false,
            b: false,
        },
        State::Green => Outputs {
            r: false,
            g: true,
            b: false,
        },
        State::Blue => Outputs {
            r: false,
            g: false,
            b: true,
        },
    }
}

/// Output names paired with the state that lights them.
pub const OUTPUT_STATES: [(&str, State); 3] =
    [("r", State::Red), ("g", State::Green), ("b", State::Blue)];

/// Emit one-bit wires `r`, `g` and `b` decoding `state`.
pub fn lower(builder: &mut DesignBuilder, state: &str) -> Result<(), ElaborationError> {
    for (name, lit) in OUTPUT_STATES {
        builder.wire(name, 1)?;
        builder.comb(
            name,
            Expr::signal(state).equals(Expr::constant(lit.encode(), State::WIDTH)),
        )?;
    }
    Ok(())
}
