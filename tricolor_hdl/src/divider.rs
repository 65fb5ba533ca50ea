//! Countdown divider driving the colour state register.
//!
//! Each rising edge either decrements `timer` or, when it has reached zero,
//! reloads it with `divisor - 1` and advances the state. The state therefore
//! changes once every `divisor` edges.

use std::num::NonZeroU64;

use contracts::*;

use crate::error::{ElaborationError, ParamError};
use crate::ir::{DesignBuilder, Expr};
use crate::state::State;

/// Register names used when the core is lowered into a design.
pub const TIMER: &str = "timer";
pub const STATE: &str = "state";

/// Bits needed to hold `max`, never fewer than one.
#[must_use]
pub const fn width_for(max: u64) -> u32 {
    let bits = u64::BITS - max.leading_zeros();
    if bits == 0 { 1 } else { bits }
}

/// Behavioural model of the divider/FSM core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Divider {
    divisor: NonZeroU64,
    timer: u64,
    state: State,
}

impl Divider {
    /// `divisor = floor(clock_frequency / blink_rate)`.
    pub fn new(clock_frequency: u64, blink_rate: u64) -> Result<Self, ParamError> {
        if clock_frequency == 0 {
            return Err(ParamError::ZeroClockFrequency);
        }
        if blink_rate == 0 {
            return Err(ParamError::ZeroBlinkRate);
        }
        let divisor = NonZeroU64::new(clock_frequency / blink_rate).ok_or(
            ParamError::ZeroDivisor {
                clock_frequency,
                blink_rate,
            },
        )?;
        Ok(Self::with_divisor(divisor))
    }

    /// A core in its reset state.
    pub fn with_divisor(divisor: NonZeroU64) -> Self {
        Self {
            divisor,
            timer: divisor.get() - 1,
            state: State::None,
        }
    }

    pub fn divisor(&self) -> u64 {
        self.divisor.get()
    }

    /// Value the timer reloads with, and holds at reset.
    pub fn reload(&self) -> u64 {
        self.divisor.get() - 1
    }

    pub fn timer(&self) -> u64 {
        self.timer
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn timer_width(&self) -> u32 {
        width_for(self.reload())
    }

    pub fn reset(&mut self) {
        self.timer = self.reload();
        self.state = State::None;
    }

    /// Apply one rising edge. Returns whether the state advanced.
    #[debug_ensures(self.timer < self.divisor.get())]
    pub fn tick(&mut self) -> bool {
        if self.timer == 0 {
            self.timer = self.reload();
            self.state = self.state.successor();
            true
        } else {
            self.timer -= 1;
            false
        }
    }

    /// Emit the `timer` and `state` registers and their next-state logic.
    pub fn lower(&self, builder: &mut DesignBuilder) -> Result<(), ElaborationError> {
        let width = self.timer_width();
        builder.register(TIMER, width, self.reload())?;
        builder.register(STATE, State::WIDTH, State::None.encode())?;

        let expired = || Expr::signal(TIMER).equals(Expr::constant(0, width));
        builder.sync(
            TIMER,
            Expr::mux(
                expired(),
                Expr::constant(self.reload(), width),
                Expr::signal(TIMER).minus(Expr::constant(1, width)),
            ),
        )?;
        builder.sync(
            STATE,
            Expr::mux(
                expired(),
                Expr::signal(STATE).plus(Expr::constant(1, State::WIDTH)),
                Expr::signal(STATE),
            ),
        )?;
        Ok(())
    }
}
