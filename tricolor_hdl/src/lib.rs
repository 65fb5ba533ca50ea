//! Structural description of the tricolor blinker.
//!
//! A [`Blink`] module composes a clock-divided [`Divider`] core with the
//! [`outputs`] mux. Elaborating it against a [`Platform`] yields a [`Design`],
//! the backend-neutral IR consumed by the synthesis, simulation and formal
//! backends.

pub mod divider;
pub mod error;
pub mod ir;
pub mod module;
pub mod mux;
pub mod platform;
pub mod property;
pub mod state;
pub mod verilog;

pub use divider::Divider;
pub use error::{ElaborationError, ParamError, StateError};
pub use ir::{Assign, Design, DesignBuilder, Expr, Port, PortDirection, Sample, Signal, SignalKind};
pub use module::{Blink, Covered, Elaboratable};
pub use mux::{Outputs, outputs};
pub use platform::{Pin, PinBinding, Platform, ResourceBinder, ResourceError, VirtualPlatform};
pub use property::{CoverProperty, PropExpr};
pub use state::State;
