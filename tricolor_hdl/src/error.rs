//! Error types for module construction and elaboration.

use thiserror::Error;

use crate::platform::ResourceError;

/// Invalid module parameters. Raised while constructing the module or its
/// divider, before any structure is produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("blink_rate must be positive, got 0")]
    ZeroBlinkRate,
    #[error("clock_frequency must be positive, got 0")]
    ZeroClockFrequency,
    #[error(
        "divisor rounds to 0: blink_rate={blink_rate} Hz exceeds clock_frequency={clock_frequency} Hz"
    )]
    ZeroDivisor {
        clock_frequency: u64,
        blink_rate: u64,
    },
}

/// A bit pattern that does not name a state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("{0:#b} is not a valid 2-bit state encoding")]
    InvalidEncoding(u64),
}

/// Errors raised while turning a module into a [`crate::Design`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElaborationError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Signal '{0}' declared twice")]
    DuplicateSignal(String),

    #[error("Reference to undeclared signal '{0}'")]
    UnknownSignal(String),

    #[error("Signal '{signal}' cannot be assigned here: {reason}")]
    InvalidTarget { signal: String, reason: String },

    #[error("Signal '{0}' has more than one driver")]
    MultipleDrivers(String),

    #[error("Signal '{signal}' is {width} bits wide, which is not supported (1..=64)")]
    UnsupportedWidth { signal: String, width: u32 },
}
