//! The four colour states and their 2-bit encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Which colour is lit. Encoded as a 2-bit unsigned value in the order below;
/// advancing past [`State::Blue`] wraps to [`State::None`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum State {
    #[default]
    None = 0,
    Red = 1,
    Green = 2,
    Blue = 3,
}

impl State {
    /// Width of the state register in bits.
    pub const WIDTH: u32 = 2;
    /// All states in encoding order.
    pub const ALL: [Self; 4] = [Self::None, Self::Red, Self::Green, Self::Blue];
    const MASK: u64 = (1 << Self::WIDTH) - 1;

    #[must_use]
    pub const fn encode(self) -> u64 {
        self as u64
    }

    pub const fn decode(bits: u64) -> Result<Self, StateError> {
        match bits {
            0 => Ok(Self::None),
            1 => Ok(Self::Red),
            2 => Ok(Self::Green),
            3 => Ok(Self::Blue),
            _ => Err(StateError::InvalidEncoding(bits)),
        }
    }

    /// Decode the low two bits, ignoring the rest. This is how the hardware
    /// register sees any value written to it.
    #[must_use]
    pub const fn from_bits_truncate(bits: u64) -> Self {
        Self::ALL[(bits & Self::MASK) as usize]
    }

    /// `(s + 1) mod 4`.
    #[must_use]
    pub const fn successor(self) -> Self {
        match self {
            Self::None => Self::Red,
            Self::Red => Self::Green,
            Self::Green => Self::Blue,
            Self::Blue => Self::None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Blue => "BLUE",
        }
    }
}

// The register width must cover exactly the set of states.
const _: () = assert!(1 << State::WIDTH == State::ALL.len());

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u64> for State {
    type Error = StateError;

    fn try_from(bits: u64) -> Result<Self, Self::Error> {
        Self::decode(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen, quickcheck};

    #[derive(Clone, Copy, Debug)]
    struct ArbitraryState(State);

    impl Arbitrary for ArbitraryState {
        fn arbitrary(g: &mut Gen) -> Self {
            Self(State::from_bits_truncate(u64::arbitrary(g)))
        }
    }

    #[test]
    fn encoding_is_total_order() {
        for (i, state) in State::ALL.iter().enumerate() {
            assert_eq!(state.encode(), i as u64);
            assert_eq!(State::decode(i as u64), Ok(*state));
        }
        assert!(State::None < State::Red && State::Red < State::Green && State::Green < State::Blue);
    }

    #[test]
    fn blue_wraps_to_none() {
        assert_eq!(State::Blue.successor(), State::None);
    }

    #[test]
    fn out_of_range_encoding_is_rejected() {
        assert_eq!(State::decode(4), Err(StateError::InvalidEncoding(4)));
        assert_eq!(State::from_bits_truncate(4), State::None);
        assert_eq!(State::from_bits_truncate(7), State::Blue);
    }

    quickcheck! {
        fn prop_period_is_four(s: ArbitraryState) -> bool {
            let s = s.0;
            s.successor().successor().successor().successor() == s
                && s.successor() != s
                && s.successor().successor() != s
                && s.successor().successor().successor() != s
        }

        fn prop_successor_is_increment_mod_four(s: ArbitraryState) -> bool {
            s.0.successor().encode() == (s.0.encode() + 1) % 4
        }
    }
}
