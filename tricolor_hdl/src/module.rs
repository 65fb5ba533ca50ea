//! The blinker module and the elaboration contract.

use std::num::NonZeroU64;

use tracing::{debug, info};

use tricolor_common::{BlinkConfig, DEFAULT_CLOCK_FREQUENCY};

use crate::divider::{self, Divider};
use crate::error::{ElaborationError, ParamError};
use crate::ir::{Design, DesignBuilder, Expr, PortDirection};
use crate::mux::{self, OUTPUT_STATES};
use crate::platform::{Platform, ResourceBinder};
use crate::property::CoverProperty;

/// Anything that can be turned into a [`Design`] for a given context.
///
/// Elaboration must be a pure function of the module and the platform: the
/// same inputs always give an equal design.
pub trait Elaboratable {
    fn elaborate(&self, platform: &dyn Platform) -> Result<Design, ElaborationError>;
}

/// Logical name of the indicator resource requested from hardware platforms.
pub const RGB_LED: &str = "rgb_led";

/// Clock and reset of the `sync` domain.
pub const CLOCK: &str = "clk";
pub const RESET: &str = "rst";

/// Counter that holds the reset after configuration on real hardware.
pub const POWER_ON_RESET: &str = "por_count";

/// Power-on reset hold time. iCE40 block RAM reads as zero for a few
/// microseconds after configuration; 15 us covers it.
const POWER_ON_RESET_US: u64 = 15;

/// Edges the power-on reset is held for at `clock_frequency`, at least one.
#[must_use]
pub const fn power_on_reset_cycles(clock_frequency: u64) -> u64 {
    let cycles = clock_frequency / 1_000_000 * POWER_ON_RESET_US;
    if cycles == 0 { 1 } else { cycles }
}

/// Clock-divided colour cycler: NONE → RED → GREEN → BLUE → NONE, one step
/// every `clock_frequency / blink_rate` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blink {
    blink_rate: NonZeroU64,
}

impl Blink {
    /// Signals exposed for inspection, in trace order.
    pub const PORTS: [&'static str; 4] = [divider::STATE, "r", "g", "b"];

    pub fn new(blink_rate: u64) -> Result<Self, ParamError> {
        let blink_rate = NonZeroU64::new(blink_rate).ok_or(ParamError::ZeroBlinkRate)?;
        Ok(Self { blink_rate })
    }

    pub fn from_config(config: &BlinkConfig) -> Result<Self, ParamError> {
        Self::new(config.blink_rate)
    }

    pub fn blink_rate(&self) -> u64 {
        self.blink_rate.get()
    }

    pub fn ports(&self) -> &'static [&'static str] {
        &Self::PORTS
    }

    /// Build the core for a clock, falling back to the default clock when the
    /// platform does not provide one.
    pub fn divider(&self, platform: &dyn Platform) -> Result<Divider, ParamError> {
        let clock_frequency = platform
            .clock_frequency()
            .unwrap_or(DEFAULT_CLOCK_FREQUENCY);
        Divider::new(clock_frequency, self.blink_rate())
    }

    fn bind_pins(
        builder: &mut DesignBuilder,
        binder: &dyn ResourceBinder,
    ) -> Result<(), ElaborationError> {
        // No reset pin on the board: hold reset from configuration instead.
        let cycles = power_on_reset_cycles(builder.clock_frequency());
        builder.power_on_reset(POWER_ON_RESET, cycles)?;

        let clock = binder.request(binder.default_clock(), 0)?;
        let clock_pin = clock.subsignal("io")?;
        let clock_name = builder.clock().to_string();
        builder.port(&clock_name, PortDirection::Input, Some(&clock_pin.name))?;

        let rgb = binder.request(RGB_LED, 0)?;
        let prefix = rgb.port_prefix();
        for (name, _) in OUTPUT_STATES {
            let pin = rgb.subsignal(name)?;
            let port = format!("{prefix}__{name}");
            let level = if pin.invert {
                Expr::signal(name).invert()
            } else {
                Expr::signal(name)
            };
            builder.wire(&port, 1)?;
            builder.comb(&port, level)?;
            builder.port(&port, PortDirection::Output, Some(&pin.name))?;
            debug!("bound {} to pin {} (invert={})", port, pin.name, pin.invert);
        }
        Ok(())
    }
}

impl Elaboratable for Blink {
    fn elaborate(&self, platform: &dyn Platform) -> Result<Design, ElaborationError> {
        let core = self.divider(platform)?;
        let clock_frequency = platform
            .clock_frequency()
            .unwrap_or(DEFAULT_CLOCK_FREQUENCY);

        let mut builder = DesignBuilder::new("blink", CLOCK, RESET, clock_frequency);
        core.lower(&mut builder)?;
        mux::lower(&mut builder, divider::STATE)?;
        for port in Self::PORTS {
            builder.observe(port)?;
        }

        match platform.resources() {
            Some(binder) => Self::bind_pins(&mut builder, binder)?,
            None => {
                builder.port(CLOCK, PortDirection::Input, None)?;
                builder.port(RESET, PortDirection::Input, None)?;
                for port in Self::PORTS {
                    builder.port(port, PortDirection::Output, None)?;
                }
            }
        }

        info!(
            "elaborated blink: clock_frequency={} Hz, blink_rate={} Hz, divisor={}",
            clock_frequency,
            self.blink_rate(),
            core.divisor()
        );
        builder.build()
    }
}

/// A module plus cover statements, elaborated together. The wrapped module is
/// unchanged; the covers are only attached to its design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Covered<M> {
    inner: M,
    covers: Vec<CoverProperty>,
}

impl<M: Elaboratable> Covered<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            covers: Vec::new(),
        }
    }

    pub fn with_cover(mut self, cover: CoverProperty) -> Self {
        self.covers.push(cover);
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn covers(&self) -> &[CoverProperty] {
        &self.covers
    }
}

impl<M: Elaboratable> Elaboratable for Covered<M> {
    fn elaborate(&self, platform: &dyn Platform) -> Result<Design, ElaborationError> {
        self.inner
            .elaborate(platform)?
            .with_covers(self.covers.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VirtualPlatform;

    #[test]
    fn zero_rate_fails_construction() {
        assert_eq!(Blink::new(0), Err(ParamError::ZeroBlinkRate));
    }

    #[test]
    fn rate_above_clock_fails_elaboration() {
        let blink = Blink::new(100).unwrap();
        let err = blink.elaborate(&VirtualPlatform::new(50)).unwrap_err();
        assert_eq!(
            err,
            ElaborationError::Param(ParamError::ZeroDivisor {
                clock_frequency: 50,
                blink_rate: 100
            })
        );
    }

    #[test]
    fn no_platform_uses_default_clock() {
        let blink = Blink::new(2).unwrap();
        let design = blink.elaborate(&()).unwrap();
        assert_eq!(design.clock_frequency(), DEFAULT_CLOCK_FREQUENCY);
        assert_eq!(design.reset_values()[divider::TIMER], 23_999_999);
    }

    #[test]
    fn power_on_reset_scales_with_clock() {
        assert_eq!(power_on_reset_cycles(48_000_000), 720);
        assert_eq!(power_on_reset_cycles(12_000_000), 180);
        assert_eq!(power_on_reset_cycles(3), 1);
    }

    #[test]
    fn covers_must_reference_known_signals() {
        let covered = Covered::new(Blink::new(2).unwrap())
            .with_cover(CoverProperty::none_to_red("active_led"));
        assert_eq!(
            covered.elaborate(&()).unwrap_err(),
            ElaborationError::UnknownSignal("active_led".to_string())
        );
    }
}
