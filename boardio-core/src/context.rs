//! HAL context
//!
//! [`Hal`] ties a board configuration to a driver bundle and owns the
//! registry, clock, timer service and platform utilities. Controllers are
//! opened against a `Hal`; clones share the same state.

use std::fmt;
use std::sync::Arc;

use boardio_hal::{DeviceClass, Result};
use log::info;

use crate::clock::Clock;
use crate::config::{BoardConfig, ConfigError};
use crate::driver::Board;
use crate::platform::Platform;
use crate::registry::Registry;
use crate::sim::SimBoard;
use crate::timer::TimerService;

struct HalInner {
    config: BoardConfig,
    board: Board,
    registry: Registry,
    clock: Arc<Clock>,
    timers: Arc<TimerService>,
    platform: Platform,
}

impl Drop for HalInner {
    fn drop(&mut self) {
        self.timers.shutdown();
    }
}

/// Runtime context for one board
#[derive(Clone)]
pub struct Hal {
    inner: Arc<HalInner>,
}

impl fmt::Debug for Hal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hal")
            .field("board", &self.inner.config.name)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Hal {
    /// Build a context over `board`
    pub fn new(config: BoardConfig, board: Board) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        let registry = Registry::new(config.devices.as_array())
            .map_err(|_| ConfigError::Invalid("devices"))?;
        let clock = Arc::new(Clock::new(config.platform.clock));
        let timers = Arc::new(TimerService::new(Arc::clone(&clock)));
        let platform = Platform::new(
            Arc::clone(&clock),
            Arc::clone(&timers),
            config.platform.cycles_per_second,
            config.platform.rng_seed,
        );
        info!(
            "board {} ready ({:?} clock)",
            config.name, config.platform.clock
        );
        Ok(Self {
            inner: Arc::new(HalInner {
                config,
                board,
                registry,
                clock,
                timers,
                platform,
            }),
        })
    }

    /// Build a context over a freshly created simulated board
    pub fn simulated(config: BoardConfig) -> core::result::Result<(Self, SimBoard), ConfigError> {
        let sim = SimBoard::new(&config);
        let hal = Self::new(config, sim.board())?;
        Ok((hal, sim))
    }

    pub fn config(&self) -> &BoardConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn platform(&self) -> &Platform {
        &self.inner.platform
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.inner.clock
    }

    /// Number of devices of `class` on this board
    pub fn device_count(&self, class: DeviceClass) -> usize {
        self.inner.registry.capacity(class)
    }

    /// Advance a manual clock and fire due timers
    pub fn advance_ms(&self, ms: u64) -> Result<()> {
        self.inner.platform.advance_ms(ms)
    }

    pub(crate) fn board(&self) -> &Board {
        &self.inner.board
    }

    pub(crate) fn timers(&self) -> &Arc<TimerService> {
        &self.inner.timers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockKind;
    use boardio_hal::Error;

    #[test]
    fn test_device_counts_follow_config() {
        let (hal, _sim) = Hal::simulated(BoardConfig::simulated()).unwrap();
        assert_eq!(hal.device_count(DeviceClass::Gpio), 46);
        assert_eq!(hal.device_count(DeviceClass::I2s), 1);
    }

    #[test]
    fn test_advance_requires_manual_clock() {
        let (hal, _sim) = Hal::simulated(BoardConfig::default()).unwrap();
        assert_eq!(hal.clock().kind(), ClockKind::Monotonic);
        assert_eq!(hal.advance_ms(1), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BoardConfig::simulated();
        config.devices.uart = 100;
        assert!(Hal::simulated(config).is_err());
    }
}
