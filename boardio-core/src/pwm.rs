//! PWM controller
//!
//! Settings are period/pulse pairs in nanoseconds. A suspended channel
//! keeps its setting and drives nothing until resumed.

use std::sync::Arc;

use boardio_hal::pwm::{PwmInfo, PwmOutput, PwmSetting};
use boardio_hal::{DeviceClass, DeviceId, Error, Result};
use log::debug;

use crate::context::Hal;
use crate::driver::PwmDriver;
use crate::registry::{HandleId, Lease};

/// Handle to one PWM output
pub struct Pwm {
    lease: Lease,
    driver: Arc<dyn PwmDriver>,
    info: PwmInfo,
    setting: Option<PwmSetting>,
    suspended: bool,
}

impl Pwm {
    /// Open channel `id` with its output off
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::Pwm, id)?;
        let driver = Arc::clone(&hal.board().pwm);
        let info = driver.info(id)?;
        driver.apply(id, PwmOutput::Off)?;
        Ok(Self {
            lease,
            driver,
            info,
            setting: None,
            suspended: false,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    pub fn info(&self) -> PwmInfo {
        self.info
    }

    /// Current setting, if one was ever applied
    pub fn setting(&self) -> Option<PwmSetting> {
        self.setting
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Apply an absolute period and pulse width
    pub fn set(&mut self, period_ns: u32, pulse_ns: u32) -> Result<()> {
        self.lease.check()?;
        let setting = PwmSetting::new(period_ns, pulse_ns)?;
        self.info.check_frequency(setting.frequency())?;
        self.apply(setting)
    }

    /// Apply a frequency in Hz and a duty cycle in `0.0..=1.0`
    pub fn set_frequency(&mut self, hz: u32, duty: f32) -> Result<()> {
        self.lease.check()?;
        self.info.check_frequency(hz)?;
        self.apply(PwmSetting::from_frequency(hz, duty)?)
    }

    /// Keep the period, change the duty cycle
    pub fn set_duty_cycle(&mut self, duty: f32) -> Result<()> {
        self.lease.check()?;
        let current = self.setting.ok_or(Error::InvalidState)?;
        self.apply(current.with_duty(duty)?)
    }

    /// Stop driving the output; the setting is kept
    pub fn suspend(&mut self) -> Result<()> {
        self.lease.check()?;
        if !self.suspended {
            self.driver.apply(self.id(), PwmOutput::Off)?;
            self.suspended = true;
        }
        Ok(())
    }

    /// Drive the output with the kept setting again
    pub fn resume(&mut self) -> Result<()> {
        self.lease.check()?;
        if self.suspended {
            if let Some(setting) = self.setting {
                self.driver.apply(self.id(), setting.output())?;
            }
            self.suspended = false;
        }
        Ok(())
    }

    fn apply(&mut self, setting: PwmSetting) -> Result<()> {
        if !self.suspended {
            self.driver.apply(self.id(), setting.output())?;
        }
        self.setting = Some(setting);
        debug!(
            "pwm{}: period {} ns pulse {} ns",
            self.id(),
            setting.period_ns(),
            setting.pulse_ns()
        );
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        if self.lease.check().is_ok() {
            // Best effort; the channel is released either way
            let _ = self.driver.apply(self.id(), PwmOutput::Off);
        }
    }
}

impl Drop for Pwm {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl embedded_hal::pwm::ErrorType for Pwm {
    type Error = Error;
}

impl embedded_hal::pwm::SetDutyCycle for Pwm {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<()> {
        Pwm::set_duty_cycle(self, duty as f32 / u16::MAX as f32)
    }
}
