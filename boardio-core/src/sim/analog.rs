use boardio_hal::adc::AdcInfo;
use boardio_hal::pwm::{PwmInfo, PwmOutput};
use boardio_hal::{DeviceId, Result};
use log::trace;

use super::Channels;
use crate::driver::{AdcDriver, PwmDriver};

/// Simulated ADC channels; samples are set from the test side
pub struct SimAdc {
    info: AdcInfo,
    samples: Channels<u16>,
}

impl SimAdc {
    pub fn new(count: usize, info: AdcInfo) -> Self {
        Self {
            info,
            samples: Channels::new(count),
        }
    }

    /// Value returned by subsequent conversions on `channel`
    pub fn set_sample(&self, channel: DeviceId, raw: u16) -> Result<()> {
        self.samples.with(channel, |s| *s = raw)
    }
}

impl AdcDriver for SimAdc {
    fn info(&self, channel: DeviceId) -> Result<AdcInfo> {
        self.samples.with(channel, |_| self.info)
    }

    fn sample(&self, channel: DeviceId) -> Result<u16> {
        self.samples.with(channel, |s| *s)
    }
}

/// Simulated PWM outputs; records what each pin is doing
pub struct SimPwm {
    info: PwmInfo,
    outputs: Channels<Option<PwmOutput>>,
}

impl SimPwm {
    pub fn new(count: usize, info: PwmInfo) -> Self {
        Self {
            info,
            outputs: Channels::new(count),
        }
    }

    /// Last output applied to `channel`, `None` if never touched
    pub fn output(&self, channel: DeviceId) -> Result<Option<PwmOutput>> {
        self.outputs.with(channel, |o| *o)
    }
}

impl PwmDriver for SimPwm {
    fn info(&self, channel: DeviceId) -> Result<PwmInfo> {
        self.outputs.with(channel, |_| self.info)
    }

    fn apply(&self, channel: DeviceId, output: PwmOutput) -> Result<()> {
        trace!("pwm{}: {:?}", channel, output);
        self.outputs.with(channel, |o| *o = Some(output))
    }
}
