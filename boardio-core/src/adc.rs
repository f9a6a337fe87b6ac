//! ADC controller

use std::sync::Arc;

use boardio_hal::adc::AdcInfo;
use boardio_hal::{DeviceClass, DeviceId, Error, Result};
use log::warn;

use crate::context::Hal;
use crate::driver::AdcDriver;
use crate::registry::{HandleId, Lease};

/// Handle to one analog input channel
pub struct Adc {
    lease: Lease,
    driver: Arc<dyn AdcDriver>,
    info: AdcInfo,
}

impl Adc {
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::Adc, id)?;
        let driver = Arc::clone(&hal.board().adc);
        let info = driver.info(id)?;
        info.validate().map_err(|_| Error::Io)?;
        Ok(Self {
            lease,
            driver,
            info,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    /// Resolution and reference voltage
    pub fn info(&self) -> AdcInfo {
        self.info
    }

    /// One raw sample in `0..=info().max_raw()`
    pub fn read(&mut self) -> Result<u16> {
        self.lease.check()?;
        let raw = self.driver.sample(self.id())?;
        if raw > self.info.max_raw() {
            warn!("adc{} sample {} out of range", self.id(), raw);
            return Err(Error::Io);
        }
        Ok(raw)
    }

    /// One sample converted to volts
    pub fn read_voltage(&mut self) -> Result<f32> {
        let raw = self.read()?;
        Ok(self.info.to_voltage(raw))
    }

    pub fn close(mut self) -> Result<()> {
        self.lease.close()
    }
}
