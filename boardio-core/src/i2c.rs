//! I2C controller
//!
//! Master-mode transfers to 7-bit addresses. `write_read` keeps the bus
//! for both phases. Empty buffers complete without touching the bus.

use std::sync::Arc;

use boardio_hal::i2c::check_address;
use boardio_hal::{DeviceClass, DeviceId, Error, I2cBus, I2cSpeed, Result};
use embedded_hal::i2c::Operation;
use log::debug;

use crate::context::Hal;
use crate::driver::I2cDriver;
use crate::registry::{HandleId, Lease};

/// Handle to one I2C bus
pub struct I2c {
    lease: Lease,
    driver: Arc<dyn I2cDriver>,
    speed: I2cSpeed,
}

impl I2c {
    /// Open bus `id` at standard speed
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::I2c, id)?;
        let driver = Arc::clone(&hal.board().i2c);
        driver.configure(id, I2cSpeed::Standard)?;
        Ok(Self {
            lease,
            driver,
            speed: I2cSpeed::Standard,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    pub fn speed(&self) -> I2cSpeed {
        self.speed
    }

    pub fn config(&mut self, speed: I2cSpeed) -> Result<()> {
        self.lease.check()?;
        speed.validate()?;
        self.driver.configure(self.id(), speed)?;
        self.speed = speed;
        debug!("i2c{} speed {} Hz", self.id(), speed.hz());
        Ok(())
    }

    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        self.lease.check()?;
        check_address(address)?;
        if data.is_empty() {
            return Ok(());
        }
        self.driver.write(self.id(), address, data)
    }

    pub fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        self.lease.check()?;
        check_address(address)?;
        if buf.is_empty() {
            return Ok(());
        }
        self.driver.read(self.id(), address, buf)
    }

    /// Write then read in one transaction
    pub fn write_read(&mut self, address: u8, data: &[u8], buf: &mut [u8]) -> Result<()> {
        self.lease.check()?;
        check_address(address)?;
        match (data.is_empty(), buf.is_empty()) {
            (true, true) => Ok(()),
            (false, true) => self.driver.write(self.id(), address, data),
            (true, false) => self.driver.read(self.id(), address, buf),
            (false, false) => self.driver.write_read(self.id(), address, data, buf),
        }
    }

    /// Run `operations` as one transaction with a single stop
    ///
    /// Adjacent writes are sent as one segment, as are adjacent reads.
    /// Empty operations are skipped.
    pub fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<()> {
        self.lease.check()?;
        check_address(address)?;

        let mut segments: Vec<Segment> = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Write(data) if data.is_empty() => {}
                Operation::Read(buf) if buf.is_empty() => {}
                Operation::Write(data) => match segments.last_mut() {
                    Some(Segment::Write(out)) => out.extend_from_slice(data),
                    _ => segments.push(Segment::Write(data.to_vec())),
                },
                Operation::Read(buf) => match segments.last_mut() {
                    Some(Segment::Read(into)) => into.resize(into.len() + buf.len(), 0),
                    _ => segments.push(Segment::Read(vec![0; buf.len()])),
                },
            }
        }
        if segments.is_empty() {
            return Ok(());
        }

        let mut merged: Vec<Operation<'_>> = segments
            .iter_mut()
            .map(|segment| match segment {
                Segment::Write(data) => Operation::Write(data.as_slice()),
                Segment::Read(buf) => Operation::Read(buf.as_mut_slice()),
            })
            .collect();
        self.driver.transaction(self.id(), address, &mut merged)?;
        drop(merged);

        let mut received = segments.iter().flat_map(|segment| match segment {
            Segment::Read(buf) => buf.as_slice(),
            Segment::Write(_) => &[][..],
        });
        for op in operations.iter_mut() {
            if let Operation::Read(buf) = op {
                for (dst, src) in buf.iter_mut().zip(&mut received) {
                    *dst = *src;
                }
            }
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.lease.close()
    }
}

impl I2cBus for I2c {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        I2c::write(self, address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        I2c::read(self, address, buf)
    }

    fn write_read(&mut self, address: u8, data: &[u8], buf: &mut [u8]) -> Result<()> {
        I2c::write_read(self, address, data, buf)
    }
}

impl embedded_hal::i2c::ErrorType for I2c {
    type Error = Error;
}

impl embedded_hal::i2c::I2c for I2c {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<()> {
        I2c::transaction(self, address, operations)
    }
}

/// Adjacent operations of one kind, merged into a single bus segment
enum Segment {
    Write(Vec<u8>),
    Read(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RegisterFile;
    use crate::test_support::sim_hal;

    #[test]
    fn test_register_roundtrip() {
        let (hal, sim) = sim_hal();
        let regs = RegisterFile::new();
        sim.i2c.attach(0, 0x48, regs.clone()).unwrap();
        let mut bus = I2c::open(&hal, 0).unwrap();
        bus.write(0x48, &[0x01, 0x60, 0xA0]).unwrap();
        let mut out = [0u8; 2];
        bus.write_read(0x48, &[0x01], &mut out).unwrap();
        assert_eq!(out, [0x60, 0xA0]);
        assert_eq!(regs.peek(0x02), 0xA0);
    }

    #[test]
    fn test_nack_is_io() {
        let (hal, _sim) = sim_hal();
        let mut bus = I2c::open(&hal, 1).unwrap();
        assert_eq!(bus.write(0x20, &[0]), Err(Error::Io));
    }

    #[test]
    fn test_address_and_speed_validation() {
        let (hal, sim) = sim_hal();
        let mut bus = I2c::open(&hal, 0).unwrap();
        assert_eq!(bus.write(0x80, &[0]), Err(Error::InvalidArgument));
        assert_eq!(bus.config(I2cSpeed::Custom(0)), Err(Error::InvalidArgument));
        bus.config(I2cSpeed::Fast).unwrap();
        assert_eq!(sim.i2c.speed(0), Ok(Some(I2cSpeed::Fast)));
    }

    #[test]
    fn test_empty_transfer_is_noop() {
        let (hal, _sim) = sim_hal();
        let mut bus = I2c::open(&hal, 0).unwrap();
        // No target attached: an actual bus access would NACK
        assert_eq!(bus.write(0x10, &[]), Ok(()));
        assert_eq!(bus.write_read(0x10, &[], &mut []), Ok(()));
    }

    #[test]
    fn test_embedded_hal_transaction() {
        let (hal, sim) = sim_hal();
        let regs = RegisterFile::new();
        regs.poke(0x0F, 0x33);
        sim.i2c.attach(0, 0x68, regs).unwrap();
        let mut bus = I2c::open(&hal, 0).unwrap();
        let mut who = [0u8; 1];
        bus.write_read(0x68, &[0x0F], &mut who).unwrap();
        assert_eq!(who, [0x33]);
        let mut again = [0u8; 1];
        embedded_hal::i2c::I2c::transaction(
            &mut bus,
            0x68,
            &mut [Operation::Write(&[0x0F]), Operation::Read(&mut again)],
        )
        .unwrap();
        assert_eq!(again, [0x33]);
    }

    #[test]
    fn test_adjacent_writes_form_one_segment() {
        let (hal, sim) = sim_hal();
        let regs = RegisterFile::new();
        sim.i2c.attach(0, 0x50, regs.clone()).unwrap();
        let mut bus = I2c::open(&hal, 0).unwrap();
        embedded_hal::i2c::I2c::transaction(
            &mut bus,
            0x50,
            &mut [Operation::Write(&[0x10]), Operation::Write(&[0xAA, 0xBB])],
        )
        .unwrap();
        assert_eq!(regs.peek(0x10), 0xAA);
        assert_eq!(regs.peek(0x11), 0xBB);
        assert_eq!(regs.peek(0xAA), 0x00);
    }

    #[test]
    fn test_adjacent_reads_continue_from_pointer() {
        let (hal, sim) = sim_hal();
        let regs = RegisterFile::new();
        for (i, value) in [0x11, 0x22, 0x33].into_iter().enumerate() {
            regs.poke(0x20 + i as u8, value);
        }
        sim.i2c.attach(1, 0x50, regs).unwrap();
        let mut bus = I2c::open(&hal, 1).unwrap();
        let mut first = [0u8; 1];
        let mut rest = [0u8; 2];
        embedded_hal::i2c::I2c::transaction(
            &mut bus,
            0x50,
            &mut [
                Operation::Write(&[0x20]),
                Operation::Read(&mut first),
                Operation::Read(&mut rest),
            ],
        )
        .unwrap();
        assert_eq!(first, [0x11]);
        assert_eq!(rest, [0x22, 0x33]);
    }

    #[test]
    fn test_empty_transaction_skips_bus() {
        let (hal, _sim) = sim_hal();
        let mut bus = I2c::open(&hal, 0).unwrap();
        assert_eq!(bus.transaction(0x10, &mut [Operation::Write(&[])]), Ok(()));
        assert_eq!(bus.transaction(0x10, &mut [Operation::Write(&[1])]), Err(Error::Io));
    }

    #[test]
    fn test_close_releases() {
        let (hal, _sim) = sim_hal();
        let bus = I2c::open(&hal, 0).unwrap();
        assert_eq!(I2c::open(&hal, 0).err(), Some(Error::Busy));
        bus.close().unwrap();
        assert!(I2c::open(&hal, 0).is_ok());
    }
}
