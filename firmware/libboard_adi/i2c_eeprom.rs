use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, Operation};

use board_noos::clock::poll;
use board_noos::config::Storage;

use crate::{Error, Result};

/// 24xx parts finish a page write within 5 ms.
const WRITE_CYCLE_POLLS: u32 = 50;
const WRITE_CYCLE_STEP_US: u32 = 100;

const EUI48_OFFSET: u8 = 0xfa;

/// 24xx-series EEPROM with single-byte word addresses, such as the
/// [24AA02E48](http://ww1.microchip.com/downloads/en/DeviceDoc/24AA02E48-24AA025E48-24AA02E64-24AA025E64-Data-Sheet-20002124H.pdf).
pub struct Eeprom<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    size: usize,
    page_size: usize,
}

impl<I: I2c, D: DelayNs> Eeprom<I, D> {
    /// `address` is the 7-bit bus address.
    pub fn new(i2c: I, delay: D, address: u8, size: usize, page_size: usize) -> Eeprom<I, D> {
        Eeprom {
            i2c: i2c,
            delay: delay,
            address: address,
            size: size.min(256),
            page_size: page_size.max(1),
        }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), I::Error> {
        if offset + len > self.size {
            return Err(Error::InvalidArgument("EEPROM address out of range"))
        }
        Ok(())
    }

    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), I::Error> {
        self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(())
        }
        self.i2c.write_read(self.address, &[offset as u8], buf).map_err(Error::Bus)
    }

    /// The part does not acknowledge its address until the write cycle is over.
    fn wait_write_cycle(&mut self) -> Result<(), I::Error> {
        let (i2c, address) = (&mut self.i2c, self.address);
        let ready = poll(&mut self.delay, WRITE_CYCLE_POLLS, WRITE_CYCLE_STEP_US, || {
            match i2c.write(address, &[]) {
                Ok(()) => Ok(true),
                Err(err) => match err.kind() {
                    ErrorKind::NoAcknowledge(_) => Ok(false),
                    _ => Err(err),
                },
            }
        }).map_err(Error::Bus)?;
        if !ready {
            error!("EEPROM 0x{:02x}: write cycle did not complete", address);
            return Err(Error::Timeout("EEPROM write cycle"))
        }
        Ok(())
    }

    /// Writes `data` one page at a time, waiting out each write cycle.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), I::Error> {
        self.check_range(offset, data.len())?;
        let mut offset = offset;
        let mut data = data;
        while !data.is_empty() {
            let len = (self.page_size - offset % self.page_size).min(data.len());
            let (chunk, rest) = data.split_at(len);
            self.i2c.transaction(self.address,
                                 &mut [Operation::Write(&[offset as u8]), Operation::Write(chunk)])
                .map_err(Error::Bus)?;
            self.wait_write_cycle()?;
            offset += len;
            data = rest;
        }
        Ok(())
    }

    /// > The 24AA02XEXX is programmed at the factory with a
    /// > globally unique node address stored in the upper half
    /// > of the array and permanently write-protected.
    pub fn read_eui48(&mut self) -> Result<[u8; 6], I::Error> {
        let mut buffer = [0u8; 6];
        self.read(EUI48_OFFSET as usize, &mut buffer)?;
        Ok(buffer)
    }
}

impl<I: I2c, D: DelayNs> Storage for Eeprom<I, D> {
    type Error = Error<I::Error>;

    fn capacity(&self) -> usize {
        self.size
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), I::Error> {
        Eeprom::read(self, offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), I::Error> {
        Eeprom::write(self, offset, data)
    }

    fn erase(&mut self) -> Result<(), I::Error> {
        let blank = [0xff; 16];
        let mut offset = 0;
        while offset < self.size {
            let len = blank.len().min(self.size - offset);
            Eeprom::write(self, offset, &blank[..len])?;
            offset += len;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_noos::config::Config;
    use board_noos::mock::{MockI2c, NoDelay};

    fn eeprom(write_cycle: u32) -> Eeprom<MockI2c, NoDelay> {
        Eeprom::new(MockI2c::new(0x50, 256, 8).with_write_cycle(write_cycle), NoDelay::new(),
                    0x50, 256, 8)
    }

    #[test]
    fn paged_write() {
        let mut rom = eeprom(3);
        rom.write(5, b"0123456789").unwrap();
        let mut buf = [0; 10];
        rom.read(5, &mut buf).unwrap();
        assert_eq!(&buf, b"0123456789");

        let (i2c, delay) = rom.release();
        assert_eq!(&i2c.memory()[5..15], b"0123456789");
        // two pages, three refused polls each
        assert_eq!(i2c.nacks(), 6);
        assert_eq!(delay.elapsed_ns(), 6 * WRITE_CYCLE_STEP_US as u64 * 1000);
    }

    #[test]
    fn stuck_write_cycle() {
        let mut rom = eeprom(1000);
        assert_eq!(rom.write(0, &[1]), Err(Error::Timeout("EEPROM write cycle")));
    }

    #[test]
    fn wrong_address() {
        let mut rom = Eeprom::new(MockI2c::new(0x50, 256, 8), NoDelay::new(), 0x51, 256, 8);
        let mut buf = [0; 1];
        assert!(matches!(rom.read(0, &mut buf), Err(Error::Bus(ErrorKind::NoAcknowledge(_)))));
    }

    #[test]
    fn out_of_range() {
        let mut rom = eeprom(0);
        let mut buf = [0; 8];
        assert_eq!(rom.read(250, &mut buf), Err(Error::InvalidArgument("EEPROM address out of range")));
    }

    #[test]
    fn eui48() {
        let mut i2c = MockI2c::new(0x50, 256, 8);
        i2c.memory_mut()[0xfa..].copy_from_slice(&[0x00, 0x04, 0xa3, 0x12, 0x34, 0x56]);
        let mut rom = Eeprom::new(i2c, NoDelay::new(), 0x50, 256, 8);
        assert_eq!(rom.read_eui48(), Ok([0x00, 0x04, 0xa3, 0x12, 0x34, 0x56]));
    }

    #[test]
    fn config_store() {
        let mut config: Config<_, 128> = Config::load(eeprom(2)).unwrap();
        config.write_int("lane_rate_khz", 10_000_000).unwrap();
        config.write("board", b"fmc").unwrap();
        assert_eq!(config.read_int("lane_rate_khz"), Ok(Some(10_000_000)));

        let config: Config<_, 128> = Config::load(config.release()).unwrap();
        assert_eq!(config.read_str("board"), Ok("fmc"));
    }
}
