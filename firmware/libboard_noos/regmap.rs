//! Byte-wide register access over SPI and I2C.

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{Operation, SpiDevice};

/// A register file addressed by 16-bit register numbers. Multi-byte accesses
/// use the device's address auto-increment.
pub trait RegisterBus {
    type Error;

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Self::Error>;

    fn read_u8(&mut self, reg: u16) -> Result<u8, Self::Error> {
        let mut buf = [0; 1];
        self.read(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn write_u8(&mut self, reg: u16, val: u8) -> Result<(), Self::Error> {
        self.write(reg, &[val])
    }

    /// Read-modify-write of the bits in `mask`. Nothing is written when the
    /// register already holds the value.
    fn update_bits(&mut self, reg: u16, mask: u8, val: u8) -> Result<(), Self::Error> {
        let orig = self.read_u8(reg)?;
        let new = (orig & !mask) | (val & mask);
        if new != orig {
            self.write_u8(reg, new)?;
        }
        Ok(())
    }

    /// Reads `len` (1 to 4) consecutive registers as a big-endian word.
    fn read_be(&mut self, reg: u16, len: usize) -> Result<u32, Self::Error> {
        let mut buf = [0; 4];
        let len = len.clamp(1, 4);
        self.read(reg, &mut buf[..len])?;
        Ok(BigEndian::read_uint(&buf[..len], len) as u32)
    }

    fn write_be(&mut self, reg: u16, val: u32, len: usize) -> Result<(), Self::Error> {
        let mut buf = [0; 4];
        let len = len.clamp(1, 4);
        BigEndian::write_uint(&mut buf[..len], val as u64 & (!0u64 >> (64 - 8 * len)), len);
        self.write(reg, &buf[..len])
    }
}

impl<'a, T: RegisterBus + ?Sized> RegisterBus for &'a mut T {
    type Error = T::Error;

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), T::Error> {
        (**self).read(reg, buf)
    }

    fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), T::Error> {
        (**self).write(reg, data)
    }
}

pub fn field_prep(mask: u32, val: u32) -> u32 {
    if mask == 0 {
        return 0
    }
    (val << mask.trailing_zeros()) & mask
}

pub fn field_get(mask: u32, reg: u32) -> u32 {
    if mask == 0 {
        return 0
    }
    (reg & mask) >> mask.trailing_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 16-bit command word, bit 15 set for reads. LSB-first devices get each
    /// byte bit-reversed and the command bytes swapped.
    Wide { lsb_first: bool },
    /// One command byte, `reg << 1 | read`.
    Shifted,
}

const LSB_FIRST_CHUNK: usize = 16;

pub struct SpiRegisters<D> {
    spi: D,
    framing: Framing,
}

impl<D: SpiDevice> SpiRegisters<D> {
    pub fn new(spi: D, framing: Framing) -> SpiRegisters<D> {
        SpiRegisters { spi: spi, framing: framing }
    }

    pub fn release(self) -> D {
        self.spi
    }

    fn command(&self, reg: u16, read: bool) -> ([u8; 2], usize) {
        match self.framing {
            Framing::Wide { lsb_first } => {
                let cmd = (if read { 0x8000 } else { 0x0000 }) | (reg & 0x7fff);
                if lsb_first {
                    ([(cmd as u8).reverse_bits(), ((cmd >> 8) as u8).reverse_bits()], 2)
                } else {
                    ([(cmd >> 8) as u8, cmd as u8], 2)
                }
            }
            Framing::Shifted => ([((reg as u8) << 1) | read as u8, 0], 1)
        }
    }

    fn lsb_first(&self) -> bool {
        self.framing == Framing::Wide { lsb_first: true }
    }
}

impl<D: SpiDevice> RegisterBus for SpiRegisters<D> {
    type Error = D::Error;

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), D::Error> {
        let (cmd, len) = self.command(reg, true);
        self.spi.transaction(&mut [Operation::Write(&cmd[..len]), Operation::Read(buf)])?;
        if self.lsb_first() {
            for byte in buf.iter_mut() {
                *byte = byte.reverse_bits();
            }
        }
        Ok(())
    }

    fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), D::Error> {
        if !self.lsb_first() {
            let (cmd, len) = self.command(reg, false);
            return self.spi.transaction(&mut [Operation::Write(&cmd[..len]), Operation::Write(data)])
        }

        for (i, chunk) in data.chunks(LSB_FIRST_CHUNK).enumerate() {
            let (cmd, len) = self.command(reg + (i * LSB_FIRST_CHUNK) as u16, false);
            let mut swapped = [0; LSB_FIRST_CHUNK];
            for (dst, src) in swapped.iter_mut().zip(chunk.iter()) {
                *dst = src.reverse_bits();
            }
            self.spi.transaction(&mut [Operation::Write(&cmd[..len]),
                                       Operation::Write(&swapped[..chunk.len()])])?;
        }
        Ok(())
    }
}

pub struct I2cRegisters<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cRegisters<I> {
    pub fn new(i2c: I, address: u8) -> I2cRegisters<I> {
        I2cRegisters { i2c: i2c, address: address }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cRegisters<I> {
    type Error = I::Error;

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), I::Error> {
        self.i2c.write_read(self.address, &[reg as u8], buf)
    }

    fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), I::Error> {
        self.i2c.transaction(self.address,
                             &mut [i2c::Operation::Write(&[reg as u8]), i2c::Operation::Write(data)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockI2c, MockRegisters, MockSpi};
    use std::vec;

    #[test]
    fn fields() {
        assert_eq!(field_prep(0xf0, 0x5), 0x50);
        assert_eq!(field_prep(0x0e, 0xff), 0x0e);
        assert_eq!(field_get(0x700, 0x5ff), 5);
        assert_eq!(field_get(0, 0xff), 0);
    }

    #[test]
    fn update_bits_skips_redundant_write() {
        let mut regs = MockRegisters::new();
        regs.set(0x20, 0x41);
        regs.update_bits(0x20, 0x3f, 0x01).unwrap();
        assert!(regs.writes().is_empty());
        regs.update_bits(0x20, 0x3f, 0x02).unwrap();
        assert_eq!(regs.writes(), &[(0x20, 0x42)]);
    }

    #[test]
    fn big_endian_words() {
        let mut regs = MockRegisters::new();
        regs.write_be(0x1e, 0x1234, 2).unwrap();
        assert_eq!(regs.get(0x1e), 0x12);
        assert_eq!(regs.get(0x1f), 0x34);
        assert_eq!(regs.read_be(0x1e, 2).unwrap(), 0x1234);
    }

    #[test]
    fn wide_framing() {
        let mut spi = SpiRegisters::new(MockSpi::new(), Framing::Wide { lsb_first: false });
        spi.write_u8(0x0a, 0x5a).unwrap();
        spi.read_u8(0x0a).unwrap();
        let bus = spi.release();
        assert_eq!(bus.sent(), &[vec![0x00, 0x0a, 0x5a], vec![0x80, 0x0a]]);
    }

    #[test]
    fn wide_framing_lsb_first() {
        let mut spi = SpiRegisters::new(MockSpi::new(), Framing::Wide { lsb_first: true });
        spi.write_u8(0x0a, 0x01).unwrap();
        let bus = spi.release();
        assert_eq!(bus.sent(), &[vec![0x50, 0x00, 0x80]]);
    }

    #[test]
    fn shifted_framing() {
        let mut spi = SpiRegisters::new(MockSpi::new(), Framing::Shifted);
        spi.read_u8(0x02).unwrap();
        spi.write_u8(0x2f, 0x52).unwrap();
        let bus = spi.release();
        assert_eq!(bus.sent(), &[vec![0x05], vec![0x5e, 0x52]]);
    }

    #[test]
    fn i2c_registers() {
        let mut eeprom = MockI2c::new(0x50, 256, 8);
        {
            let mut regs = I2cRegisters::new(&mut eeprom, 0x50);
            regs.write(0x10, &[1, 2, 3]).unwrap();
            let mut buf = [0; 3];
            regs.read(0x10, &mut buf).unwrap();
            assert_eq!(buf, [1, 2, 3]);
        }
        assert_eq!(&eeprom.memory()[0x10..0x13], &[1, 2, 3]);
    }
}
