//! Host-side test doubles for the bus, MMIO, delay and storage traits.

use core::convert::Infallible;
use std::boxed::Box;
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;
use std::vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource};
use embedded_hal::spi;

use crate::config::Storage;
use crate::mmio::Mmio;
use crate::regmap::RegisterBus;

type RegHook = Box<dyn FnMut(&mut BTreeMap<u16, u8>, u16, u8)>;

/// Byte register file. Unset registers read as 0. Registers registered as
/// FIFOs pop queued bytes instead of auto-incrementing.
#[derive(Default)]
pub struct MockRegisters {
    regs: BTreeMap<u16, u8>,
    writes: Vec<(u16, u8)>,
    fifos: BTreeMap<u16, VecDeque<u8>>,
    on_write: Option<RegHook>,
}

impl MockRegisters {
    pub fn new() -> MockRegisters {
        MockRegisters::default()
    }

    pub fn set(&mut self, reg: u16, val: u8) {
        self.regs.insert(reg, val);
    }

    pub fn get(&self, reg: u16) -> u8 {
        self.regs.get(&reg).cloned().unwrap_or(0)
    }

    /// Every byte written, in order.
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear()
    }

    pub fn written(&self, reg: u16) -> Vec<u8> {
        self.writes.iter().filter(|w| w.0 == reg).map(|w| w.1).collect()
    }

    pub fn push_fifo(&mut self, reg: u16, data: &[u8]) {
        self.fifos.entry(reg).or_default().extend(data.iter().cloned());
    }

    /// Called after every byte write, with the register file.
    pub fn on_write<F: FnMut(&mut BTreeMap<u16, u8>, u16, u8) + 'static>(&mut self, f: F) {
        self.on_write = Some(Box::new(f));
    }
}

impl RegisterBus for MockRegisters {
    type Error = Infallible;

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Infallible> {
        if let Some(fifo) = self.fifos.get_mut(&reg) {
            for byte in buf.iter_mut() {
                *byte = fifo.pop_front().unwrap_or(0);
            }
            return Ok(())
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.get(reg + i as u16);
        }
        Ok(())
    }

    fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Infallible> {
        for (i, &byte) in data.iter().enumerate() {
            let reg = reg + i as u16;
            self.regs.insert(reg, byte);
            self.writes.push((reg, byte));
            if let Some(ref mut hook) = self.on_write {
                hook(&mut self.regs, reg, byte);
            }
        }
        Ok(())
    }
}

type MmioHook = Box<dyn FnMut(&mut BTreeMap<u32, u32>, u32, u32)>;

#[derive(Default)]
pub struct MockMmio {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    on_write: Option<MmioHook>,
}

impl MockMmio {
    pub fn new() -> MockMmio {
        MockMmio::default()
    }

    pub fn set(&mut self, offset: u32, val: u32) {
        self.regs.insert(offset, val);
    }

    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    pub fn written(&self, offset: u32) -> Vec<u32> {
        self.writes.iter().filter(|w| w.0 == offset).map(|w| w.1).collect()
    }

    pub fn on_write<F: FnMut(&mut BTreeMap<u32, u32>, u32, u32) + 'static>(&mut self, f: F) {
        self.on_write = Some(Box::new(f));
    }
}

impl Mmio for MockMmio {
    fn read(&self, offset: u32) -> u32 {
        self.regs.get(&offset).cloned().unwrap_or(0)
    }

    fn write(&mut self, offset: u32, val: u32) {
        self.regs.insert(offset, val);
        self.writes.push((offset, val));
        if let Some(ref mut hook) = self.on_write {
            hook(&mut self.regs, offset, val);
        }
    }
}

/// Records the bytes written in each transaction. Reads return queued
/// response bytes, then zeros.
#[derive(Default)]
pub struct MockSpi {
    sent: Vec<Vec<u8>>,
    responses: VecDeque<u8>,
}

impl MockSpi {
    pub fn new() -> MockSpi {
        MockSpi::default()
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn queue_response(&mut self, data: &[u8]) {
        self.responses.extend(data.iter().cloned())
    }
}

impl spi::ErrorType for MockSpi {
    type Error = Infallible;
}

impl spi::SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut frame = vec![];
        for op in operations.iter_mut() {
            match op {
                spi::Operation::Write(data) => frame.extend_from_slice(data),
                spi::Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.responses.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::Transfer(read, write) => {
                    frame.extend_from_slice(write);
                    for byte in read.iter_mut() {
                        *byte = self.responses.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::TransferInPlace(buf) => {
                    frame.extend_from_slice(buf);
                    for byte in buf.iter_mut() {
                        *byte = self.responses.pop_front().unwrap_or(0);
                    }
                }
                spi::Operation::DelayNs(_) => ()
            }
        }
        self.sent.push(frame);
        Ok(())
    }
}

/// 24xx-style I2C EEPROM: one address byte, page-wrapped writes, sequential
/// reads, and no acknowledge for `write_cycle` transactions after a write.
pub struct MockI2c {
    address: u8,
    memory: Vec<u8>,
    page_size: usize,
    pointer: usize,
    write_cycle: u32,
    busy: u32,
    nacks: u32,
}

impl MockI2c {
    pub fn new(address: u8, size: usize, page_size: usize) -> MockI2c {
        MockI2c {
            address: address,
            memory: vec![0xff; size],
            page_size: page_size,
            pointer: 0,
            write_cycle: 0,
            busy: 0,
            nacks: 0,
        }
    }

    pub fn with_write_cycle(mut self, polls: u32) -> MockI2c {
        self.write_cycle = polls;
        self
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Transactions refused while a write cycle was in progress.
    pub fn nacks(&self) -> u32 {
        self.nacks
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl i2c::I2c for MockI2c {
    fn transaction(&mut self, address: u8, operations: &mut [i2c::Operation<'_>])
                  -> Result<(), ErrorKind> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        }
        if self.busy > 0 {
            self.busy -= 1;
            self.nacks += 1;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        }

        let size = self.memory.len();
        let mut addressed = false;
        let mut wrote = false;
        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(data) => {
                    for &byte in data.iter() {
                        if !addressed {
                            self.pointer = byte as usize % size;
                            addressed = true;
                            continue
                        }
                        let page = self.pointer - self.pointer % self.page_size;
                        self.memory[self.pointer] = byte;
                        self.pointer = page + (self.pointer + 1 - page) % self.page_size;
                        wrote = true;
                    }
                }
                i2c::Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.memory[self.pointer];
                        self.pointer = (self.pointer + 1) % size;
                    }
                }
            }
        }
        if wrote {
            self.busy = self.write_cycle;
        }
        Ok(())
    }
}

/// Delay that returns immediately and accumulates the requested time.
#[derive(Default)]
pub struct NoDelay {
    elapsed_ns: u64,
}

impl NoDelay {
    pub fn new() -> NoDelay {
        NoDelay::default()
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

pub struct MemStorage {
    data: Vec<u8>,
}

impl MemStorage {
    pub fn new(size: usize) -> MemStorage {
        MemStorage { data: vec![0xff; size] }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Storage for MemStorage {
    type Error = Infallible;

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Infallible> {
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Infallible> {
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), Infallible> {
        for byte in self.data.iter_mut() {
            *byte = 0xff;
        }
        Ok(())
    }
}
