//! AXI clock generator core (MMCM behind a DRP bridge).

use embedded_hal::delay::DelayNs;

use board_noos::clock::poll;
use board_noos::mmio::Mmio;
use pll::axi_clkgen::{self as search, DividerParams, MmcmParams};

use crate::{Error, Result};

const REG_VERSION: u32 = 0x00;
const REG_RESET: u32 = 0x40;
const RESET_ENABLE: u32 = 1 << 0;
const RESET_MMCM_ENABLE: u32 = 1 << 1;
const REG_CLKSEL: u32 = 0x44;
const REG_STATUS: u32 = 0x5c;
const STATUS_LOCKED: u32 = 1 << 0;
const REG_DRP_CNTRL: u32 = 0x70;
const DRP_CNTRL_SEL: u32 = 1 << 29;
const DRP_CNTRL_READ: u32 = 1 << 28;
const REG_DRP_STATUS: u32 = 0x74;
const DRP_STATUS_BUSY: u32 = 1 << 16;

const MMCM_REG_CLKOUT0_1: u32 = 0x08;
const MMCM_REG_CLKOUT0_2: u32 = 0x09;
const MMCM_REG_CLK_FB1: u32 = 0x14;
const MMCM_REG_CLK_FB2: u32 = 0x15;
const MMCM_REG_CLK_DIV: u32 = 0x16;
const MMCM_REG_LOCK1: u32 = 0x18;
const MMCM_REG_LOCK2: u32 = 0x19;
const MMCM_REG_LOCK3: u32 = 0x1a;
const MMCM_REG_FILTER1: u32 = 0x4e;
const MMCM_REG_FILTER2: u32 = 0x4f;

const DRP_POLL_ITERATIONS: u32 = 10_000;
const LOCK_POLL_ITERATIONS: u32 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct InitParams {
    pub name: &'static str,
    pub parent_rate: u64,
    /// Initial output rate in Hz, 0 to leave the MMCM untouched.
    pub rate: u64,
}

pub struct AxiClkgen<M, D> {
    mmio: M,
    delay: D,
    name: &'static str,
}

impl<M: Mmio, D: DelayNs> AxiClkgen<M, D> {
    pub fn new(mmio: M, delay: D, name: &'static str) -> AxiClkgen<M, D> {
        AxiClkgen { mmio: mmio, delay: delay, name: name }
    }

    pub fn init(mmio: M, delay: D, params: &InitParams) -> Result<AxiClkgen<M, D>> {
        let mut clkgen = AxiClkgen::new(mmio, delay, params.name);
        let version = clkgen.version();
        info!("{}: core version {}.{:02}.{}", params.name,
              version >> 16, (version >> 8) & 0xff, (version & 0xff) as u8 as char);
        if params.rate != 0 {
            clkgen.set_rate(params.rate, params.parent_rate)?;
        }
        Ok(clkgen)
    }

    pub fn release(self) -> (M, D) {
        (self.mmio, self.delay)
    }

    pub fn version(&self) -> u32 {
        self.mmio.read(REG_VERSION)
    }

    fn mmcm_enable(&mut self, enable: bool) {
        let val = RESET_ENABLE | if enable { RESET_MMCM_ENABLE } else { 0 };
        self.mmio.write(REG_RESET, val)
    }

    pub fn enable(&mut self) {
        self.mmcm_enable(true)
    }

    pub fn disable(&mut self) {
        self.mmcm_enable(false)
    }

    pub fn set_parent(&mut self, index: u32) {
        self.mmio.write(REG_CLKSEL, index)
    }

    pub fn parent(&self) -> u32 {
        self.mmio.read(REG_CLKSEL)
    }

    fn wait_drp_idle(&mut self) -> Result<u32> {
        let mmio = &self.mmio;
        let idle = poll(&mut self.delay, DRP_POLL_ITERATIONS, 1,
                        || Ok::<_, ()>(mmio.read(REG_DRP_STATUS) & DRP_STATUS_BUSY == 0))
            .unwrap_or(false);
        if !idle {
            error!("{}: DRP busy timeout", self.name);
            return Err(Error::Timeout("clkgen DRP"))
        }
        Ok(self.mmio.read(REG_DRP_STATUS))
    }

    fn mmcm_read(&mut self, reg: u32) -> Result<u16> {
        self.wait_drp_idle()?;
        self.mmio.write(REG_DRP_CNTRL, DRP_CNTRL_SEL | DRP_CNTRL_READ | (reg << 16));
        let status = self.wait_drp_idle()?;
        Ok(status as u16)
    }

    fn mmcm_write(&mut self, reg: u32, val: u16, mask: u16) -> Result<()> {
        self.wait_drp_idle()?;
        let val = if mask != 0xffff {
            let old = self.mmcm_read(reg)?;
            (val & mask) | (old & !mask)
        } else {
            val
        };
        self.mmio.write(REG_DRP_CNTRL, DRP_CNTRL_SEL | (reg << 16) | val as u32);
        Ok(())
    }

    fn set_div(&mut self, reg1: u32, reg2: u32, divider: u32) -> Result<()> {
        let p = DividerParams::new(divider);
        self.mmcm_write(reg1, ((p.high << 6) | p.low) as u16, 0xefff)?;
        self.mmcm_write(reg2, ((p.edge << 7) | (p.nocount << 6)) as u16, 0x03ff)
    }

    fn get_div(&mut self, reg1: u32, reg2: u32) -> Result<u32> {
        let lo_hi = self.mmcm_read(reg1)? as u32;
        let flags = self.mmcm_read(reg2)? as u32;
        if flags & (1 << 6) != 0 {
            return Ok(1)
        }
        Ok((lo_hi & 0x3f) + ((lo_hi >> 6) & 0x3f))
    }

    fn write_params(&mut self, params: &MmcmParams) -> Result<()> {
        self.set_div(MMCM_REG_CLKOUT0_1, MMCM_REG_CLKOUT0_2, params.dout)?;

        let d = DividerParams::new(params.d);
        self.mmcm_write(MMCM_REG_CLK_DIV,
                        ((d.edge << 13) | (d.nocount << 12) | (d.high << 6) | d.low) as u16,
                        0x3fff)?;

        self.set_div(MMCM_REG_CLK_FB1, MMCM_REG_CLK_FB2, params.m)?;

        let lock = params.lock();
        self.mmcm_write(MMCM_REG_LOCK1, (lock & 0x3ff) as u16, 0x3ff)?;
        self.mmcm_write(MMCM_REG_LOCK2, ((((lock >> 16) & 0x1f) << 10) | 0x1) as u16, 0x7fff)?;
        self.mmcm_write(MMCM_REG_LOCK3, ((((lock >> 24) & 0x1f) << 10) | 0x3e9) as u16, 0x7fff)?;

        let filter = params.filter();
        self.mmcm_write(MMCM_REG_FILTER1, (filter >> 16) as u16, 0x9900)?;
        self.mmcm_write(MMCM_REG_FILTER2, filter as u16, 0x9900)
    }

    /// Programs the MMCM for the closest reachable output rate and waits for
    /// it to lock.
    pub fn set_rate(&mut self, rate: u64, parent_rate: u64) -> Result<()> {
        if rate == 0 || parent_rate == 0 {
            return Err(Error::InvalidArgument("zero clock rate"))
        }
        let params = search::calc_params(parent_rate, rate)?;
        debug!("{}: d={} m={} dout={}", self.name, params.d, params.m, params.dout);

        self.mmcm_enable(false);
        self.write_params(&params)?;
        self.mmcm_enable(true);

        let mmio = &self.mmio;
        let locked = poll(&mut self.delay, LOCK_POLL_ITERATIONS, 1,
                          || Ok::<_, ()>(mmio.read(REG_STATUS) & STATUS_LOCKED != 0))
            .unwrap_or(false);
        if !locked {
            error!("{}: MMCM did not lock", self.name);
            return Err(Error::NotLocked)
        }
        info!("{}: {} Hz from {} Hz", self.name, self.round_rate(rate, parent_rate)?, parent_rate);
        Ok(())
    }

    pub fn round_rate(&self, rate: u64, parent_rate: u64) -> Result<u64> {
        let p = search::calc_params(parent_rate, rate)?;
        let div = p.d as u64 * p.dout as u64;
        Ok((parent_rate * p.m as u64 + div / 2) / div)
    }

    /// Output rate derived from the dividers currently in the MMCM.
    pub fn recalc_rate(&mut self, parent_rate: u64) -> Result<u64> {
        let dout = self.get_div(MMCM_REG_CLKOUT0_1, MMCM_REG_CLKOUT0_2)?;

        let reg = self.mmcm_read(MMCM_REG_CLK_DIV)? as u32;
        let d = if reg & (1 << 12) != 0 {
            1
        } else {
            (reg & 0x3f) + ((reg >> 6) & 0x3f)
        };

        let m = self.get_div(MMCM_REG_CLK_FB1, MMCM_REG_CLK_FB2)?;

        if d == 0 || dout == 0 {
            return Ok(0)
        }
        Ok(parent_rate * m as u64 / d as u64 / dout as u64)
    }
}
