//! Arria 10 fPLL behind the AVMM reconfiguration port.
//!
//! Reconfiguration registers are 8 bits wide and sit at word offsets. The
//! port must be taken from the calibration engine before writing and handed
//! back afterwards; handing it back with calibration requested recalibrates
//! the PLL on the new settings.

use embedded_hal::delay::DelayNs;

use board_noos::clock::poll;
use board_noos::mmio::Mmio;
use pll::a10_fpll::{self as search, FpllParams};

use crate::{Error, Result};

const REG_ARBITRATION: u32 = 0x000;
const ARBITRATION_USER: u32 = 0x2;
const ARBITRATION_RELEASE_CAL: u32 = 0x1;
const ARBITRATION_RELEASE: u32 = 0x3;

const REG_LF_RESISTANCE: u32 = 0x107;
const LF_RESISTANCE_MASK: u32 = 0x0c;
const REG_CP_CURRENT: u32 = 0x108;
const CP_CURRENT_MASK: u32 = 0x07;

const REG_N: u32 = 0x12b;
const N_MASK: u32 = 0x1f;
const REG_M: u32 = 0x12c;
const M_MASK: u32 = 0x7f;
const REG_C0_LO: u32 = 0x12d;
const REG_C0_HI: u32 = 0x12e;

const REG_CALIBRATION: u32 = 0x100;
const CALIBRATION_REQUEST: u32 = 1 << 1;

const REG_STATUS: u32 = 0x280;
const STATUS_LOCKED: u32 = 1 << 0;
const STATUS_CAL_BUSY: u32 = 1 << 1;
const STATUS_AVMM_BUSY: u32 = 1 << 2;

const POLL_ITERATIONS: u32 = 10_000;

pub struct A10Fpll<M, D> {
    mmio: M,
    delay: D,
}

impl<M: Mmio, D: DelayNs> A10Fpll<M, D> {
    pub fn new(mmio: M, delay: D) -> A10Fpll<M, D> {
        A10Fpll { mmio: mmio, delay: delay }
    }

    pub fn release(self) -> (M, D) {
        (self.mmio, self.delay)
    }

    fn read(&self, reg: u32) -> u32 {
        self.mmio.read(reg * 4) & 0xff
    }

    fn write(&mut self, reg: u32, val: u32) {
        self.mmio.write(reg * 4, val & 0xff)
    }

    fn update(&mut self, reg: u32, mask: u32, val: u32) {
        let reg_val = (self.read(reg) & !mask) | (val & mask);
        self.write(reg, reg_val)
    }

    fn wait_status(&mut self, mask: u32, set: bool, what: &'static str) -> Result<()> {
        let mmio = &self.mmio;
        let ok = poll(&mut self.delay, POLL_ITERATIONS, 10,
                      || Ok::<_, ()>((mmio.read(REG_STATUS * 4) & mask != 0) == set))
            .unwrap_or(false);
        if ok {
            Ok(())
        } else {
            error!("fPLL: timeout waiting for {}", what);
            Err(Error::Timeout(what))
        }
    }

    pub fn acquire_arbitration(&mut self) -> Result<()> {
        self.write(REG_ARBITRATION, ARBITRATION_USER);
        self.wait_status(STATUS_AVMM_BUSY, false, "fPLL arbitration")
    }

    pub fn release_arbitration(&mut self, calibrate: bool) {
        self.write(REG_ARBITRATION, if calibrate { ARBITRATION_RELEASE_CAL } else { ARBITRATION_RELEASE })
    }

    fn write_params(&mut self, params: &FpllParams, fvco_khz: u64) {
        self.update(REG_N, N_MASK, params.n);
        self.update(REG_M, M_MASK, params.m);
        let c0 = params.c0 - 1;
        self.write(REG_C0_LO, c0);
        self.update(REG_C0_HI, 0x01, c0 >> 8);

        let lf = search::lookup_lf_resistance(fvco_khz, params.m) as u32;
        let cp = search::lookup_cp_current(fvco_khz, params.m) as u32;
        self.update(REG_LF_RESISTANCE, LF_RESISTANCE_MASK, lf << 2);
        self.update(REG_CP_CURRENT, CP_CURRENT_MASK, cp);
    }

    pub fn set_rate(&mut self, rate: u64, parent_rate: u64) -> Result<()> {
        if rate == 0 || parent_rate == 0 {
            return Err(Error::InvalidArgument("zero clock rate"))
        }
        let params = search::calc_params(parent_rate, rate)?;
        let fvco_khz = params.vco_khz(parent_rate / 1000);
        debug!("fPLL: n={} m={} c0={} vco={} kHz", params.n, params.m, params.c0, fvco_khz);

        self.acquire_arbitration()?;
        self.write_params(&params, fvco_khz);
        self.update(REG_CALIBRATION, CALIBRATION_REQUEST, CALIBRATION_REQUEST);
        self.release_arbitration(true);

        self.wait_status(STATUS_CAL_BUSY, false, "fPLL calibration")?;
        if self.mmio.read(REG_STATUS * 4) & STATUS_LOCKED == 0 {
            error!("fPLL: not locked after calibration, status 0x{:02x}", self.read(REG_STATUS));
            return Err(Error::NotLocked)
        }
        Ok(())
    }

    pub fn round_rate(&self, rate: u64, parent_rate: u64) -> Result<u64> {
        let p = search::calc_params(parent_rate, rate)?;
        Ok(p.output_khz(parent_rate / 1000) * 1000)
    }

    pub fn recalc_rate(&self, parent_rate: u64) -> u64 {
        let n = self.read(REG_N) & N_MASK;
        let m = self.read(REG_M) & M_MASK;
        let c0 = (((self.read(REG_C0_HI) & 1) << 8) | self.read(REG_C0_LO)) + 1;
        if n == 0 {
            return 0
        }
        parent_rate * m as u64 / (n as u64 * c0 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_noos::mock::{MockMmio, NoDelay};

    #[test]
    fn set_rate_programs_counters() {
        let mut mmio = MockMmio::new();
        mmio.set(REG_STATUS * 4, STATUS_LOCKED);
        let mut fpll = A10Fpll::new(mmio, NoDelay::new());

        fpll.set_rate(250_000_000, 100_000_000).unwrap();
        assert_eq!(fpll.recalc_rate(100_000_000), 250_000_000);

        let (mmio, _) = fpll.release();
        assert_eq!(mmio.written(REG_ARBITRATION), &[ARBITRATION_USER, ARBITRATION_RELEASE_CAL]);
        assert_eq!(mmio.read(REG_N * 4), 2);
        assert_eq!(mmio.read(REG_M * 4), 100);
        assert_eq!(mmio.read(REG_C0_LO * 4), 19);
        // 5 GHz VCO with M = 100
        assert_eq!(mmio.read(REG_LF_RESISTANCE * 4), 2 << 2);
        assert_eq!(mmio.read(REG_CP_CURRENT * 4), 4);
        assert_eq!(mmio.read(REG_CALIBRATION * 4), CALIBRATION_REQUEST);
    }

    #[test]
    fn calibration_without_lock() {
        let mut fpll = A10Fpll::new(MockMmio::new(), NoDelay::new());
        assert_eq!(fpll.set_rate(250_000_000, 100_000_000), Err(Error::NotLocked));
    }

    #[test]
    fn busy_port() {
        let mut mmio = MockMmio::new();
        mmio.set(REG_STATUS * 4, STATUS_AVMM_BUSY);
        let mut fpll = A10Fpll::new(mmio, NoDelay::new());
        assert_eq!(fpll.acquire_arbitration(), Err(Error::Timeout("fPLL arbitration")));
    }

    #[test]
    fn large_c0() {
        let mut mmio = MockMmio::new();
        mmio.set(REG_N * 4, 1);
        mmio.set(REG_M * 4, 50);
        mmio.set(REG_C0_LO * 4, 0xff);
        mmio.set(REG_C0_HI * 4, 0x01);
        let fpll = A10Fpll::new(mmio, NoDelay::new());
        assert_eq!(fpll.recalc_rate(100_000_000), 100_000_000 * 50 / 512);
    }

    #[test]
    fn rounding() {
        let fpll = A10Fpll::new(MockMmio::new(), NoDelay::new());
        assert_eq!(fpll.round_rate(250_000_000, 100_000_000).unwrap(), 250_000_000);
        assert_eq!(fpll.recalc_rate(100_000_000), 0);
    }
}
