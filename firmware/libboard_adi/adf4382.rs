//! ADF4382/ADF4382A microwave wideband synthesizer.

use embedded_hal::delay::DelayNs;

use board_noos::regmap::{field_get, field_prep, RegisterBus};
use pll::adf4382::{self as search, FracN};

use crate::{Error, Result};

const REG_CONFIG: u16 = 0x00;
const RESET_CMD: u8 = 0x81;
const SDO_ACTIVE: u8 = (1 << 4) | (1 << 3);

const REG_SCRATCHPAD: u16 = 0x0a;
const SCRATCHPAD_TEST: u8 = 0x5a;

const REG_N_INT_LSB: u16 = 0x10;
const REG_N_INT_MSB: u16 = 0x11;
const CLKOUT_DIV_MSK: u8 = 0xe0;
const N_INT_MSB_MSK: u8 = 0x0f;

const REG_FRAC1: u16 = 0x12;
const REG_FRAC1_MSB: u16 = 0x15;
const INT_MODE_MSK: u8 = 1 << 2;
const FRAC1_MSB_MSK: u8 = 1 << 0;
const REG_FRAC2: u16 = 0x17;
const REG_MOD2: u16 = 0x1a;

const REG_BLEED_LSB: u16 = 0x1d;
const REG_BLEED_MSB: u16 = 0x1e;
const EN_PHASE_RESYNC_MSK: u8 = 1 << 7;
const BLEED_MSB_MSK: u8 = 0x1f;
const REG_CP: u16 = 0x1f;
const EN_BLEED_MSK: u8 = 1 << 4;
const CP_I_MSK: u8 = 0x0f;

const REG_REF: u16 = 0x20;
const EN_RDBLR_MSK: u8 = 1 << 6;
const R_DIV_MSK: u8 = 0x3f;

const REG_DCLK: u16 = 0x24;
const DCLK_DIV1_MSK: u8 = 0xc0;
const REG_MOD: u16 = 0x28;
const VAR_MOD_EN_MSK: u8 = 1 << 7;
const REG_OUT_POWER: u16 = 0x29;
const CLK2_OPWR_MSK: u8 = 0xf0;
const CLK1_OPWR_MSK: u8 = 0x0f;
const REG_PD_SYNC: u16 = 0x2a;
const PD_SYNC_MSK: u8 = 1 << 4;
const REG_PD_CLKOUT: u16 = 0x2b;
const PD_CLKOUT1_MSK: u8 = 1 << 1;
const PD_CLKOUT2_MSK: u8 = 1 << 0;
const REG_LD: u16 = 0x2c;
const LDWIN_PW_MSK: u8 = 0xf0;
const LD_COUNT_MSK: u8 = 0x0f;

const REG_CAL: u16 = 0x31;
const CAL_CT_SEL_MSK: u8 = 1 << 4;
const EN_ADC_CLK_MSK: u8 = 1 << 3;
const DCLK_MODE_MSK: u8 = 1 << 2;
const REG_PHASE_CTRL: u16 = 0x32;
const PHASE_ADJ_POL_MSK: u8 = 1 << 6;
const DEL_MODE_MSK: u8 = 0x30;
const REG_PHASE_WORD: u16 = 0x33;
const REG_PHASE_ADJ: u16 = 0x34;
const PHASE_ADJ_MSK: u8 = 1 << 7;

const REG_VCO_CAL_CNT: u16 = 0x37;
const REG_VCO_CAL_VTUNE: u16 = 0x38;
const REG_VCO_CAL_ALC: u16 = 0x3a;
const REG_CMOS_OV: u16 = 0x3d;
const CMOS_OV_MSK: u8 = 1 << 1;
const REG_CAL_VTUNE_TO: u16 = 0x3e;
const REG_STATUS: u16 = 0x58;
const LOCKED_MSK: u8 = 1 << 0;

const VCO_CAL_CNT: u8 = 202;
const VCO_CAL_VTUNE: u8 = 124;
const VCO_CAL_ALC: u8 = 250;

const POR_DELAY_US: u32 = 200;
const LKD_DELAY_US: u32 = 500;

pub const REF_CLK_MAX: u64 = 5_000_000_000;
pub const REF_CLK_MIN: u64 = 10_000_000;
pub const REF_DIV_MAX: u8 = 63;
pub const CPI_VAL_MAX: u8 = 15;
pub const BLEED_WORD_MAX: u16 = 0x1fff;
pub const OUT_PWR_MAX: u8 = 15;

const DUMP_RANGES: [(u16, u16); 3] = [(0x000, 0x068), (0x100, 0x112), (0x200, 0x274)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Adf4382,
    Adf4382a,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Limits {
    freq_min: u64,
    freq_max: u64,
    vco_min: u64,
    vco_max: u64,
    clkout_div_max: u8,
}

impl Chip {
    fn limits(self) -> Limits {
        match self {
            Chip::Adf4382 => Limits {
                freq_min: 687_500_000,
                freq_max: 22_000_000_000,
                vco_min: 11_000_000_000,
                vco_max: 22_000_000_000,
                clkout_div_max: 4,
            },
            Chip::Adf4382a => Limits {
                freq_min: 2_875_000_000,
                freq_max: 21_000_000_000,
                vco_min: 11_500_000_000,
                vco_max: 21_000_000_000,
                clkout_div_max: 2,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Clk1,
    Clk2,
}

#[derive(Debug, Clone, Copy)]
pub struct InitParams {
    pub chip: Chip,
    pub spi_3wire_en: bool,
    pub cmos_3v3: bool,
    pub ref_hz: u64,
    pub freq: u64,
    pub ref_doubler_en: bool,
    pub ref_div: u8,
    pub cp_i: u8,
    pub bleed_word: u16,
    pub ld_count: u8,
}

pub struct Adf4382<B, D> {
    bus: B,
    delay: D,
    limits: Limits,
    ref_hz: u64,
    freq: u64,
    ref_doubler_en: bool,
    ref_div: u8,
    cp_i: u8,
    bleed_word: u16,
    ld_count: u8,
    phase_adj_ps: u32,
}

impl<B: RegisterBus, D: DelayNs> Adf4382<B, D> {
    /// Resets the part, checks the SPI link and locks to `params.freq`.
    pub fn init(bus: B, delay: D, params: &InitParams) -> Result<Adf4382<B, D>, B::Error> {
        let mut dev = Adf4382 {
            bus: bus,
            delay: delay,
            limits: params.chip.limits(),
            ref_hz: params.ref_hz,
            freq: params.freq,
            ref_doubler_en: params.ref_doubler_en,
            ref_div: params.ref_div,
            cp_i: params.cp_i.min(CPI_VAL_MAX),
            bleed_word: params.bleed_word.min(BLEED_WORD_MAX),
            ld_count: params.ld_count,
            phase_adj_ps: 0,
        };

        dev.write(REG_CONFIG, RESET_CMD)?;
        dev.delay.delay_us(POR_DELAY_US);
        dev.write(REG_CONFIG, if params.spi_3wire_en { 0 } else { SDO_ACTIVE })?;
        dev.write(REG_CMOS_OV, field_prep(CMOS_OV_MSK as u32, params.cmos_3v3 as u32) as u8)?;
        dev.check_scratchpad()?;

        dev.set_freq()?;
        dev.set_out_power(Output::Clk1, 9)?;
        dev.set_out_power(Output::Clk2, 9)?;
        info!("ADF4382: locked at {} Hz", dev.freq);
        Ok(dev)
    }

    pub fn remove(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<(), B::Error> {
        self.bus.write_u8(reg, val).map_err(Error::Bus)
    }

    fn read(&mut self, reg: u16) -> Result<u8, B::Error> {
        self.bus.read_u8(reg).map_err(Error::Bus)
    }

    fn update(&mut self, reg: u16, mask: u8, val: u8) -> Result<(), B::Error> {
        self.bus.update_bits(reg, mask, val).map_err(Error::Bus)
    }

    fn update_field(&mut self, reg: u16, mask: u8, val: u32) -> Result<(), B::Error> {
        self.update(reg, mask, field_prep(mask as u32, val) as u8)
    }

    fn read_field(&mut self, reg: u16, mask: u8) -> Result<u8, B::Error> {
        let val = self.read(reg)?;
        Ok(field_get(mask as u32, val as u32) as u8)
    }

    fn write_word(&mut self, reg: u16, val: u32, len: u16) -> Result<(), B::Error> {
        for i in 0..len {
            self.write(reg + i, (val >> (8 * i)) as u8)?;
        }
        Ok(())
    }

    fn read_word(&mut self, reg: u16, len: u16) -> Result<u32, B::Error> {
        let mut val = 0;
        for i in (0..len).rev() {
            val = (val << 8) | self.read(reg + i)? as u32;
        }
        Ok(val)
    }

    fn check_scratchpad(&mut self) -> Result<(), B::Error> {
        self.write(REG_SCRATCHPAD, SCRATCHPAD_TEST)?;
        let read = self.read(REG_SCRATCHPAD)?;
        if read != SCRATCHPAD_TEST {
            error!("ADF4382: scratchpad reads 0x{:02x}", read);
            return Err(Error::ReadWriteCheck { wrote: SCRATCHPAD_TEST, read: read })
        }
        Ok(())
    }

    fn pfd(&self) -> u64 {
        search::pfd(self.ref_hz, self.ref_div, self.ref_doubler_en)
    }

    fn cp_ua(&self) -> u32 {
        search::charge_pump_ua(self.cp_i).unwrap_or(0)
    }

    /// Programs the whole synthesizer for the current settings. N_INT goes
    /// last since writing it starts the VCO calibration.
    pub fn set_freq(&mut self) -> Result<(), B::Error> {
        self.update(REG_REF, EN_RDBLR_MSK | R_DIV_MSK,
                    (field_prep(EN_RDBLR_MSK as u32, self.ref_doubler_en as u32) |
                     field_prep(R_DIV_MSK as u32, self.ref_div as u32)) as u8)?;

        let limits = self.limits;
        let (clkout_div, vco) = search::select_vco(self.freq, limits.vco_min, limits.vco_max,
                                                   limits.clkout_div_max)
            .map_err(|err| {
                error!("ADF4382: no VCO setting for {} Hz", self.freq);
                err
            })?;
        let pfd = self.pfd();
        debug!("ADF4382: VCO {} Hz, CLKOUT_DIV {}, PFD {} Hz", vco, clkout_div, pfd);

        self.update_field(REG_CP, CP_I_MSK, self.cp_i as u32)?;

        let phase_resync = self.read(REG_BLEED_MSB)? & EN_PHASE_RESYNC_MSK != 0;
        let n = search::frac_n(self.freq, pfd, phase_resync)?;
        let fractional = !n.is_integer();
        let ldwin_pw = search::ldwin_pw(pfd, self.freq, fractional, self.bleed_word, self.cp_ua());

        self.update(REG_MOD, VAR_MOD_EN_MSK, if n.frac2 != 0 { 0xff } else { 0 })?;
        self.update_field(REG_FRAC1_MSB, INT_MODE_MSK, !fractional as u32)?;

        self.write(REG_BLEED_LSB, self.bleed_word as u8)?;
        self.update_field(REG_BLEED_MSB, BLEED_MSB_MSK, (self.bleed_word >> 8) as u32)?;
        self.update_field(REG_CP, EN_BLEED_MSK, fractional as u32)?;

        self.write_word(REG_MOD2, n.mod2, 3)?;
        self.write_word(REG_FRAC2, n.frac2, 3)?;
        self.write_word(REG_FRAC1, n.frac1, 3)?;
        self.update(REG_FRAC1_MSB, FRAC1_MSB_MSK, (n.frac1 >> 24) as u8)?;

        let (dclk_div1, div1) = search::dclk_div1(pfd);
        self.update_field(REG_DCLK, DCLK_DIV1_MSK, dclk_div1 as u32)?;
        self.update(REG_CAL, DCLK_MODE_MSK | CAL_CT_SEL_MSK | EN_ADC_CLK_MSK, 0xff)?;
        self.write(REG_VCO_CAL_CNT, VCO_CAL_CNT)?;
        self.write(REG_VCO_CAL_VTUNE, VCO_CAL_VTUNE)?;
        self.write(REG_VCO_CAL_ALC, VCO_CAL_ALC)?;
        self.write(REG_CAL_VTUNE_TO, search::cal_vtune_to(pfd, div1))?;

        self.update(REG_LD, LD_COUNT_MSK, self.ld_count)?;
        self.update_field(REG_LD, LDWIN_PW_MSK, ldwin_pw as u32)?;

        self.update_field(REG_N_INT_MSB, CLKOUT_DIV_MSK, clkout_div as u32)?;
        self.update(REG_N_INT_MSB, N_INT_MSB_MSK, (n.n_int >> 8) as u8)?;
        self.write(REG_N_INT_LSB, n.n_int as u8)?;

        self.delay.delay_us(LKD_DELAY_US);
        if self.read(REG_STATUS)? & LOCKED_MSK == 0 {
            error!("ADF4382: not locked at {} Hz", self.freq);
            return Err(Error::NotLocked)
        }
        Ok(())
    }

    pub fn set_ref_clk(&mut self, ref_hz: u64) -> Result<(), B::Error> {
        self.ref_hz = ref_hz.max(REF_CLK_MIN).min(REF_CLK_MAX);
        self.set_freq()
    }

    pub fn ref_clk(&self) -> u64 {
        self.ref_hz
    }

    pub fn set_en_ref_doubler(&mut self, en: bool) -> Result<(), B::Error> {
        self.ref_doubler_en = en;
        self.set_freq()
    }

    pub fn en_ref_doubler(&mut self) -> Result<bool, B::Error> {
        self.ref_doubler_en = self.read_field(REG_REF, EN_RDBLR_MSK)? != 0;
        Ok(self.ref_doubler_en)
    }

    pub fn set_ref_div(&mut self, div: u8) -> Result<(), B::Error> {
        self.ref_div = div.min(REF_DIV_MAX);
        self.set_freq()
    }

    pub fn ref_div(&mut self) -> Result<u8, B::Error> {
        self.ref_div = self.read_field(REG_REF, R_DIV_MSK)?;
        Ok(self.ref_div)
    }

    pub fn set_cp_i(&mut self, cp_i: u8) -> Result<(), B::Error> {
        self.cp_i = cp_i.min(CPI_VAL_MAX);
        self.set_freq()
    }

    pub fn cp_i(&mut self) -> Result<u8, B::Error> {
        self.cp_i = self.read_field(REG_CP, CP_I_MSK)?;
        Ok(self.cp_i)
    }

    pub fn set_bleed_word(&mut self, word: u16) -> Result<(), B::Error> {
        self.bleed_word = word.min(BLEED_WORD_MAX);
        self.set_freq()
    }

    pub fn bleed_word(&mut self) -> Result<u16, B::Error> {
        let upper = self.read(REG_BLEED_MSB)? & BLEED_MSB_MSK;
        let lower = self.read(REG_BLEED_LSB)?;
        self.bleed_word = ((upper as u16) << 8) | lower as u16;
        Ok(self.bleed_word)
    }

    pub fn set_out_power(&mut self, out: Output, pwr: u8) -> Result<(), B::Error> {
        let mask = match out {
            Output::Clk1 => CLK1_OPWR_MSK,
            Output::Clk2 => CLK2_OPWR_MSK,
        };
        self.update_field(REG_OUT_POWER, mask, pwr.min(OUT_PWR_MAX) as u32)
    }

    pub fn out_power(&mut self, out: Output) -> Result<u8, B::Error> {
        match out {
            Output::Clk1 => self.read_field(REG_OUT_POWER, CLK1_OPWR_MSK),
            Output::Clk2 => self.read_field(REG_OUT_POWER, CLK2_OPWR_MSK),
        }
    }

    pub fn set_en_chan(&mut self, out: Output, en: bool) -> Result<(), B::Error> {
        let mask = match out {
            Output::Clk1 => PD_CLKOUT1_MSK,
            Output::Clk2 => PD_CLKOUT2_MSK,
        };
        self.update_field(REG_PD_CLKOUT, mask, !en as u32)
    }

    pub fn en_chan(&mut self, out: Output) -> Result<bool, B::Error> {
        let mask = match out {
            Output::Clk1 => PD_CLKOUT1_MSK,
            Output::Clk2 => PD_CLKOUT2_MSK,
        };
        Ok(self.read_field(REG_PD_CLKOUT, mask)? == 0)
    }

    pub fn set_en_sync(&mut self, en: bool) -> Result<(), B::Error> {
        self.update_field(REG_PD_SYNC, PD_SYNC_MSK, en as u32)
    }

    pub fn en_sync(&mut self) -> Result<bool, B::Error> {
        Ok(self.read_field(REG_PD_SYNC, PD_SYNC_MSK)? != 0)
    }

    /// Clamps `freq` to the part's output range and relocks.
    pub fn set_rfout(&mut self, freq: u64) -> Result<(), B::Error> {
        self.freq = freq.max(self.limits.freq_min).min(self.limits.freq_max);
        self.set_freq()
    }

    /// Output frequency the programmed dividers produce.
    pub fn rfout(&mut self) -> Result<u64, B::Error> {
        let n_int = (((self.read(REG_N_INT_MSB)? & N_INT_MSB_MSK) as u16) << 8) |
                    self.read(REG_N_INT_LSB)? as u16;
        let frac1 = (((self.read(REG_FRAC1_MSB)? & FRAC1_MSB_MSK) as u32) << 24) |
                    self.read_word(REG_FRAC1, 3)?;
        let n = FracN {
            n_int: n_int,
            frac1: frac1,
            frac2: self.read_word(REG_FRAC2, 3)?,
            mod2: self.read_word(REG_MOD2, 3)?,
        };
        Ok(search::output_frequency(self.pfd(), &n))
    }

    /// Delays the output by `phase_ps` through the bleed current, with phase
    /// resync enabled.
    pub fn set_phase_adjust(&mut self, phase_ps: u32) -> Result<(), B::Error> {
        let word = search::phase_adjust_word(self.freq, self.pfd(), self.cp_ua(), phase_ps)?;

        self.update(REG_BLEED_MSB, EN_PHASE_RESYNC_MSK, 0xff)?;
        self.update(REG_CP, EN_BLEED_MSK, 0xff)?;
        self.update(REG_PHASE_CTRL, DEL_MODE_MSK, 0)?;
        self.phase_adj_ps = phase_ps;

        self.write(REG_PHASE_WORD, word)?;
        self.update(REG_PHASE_ADJ, PHASE_ADJ_MSK, 0xff)
    }

    pub fn phase_adjust(&self) -> u32 {
        self.phase_adj_ps
    }

    /// `true` subtracts the phase adjustment, `false` adds it.
    pub fn set_phase_pol(&mut self, polarity: bool) -> Result<(), B::Error> {
        self.update_field(REG_PHASE_CTRL, PHASE_ADJ_POL_MSK, polarity as u32)
    }

    pub fn phase_pol(&mut self) -> Result<bool, B::Error> {
        Ok(self.read_field(REG_PHASE_CTRL, PHASE_ADJ_POL_MSK)? != 0)
    }

    /// Logs every documented register. Returns how many were read.
    pub fn reg_dump(&mut self) -> Result<usize, B::Error> {
        let mut count = 0;
        for &(start, end) in DUMP_RANGES.iter() {
            for reg in start..end {
                let val = self.read(reg)?;
                info!("0x{:03x}    0x{:02x}", reg, val);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_noos::mock::{MockRegisters, NoDelay};

    fn params(freq: u64) -> InitParams {
        InitParams {
            chip: Chip::Adf4382,
            spi_3wire_en: false,
            cmos_3v3: false,
            ref_hz: 125_000_000,
            freq: freq,
            ref_doubler_en: false,
            ref_div: 1,
            cp_i: 15,
            bleed_word: 4903,
            ld_count: 10,
        }
    }

    fn locked_regs() -> MockRegisters {
        let mut regs = MockRegisters::new();
        regs.set(REG_STATUS, LOCKED_MSK);
        regs
    }

    #[test]
    fn integer_mode_lock() {
        let dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(20_000_000_000)).unwrap();
        let (regs, delay) = dev.remove();

        assert_eq!(regs.written(REG_CONFIG), &[RESET_CMD, SDO_ACTIVE]);
        assert_eq!(regs.get(REG_N_INT_LSB), 160);
        assert_eq!(regs.get(REG_N_INT_MSB), 0);
        assert_eq!(regs.get(REG_FRAC1_MSB), INT_MODE_MSK);
        assert_eq!(regs.get(REG_CP), 15);
        assert_eq!((regs.get(REG_BLEED_LSB), regs.get(REG_BLEED_MSB)), (0x27, 0x13));
        assert_eq!(regs.get(REG_CAL_VTUNE_TO), 78);
        assert_eq!(regs.get(REG_LD), 10);
        assert_eq!(regs.get(REG_OUT_POWER), 0x99);
        assert_eq!(regs.get(REG_VCO_CAL_CNT), VCO_CAL_CNT);
        assert_eq!(delay.elapsed_ns(), (POR_DELAY_US + LKD_DELAY_US) as u64 * 1000);

        // writing N_INT LSB starts the calibration
        let writes = regs.writes();
        let n_int = writes.iter().rposition(|w| w.0 == REG_N_INT_LSB).unwrap();
        assert!(writes.iter().position(|w| w.0 == REG_MOD2).unwrap() < n_int);
        assert!(writes.iter().position(|w| w.0 == REG_CAL_VTUNE_TO).unwrap() < n_int);
    }

    #[test]
    fn fractional_mode() {
        let mut dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(20_062_500_000)).unwrap();
        assert_eq!(dev.rfout(), Ok(20_062_500_000));
        let (regs, _) = dev.remove();

        assert_eq!(regs.get(REG_FRAC1_MSB), FRAC1_MSB_MSK);
        assert_eq!(regs.get(REG_CP), EN_BLEED_MSK | 15);
        assert_eq!(regs.get(REG_LD), (4 << 4) | 10);
        assert_eq!(regs.get(REG_MOD) & VAR_MOD_EN_MSK, 0);
    }

    #[test]
    fn output_divider() {
        let mut dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(5_000_000_000)).unwrap();
        assert_eq!(dev.rfout(), Ok(5_000_000_000));
        dev.set_rfout(100_000_000).unwrap();
        let (regs, _) = dev.remove();
        // clamped to 687.5 MHz, VCO at 11 GHz
        assert_eq!(regs.get(REG_N_INT_MSB), 4 << 5);
        assert_eq!(regs.get(REG_N_INT_LSB), 5);
        assert_eq!(regs.get(REG_FRAC1_MSB), FRAC1_MSB_MSK);
    }

    #[test]
    fn unlocked() {
        assert_eq!(Adf4382::init(MockRegisters::new(), NoDelay::new(), &params(20_000_000_000)).err(),
                   Some(Error::NotLocked));
    }

    #[test]
    fn scratchpad_failure() {
        let mut regs = locked_regs();
        regs.on_write(|regs, reg, _| {
            if reg == REG_SCRATCHPAD {
                regs.insert(reg, 0x00);
            }
        });
        assert_eq!(Adf4382::init(regs, NoDelay::new(), &params(20_000_000_000)).err(),
                   Some(Error::ReadWriteCheck { wrote: SCRATCHPAD_TEST, read: 0 }));
    }

    #[test]
    fn settings_round_trip() {
        let mut dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(20_000_000_000)).unwrap();

        // N_INT overflows at a 2 MHz PFD, but the divider is already written
        assert!(dev.set_ref_div(100).is_err());
        assert_eq!(dev.ref_div(), Ok(REF_DIV_MAX));
        dev.set_ref_div(1).unwrap();
        dev.set_en_ref_doubler(true).unwrap();
        assert_eq!(dev.en_ref_doubler(), Ok(true));
        dev.set_cp_i(7).unwrap();
        assert_eq!(dev.cp_i(), Ok(7));
        dev.set_bleed_word(0xffff).unwrap();
        assert_eq!(dev.bleed_word(), Ok(BLEED_WORD_MAX));

        dev.set_out_power(Output::Clk2, 3).unwrap();
        assert_eq!(dev.out_power(Output::Clk2), Ok(3));
        assert_eq!(dev.out_power(Output::Clk1), Ok(9));

        dev.set_en_chan(Output::Clk1, false).unwrap();
        assert_eq!(dev.en_chan(Output::Clk1), Ok(false));
        assert_eq!(dev.en_chan(Output::Clk2), Ok(true));
        dev.set_en_sync(true).unwrap();
        assert_eq!(dev.en_sync(), Ok(true));

        dev.set_ref_clk(1).unwrap();
        assert_eq!(dev.ref_clk(), REF_CLK_MIN);
    }

    #[test]
    fn phase_adjust() {
        let mut dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(20_000_000_000)).unwrap();
        dev.set_phase_pol(true).unwrap();
        assert_eq!(dev.phase_pol(), Ok(true));
        dev.set_phase_adjust(10).unwrap();
        assert_eq!(dev.phase_adjust(), 10);
        assert!(dev.set_phase_adjust(1_000).is_err());

        let (regs, _) = dev.remove();
        assert_eq!(regs.get(REG_BLEED_MSB) & EN_PHASE_RESYNC_MSK, EN_PHASE_RESYNC_MSK);
        assert_eq!(regs.get(REG_PHASE_ADJ), PHASE_ADJ_MSK);
        assert_eq!(regs.get(REG_PHASE_WORD),
                   search::phase_adjust_word(20_000_000_000, 125_000_000, 11_100, 10).unwrap());
    }

    #[test]
    fn dump() {
        let mut dev = Adf4382::init(locked_regs(), NoDelay::new(), &params(20_000_000_000)).unwrap();
        assert_eq!(dev.reg_dump(), Ok(0x68 + 0x12 + 0x74));
    }
}
