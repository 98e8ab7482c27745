//! AD9517 clock generator with integrated VCO: four LVPECL outputs on two
//! dividers and four LVDS/CMOS outputs on two cascaded divider pairs.

use embedded_hal::delay::DelayNs;

use board_noos::regmap::{field_get, field_prep, RegisterBus};
use pll::ad9517::{self as search, DualModulus};

use crate::{Error, Result};

const REG_SERIAL_PORT_CONFIG: u16 = 0x000;
const SOFT_RESET: u8 = (1 << 5) | (1 << 2);
const LONG_INSTRUCTION: u8 = (1 << 4) | (1 << 3);
const REG_PART_ID: u16 = 0x003;

const REG_PFD_CHARGE_PUMP: u16 = 0x010;
const PLL_POWER_DOWN_MSK: u8 = 0x03;
const CP_MODE_MSK: u8 = 0x0c;
const CP_CURRENT_MSK: u8 = 0x70;
const REG_R_COUNTER_LSB: u16 = 0x011;
const REG_R_COUNTER_MSB: u16 = 0x012;
const REG_A_COUNTER: u16 = 0x013;
const A_COUNTER_MSK: u8 = 0x3f;
const REG_B_COUNTER_LSB: u16 = 0x014;
const REG_B_COUNTER_MSB: u16 = 0x015;
const REG_PLL_CTRL_1: u16 = 0x016;
const PRESCALER_P_MSK: u8 = 0x07;
const REG_PLL_CTRL_3: u16 = 0x018;
const VCO_CAL_NOW: u8 = 1 << 0;
const REG_PLL_CTRL_7: u16 = 0x01c;
const DIFF_REF: u8 = 1 << 0;
const REF1_POWER_ON: u8 = 1 << 1;
const REF2_POWER_ON: u8 = 1 << 2;
const USE_REF_SEL_PIN: u8 = 1 << 5;
const SELECT_REF2: u8 = 1 << 6;

const REG_LVPECL_OUT: [u16; 4] = [0x0f0, 0x0f1, 0x0f4, 0x0f5];
const LVPECL_INVERT: u8 = 1 << 4;
const LVPECL_DIFF_VOLTAGE_MSK: u8 = 0x0c;
const LVPECL_POWER_DOWN_MSK: u8 = 0x03;

const REG_LVDS_CMOS_OUT: u16 = 0x140;
const LVDS_CMOS_INVERT_MSK: u8 = 0xe0;
const CMOS_B: u8 = 1 << 4;
const LVDS_CMOS_SELECT: u8 = 1 << 3;
const LVDS_CURRENT_MSK: u8 = 0x06;
const LVDS_CMOS_POWER_DOWN: u8 = 1 << 0;

// LVPECL dividers 0 and 1: cycles, then bypass and phase.
const REG_DIVIDER: [u16; 2] = [0x190, 0x196];
const DIVIDER_BYPASS: u8 = 1 << 7;
const DIVIDER_PHASE_MSK: u8 = 0x0f;

// LVDS/CMOS dividers 2 and 3: cycles of the first stage, phase of both
// stages, cycles of the second stage, bypass bits.
const REG_LVDS_CMOS_DIVIDER: [u16; 2] = [0x199, 0x19e];
const PHASE_DIVIDER_2_MSK: u8 = 0xf0;
const PHASE_DIVIDER_1_MSK: u8 = 0x0f;
const BYPASS_DIVIDER_2: u8 = 1 << 5;
const BYPASS_DIVIDER_1: u8 = 1 << 4;

const CYCLES_LOW_MSK: u8 = 0xf0;
const CYCLES_HIGH_MSK: u8 = 0x0f;

const REG_VCO_DIVIDER: u16 = 0x1e0;
const REG_INPUT_CLKS: u16 = 0x1e1;
const BYPASS_VCO_DIVIDER: u8 = 1 << 0;
const SEL_VCO_CLK: u8 = 1 << 1;
const POWER_DOWN_VCO_CLK: u8 = 1 << 2;

const REG_UPDATE_ALL_REGS: u16 = 0x232;
const UPDATE_ALL_REGS: u8 = 1 << 0;

/// Table 29 of the datasheet.
const VCO_CAL_MS: u32 = 88;
const CHAN_DIV_INPUT_MAX: u64 = 1_600_000_000;
const VCO_DIVIDER_MAX: u32 = 6;
const LVPECL_DIVIDER_MAX: u32 = 32;
const LVDS_CMOS_DIVIDER_MAX: u32 = 1024;

pub const NUM_CHAN: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Ad9517_1,
    Ad9517_2,
    Ad9517_3,
    Ad9517_4,
}

impl Chip {
    fn part_id(self) -> u8 {
        match self {
            Chip::Ad9517_1 => 0x51,
            Chip::Ad9517_2 => 0x91,
            Chip::Ad9517_3 => 0x53,
            Chip::Ad9517_4 => 0xd3,
        }
    }

    fn vco_range(self) -> (u64, u64) {
        match self {
            Chip::Ad9517_1 => (2_300_000_000, 2_650_000_000),
            Chip::Ad9517_2 => (2_050_000_000, 2_330_000_000),
            Chip::Ad9517_3 => (1_750_000_000, 2_250_000_000),
            Chip::Ad9517_4 => (1_450_000_000, 1_800_000_000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PllSettings {
    pub ref_1_hz: u64,
    pub ref_2_hz: u64,
    pub diff_ref_en: bool,
    pub ref_1_power_on: bool,
    pub ref_2_power_on: bool,
    /// Reference chosen by the REF_SEL pin instead of `ref_2_en`.
    pub ref_sel_pin_en: bool,
    /// Level of the REF_SEL pin, high selects REF2.
    pub ref_sel_pin: bool,
    pub ref_2_en: bool,
    pub ext_clk_hz: u64,
    pub int_vco_hz: u64,
    /// Channel dividers fed from the VCO rather than the CLK input.
    pub vco_clk_sel: bool,
    pub power_down_vco_clk: bool,
}

impl PllSettings {
    fn ref_hz(&self) -> u64 {
        let ref_2 = if self.ref_sel_pin_en { self.ref_sel_pin } else { self.ref_2_en };
        if ref_2 { self.ref_2_hz } else { self.ref_1_hz }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LvpeclChannel {
    pub invert: bool,
    /// Differential voltage code, 0 to 3.
    pub diff_voltage: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LvdsCmosChannel {
    /// Inversion bits, 0 to 7.
    pub invert: u8,
    /// CMOS logic instead of LVDS.
    pub cmos: bool,
    pub cmos_b_en: bool,
    /// LVDS output current code, 0 to 3.
    pub lvds_current: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct InitParams {
    pub chip: Chip,
    pub pll: PllSettings,
    pub lvpecl: [LvpeclChannel; 4],
    pub lvds_cmos: [LvdsCmosChannel; 4],
}

impl LvpeclChannel {
    fn out_word(&self, power_down: u8) -> u8 {
        (if self.invert { LVPECL_INVERT } else { 0 }) |
        field_prep(LVPECL_DIFF_VOLTAGE_MSK as u32, self.diff_voltage as u32) as u8 |
        field_prep(LVPECL_POWER_DOWN_MSK as u32, power_down as u32) as u8
    }
}

impl LvdsCmosChannel {
    fn out_word(&self, power_down: bool) -> u8 {
        field_prep(LVDS_CMOS_INVERT_MSK as u32, self.invert as u32) as u8 |
        (if self.cmos_b_en { CMOS_B } else { 0 }) |
        (if self.cmos { LVDS_CMOS_SELECT } else { 0 }) |
        field_prep(LVDS_CURRENT_MSK as u32, self.lvds_current as u32) as u8 |
        (if power_down { LVDS_CMOS_POWER_DOWN } else { 0 })
    }
}

fn cycles_word(low: u32, high: u32) -> u8 {
    field_prep(CYCLES_LOW_MSK as u32, low) as u8 | field_prep(CYCLES_HIGH_MSK as u32, high) as u8
}

pub struct Ad9517<B, D> {
    bus: B,
    delay: D,
    chip: Chip,
    pll: PllSettings,
    lvpecl: [LvpeclChannel; 4],
    lvds_cmos: [LvdsCmosChannel; 4],
    counters: Option<DualModulus>,
    vco_divider: u32,
}

impl<B: RegisterBus, D: DelayNs> Ad9517<B, D> {
    /// Checks the part ID, resets the serial port, sets up references and
    /// outputs, and when the VCO drives the dividers locks and calibrates it.
    pub fn init(bus: B, delay: D, params: &InitParams) -> Result<Ad9517<B, D>, B::Error> {
        let mut dev = Ad9517 {
            bus: bus,
            delay: delay,
            chip: params.chip,
            pll: params.pll,
            lvpecl: params.lvpecl,
            lvds_cmos: params.lvds_cmos,
            counters: None,
            vco_divider: 1,
        };

        let part_id = dev.read(REG_PART_ID)?;
        if part_id != dev.chip.part_id() {
            error!("AD9517: unexpected part ID 0x{:02x}", part_id);
            return Err(Error::InvalidId {
                what: "AD9517 part ID",
                expected: dev.chip.part_id() as u32,
                found: part_id as u32,
            })
        }

        dev.write(REG_SERIAL_PORT_CONFIG, SOFT_RESET | LONG_INSTRUCTION)?;
        dev.update()?;
        dev.write(REG_SERIAL_PORT_CONFIG, LONG_INSTRUCTION)?;
        dev.update()?;

        let pll = dev.pll;
        let flag = |on: bool, bit: u8| if on { bit } else { 0 };
        dev.write(REG_PLL_CTRL_7,
                  flag(pll.diff_ref_en, DIFF_REF) |
                  flag(pll.ref_1_power_on, REF1_POWER_ON) |
                  flag(pll.ref_2_power_on, REF2_POWER_ON) |
                  flag(pll.ref_sel_pin_en, USE_REF_SEL_PIN) |
                  flag(pll.ref_2_en, SELECT_REF2))?;
        dev.write(REG_INPUT_CLKS,
                  flag(pll.vco_clk_sel, SEL_VCO_CLK) |
                  flag(pll.power_down_vco_clk, POWER_DOWN_VCO_CLK))?;

        for (i, &reg) in REG_LVPECL_OUT.iter().enumerate() {
            let word = dev.lvpecl[i].out_word(0);
            dev.write(reg, word)?;
        }
        for i in 0..4 {
            let word = dev.lvds_cmos[i].out_word(false);
            dev.write(REG_LVDS_CMOS_OUT + i as u16, word)?;
        }

        if pll.vco_clk_sel {
            dev.set_vco_frequency(pll.int_vco_hz)?;
            dev.write(REG_PFD_CHARGE_PUMP,
                      field_prep(CP_MODE_MSK as u32, 3) as u8 |
                      field_prep(CP_CURRENT_MSK as u32, 7) as u8)?;
            dev.calibrate_vco()?;
        }
        info!("AD9517: ready, VCO at {} Hz", dev.pll.int_vco_hz);
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

    fn update_bits(&mut self, reg: u16, mask: u8, val: u8) -> Result<(), B::Error> {
        self.bus.update_bits(reg, mask, val).map_err(Error::Bus)
    }

    /// Transfers the buffered register writes to the active registers.
    pub fn update(&mut self) -> Result<(), B::Error> {
        self.write(REG_UPDATE_ALL_REGS, UPDATE_ALL_REGS)
    }

    fn calibrate_vco(&mut self) -> Result<(), B::Error> {
        let ctrl = self.read(REG_PLL_CTRL_3)? & !VCO_CAL_NOW;
        self.write(REG_PLL_CTRL_3, ctrl)?;
        self.update()?;
        self.write(REG_PLL_CTRL_3, ctrl | VCO_CAL_NOW)?;
        self.update()?;
        self.delay.delay_ms(VCO_CAL_MS);
        Ok(())
    }

    /// Programs R, P, B and A for the VCO. Returns the frequency reached.
    pub fn set_vco_frequency(&mut self, hz: u64) -> Result<u64, B::Error> {
        let (min, max) = self.chip.vco_range();
        if hz < min || hz > max {
            return Err(Error::Pll(pll::Error::OutOfRange { what: "VCO frequency", value: hz,
                                                           min: min, max: max }))
        }

        let ref_hz = self.pll.ref_hz();
        let counters = search::vco_counters(ref_hz, hz)?;
        if counters.wide_antibacklash(ref_hz) {
            debug!("AD9517: PFD at {} Hz may need a shorter antibacklash pulse",
                   counters.pfd_hz(ref_hz));
        }

        self.update_bits(REG_PLL_CTRL_1, PRESCALER_P_MSK, counters.p_code)?;
        self.write(REG_A_COUNTER, counters.a as u8 & A_COUNTER_MSK)?;
        self.write(REG_B_COUNTER_MSB, (counters.b >> 8) as u8 & 0x1f)?;
        self.write(REG_B_COUNTER_LSB, counters.b as u8)?;
        self.write(REG_R_COUNTER_MSB, (counters.r >> 8) as u8 & 0x3f)?;
        self.write(REG_R_COUNTER_LSB, counters.r as u8)?;

        let vco_hz = counters.vco_hz(ref_hz);
        self.counters = Some(counters);
        self.pll.int_vco_hz = vco_hz;
        debug!("AD9517: R={} P={} B={} A={}, VCO {} Hz",
               counters.r, counters.p, counters.b, counters.a, vco_hz);
        Ok(vco_hz)
    }

    pub fn vco_frequency(&self) -> u64 {
        self.pll.int_vco_hz
    }

    pub fn counters(&self) -> Option<DualModulus> {
        self.counters
    }

    pub fn vco_divider(&self) -> u32 {
        self.vco_divider
    }

    /// Sets the VCO divider and the channel divider for output `channel`
    /// (0 to 3 LVPECL, 4 to 7 LVDS/CMOS). Returns the frequency reached.
    pub fn set_frequency(&mut self, channel: u8, hz: u64) -> Result<u64, B::Error> {
        if channel >= NUM_CHAN {
            return Err(Error::InvalidArgument("AD9517 channel"))
        }
        let lvpecl = channel < 4;

        let input = if self.pll.vco_clk_sel { self.pll.int_vco_hz } else { self.pll.ext_clk_hz };
        // the VCO divider cannot be bypassed with the VCO selected
        let mut vco_divider = if self.pll.vco_clk_sel { 2 } else { 1 };
        while input / vco_divider as u64 > CHAN_DIV_INPUT_MAX {
            vco_divider += 1;
        }
        let divider_max = if lvpecl { LVPECL_DIVIDER_MAX } else { LVDS_CMOS_DIVIDER_MAX };
        while vco_divider < VCO_DIVIDER_MAX && hz != 0 &&
                input / vco_divider as u64 / hz > divider_max as u64 {
            vco_divider += 1;
        }
        let chan_input = input / vco_divider as u64;
        let divider = search::nearest_divider(chan_input, hz, divider_max)?;

        if vco_divider == 1 {
            self.update_bits(REG_INPUT_CLKS, BYPASS_VCO_DIVIDER, BYPASS_VCO_DIVIDER)?;
        } else {
            self.update_bits(REG_INPUT_CLKS, BYPASS_VCO_DIVIDER, 0)?;
            self.write(REG_VCO_DIVIDER, (vco_divider - 2) as u8)?;
        }
        self.vco_divider = vco_divider;

        if lvpecl {
            self.set_lvpecl_divider(channel / 2, divider)?;
        } else {
            self.set_lvds_cmos_divider((channel - 4) / 2, divider)?;
        }

        let rate = chan_input / divider as u64;
        info!("AD9517: channel {} at {} Hz (VCO divider {}, channel divider {})",
              channel, rate, vco_divider, divider);
        Ok(rate)
    }

    fn set_lvpecl_divider(&mut self, index: u8, divider: u32) -> Result<(), B::Error> {
        let reg = REG_DIVIDER[index as usize];
        match search::divider_cycles(divider) {
            None => self.update_bits(reg + 1, DIVIDER_BYPASS, DIVIDER_BYPASS),
            Some((low, high)) => {
                self.update_bits(reg + 1, DIVIDER_BYPASS, 0)?;
                self.write(reg, cycles_word(low, high))
            }
        }
    }

    fn set_lvds_cmos_divider(&mut self, index: u8, divider: u32) -> Result<(), B::Error> {
        let reg = REG_LVDS_CMOS_DIVIDER[index as usize];
        let bypass = BYPASS_DIVIDER_2 | BYPASS_DIVIDER_1;
        if divider <= 32 {
            return match search::divider_cycles(divider) {
                None => self.update_bits(reg + 3, bypass, bypass),
                Some((low, high)) => {
                    self.update_bits(reg + 3, bypass, BYPASS_DIVIDER_2)?;
                    self.write(reg, cycles_word(low, high))
                }
            }
        }

        let (d1, d2) = match search::split_divider(divider) {
            Some(split) => split,
            None => return Err(Error::Pll(pll::Error::InvalidDivider { what: "LVDS/CMOS",
                                                                       value: divider }))
        };
        for &(offset, d) in [(0, d1), (2, d2)].iter() {
            let (low, high) = match search::divider_cycles(d) {
                Some(cycles) => cycles,
                None => (0, 0),
            };
            self.write(reg + offset, cycles_word(low, high))?;
        }
        self.update_bits(reg + 3, bypass, 0)
    }

    /// Phase offset in input clock cycles, 0 to 15 on LVPECL outputs. The
    /// LVDS/CMOS offset is shared between the two cascaded stages.
    pub fn set_phase(&mut self, channel: u8, phase: u8) -> Result<(), B::Error> {
        if channel >= NUM_CHAN {
            return Err(Error::InvalidArgument("AD9517 channel"))
        }
        if channel < 4 {
            let reg = REG_DIVIDER[(channel / 2) as usize] + 1;
            self.update_bits(reg, DIVIDER_PHASE_MSK,
                             field_prep(DIVIDER_PHASE_MSK as u32, phase as u32) as u8)
        } else {
            let reg = REG_LVDS_CMOS_DIVIDER[((channel - 4) / 2) as usize] + 1;
            let stage_2 = (phase / 2 + phase % 2) as u32;
            let stage_1 = (phase / 2) as u32;
            self.write(reg, field_prep(PHASE_DIVIDER_2_MSK as u32, stage_2) as u8 |
                            field_prep(PHASE_DIVIDER_1_MSK as u32, stage_1) as u8)
        }
    }

    /// LVPECL modes are 0 (on) to 3 (safe power-down); LVDS/CMOS outputs
    /// take 0 (on) or 1 (off).
    pub fn set_power_mode(&mut self, channel: u8, mode: u8) -> Result<(), B::Error> {
        match channel {
            0..=3 => {
                if mode > 3 {
                    return Err(Error::InvalidArgument("AD9517 LVPECL power mode"))
                }
                let word = self.lvpecl[channel as usize].out_word(mode);
                self.write(REG_LVPECL_OUT[channel as usize], word)
            }
            4..=7 => {
                if mode > 1 {
                    return Err(Error::InvalidArgument("AD9517 LVDS/CMOS power mode"))
                }
                let word = self.lvds_cmos[(channel - 4) as usize].out_word(mode == 1);
                self.write(REG_LVDS_CMOS_OUT + (channel - 4) as u16, word)
            }
            _ => Err(Error::InvalidArgument("AD9517 channel"))
        }
    }

    pub fn power_mode(&mut self, channel: u8) -> Result<u8, B::Error> {
        match channel {
            0..=3 => {
                let val = self.read(REG_LVPECL_OUT[channel as usize])?;
                Ok(field_get(LVPECL_POWER_DOWN_MSK as u32, val as u32) as u8)
            }
            4..=7 => {
                let val = self.read(REG_LVDS_CMOS_OUT + (channel - 4) as u16)?;
                Ok(val & LVDS_CMOS_POWER_DOWN)
            }
            _ => Err(Error::InvalidArgument("AD9517 channel"))
        }
    }
}
