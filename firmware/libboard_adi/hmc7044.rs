//! HMC7044 jitter attenuator and HMC7043 fanout buffer.
//!
//! Both parts share the register map and the 16-bit SPI command word, so one
//! driver covers them; the HMC7043 simply has no PLLs. Registers go through
//! any `RegisterBus`, normally `SpiRegisters` with `Framing::Wide`.

use embedded_hal::delay::DelayNs;

use board_noos::regmap::RegisterBus;
use pll::hmc7044::{self as search, NUM_CLKIN};

use crate::{Error, Result};

const REG_SOFT_RESET: u16 = 0x0000;
const SOFT_RESET: u8 = 1 << 0;

const REG_REQ_MODE_0: u16 = 0x0001;
const RESEED_REQ: u8 = 1 << 7;
const HIGH_PERF_DISTRIB_PATH: u8 = 1 << 6;
const HIGH_PERF_PLL_VCO: u8 = 1 << 5;
const PULSE_GEN_REQ: u8 = 1 << 2;
const RESTART_DIV_FSM: u8 = 1 << 1;
const SLEEP_MODE: u8 = 1 << 0;

const REG_EN_CTRL_0: u16 = 0x0003;
const RF_RESEEDER_EN: u8 = 1 << 5;
const VCO_HIGH: u8 = 1 << 3;
const VCO_LOW: u8 = 2 << 3;
const SYSREF_TIMER_EN: u8 = 1 << 2;
const PLL2_EN: u8 = 1 << 1;
const PLL1_EN: u8 = 1 << 0;

const REG_GLOB_MODE: u16 = 0x0005;
const RFSYNC_EN: u8 = 1 << 4;
const VCOIN_MODE_EN: u8 = 1 << 5;
const SYNC_PIN_MODE_MASK: u8 = 0xc0;

const REG_SCRATCHPAD: u16 = 0x0008;
const SCRATCHPAD_PATTERN: u8 = 0xad;

const REG_IN_BUF_CTRL: u16 = 0x000a;
const REG_PLL1_REF_PRIO_CTRL: u16 = 0x0014;
const REG_CLKIN_PRESCALER: u16 = 0x001c;
const REG_OSCIN_PRESCALER: u16 = 0x0020;
const REG_PLL1_R: u16 = 0x0021;
const REG_PLL1_N: u16 = 0x0026;
const REG_PLL1_LOCK_DETECT: u16 = 0x0028;
const REG_PLL2_FREQ_DOUBLER: u16 = 0x0032;
const PLL2_FREQ_DOUBLER_DIS: u8 = 1 << 0;
const REG_PLL2_R: u16 = 0x0033;
const REG_PLL2_N: u16 = 0x0035;
const REG_GPI_CTRL: u16 = 0x0046;
const REG_GPO_CTRL: u16 = 0x0050;
const REG_PULSE_GEN: u16 = 0x005a;
const REG_SYSREF_TIMER: u16 = 0x005c;
const REG_CLK_INPUT_CTRL: u16 = 0x0064;
const LOW_FREQ_INPUT_MODE: u8 = 1 << 0;
const REG_PRODUCT_ID: u16 = 0x0078;
const REG_ALARM_READBACK: u16 = 0x007d;
const REG_PLL1_STATUS: u16 = 0x0082;

const REG_CLK_OUT_DRV_LOW_PW: u16 = 0x009f;
const REG_CLK_OUT_DRV_HIGH_PW: u16 = 0x00a0;
const REG_PLL1_DELAY: u16 = 0x00a5;
const REG_PLL1_HOLDOVER: u16 = 0x00a8;
const REG_VTUNE_PRESET: u16 = 0x00b0;

fn reg_ch_out_ctrl(ch: u8, n: u16) -> u16 {
    0x00c8 + 0xa * ch as u16 + n
}

const HI_PERF_MODE: u8 = 1 << 7;
const SYNC_EN: u8 = 1 << 6;
const CTRL0_RB4: u8 = 1 << 4;
const START_UP_MODE_DYN_EN: u8 = (1 << 3) | (1 << 2);
const CH_EN: u8 = 1 << 0;
const DYN_DRIVER_EN: u8 = 1 << 5;
const FORCE_MUTE_EN: u8 = 1 << 7;

pub const NUM_CHAN: usize = 14;

pub const PULSE_GEN_CONT_PULSE: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceId {
    Hmc7044,
    Hmc7043,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPinMode {
    Disabled = 0,
    Sync = 1,
    PulseGenReq = 2,
    SyncThenPulseGen = 3,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelSpec {
    pub num: u8,
    pub disable: bool,
    pub divider: u32,
    pub driver_mode: u8,
    pub driver_impedance: u8,
    pub high_performance_mode_dis: bool,
    pub start_up_mode_dynamic_enable: bool,
    pub dynamic_driver_enable: bool,
    pub output_control0_rb4_enable: bool,
    pub force_mute_enable: bool,
    pub coarse_delay: u8,
    pub fine_delay: u8,
    pub out_mux_mode: u8,
    /// Carries SYSREF and follows the rate chosen for the JESD204 links.
    pub is_sysref: bool,
}

impl ChannelSpec {
    fn ctrl0(&self, sync: bool) -> u8 {
        (if self.start_up_mode_dynamic_enable { START_UP_MODE_DYN_EN } else { 0 }) |
        (if self.output_control0_rb4_enable { CTRL0_RB4 } else { 0 }) |
        (if self.high_performance_mode_dis { 0 } else { HI_PERF_MODE }) |
        (if sync { SYNC_EN } else { 0 }) |
        CH_EN
    }
}

#[derive(Debug, Clone)]
pub struct InitParams<'a> {
    pub device: DeviceId,
    /// CLKIN0..3 in Hz, zero when unused. CLKIN0 feeds the HMC7043.
    pub clkin_hz: [u64; NUM_CLKIN],
    pub vcxo_hz: u64,
    pub pll2_hz: u64,
    pub pll1_loop_bw: u32,
    pub sysref_timer_div: u32,
    pub pll1_ref_prio_ctrl: u8,
    pub clkin0_rfsync_en: bool,
    pub clkin1_vcoin_en: bool,
    pub high_performance_mode_clock_dist_en: bool,
    pub high_performance_mode_pll_vco_en: bool,
    pub rf_reseeder_en: bool,
    pub sync_pin_mode: SyncPinMode,
    pub pulse_gen_mode: u8,
    /// CLKIN0..3 then OSCIN.
    pub in_buf_mode: [u8; NUM_CLKIN + 1],
    pub gpi_ctrl: [u8; 4],
    pub gpo_ctrl: [u8; 4],
    pub channels: &'a [ChannelSpec],
    pub max_sysref_hz: u32,
    pub desired_sysref_hz: u32,
}

impl<'a> Default for InitParams<'a> {
    fn default() -> InitParams<'a> {
        InitParams {
            device: DeviceId::Hmc7044,
            clkin_hz: [0; NUM_CLKIN],
            vcxo_hz: 0,
            pll2_hz: 0,
            pll1_loop_bw: 200,
            sysref_timer_div: 1024,
            pll1_ref_prio_ctrl: 0xe4,
            clkin0_rfsync_en: false,
            clkin1_vcoin_en: false,
            high_performance_mode_clock_dist_en: false,
            high_performance_mode_pll_vco_en: false,
            rf_reseeder_en: true,
            sync_pin_mode: SyncPinMode::Sync,
            pulse_gen_mode: 0,
            in_buf_mode: [0; NUM_CLKIN + 1],
            gpi_ctrl: [0; 4],
            gpo_ctrl: [0; 4],
            channels: &[],
            max_sysref_hz: 0,
            desired_sysref_hz: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllStatus {
    pub pll1_fsm_state: u8,
    pub pll1_active_clkin: u8,
    pub pll2_locked: bool,
    pub sysref_sync: bool,
    pub clk_out_phase_ok: bool,
    pub pll1_pll2_locked: bool,
    pub sync_req: bool,
}

pub struct Hmc7044<B, D> {
    bus: B,
    delay: D,
    device: DeviceId,
    channels: [Option<ChannelSpec>; NUM_CHAN],
    pll2_hz: u64,
    pll1_pfd_khz: u32,
    clkin0_rfsync_en: bool,
    clkin1_vcoin_en: bool,
    pulse_gen_mode: u8,
    read_write_confirmed: bool,
    lmfc_rate: u32,
    lmfc_gcd: u32,
    max_sysref_hz: u32,
    desired_sysref_hz: u32,
}

impl<B: RegisterBus, D: DelayNs> Hmc7044<B, D> {
    /// Resets and programs the device.
    pub fn init(bus: B, delay: D, params: &InitParams) -> Result<Hmc7044<B, D>, B::Error> {
        let mut channels = [None; NUM_CHAN];
        for chan in params.channels.iter() {
            if chan.num as usize >= NUM_CHAN {
                warn!("HMC7044: ignoring channel {}", chan.num);
                continue
            }
            if !chan.disable {
                channels[chan.num as usize] = Some(*chan);
            }
        }

        let mut dev = Hmc7044 {
            bus: bus,
            delay: delay,
            device: params.device,
            channels: channels,
            pll2_hz: params.pll2_hz,
            pll1_pfd_khz: 0,
            clkin0_rfsync_en: params.clkin0_rfsync_en,
            clkin1_vcoin_en: params.clkin1_vcoin_en,
            pulse_gen_mode: params.pulse_gen_mode,
            read_write_confirmed: false,
            lmfc_rate: 0,
            lmfc_gcd: 0,
            max_sysref_hz: params.max_sysref_hz,
            desired_sysref_hz: params.desired_sysref_hz,
        };
        match params.device {
            DeviceId::Hmc7044 => dev.setup_hmc7044(params)?,
            DeviceId::Hmc7043 => dev.setup_hmc7043(params)?,
        }
        Ok(dev)
    }

    /// Gives the bus and delay back.
    pub fn remove(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<(), B::Error> {
        self.bus.write_u8(reg, val).map_err(Error::Bus)
    }

    fn read(&mut self, reg: u16) -> Result<u8, B::Error> {
        self.bus.read_u8(reg).map_err(Error::Bus)
    }

    fn write_u16(&mut self, reg: u16, val: u32, msb_mask: u32) -> Result<(), B::Error> {
        self.write(reg, val as u8)?;
        self.write(reg + 1, ((val & msb_mask) >> 8) as u8)
    }

    pub fn product_id(&mut self) -> Result<u32, B::Error> {
        self.bus.read_be(REG_PRODUCT_ID, 3).map_err(Error::Bus)
    }

    fn soft_reset(&mut self) -> Result<(), B::Error> {
        self.write(REG_SOFT_RESET, SOFT_RESET)?;
        self.delay.delay_ms(10);
        self.write(REG_SOFT_RESET, 0)?;
        self.delay.delay_ms(10);
        Ok(())
    }

    fn read_write_check(&mut self) -> Result<(), B::Error> {
        self.write(REG_SCRATCHPAD, SCRATCHPAD_PATTERN)?;
        let val = self.read(REG_SCRATCHPAD)?;
        self.read_write_confirmed = val == SCRATCHPAD_PATTERN;
        if !self.read_write_confirmed {
            warn!("HMC7044: read/write check failed (0x{:02x})", val);
        }
        Ok(())
    }

    fn disable_channels(&mut self) -> Result<(), B::Error> {
        for ch in 0..NUM_CHAN as u8 {
            self.write(reg_ch_out_ctrl(ch, 0), 0)?;
        }
        Ok(())
    }

    fn write_sysref_timer(&mut self, div: u32) -> Result<(), B::Error> {
        self.write_u16(REG_SYSREF_TIMER, div, 0xf00)
    }

    fn setup_channels(&mut self) -> Result<(), B::Error> {
        for ch in 0..NUM_CHAN as u8 {
            let chan = match self.channels[ch as usize] {
                Some(chan) => chan,
                None => continue
            };
            self.write(reg_ch_out_ctrl(ch, 1), chan.divider as u8)?;
            self.write(reg_ch_out_ctrl(ch, 2), (chan.divider >> 8) as u8)?;
            self.write(reg_ch_out_ctrl(ch, 8),
                       ((chan.driver_mode & 0x3) << 3) |
                       (chan.driver_impedance & 0x3) |
                       (if chan.dynamic_driver_enable { DYN_DRIVER_EN } else { 0 }) |
                       (if chan.force_mute_enable { FORCE_MUTE_EN } else { 0 }))?;
            self.write(reg_ch_out_ctrl(ch, 3), chan.fine_delay & 0x1f)?;
            self.write(reg_ch_out_ctrl(ch, 4), chan.coarse_delay & 0x1f)?;
            self.write(reg_ch_out_ctrl(ch, 7), chan.out_mux_mode & 0x3)?;
            self.write(reg_ch_out_ctrl(ch, 0), chan.ctrl0(true))?;
        }
        Ok(())
    }

    fn restart(&mut self, high_perf: u8) -> Result<(), B::Error> {
        self.write(REG_REQ_MODE_0, RESTART_DIV_FSM)?;
        self.delay.delay_ms(1);
        self.write(REG_REQ_MODE_0, high_perf)?;
        self.delay.delay_ms(1);
        Ok(())
    }

    fn setup_hmc7044(&mut self, params: &InitParams) -> Result<(), B::Error> {
        let plan = search::plan(params.vcxo_hz, &params.clkin_hz, params.pll2_hz,
                                params.pll1_loop_bw)?;
        self.pll1_pfd_khz = plan.pfd1_khz;
        debug!("HMC7044: {:?}", plan);

        self.soft_reset()?;
        self.read_write_check()?;
        self.disable_channels()?;

        // configuration updates for the silicon revision
        self.write(REG_CLK_OUT_DRV_LOW_PW, 0x4d)?;
        self.write(REG_CLK_OUT_DRV_HIGH_PW, 0xdf)?;
        self.write(REG_PLL1_DELAY, 0x06)?;
        self.write(REG_PLL1_HOLDOVER, 0x06)?;
        self.write(REG_VTUNE_PRESET, 0x04)?;

        self.write(REG_GLOB_MODE,
                   ((params.sync_pin_mode as u8) << 6) |
                   (if params.clkin0_rfsync_en { RFSYNC_EN } else { 0 }) |
                   (if params.clkin1_vcoin_en { VCOIN_MODE_EN } else { 0 }) |
                   (plan.ref_en & 0xf))?;

        self.write(REG_EN_CTRL_0,
                   (if params.rf_reseeder_en { RF_RESEEDER_EN } else { 0 }) |
                   (if plan.high_vco { VCO_HIGH } else { VCO_LOW }) |
                   SYSREF_TIMER_EN | PLL2_EN | PLL1_EN)?;
        self.write_u16(REG_PLL2_R, plan.r2, 0xf00)?;
        self.write_u16(REG_PLL2_N, plan.n2, 0xff00)?;
        self.write(REG_PLL2_FREQ_DOUBLER, if plan.doubler { 0 } else { PLL2_FREQ_DOUBLER_DIS })?;

        self.write(REG_PLL1_LOCK_DETECT, (plan.pll1_lock_detect & 0x1f) as u8)?;
        for i in 0..NUM_CLKIN {
            self.write(REG_CLKIN_PRESCALER + i as u16, plan.in_prescaler[i] as u8)?;
        }
        self.write(REG_OSCIN_PRESCALER, plan.in_prescaler[NUM_CLKIN] as u8)?;
        self.write_u16(REG_PLL1_R, plan.r1, 0xff00)?;
        self.write_u16(REG_PLL1_N, plan.n1, 0xff00)?;
        self.write(REG_PLL1_REF_PRIO_CTRL, params.pll1_ref_prio_ctrl)?;

        self.write_sysref_timer(params.sysref_timer_div)?;
        self.write(REG_PULSE_GEN, params.pulse_gen_mode & 0x7)?;

        for (i, &mode) in params.in_buf_mode.iter().enumerate() {
            self.write(REG_IN_BUF_CTRL + i as u16, mode)?;
        }
        for (i, &ctrl) in params.gpi_ctrl.iter().enumerate() {
            self.write(REG_GPI_CTRL + i as u16, ctrl)?;
        }
        for (i, &ctrl) in params.gpo_ctrl.iter().enumerate() {
            self.write(REG_GPO_CTRL + i as u16, ctrl)?;
        }
        self.delay.delay_ms(10);

        self.setup_channels()?;
        self.delay.delay_ms(10);

        self.restart((if params.high_performance_mode_clock_dist_en { HIGH_PERF_DISTRIB_PATH } else { 0 }) |
                     (if params.high_performance_mode_pll_vco_en { HIGH_PERF_PLL_VCO } else { 0 }))?;
        info!("HMC7044: PLL2 at {} Hz, PFD1 {} kHz", self.pll2_hz, self.pll1_pfd_khz);
        Ok(())
    }

    fn setup_hmc7043(&mut self, params: &InitParams) -> Result<(), B::Error> {
        self.pll2_hz = params.clkin_hz[0];
        if self.pll2_hz == 0 {
            error!("HMC7043: no CLKIN0 rate");
            return Err(Error::InvalidArgument("HMC7043 CLKIN0 rate"))
        }

        self.soft_reset()?;
        self.write(REG_CLK_OUT_DRV_LOW_PW, 0x4d)?;
        self.write(REG_CLK_OUT_DRV_HIGH_PW, 0xdf)?;
        self.read_write_check()?;
        self.disable_channels()?;

        if self.pll2_hz < 1_000_000_000 {
            self.write(REG_CLK_INPUT_CTRL, LOW_FREQ_INPUT_MODE)?;
        }
        self.write(REG_EN_CTRL_0,
                   (if params.rf_reseeder_en { RF_RESEEDER_EN } else { 0 }) | SYSREF_TIMER_EN)?;

        self.write_sysref_timer(params.sysref_timer_div)?;
        self.write(REG_PULSE_GEN, params.pulse_gen_mode & 0x7)?;
        self.write(REG_IN_BUF_CTRL, params.in_buf_mode[0])?;
        self.write(REG_IN_BUF_CTRL + 1, params.in_buf_mode[1])?;
        self.write(REG_GPI_CTRL, params.gpi_ctrl[0])?;
        self.write(REG_GPO_CTRL, params.gpo_ctrl[0])?;

        self.setup_channels()?;
        self.delay.delay_ms(10);

        self.restart(if params.high_performance_mode_clock_dist_en { HIGH_PERF_DISTRIB_PATH } else { 0 })?;
        info!("HMC7043: input at {} Hz", self.pll2_hz);
        Ok(())
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn read_write_confirmed(&self) -> bool {
        self.read_write_confirmed
    }

    fn channel(&self, ch: u8) -> Result<ChannelSpec, B::Error> {
        self.channels.get(ch as usize)
            .and_then(|chan| *chan)
            .ok_or(Error::InvalidArgument("HMC7044 channel"))
    }

    pub fn recalc_rate(&self, ch: u8) -> Result<u64, B::Error> {
        let chan = self.channel(ch)?;
        if chan.divider == 0 {
            return Ok(0)
        }
        Ok(self.pll2_hz / chan.divider as u64)
    }

    pub fn round_rate(&self, rate: u64) -> u64 {
        let div = search::calc_out_div(rate, self.pll2_hz) as u64;
        (self.pll2_hz + div / 2) / div
    }

    pub fn set_rate(&mut self, ch: u8, rate: u64) -> Result<(), B::Error> {
        let mut chan = self.channel(ch)?;
        chan.divider = search::calc_out_div(rate, self.pll2_hz);
        self.channels[ch as usize] = Some(chan);
        debug!("HMC7044: channel {} divider {}", ch, chan.divider);
        self.write(reg_ch_out_ctrl(ch, 1), chan.divider as u8)?;
        self.write(reg_ch_out_ctrl(ch, 2), (chan.divider >> 8) as u8)
    }

    /// Sets then clears `mask`, keeping the other bits when the register can
    /// be read back.
    fn toggle_bit(&mut self, reg: u16, mask: u8, delay_us: u32) -> Result<(), B::Error> {
        let val = if self.read_write_confirmed { self.read(reg)? } else { 0 };
        self.write(reg, val | mask)?;
        self.write(reg, val & !mask)?;
        if delay_us != 0 {
            self.delay.delay_us(delay_us);
        }
        Ok(())
    }

    pub fn sysref_pulse(&mut self) -> Result<(), B::Error> {
        self.toggle_bit(REG_REQ_MODE_0, PULSE_GEN_REQ, 0)
    }

    pub fn reseed(&mut self) -> Result<(), B::Error> {
        self.toggle_bit(REG_REQ_MODE_0, RESEED_REQ, 1000)
    }

    pub fn restart_dividers(&mut self) -> Result<(), B::Error> {
        let delay_us = if self.device == DeviceId::Hmc7044 && !self.clkin1_vcoin_en { 10_000 } else { 1000 };
        self.toggle_bit(REG_REQ_MODE_0, RESTART_DIV_FSM, delay_us)
    }

    pub fn sync_pin_set(&mut self, mode: SyncPinMode) -> Result<(), B::Error> {
        let val = if self.read_write_confirmed {
            self.read(REG_GLOB_MODE)?
        } else {
            (if self.clkin0_rfsync_en { RFSYNC_EN } else { 0 }) |
            (if self.clkin1_vcoin_en { VCOIN_MODE_EN } else { 0 }) |
            0xf
        };
        self.write(REG_GLOB_MODE, (val & !SYNC_PIN_MODE_MASK) | ((mode as u8) << 6))
    }

    /// Channels with dynamic start-up keep SYNC enabled regardless.
    pub fn continuous_chan_sync_enable(&mut self, enable: bool) -> Result<(), B::Error> {
        for ch in 0..NUM_CHAN as u8 {
            if let Some(chan) = self.channels[ch as usize] {
                let sync = enable || chan.start_up_mode_dynamic_enable;
                self.write(reg_ch_out_ctrl(ch, 0), chan.ctrl0(sync))?;
            }
        }
        Ok(())
    }

    pub fn pll_status(&mut self) -> Result<PllStatus, B::Error> {
        let pll1 = self.read(REG_PLL1_STATUS)?;
        let alarm = self.read(REG_ALARM_READBACK)?;
        Ok(PllStatus {
            pll1_fsm_state: pll1 & 0x7,
            pll1_active_clkin: (pll1 >> 3) & 0x3,
            pll2_locked: alarm & 0x01 != 0,
            sysref_sync: alarm & 0x02 != 0,
            clk_out_phase_ok: alarm & 0x04 != 0,
            pll1_pll2_locked: alarm & 0x08 != 0,
            sync_req: alarm & 0x10 != 0,
        })
    }

    /// Accepts a JESD204 link whose LMFC/LEMC runs at `lmfc_hz`, narrowing
    /// the SYSREF rate common to all links accepted so far.
    pub fn add_link(&mut self, lmfc_hz: u32) -> Result<(), B::Error> {
        let (rate, dividend, gcd) = if self.lmfc_rate != 0 {
            (self.lmfc_rate.min(lmfc_hz), self.lmfc_gcd as u64, self.lmfc_gcd)
        } else {
            (lmfc_hz, self.pll2_hz, 0)
        };
        self.lmfc_gcd = search::validate_lmfc(self.pll2_hz, dividend, lmfc_hz, gcd)?;
        self.lmfc_rate = rate;
        debug!("HMC7044: LMFC {} Hz, common SYSREF {} Hz", lmfc_hz, self.lmfc_gcd);
        Ok(())
    }

    /// Slowest LMFC/LEMC among the accepted links, 0 before the first.
    pub fn lmfc_rate(&self) -> u32 {
        self.lmfc_rate
    }

    /// Moves the SYSREF channels and the SYSREF timer to the rate the
    /// accepted links share. Returns that rate.
    pub fn setup_sysref(&mut self, continuous: bool) -> Result<u32, B::Error> {
        let rate = search::sysref_rate(self.lmfc_gcd, self.desired_sysref_hz, self.max_sysref_hz);
        self.lmfc_gcd = rate;

        for ch in 0..NUM_CHAN as u8 {
            let chan = match self.channels[ch as usize] {
                Some(chan) if chan.is_sysref || chan.start_up_mode_dynamic_enable => chan,
                _ => continue
            };
            if self.round_rate(rate as u64) == rate as u64 {
                self.set_rate(chan.num, rate as u64)?;
            } else {
                error!("HMC7044: channel {} cannot run SYSREF at {} Hz", ch, rate);
            }
        }

        let timer = search::sysref_timer(self.pll2_hz, rate)?;
        self.write_sysref_timer(timer)?;

        if continuous {
            if self.pulse_gen_mode != PULSE_GEN_CONT_PULSE {
                warn!("HMC7044: forcing continuous SYSREF");
            }
            self.write(REG_PULSE_GEN, PULSE_GEN_CONT_PULSE)?;
        }
        info!("HMC7044: SYSREF at {} Hz", rate);
        Ok(rate)
    }

    pub fn shutdown(&mut self) -> Result<(), B::Error> {
        info!("HMC7044: entering sleep mode");
        self.write(REG_REQ_MODE_0, SLEEP_MODE)
    }
}
