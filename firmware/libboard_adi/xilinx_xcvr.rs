//! Xilinx GTX2/GTH3/GTH4/GTY4 transceiver configuration over the DRP.

use embedded_hal::delay::DelayNs;

use board_noos::clock::poll;
use board_noos::mmio::Mmio;
use pll::xcvr::{self as search, CpllConfig, QpllConfig, XcvrInfo, XcvrType};

use crate::{Error, Result};

/// A DRP port: the quad common block or a channel, by index.
/// `BROADCAST` addresses every block of the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Port {
    Common(u8),
    Channel(u8),
}

pub const BROADCAST: u8 = 0xff;

pub trait Drp {
    type Error;

    fn read(&mut self, port: Port, reg: u16) -> Result<u16, Self::Error>;
    fn write(&mut self, port: Port, reg: u16, val: u16) -> Result<(), Self::Error>;
}

impl<'a, T: Drp + ?Sized> Drp for &'a mut T {
    type Error = T::Error;

    fn read(&mut self, port: Port, reg: u16) -> Result<u16, T::Error> {
        (**self).read(port, reg)
    }

    fn write(&mut self, port: Port, reg: u16, val: u16) -> Result<(), T::Error> {
        (**self).write(port, reg, val)
    }
}

/// AXI_ADXCVR core registers.
pub mod adxcvr {
    pub const REG_VERSION: u32 = 0x0000;
    pub const REG_RESETN: u32 = 0x0010;
    pub const RESETN: u32 = 1 << 0;
    pub const REG_STATUS: u32 = 0x0014;
    pub const STATUS_READY: u32 = 1 << 0;
    pub const REG_CONTROL: u32 = 0x0020;
    pub const LPM_DFE_N: u32 = 1 << 12;

    pub const REG_DRP_SEL: u32 = 0x0040;
    pub const REG_DRP_CTRL: u32 = 0x0044;
    pub const DRP_WR: u32 = 1 << 28;
    pub const REG_DRP_STATUS: u32 = 0x0048;
    pub const DRP_BUSY: u32 = 1 << 16;

    pub const COMMON_OFFSET: u32 = 0x00;
    pub const CHANNEL_OFFSET: u32 = 0x20;

    pub fn sysclk_sel(x: u32) -> u32 { (x & 0x3) << 4 }
    pub fn outclk_sel(x: u32) -> u32 { x & 0x7 }
    pub fn drp_addr(x: u16) -> u32 { (x as u32 & 0xfff) << 16 }
}

const DRP_POLL_ITERATIONS: u32 = 20;
const READY_POLL_ITERATIONS: u32 = 100;

/// DRP access through the AXI_ADXCVR core, which also owns the transceiver
/// reset and clock selection.
pub struct AdxcvrDrp<M, D> {
    mmio: M,
    delay: D,
}

impl<M: Mmio, D: DelayNs> AdxcvrDrp<M, D> {
    pub fn new(mmio: M, delay: D) -> AdxcvrDrp<M, D> {
        AdxcvrDrp { mmio: mmio, delay: delay }
    }

    pub fn release(self) -> (M, D) {
        (self.mmio, self.delay)
    }

    pub fn version(&self) -> u32 {
        self.mmio.read(adxcvr::REG_VERSION)
    }

    pub fn reset(&mut self, assert: bool) {
        self.mmio.write(adxcvr::REG_RESETN, if assert { 0 } else { adxcvr::RESETN })
    }

    pub fn configure(&mut self, lpm: bool, sys_clk_sel: u32, out_clk_sel: u32) {
        self.mmio.write(adxcvr::REG_CONTROL,
                        (if lpm { adxcvr::LPM_DFE_N } else { 0 }) |
                        adxcvr::sysclk_sel(sys_clk_sel) |
                        adxcvr::outclk_sel(out_clk_sel))
    }

    /// Waits for the transceivers to come out of reset.
    pub fn wait_ready(&mut self) -> Result<()> {
        let mmio = &self.mmio;
        let ready = poll(&mut self.delay, READY_POLL_ITERATIONS, 1000,
                         || Ok::<_, ()>(mmio.read(adxcvr::REG_STATUS) & adxcvr::STATUS_READY != 0))
            .unwrap_or(false);
        if !ready {
            error!("xcvr: not ready after reset");
            return Err(Error::Timeout("xcvr ready"))
        }
        Ok(())
    }

    fn select(&mut self, port: Port) -> u32 {
        let (offset, sel) = match port {
            Port::Common(sel) => (adxcvr::COMMON_OFFSET, sel),
            Port::Channel(sel) => (adxcvr::CHANNEL_OFFSET, sel),
        };
        self.mmio.write(adxcvr::REG_DRP_SEL + offset, sel as u32);
        offset
    }

    fn wait_idle(&mut self, offset: u32, reg: u16) -> Result<u32> {
        let mmio = &self.mmio;
        let idle = poll(&mut self.delay, DRP_POLL_ITERATIONS, 1000,
                        || Ok::<_, ()>(mmio.read(adxcvr::REG_DRP_STATUS + offset) & adxcvr::DRP_BUSY == 0))
            .unwrap_or(false);
        if !idle {
            error!("xcvr: DRP timeout at 0x{:03x}", reg);
            return Err(Error::Timeout("xcvr DRP"))
        }
        Ok(self.mmio.read(adxcvr::REG_DRP_STATUS + offset))
    }
}

impl<M: Mmio, D: DelayNs> Drp for AdxcvrDrp<M, D> {
    type Error = core::convert::Infallible;

    fn read(&mut self, port: Port, reg: u16) -> Result<u16> {
        let offset = self.select(port);
        self.mmio.write(adxcvr::REG_DRP_CTRL + offset, adxcvr::drp_addr(reg));
        let status = self.wait_idle(offset, reg)?;
        Ok(status as u16)
    }

    fn write(&mut self, port: Port, reg: u16, val: u16) -> Result<()> {
        let offset = self.select(port);
        self.mmio.write(adxcvr::REG_DRP_CTRL + offset,
                        adxcvr::DRP_WR | adxcvr::drp_addr(reg) | val as u32);
        self.wait_idle(offset, reg)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Enc8b10b,
    Enc64b66b,
}

/// Reference clock frequency offset the receiver CDR must tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ppm {
    Ppm200,
    Ppm700,
    Ppm1250,
}

pub const SYSCLK_CPLL: u32 = 0;
pub const SYSCLK_QPLL0: u32 = 3;
pub const SYSCLK_QPLL1: u32 = search::GTH34_SYSCLK_QPLL1;

/// Where a lane gets its clock from and which direction it runs.
#[derive(Debug, Clone, Copy)]
pub struct Lane {
    pub channel: Port,
    pub common: Port,
    pub sys_clk_sel: u32,
    pub dir: Direction,
    pub lpm: bool,
}

mod gtx2 {
    pub const OUT_DIV: u16 = 0x88;
    pub const RX_OUT_DIV_MASK: u16 = 0x0007;
    pub const TX_OUT_DIV_MASK: u16 = 0x0070;

    pub const RXCDR_CFG0: u16 = 0xa8;
    pub const RXCDR_CFG1: u16 = 0xa9;
    pub const RXCDR_CFG2: u16 = 0xaa;
    pub const RXCDR_CFG3: u16 = 0xab;
    pub const RXCDR_CFG4: u16 = 0xac;
    pub const RXCDR_CFG4_MASK: u16 = 0xff;

    pub const RX_DFE_LPM_CFG: u16 = 0x29;

    pub const QPLL_CFG0: u16 = 0x32;
    pub const QPLL_CFG0_LOWBAND: u16 = 0x40;
    pub const QPLL_REFCLK_DIV: u16 = 0x33;
    pub const QPLL_REFCLK_DIV_MASK: u16 = 0xf800;
    pub const QPLL_FBDIV: u16 = 0x36;
    pub const QPLL_FBDIV_MASK: u16 = 0x3ff;
    pub const QPLL_FBDIV_RATIO: u16 = 0x37;
    pub const QPLL_FBDIV_RATIO_MASK: u16 = 0x40;

    pub const CPLL: u16 = 0x5e;
    pub const CPLL_REFCLK_DIV_MASK: u16 = 0x1f00;
    pub const CPLL_FB_DIV_N1: u16 = 0x80;
    pub const CPLL_FB_DIV_N2_MASK: u16 = 0x7f;

    pub const RX_CLK25_DIV: u16 = 0x11;
    pub const RX_CLK25_DIV_MASK: u16 = 0x7c0;
    pub const TX_CLK25_DIV: u16 = 0x6a;
    pub const TX_CLK25_DIV_MASK: u16 = 0x1f;

    pub const PRBS_ERR_CNT: u16 = 0x15c;

    pub const QPLL_FBDIV_CODES: [(u32, u16); 8] = [
        (16, 32), (20, 48), (32, 96), (40, 128),
        (64, 224), (66, 320), (80, 288), (100, 368),
    ];
}

mod gth34 {
    pub const CPLL_FBDIV: u16 = 0x28;
    pub const CPLL_FBDIV_MASK: u16 = 0xff80;
    pub const CPLL_FB_DIV_N1: u16 = 0x80;
    pub const CPLL_REFCLK_DIV: u16 = 0x2a;
    pub const CPLL_REFCLK_DIV_MASK: u16 = 0xf800;

    pub fn qpll_fbdiv(sel: u32) -> u16 { 0x14 + 0x80 * sel as u16 }
    pub const QPLL_FBDIV_MASK: u16 = 0xff;
    pub fn qpll_refclk_div(sel: u32) -> u16 { 0x18 + 0x80 * sel as u16 }
    pub const QPLL_REFCLK_DIV_MASK: u16 = 0xf80;
    pub fn qpll_clkout_rate(sel: u32) -> u16 { 0x0e + 0x80 * sel as u16 }

    pub const RX_OUT_DIV: u16 = 0x63;
    pub const RX_OUT_DIV_MASK: u16 = 0x7;
    pub const TX_OUT_DIV: u16 = 0x7c;
    pub const TX_OUT_DIV_MASK: u16 = 0x700;

    pub const RX_PROGDIV: u16 = 0xc6;
    pub const TX_PROGDIV: u16 = 0x3e;
    pub const GTY4_TX_PROGDIV: u16 = 0x57;
    pub const GTY4_RX_PROGDIV_RATE: u16 = 0x103;
    pub const GTY4_TX_PROGDIV_RATE: u16 = 0x105;

    pub const TX_ASYNC_GEARBOX: u16 = 0x7c;
    pub const TX_ASYNC_GEARBOX_MASK: u16 = (1 << 13) | (1 << 7);

    pub const RX_CLK25_DIV: u16 = 0x6d;
    pub const RX_CLK25_DIV_MASK: u16 = 0xf8;
    pub const TX_CLK25_DIV: u16 = 0x7a;
    pub const TX_CLK25_DIV_MASK: u16 = 0xf800;

    pub const GTH3_PRBS_ERR_CNT: u16 = 0x15e;
    pub const GTH4_PRBS_ERR_CNT: u16 = 0x25e;
}

fn refclk_div_encode(div: u32) -> u16 {
    match div {
        1 => 16,
        2 => 0,
        3 => 1,
        4 => 2,
        _ => 0,
    }
}

fn refclk_div_decode(val: u16) -> u32 {
    match val {
        16 => 1,
        0 => 2,
        1 => 3,
        2 => 4,
        _ => 1,
    }
}

fn cpll_n2_encode(n2: u32) -> u16 {
    match n2 {
        1 => 16,
        2 => 0,
        3 => 1,
        4 => 2,
        5 => 3,
        _ => 0,
    }
}

fn cpll_n2_decode(val: u16) -> u32 {
    match val {
        16 => 1,
        0 => 2,
        1 => 3,
        2 => 4,
        3 => 5,
        _ => 2,
    }
}

fn out_div_decode(val: u16) -> u32 {
    1 << (val & 0x7).min(4)
}

fn clk25_div<E>(refclk_khz: u32) -> Result<u16, E> {
    let div = (refclk_khz + 24_999) / 25_000;
    if div < 1 || div > 32 {
        return Err(Error::InvalidArgument("CLK25 divider"))
    }
    Ok(div as u16 - 1)
}

pub struct Xcvr<D> {
    drp: D,
    info: XcvrInfo,
    pub encoding: Encoding,
    pub ppm: Ppm,
}

impl<D: Drp> Xcvr<D> {
    pub fn new(drp: D, info: XcvrInfo) -> Xcvr<D> {
        Xcvr {
            drp: drp,
            info: info,
            encoding: Encoding::Enc8b10b,
            ppm: Ppm::Ppm200,
        }
    }

    pub fn release(self) -> D {
        self.drp
    }

    pub fn info(&self) -> &XcvrInfo {
        &self.info
    }

    fn xcvr_type(&self) -> XcvrType {
        self.info.xcvr_type
    }

    /// Read-modify-write of the bits in `mask`, checked by reading back.
    pub fn drp_update(&mut self, port: Port, reg: u16, mask: u16, val: u16) -> Result<(), D::Error> {
        let old = self.drp.read(port, reg)?;
        let new = (old & !mask) | (val & mask);
        self.drp.write(port, reg, new)?;
        let readback = self.drp.read(port, reg)?;
        if readback != new {
            warn!("xcvr: DRP 0x{:03x} on {:?} reads 0x{:04x}, wrote 0x{:04x}",
                  reg, port, readback, new);
        }
        Ok(())
    }

    fn drp_write(&mut self, port: Port, reg: u16, val: u16) -> Result<(), D::Error> {
        self.drp_update(port, reg, 0xffff, val)
    }

    pub fn read_cpll_config(&mut self, port: Port) -> Result<CpllConfig, D::Error> {
        match self.xcvr_type() {
            XcvrType::Gtx2 => {
                let val = self.drp.read(port, gtx2::CPLL)?;
                Ok(CpllConfig {
                    refclk_div: refclk_div_decode((val & gtx2::CPLL_REFCLK_DIV_MASK) >> 8),
                    fb_div_n1: if val & gtx2::CPLL_FB_DIV_N1 != 0 { 5 } else { 4 },
                    fb_div_n2: cpll_n2_decode(val & gtx2::CPLL_FB_DIV_N2_MASK),
                })
            }
            _ => {
                let val = self.drp.read(port, gth34::CPLL_FBDIV)?;
                let refclk = self.drp.read(port, gth34::CPLL_REFCLK_DIV)?;
                Ok(CpllConfig {
                    refclk_div: if refclk & gth34::CPLL_REFCLK_DIV_MASK == 16 << 11 { 1 } else { 2 },
                    fb_div_n1: if val & gth34::CPLL_FB_DIV_N1 != 0 { 5 } else { 4 },
                    fb_div_n2: cpll_n2_decode(val >> 8),
                })
            }
        }
    }

    pub fn write_cpll_config(&mut self, port: Port, conf: &CpllConfig) -> Result<(), D::Error> {
        let n1 = if conf.fb_div_n1 == 5 { gtx2::CPLL_FB_DIV_N1 } else { 0 };
        match self.xcvr_type() {
            XcvrType::Gtx2 => {
                let val = (refclk_div_encode(conf.refclk_div) << 8) | n1 |
                          cpll_n2_encode(conf.fb_div_n2);
                self.drp_update(port, gtx2::CPLL,
                                gtx2::CPLL_REFCLK_DIV_MASK | gtx2::CPLL_FB_DIV_N1 |
                                gtx2::CPLL_FB_DIV_N2_MASK,
                                val)
            }
            _ => {
                let val = (cpll_n2_encode(conf.fb_div_n2) << 8) | n1;
                self.drp_update(port, gth34::CPLL_FBDIV, gth34::CPLL_FBDIV_MASK, val)?;
                let refclk: u16 = if conf.refclk_div == 1 { 16 } else { 0 };
                self.drp_update(port, gth34::CPLL_REFCLK_DIV, gth34::CPLL_REFCLK_DIV_MASK,
                                refclk << 11)
            }
        }
    }

    pub fn read_qpll_config(&mut self, port: Port, sys_clk_sel: u32) -> Result<QpllConfig, D::Error> {
        match self.xcvr_type() {
            XcvrType::Gtx2 => {
                let cfg0 = self.drp.read(port, gtx2::QPLL_CFG0)?;
                let refclk = self.drp.read(port, gtx2::QPLL_REFCLK_DIV)?;
                let fbdiv = self.drp.read(port, gtx2::QPLL_FBDIV)? & gtx2::QPLL_FBDIV_MASK;
                let fb_div = gtx2::QPLL_FBDIV_CODES.iter()
                    .find(|&&(_, code)| code == fbdiv)
                    .map(|&(n, _)| n)
                    .ok_or(pll::Error::InvalidDivider { what: "QPLL FBDIV", value: fbdiv as u32 })?;
                Ok(QpllConfig {
                    refclk_div: refclk_div_decode((refclk & gtx2::QPLL_REFCLK_DIV_MASK) >> 11),
                    fb_div: fb_div,
                    band: if cfg0 & gtx2::QPLL_CFG0_LOWBAND != 0 { 0 } else { 1 },
                    gty4_full_rate: false,
                })
            }
            xcvr_type => {
                let sel = search::qpll_sel(xcvr_type, sys_clk_sel);
                let fbdiv = self.drp.read(port, gth34::qpll_fbdiv(sel))?;
                let refclk = self.drp.read(port, gth34::qpll_refclk_div(sel))?;
                let full_rate = if xcvr_type == XcvrType::Gty4 {
                    self.drp.read(port, gth34::qpll_clkout_rate(sel))? & 1 != 0
                } else {
                    false
                };
                // separate QPLLs instead of VCO bands
                Ok(QpllConfig {
                    refclk_div: refclk_div_decode((refclk & gth34::QPLL_REFCLK_DIV_MASK) >> 7),
                    fb_div: (fbdiv & gth34::QPLL_FBDIV_MASK) as u32 + 2,
                    band: 0,
                    gty4_full_rate: full_rate,
                })
            }
        }
    }

    pub fn write_qpll_config(&mut self, port: Port, sys_clk_sel: u32, conf: &QpllConfig)
                            -> Result<(), D::Error> {
        match self.xcvr_type() {
            XcvrType::Gtx2 => {
                let fbdiv = gtx2::QPLL_FBDIV_CODES.iter()
                    .find(|&&(n, _)| n == conf.fb_div)
                    .map(|&(_, code)| code)
                    .ok_or(pll::Error::InvalidDivider { what: "QPLL FBDIV", value: conf.fb_div })?;
                self.drp_update(port, gtx2::QPLL_CFG0, gtx2::QPLL_CFG0_LOWBAND,
                                if conf.band != 0 { 0 } else { gtx2::QPLL_CFG0_LOWBAND })?;
                self.drp_update(port, gtx2::QPLL_REFCLK_DIV, gtx2::QPLL_REFCLK_DIV_MASK,
                                refclk_div_encode(conf.refclk_div) << 11)?;
                self.drp_update(port, gtx2::QPLL_FBDIV, gtx2::QPLL_FBDIV_MASK, fbdiv)?;
                self.drp_update(port, gtx2::QPLL_FBDIV_RATIO, gtx2::QPLL_FBDIV_RATIO_MASK,
                                if conf.fb_div == 66 { 0 } else { gtx2::QPLL_FBDIV_RATIO_MASK })
            }
            xcvr_type => {
                let sel = search::qpll_sel(xcvr_type, sys_clk_sel);
                self.drp_update(port, gth34::qpll_fbdiv(sel), gth34::QPLL_FBDIV_MASK,
                                (conf.fb_div - 2) as u16)?;
                self.drp_update(port, gth34::qpll_refclk_div(sel), gth34::QPLL_REFCLK_DIV_MASK,
                                refclk_div_encode(conf.refclk_div) << 7)?;
                if xcvr_type == XcvrType::Gty4 {
                    self.drp_update(port, gth34::qpll_clkout_rate(sel), 1,
                                    conf.gty4_full_rate as u16)?;
                }
                Ok(())
            }
        }
    }

    pub fn read_out_div(&mut self, port: Port, dir: Direction) -> Result<u32, D::Error> {
        let val = match (self.xcvr_type(), dir) {
            (XcvrType::Gtx2, Direction::Rx) =>
                self.drp.read(port, gtx2::OUT_DIV)? & gtx2::RX_OUT_DIV_MASK,
            (XcvrType::Gtx2, Direction::Tx) =>
                (self.drp.read(port, gtx2::OUT_DIV)? & gtx2::TX_OUT_DIV_MASK) >> 4,
            (_, Direction::Rx) =>
                self.drp.read(port, gth34::RX_OUT_DIV)? & gth34::RX_OUT_DIV_MASK,
            (_, Direction::Tx) =>
                (self.drp.read(port, gth34::TX_OUT_DIV)? & gth34::TX_OUT_DIV_MASK) >> 8,
        };
        Ok(out_div_decode(val))
    }

    pub fn write_out_div(&mut self, port: Port, dir: Direction, out_div: u32) -> Result<(), D::Error> {
        let val = search::out_div_to_val(out_div) as u16;
        match (self.xcvr_type(), dir) {
            (XcvrType::Gtx2, Direction::Rx) =>
                self.drp_update(port, gtx2::OUT_DIV, gtx2::RX_OUT_DIV_MASK, val),
            (XcvrType::Gtx2, Direction::Tx) =>
                self.drp_update(port, gtx2::OUT_DIV, gtx2::TX_OUT_DIV_MASK, val << 4),
            (_, Direction::Rx) =>
                self.drp_update(port, gth34::RX_OUT_DIV, gth34::RX_OUT_DIV_MASK, val),
            (_, Direction::Tx) =>
                self.drp_update(port, gth34::TX_OUT_DIV, gth34::TX_OUT_DIV_MASK, val << 8),
        }
    }

    pub fn write_prog_div(&mut self, port: Port, dir: Direction, div: u32) -> Result<(), D::Error> {
        let val = search::prog_div_to_val(self.xcvr_type(), div)? as u16;
        let reg = match dir {
            Direction::Rx => gth34::RX_PROGDIV,
            Direction::Tx if self.xcvr_type() == XcvrType::Gty4 => gth34::GTY4_TX_PROGDIV,
            Direction::Tx => gth34::TX_PROGDIV,
        };
        self.drp_write(port, reg, val)
    }

    /// GTY4 only; a no-op on the other transceivers.
    pub fn write_prog_div_rate(&mut self, port: Port, dir: Direction, full_rate: bool)
                              -> Result<(), D::Error> {
        if self.xcvr_type() != XcvrType::Gty4 {
            return Ok(())
        }
        let reg = match dir {
            Direction::Rx => gth34::GTY4_RX_PROGDIV_RATE,
            Direction::Tx => gth34::GTY4_TX_PROGDIV_RATE,
        };
        self.drp_update(port, reg, 1, full_rate as u16)
    }

    pub fn write_async_gearbox_en(&mut self, port: Port, enable: bool) -> Result<(), D::Error> {
        match self.xcvr_type() {
            XcvrType::Gth4 | XcvrType::Gty4 =>
                self.drp_update(port, gth34::TX_ASYNC_GEARBOX, gth34::TX_ASYNC_GEARBOX_MASK,
                                if enable { gth34::TX_ASYNC_GEARBOX_MASK } else { 0 }),
            _ => Err(Error::InvalidArgument("async gearbox needs GTH4 or GTY4")),
        }
    }

    pub fn write_rx_clk25_div(&mut self, port: Port, refclk_khz: u32) -> Result<(), D::Error> {
        let div = clk25_div(refclk_khz)?;
        match self.xcvr_type() {
            XcvrType::Gtx2 =>
                self.drp_update(port, gtx2::RX_CLK25_DIV, gtx2::RX_CLK25_DIV_MASK, div << 6),
            _ =>
                self.drp_update(port, gth34::RX_CLK25_DIV, gth34::RX_CLK25_DIV_MASK, div << 3),
        }
    }

    pub fn write_tx_clk25_div(&mut self, port: Port, refclk_khz: u32) -> Result<(), D::Error> {
        let div = clk25_div(refclk_khz)?;
        match self.xcvr_type() {
            XcvrType::Gtx2 =>
                self.drp_update(port, gtx2::TX_CLK25_DIV, gtx2::TX_CLK25_DIV_MASK, div),
            _ =>
                self.drp_update(port, gth34::TX_CLK25_DIV, gth34::TX_CLK25_DIV_MASK, div << 11),
        }
    }

    /// Receiver CDR settings. Only the GTX2 needs them.
    pub fn configure_cdr(&mut self, port: Port, lane_rate_khz: u32, out_div: u32, lpm: bool)
                        -> Result<(), D::Error> {
        if self.xcvr_type() != XcvrType::Gtx2 {
            return Ok(())
        }

        let cfg0 = 0x0020;
        let cfg2 = 0x23ff;
        let cfg3 = match self.ppm {
            Ppm::Ppm200 => 0x0000,
            Ppm::Ppm700 | Ppm::Ppm1250 => 0x8000,
        };
        let fast = lane_rate_khz > 6_600_000;
        let cfg4 = if fast && out_div == 1 { 0x0b } else { 0x03 };

        let cfg1 = match (self.encoding, out_div) {
            (Encoding::Enc8b10b, 1) => 0x1040,
            (Encoding::Enc8b10b, 2) => 0x1020,
            (Encoding::Enc8b10b, 4) => 0x1010,
            (Encoding::Enc8b10b, 8) => 0x1008,
            (Encoding::Enc64b66b, 1) => {
                if self.ppm == Ppm::Ppm1250 {
                    0x1020
                } else if fast {
                    0x1040
                } else if lpm {
                    0x1020
                } else {
                    0x2040
                }
            }
            (Encoding::Enc64b66b, 2) => 0x4020,
            (Encoding::Enc64b66b, 4) => 0x4010,
            (Encoding::Enc64b66b, 8) => 0x4008,
            _ => return Err(Error::InvalidArgument("CDR output divider")),
        };

        self.drp_write(port, gtx2::RXCDR_CFG0, cfg0)?;
        self.drp_write(port, gtx2::RXCDR_CFG1, cfg1)?;
        self.drp_write(port, gtx2::RXCDR_CFG2, cfg2)?;
        self.drp_write(port, gtx2::RXCDR_CFG3, cfg3)?;
        self.drp_update(port, gtx2::RXCDR_CFG4, gtx2::RXCDR_CFG4_MASK, cfg4)
    }

    pub fn configure_lpm_dfe_mode(&mut self, port: Port, lpm: bool) -> Result<(), D::Error> {
        match self.xcvr_type() {
            XcvrType::Gtx2 =>
                self.drp_write(port, gtx2::RX_DFE_LPM_CFG, if lpm { 0x0104 } else { 0x0954 }),
            _ => {
                let values: [(u16, u16); 3] = if lpm {
                    [(0x036, 0x0032), (0x039, 0x1000), (0x062, 0x1980)]
                } else {
                    [(0x036, 0x0002), (0x039, 0x0000), (0x062, 0x0000)]
                };
                for &(reg, val) in values.iter() {
                    self.drp_write(port, reg, val)?;
                }
                Ok(())
            }
        }
    }

    pub fn prbs_err_cnt(&mut self, port: Port) -> Result<u32, D::Error> {
        let reg = match self.xcvr_type() {
            XcvrType::Gtx2 => return Ok(self.drp.read(port, gtx2::PRBS_ERR_CNT)? as u32),
            XcvrType::Gth3 => gth34::GTH3_PRBS_ERR_CNT,
            XcvrType::Gth4 | XcvrType::Gty4 => gth34::GTH4_PRBS_ERR_CNT,
        };
        let lo = self.drp.read(port, reg)? as u32;
        let hi = self.drp.read(port, reg + 1)? as u32;
        Ok((hi << 16) | lo)
    }

    /// Programs the lane's PLL, output divider, CDR and CLK25 divider for
    /// `lane_rate_khz`. Returns the output divider.
    pub fn set_lane_rate(&mut self, lane: &Lane, refclk_khz: u32, lane_rate_khz: u32)
                        -> Result<u32, D::Error> {
        let out_div = if lane.sys_clk_sel == SYSCLK_CPLL {
            let (conf, out_div) = search::calc_cpll_config(&self.info, refclk_khz, lane_rate_khz)?;
            debug!("xcvr: CPLL M={} N1={} N2={} D={}",
                   conf.refclk_div, conf.fb_div_n1, conf.fb_div_n2, out_div);
            self.write_cpll_config(lane.channel, &conf)?;
            out_div
        } else {
            let (conf, out_div) = search::calc_qpll_config(&self.info, lane.sys_clk_sel,
                                                           refclk_khz, lane_rate_khz)?;
            debug!("xcvr: QPLL M={} N={} band={} D={}",
                   conf.refclk_div, conf.fb_div, conf.band, out_div);
            self.write_qpll_config(lane.common, lane.sys_clk_sel, &conf)?;
            out_div
        };

        self.write_out_div(lane.channel, lane.dir, out_div)?;
        match lane.dir {
            Direction::Rx => {
                self.configure_cdr(lane.channel, lane_rate_khz, out_div, lane.lpm)?;
                self.write_rx_clk25_div(lane.channel, refclk_khz)?;
            }
            Direction::Tx => self.write_tx_clk25_div(lane.channel, refclk_khz)?,
        }
        info!("xcvr: lane rate {} kHz from {} kHz reference", lane_rate_khz, refclk_khz);
        Ok(out_div)
    }

    /// Lane rate in kHz the current register contents produce.
    pub fn lane_rate(&mut self, lane: &Lane, refclk_hz: u32) -> Result<u32, D::Error> {
        let out_div = self.read_out_div(lane.channel, lane.dir)?;
        if lane.sys_clk_sel == SYSCLK_CPLL {
            let conf = self.read_cpll_config(lane.channel)?;
            Ok(search::cpll_lane_rate(refclk_hz, &conf, out_div))
        } else {
            let conf = self.read_qpll_config(lane.common, lane.sys_clk_sel)?;
            Ok(search::qpll_lane_rate(refclk_hz, &conf, out_div))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use board_noos::mock::{MockMmio, NoDelay};

    #[derive(Default)]
    struct MockDrp {
        regs: BTreeMap<(Port, u16), u16>,
        writes: usize,
        /// Bits that read back as zero, to model read-only fields.
        stuck: u16,
    }

    impl Drp for MockDrp {
        type Error = ();

        fn read(&mut self, port: Port, reg: u16) -> Result<u16, ()> {
            Ok(self.regs.get(&(port, reg)).cloned().unwrap_or(0) & !self.stuck)
        }

        fn write(&mut self, port: Port, reg: u16, val: u16) -> Result<(), ()> {
            self.writes += 1;
            self.regs.insert((port, reg), val);
            Ok(())
        }
    }

    const CH: Port = Port::Channel(0);
    const CM: Port = Port::Common(0);

    fn lane(sys_clk_sel: u32, dir: Direction) -> Lane {
        Lane { channel: CH, common: CM, sys_clk_sel: sys_clk_sel, dir: dir, lpm: false }
    }

    #[test]
    fn gtx2_cpll_lane() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gtx2));
        let rx = lane(SYSCLK_CPLL, Direction::Rx);
        assert_eq!(xcvr.set_lane_rate(&rx, 125_000, 2_500_000).unwrap(), 2);
        assert_eq!(xcvr.lane_rate(&rx, 125_000_000).unwrap(), 2_500_000);

        let drp = xcvr.release();
        assert_eq!(drp.regs[&(CH, gtx2::CPLL)], 0x1082);
        assert_eq!(drp.regs[&(CH, gtx2::OUT_DIV)], 1);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG0)], 0x0020);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG1)], 0x1020);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG2)], 0x23ff);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG4)], 0x03);
        assert_eq!(drp.regs[&(CH, gtx2::RX_CLK25_DIV)], 4 << 6);
    }

    #[test]
    fn gtx2_qpll_lane_64b66b() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gtx2));
        xcvr.encoding = Encoding::Enc64b66b;
        let rx = lane(SYSCLK_QPLL0, Direction::Rx);
        assert_eq!(xcvr.set_lane_rate(&rx, 500_000, 10_000_000).unwrap(), 1);
        assert_eq!(xcvr.read_qpll_config(CM, SYSCLK_QPLL0).unwrap(),
                   QpllConfig { refclk_div: 1, fb_div: 20, band: 1, gty4_full_rate: false });
        assert_eq!(xcvr.lane_rate(&rx, 500_000_000).unwrap(), 10_000_000);

        let drp = xcvr.release();
        assert_eq!(drp.regs[&(CM, gtx2::QPLL_CFG0)], 0);
        assert_eq!(drp.regs[&(CM, gtx2::QPLL_REFCLK_DIV)], 16 << 11);
        assert_eq!(drp.regs[&(CM, gtx2::QPLL_FBDIV)], 48);
        assert_eq!(drp.regs[&(CM, gtx2::QPLL_FBDIV_RATIO)], 0x40);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG1)], 0x1040);
        assert_eq!(drp.regs[&(CH, gtx2::RXCDR_CFG4)], 0x0b);
    }

    #[test]
    fn gth4_qpll0_lane() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gth4));
        let tx = lane(SYSCLK_QPLL0, Direction::Tx);
        assert_eq!(xcvr.set_lane_rate(&tx, 250_000, 10_000_000).unwrap(), 1);
        assert_eq!(xcvr.lane_rate(&tx, 250_000_000).unwrap(), 10_000_000);

        let drp = xcvr.release();
        assert_eq!(drp.regs[&(CM, gth34::qpll_fbdiv(0))], 38);
        assert_eq!(drp.regs[&(CM, gth34::qpll_refclk_div(0))], 16 << 7);
        assert_eq!(drp.regs[&(CH, gth34::TX_CLK25_DIV)], 9 << 11);
        // no CDR writes for UltraScale
        assert!(!drp.regs.contains_key(&(CH, gtx2::RXCDR_CFG0)));
    }

    #[test]
    fn gth3_cpll_round_trip() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gth3));
        let conf = CpllConfig { refclk_div: 1, fb_div_n1: 5, fb_div_n2: 4 };
        xcvr.write_cpll_config(CH, &conf).unwrap();
        assert_eq!(xcvr.read_cpll_config(CH).unwrap(), conf);
    }

    #[test]
    fn out_div_per_direction() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gtx2));
        xcvr.write_out_div(CH, Direction::Rx, 4).unwrap();
        xcvr.write_out_div(CH, Direction::Tx, 8).unwrap();
        assert_eq!(xcvr.read_out_div(CH, Direction::Rx).unwrap(), 4);
        assert_eq!(xcvr.read_out_div(CH, Direction::Tx).unwrap(), 8);
        assert_eq!(xcvr.release().regs[&(CH, gtx2::OUT_DIV)], 0x32);
    }

    #[test]
    fn ultrascale_only_settings() {
        let mut gtx2 = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gtx2));
        assert!(gtx2.write_prog_div(CH, Direction::Rx, 20).is_err());
        assert!(gtx2.write_async_gearbox_en(CH, true).is_err());

        let mut gty4 = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gty4));
        gty4.write_prog_div(CH, Direction::Tx, 0).unwrap();
        gty4.write_prog_div_rate(CH, Direction::Rx, true).unwrap();
        gty4.write_async_gearbox_en(CH, true).unwrap();
        let drp = gty4.release();
        assert_eq!(drp.regs[&(CH, gth34::GTY4_TX_PROGDIV)], 32768);
        assert_eq!(drp.regs[&(CH, gth34::GTY4_RX_PROGDIV_RATE)], 1);
        assert_eq!(drp.regs[&(CH, gth34::TX_ASYNC_GEARBOX)], 0x2080);
    }

    #[test]
    fn clk25_limits() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gth3));
        assert_eq!(xcvr.write_rx_clk25_div(CH, 900_000),
                   Err(Error::InvalidArgument("CLK25 divider")));
        xcvr.write_rx_clk25_div(CH, 800_000).unwrap();
        assert_eq!(xcvr.release().regs[&(CH, gth34::RX_CLK25_DIV)], 31 << 3);
    }

    #[test]
    fn lpm_dfe_and_prbs() {
        let mut xcvr = Xcvr::new(MockDrp::default(), XcvrInfo::new(XcvrType::Gth4));
        xcvr.configure_lpm_dfe_mode(CH, true).unwrap();
        let mut drp = xcvr.release();
        assert_eq!(drp.regs[&(CH, 0x062)], 0x1980);

        drp.regs.insert((CH, gth34::GTH4_PRBS_ERR_CNT), 0x0005);
        drp.regs.insert((CH, gth34::GTH4_PRBS_ERR_CNT + 1), 0x0001);
        let mut xcvr = Xcvr::new(drp, XcvrInfo::new(XcvrType::Gth4));
        assert_eq!(xcvr.prbs_err_cnt(CH).unwrap(), 0x1_0005);
    }

    #[test]
    fn readback_mismatch_is_not_fatal() {
        let drp = MockDrp { stuck: 0x0001, ..MockDrp::default() };
        let mut xcvr = Xcvr::new(drp, XcvrInfo::new(XcvrType::Gtx2));
        xcvr.drp_update(CH, 0x40, 0xffff, 0x0003).unwrap();
        assert_eq!(xcvr.release().writes, 1);
    }

    const DRP_SHADOW: u32 = 0x1_0000;

    fn adxcvr_mmio() -> MockMmio {
        let mut mmio = MockMmio::new();
        mmio.on_write(|regs, offset, val| {
            let port = match offset {
                adxcvr::REG_DRP_CTRL => adxcvr::COMMON_OFFSET,
                o if o == adxcvr::REG_DRP_CTRL + adxcvr::CHANNEL_OFFSET => adxcvr::CHANNEL_OFFSET,
                _ => return
            };
            let key = DRP_SHADOW + (port << 12) + ((val >> 16) & 0xfff);
            if val & adxcvr::DRP_WR != 0 {
                regs.insert(key, val & 0xffff);
            } else {
                let data = regs.get(&key).cloned().unwrap_or(0);
                regs.insert(adxcvr::REG_DRP_STATUS + port, data);
            }
        });
        mmio
    }

    #[test]
    fn adxcvr_drp_access() {
        let mut drp = AdxcvrDrp::new(adxcvr_mmio(), NoDelay::new());
        drp.write(Port::Channel(BROADCAST), 0x88, 0x0012).unwrap();
        drp.write(Port::Common(0), 0x88, 0x0034).unwrap();
        assert_eq!(drp.read(Port::Channel(2), 0x88).unwrap(), 0x0012);
        assert_eq!(drp.read(Port::Common(0), 0x88).unwrap(), 0x0034);

        let (mmio, _) = drp.release();
        assert_eq!(mmio.written(adxcvr::REG_DRP_SEL + adxcvr::CHANNEL_OFFSET), &[0xff, 2]);
    }

    #[test]
    fn adxcvr_core_control() {
        let mut drp = AdxcvrDrp::new(MockMmio::new(), NoDelay::new());
        drp.reset(true);
        drp.configure(true, SYSCLK_QPLL0, 2);
        assert_eq!(drp.wait_ready(), Err(Error::Timeout("xcvr ready")));
        drp.reset(false);

        let (mmio, delay) = drp.release();
        assert_eq!(mmio.written(adxcvr::REG_RESETN), &[0, 1]);
        assert_eq!(mmio.read(adxcvr::REG_CONTROL), (1 << 12) | (3 << 4) | 2);
        assert_eq!(delay.elapsed_ns(), 100 * 1_000_000);
    }

    #[test]
    fn adxcvr_drp_busy() {
        let mut mmio = MockMmio::new();
        mmio.set(adxcvr::REG_DRP_STATUS, adxcvr::DRP_BUSY);
        let mut drp = AdxcvrDrp::new(mmio, NoDelay::new());
        assert_eq!(drp.read(Port::Common(0), 0x32), Err(Error::Timeout("xcvr DRP")));
    }
}
