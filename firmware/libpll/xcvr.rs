//! Xilinx GTX2/GTH3/GTH4/GTY4 channel (CPLL) and quad (QPLL) PLL search.
//!
//! CPLL: fVCO = fREF * N1 * N2 / M, lane rate = fVCO * 2 / D.
//! QPLL: fVCO = fREF * N / M, lane rate = fVCO / D (twice that for GTY4 in
//! full rate mode).

use super::{div_round_closest, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XcvrType {
    Gtx2,
    Gth3,
    Gth4,
    Gty4,
}

impl XcvrType {
    pub fn is_ultrascale(self) -> bool {
        self != XcvrType::Gtx2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpgaFamily {
    Unknown,
    Artix,
    Kintex,
    Virtex,
    Zynq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpgaPackage {
    Unknown,
    Rf,
    Fl,
    Ff,
    Fb,
    Hc,
    Fh,
    Cs,
    Cp,
    Ft,
    Fg,
    Sb,
    Rb,
    Rs,
    Cl,
    Sf,
    Ba,
    Fa,
}

#[derive(Debug, Clone, Copy)]
pub struct XcvrInfo {
    pub xcvr_type: XcvrType,
    /// Major version of the transceiver pcore.
    pub version_major: u32,
    pub voltage_mv: u32,
    /// Speed grade times ten, e.g. 20 for -2.
    pub speed_grade: u32,
    pub family: FpgaFamily,
    pub package: FpgaPackage,
    /// Non-zero values override the silicon defaults, in kHz.
    pub vco0_min: u32,
    pub vco0_max: u32,
    pub vco1_min: u32,
    pub vco1_max: u32,
}

impl XcvrInfo {
    pub fn new(xcvr_type: XcvrType) -> XcvrInfo {
        XcvrInfo {
            xcvr_type: xcvr_type,
            version_major: 0,
            voltage_mv: 0,
            speed_grade: 0,
            family: FpgaFamily::Unknown,
            package: FpgaPackage::Unknown,
            vco0_min: 0,
            vco0_max: 0,
            vco1_min: 0,
            vco1_max: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcoRange {
    pub min: u32,
    pub max: u32,
}

impl VcoRange {
    pub fn contains(&self, khz: u32) -> bool {
        khz >= self.min && khz <= self.max
    }
}

pub const GTH34_SYSCLK_QPLL1: u32 = 2;

/// Which of the two quad PLLs of an UltraScale quad `sys_clk_sel` selects.
pub fn qpll_sel(xcvr_type: XcvrType, sys_clk_sel: u32) -> u32 {
    if xcvr_type.is_ultrascale() && sys_clk_sel == GTH34_SYSCLK_QPLL1 {
        1
    } else {
        0
    }
}

pub fn cpll_vco_range(info: &XcvrInfo) -> VcoRange {
    let mut range = match info.xcvr_type {
        XcvrType::Gtx2 => VcoRange { min: 1_600_000, max: 3_300_000 },
        _ => VcoRange { min: 2_000_000, max: 6_250_000 },
    };

    if info.version_major > 0x10 {
        match info.xcvr_type {
            XcvrType::Gth3 | XcvrType::Gth4 => {
                if info.voltage_mv < 850 || info.speed_grade / 10 == 1 {
                    range.max = 4_250_000;
                }
            }
            XcvrType::Gty4 => {
                if info.speed_grade / 10 == 1 {
                    range.max = 4_250_000;
                }
            }
            XcvrType::Gtx2 => ()
        }
    }

    if info.vco0_min != 0 {
        range.min = info.vco0_min;
    }
    if info.vco0_max != 0 {
        range.max = info.vco0_max;
    }
    range
}

/// Returns the (band 0, band 1) VCO windows.
pub fn qpll_vco_ranges(info: &XcvrInfo, sys_clk_sel: u32) -> (VcoRange, VcoRange) {
    let (mut vco0, mut vco1) = match info.xcvr_type {
        XcvrType::Gtx2 =>
            (VcoRange { min: 5_930_000, max: 8_000_000 },
             VcoRange { min: 9_800_000, max: 12_500_000 }),
        _ => {
            let range = if qpll_sel(info.xcvr_type, sys_clk_sel) == 1 {
                VcoRange { min: 8_000_000, max: 13_000_000 }
            } else {
                VcoRange { min: 9_800_000, max: 16_375_000 }
            };
            (range, range)
        }
    };

    if info.version_major > 0x10 && info.xcvr_type == XcvrType::Gtx2 {
        if info.family == FpgaFamily::Kintex {
            match info.package {
                FpgaPackage::Fb | FpgaPackage::Rf | FpgaPackage::Ff => vco0.max = 6_600_000,
                _ => ()
            }
        }
        if info.speed_grade / 10 == 2 {
            vco1.max = 10_312_500;
        }
    }

    if info.vco0_min != 0 { vco0.min = info.vco0_min }
    if info.vco0_max != 0 { vco0.max = info.vco0_max }
    if info.vco1_min != 0 { vco1.min = info.vco1_min }
    if info.vco1_max != 0 { vco1.max = info.vco1_max }
    (vco0, vco1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpllConfig {
    pub refclk_div: u32,
    pub fb_div_n1: u32,
    pub fb_div_n2: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QpllConfig {
    pub refclk_div: u32,
    pub fb_div: u32,
    pub band: u32,
    pub gty4_full_rate: bool,
}

/// Finds CPLL dividers and the channel output divider for a lane rate.
pub fn calc_cpll_config(info: &XcvrInfo, refclk_khz: u32, lane_rate_khz: u32)
                       -> Result<(CpllConfig, u32), Error> {
    let vco = cpll_vco_range(info);

    for m in 1..=2u32 {
        for &d in [1u32, 2, 4, 8].iter() {
            for n1 in (4..=5u32).rev() {
                for n2 in (1..=5u32).rev() {
                    let vco_freq = (refclk_khz as u64 * n1 as u64 * n2 as u64 / m as u64) as u32;
                    if !vco.contains(vco_freq) {
                        continue
                    }

                    if refclk_khz / m / d == lane_rate_khz / (2 * n1 * n2) {
                        let conf = CpllConfig { refclk_div: m, fb_div_n1: n1, fb_div_n2: n2 };
                        return Ok((conf, d))
                    }
                }
            }
        }
    }

    debug!("CPLL: no setting for lane rate {} kHz with reference clock {} kHz",
           lane_rate_khz, refclk_khz);
    Err(Error::NoSolution)
}

const N_GTX2: [u32; 8] = [16, 20, 32, 40, 64, 66, 80, 100];
const N_GTY4: [u32; 17] = [16, 20, 32, 33, 40, 64, 66, 75, 80, 99, 100, 112, 120, 125, 132, 150, 160];

fn qpll_fb_dividers(xcvr_type: XcvrType) -> impl Iterator<Item = u32> {
    let empty: &'static [u32] = &[];
    let (table, range) = match xcvr_type {
        XcvrType::Gtx2 => (&N_GTX2[..], 1..=0),
        XcvrType::Gth3 | XcvrType::Gth4 => (empty, 16..=160),
        XcvrType::Gty4 => (&N_GTY4[..], 1..=0),
    };
    table.iter().cloned().chain(range)
}

/// Finds QPLL dividers, the VCO band and the channel output divider for a
/// lane rate.
pub fn calc_qpll_config(info: &XcvrInfo, sys_clk_sel: u32, refclk_khz: u32, lane_rate_khz: u32)
                       -> Result<(QpllConfig, u32), Error> {
    let (vco0, vco1) = qpll_vco_ranges(info, sys_clk_sel);

    for m in 1..=4u32 {
        for &d in [1u32, 2, 4, 8, 16].iter() {
            for n in qpll_fb_dividers(info.xcvr_type) {
                let vco_freq = (refclk_khz as u64 * n as u64 / m as u64) as u32;

                let band = if vco1.contains(vco_freq) {
                    1
                } else if vco0.contains(vco_freq) {
                    0
                } else {
                    continue
                };

                let conf = QpllConfig { refclk_div: m, fb_div: n, band: band, gty4_full_rate: false };
                if refclk_khz / m / d == lane_rate_khz / n {
                    return Ok((conf, d))
                }

                if info.xcvr_type == XcvrType::Gty4 && refclk_khz / m / d == lane_rate_khz / 2 / n {
                    return Ok((QpllConfig { gty4_full_rate: true, ..conf }, d))
                }
            }
        }
    }

    debug!("QPLL: no setting for lane rate {} kHz with reference clock {} kHz",
           lane_rate_khz, refclk_khz);
    Err(Error::NoSolution)
}

/// Lane rate in kHz produced by a CPLL configuration.
pub fn cpll_lane_rate(refclk_hz: u32, conf: &CpllConfig, out_div: u32) -> u32 {
    if conf.refclk_div == 0 || out_div == 0 {
        return 0
    }
    div_round_closest(refclk_hz as u64 * conf.fb_div_n1 as u64 * conf.fb_div_n2 as u64 * 2,
                      conf.refclk_div as u64 * out_div as u64 * 1000) as u32
}

/// Lane rate in kHz produced by a QPLL configuration.
pub fn qpll_lane_rate(refclk_hz: u32, conf: &QpllConfig, out_div: u32) -> u32 {
    if conf.refclk_div == 0 || out_div == 0 {
        return 0
    }
    let mut refclk = refclk_hz as u64;
    if conf.gty4_full_rate {
        refclk *= 2;
    }
    div_round_closest(refclk * conf.fb_div as u64,
                      conf.refclk_div as u64 * out_div as u64 * 1000) as u32
}

pub fn out_div_to_val(out_div: u32) -> u32 {
    match out_div {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        _ => 4,
    }
}

/// PROGDIV attribute encoding. 0 disables the divider; 17 stands for 16.5.
pub fn prog_div_to_val(xcvr_type: XcvrType, div: u32) -> Result<u32, Error> {
    let val = match xcvr_type {
        XcvrType::Gth3 => match div {
            4 => 57744,
            5 => 49648,
            8 => 57728,
            10 => 57760,
            16 => 57730,
            17 => 49672,
            20 => 57762,
            32 => 57734,
            33 => 49800,
            40 => 57766,
            64 => 57742,
            66 => 50056,
            80 => 57743,
            100 => 57775,
            _ => 32768,
        },
        XcvrType::Gth4 | XcvrType::Gty4 => match div {
            4 => 57432,
            5 => 57464,
            8 => 57408,
            10 => 57440,
            16 => 57410,
            17 => 57880,
            20 => 57442,
            32 => 57414,
            33 => 57856,
            40 => 57415,
            64 => 57422,
            66 => 57858,
            80 => 57423,
            100 => 57455,
            128 => 24654,
            132 => 57862,
            _ => 32768,
        },
        XcvrType::Gtx2 => return Err(Error::InvalidDivider { what: "PROGDIV", value: div }),
    };
    Ok(val)
}

const PRBS_GTX2: [u32; 5] = [0, 7, 15, 23, 31];
const PRBS_GTH_GTY: [u32; 6] = [0, 7, 9, 15, 23, 31];

fn prbs_table(xcvr_type: XcvrType) -> &'static [u32] {
    match xcvr_type {
        XcvrType::Gtx2 => &PRBS_GTX2,
        _ => &PRBS_GTH_GTY,
    }
}

/// PRBSSEL encoding of a PRBS polynomial order (0 disables the checker).
pub fn prbs_sel_encode(xcvr_type: XcvrType, prbs: u32) -> Option<u32> {
    prbs_table(xcvr_type).iter().position(|&p| p == prbs).map(|i| i as u32)
}

pub fn prbs_sel_decode(xcvr_type: XcvrType, sel: u32) -> Option<u32> {
    prbs_table(xcvr_type).get(sel as usize).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gtx2_cpll_2_5g_lane() {
        let info = XcvrInfo::new(XcvrType::Gtx2);
        let (conf, out_div) = calc_cpll_config(&info, 125_000, 2_500_000).unwrap();
        assert_eq!(conf, CpllConfig { refclk_div: 1, fb_div_n1: 5, fb_div_n2: 4 });
        assert_eq!(out_div, 2);
        assert_eq!(cpll_lane_rate(125_000_000, &conf, out_div), 2_500_000);
    }

    #[test]
    fn cpll_lane_rate_round_trip() {
        let info = XcvrInfo::new(XcvrType::Gth3);
        let (conf, out_div) = calc_cpll_config(&info, 250_000, 5_000_000).unwrap();
        assert_eq!(cpll_lane_rate(250_000_000, &conf, out_div), 5_000_000);
    }

    #[test]
    fn slow_gth_caps_cpll_vco() {
        let mut info = XcvrInfo::new(XcvrType::Gth4);
        info.version_major = 0x11;
        info.voltage_mv = 800;
        assert_eq!(cpll_vco_range(&info).max, 4_250_000);
        info.version_major = 0x10;
        assert_eq!(cpll_vco_range(&info).max, 6_250_000);
        info.vco0_max = 5_000_000;
        assert_eq!(cpll_vco_range(&info).max, 5_000_000);
    }

    #[test]
    fn gtx2_qpll_ranges_adjusted() {
        let mut info = XcvrInfo::new(XcvrType::Gtx2);
        info.version_major = 0x11;
        info.family = FpgaFamily::Kintex;
        info.package = FpgaPackage::Ff;
        info.speed_grade = 20;
        let (vco0, vco1) = qpll_vco_ranges(&info, 0);
        assert_eq!(vco0.max, 6_600_000);
        assert_eq!(vco1.max, 10_312_500);
    }

    #[test]
    fn gth_qpll1_window() {
        let info = XcvrInfo::new(XcvrType::Gth3);
        let (vco0, vco1) = qpll_vco_ranges(&info, GTH34_SYSCLK_QPLL1);
        assert_eq!(vco0, VcoRange { min: 8_000_000, max: 13_000_000 });
        assert_eq!(vco0, vco1);
    }

    #[test]
    fn gtx2_qpll_10g() {
        let info = XcvrInfo::new(XcvrType::Gtx2);
        let (conf, out_div) = calc_qpll_config(&info, 0, 500_000, 10_000_000).unwrap();
        assert_eq!(conf, QpllConfig { refclk_div: 1, fb_div: 20, band: 1, gty4_full_rate: false });
        assert_eq!(out_div, 1);
        assert_eq!(qpll_lane_rate(500_000_000, &conf, out_div), 10_000_000);
    }

    #[test]
    fn gty4_full_rate() {
        let info = XcvrInfo::new(XcvrType::Gty4);
        let (conf, out_div) = calc_qpll_config(&info, 0, 500_000, 32_000_000).unwrap();
        assert!(conf.gty4_full_rate);
        assert_eq!(qpll_lane_rate(500_000_000, &conf, out_div), 32_000_000);
    }

    #[test]
    fn zero_dividers_give_zero_rate() {
        let conf = CpllConfig { refclk_div: 0, fb_div_n1: 5, fb_div_n2: 4 };
        assert_eq!(cpll_lane_rate(100_000_000, &conf, 1), 0);
    }

    #[test]
    fn encodings() {
        assert_eq!(out_div_to_val(8), 3);
        assert_eq!(out_div_to_val(16), 4);
        assert_eq!(prog_div_to_val(XcvrType::Gty4, 0), Ok(32768));
        assert_eq!(prog_div_to_val(XcvrType::Gth3, 20), Ok(57762));
        assert!(prog_div_to_val(XcvrType::Gtx2, 20).is_err());
        assert_eq!(prbs_sel_encode(XcvrType::Gth3, 9), Some(2));
        assert_eq!(prbs_sel_encode(XcvrType::Gtx2, 9), None);
        assert_eq!(prbs_sel_decode(XcvrType::Gtx2, 2), Some(15));
    }
}
