//! MMCM divider search for the AXI clock generator core.
//!
//! fVCO = fIN * M / D, fOUT = fVCO / DOUT. All frequencies are handled in kHz
//! internally, as the VCO product would otherwise overflow for large M.

use core::cmp;

use super::{abs_diff, div_round_closest, div_round_up, Error};

pub const FPFD_MIN_KHZ: u64 = 10_000;
pub const FPFD_MAX_KHZ: u64 = 300_000;
pub const FVCO_MIN_KHZ: u64 = 600_000;
pub const FVCO_MAX_KHZ: u64 = 1_200_000;

pub const D_MAX: u64 = 80;
pub const M_MAX: u64 = 64;
pub const DOUT_MAX: u64 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmcmParams {
    pub d: u32,
    pub m: u32,
    pub dout: u32,
}

impl MmcmParams {
    pub fn vco_khz(&self, fin_khz: u64) -> u64 {
        fin_khz * self.m as u64 / self.d as u64
    }

    pub fn output_khz(&self, fin_khz: u64) -> u64 {
        self.vco_khz(fin_khz) / self.dout as u64
    }

    pub fn filter(&self) -> u32 {
        lookup_filter(self.m - 1)
    }

    pub fn lock(&self) -> u32 {
        lookup_lock(self.m - 1)
    }
}

pub fn calc_params(fin_hz: u64, fout_hz: u64) -> Result<MmcmParams, Error> {
    let fin = fin_hz / 1000;
    let fout = fout_hz / 1000;
    if fin == 0 || fout == 0 {
        return Err(Error::NoSolution)
    }

    let d_min = cmp::max(div_round_up(fin, FPFD_MAX_KHZ), 1);
    let d_max = cmp::min(fin / FPFD_MIN_KHZ, D_MAX);

    let m_min = cmp::max(div_round_up(FVCO_MIN_KHZ, fin) * d_min, 1);
    let m_max = cmp::min(FVCO_MAX_KHZ * d_max / fin, M_MAX);

    let mut best: Option<(u64, MmcmParams)> = None;
    for m in m_min..=m_max {
        let d_lo = cmp::max(d_min, div_round_up(fin * m, FVCO_MAX_KHZ));
        let d_hi = cmp::min(d_max, fin * m / FVCO_MIN_KHZ);

        for d in d_lo..=d_hi {
            let fvco = fin * m / d;
            let dout = div_round_closest(fvco, fout).clamp(1, DOUT_MAX);
            let f = fvco / dout;

            let better = match best {
                None => true,
                Some((best_f, _)) => abs_diff(f, fout) < abs_diff(best_f, fout),
            };
            if better {
                let params = MmcmParams { d: d as u32, m: m as u32, dout: dout as u32 };
                if f == fout {
                    return Ok(params)
                }
                best = Some((f, params));
            }
        }
    }

    match best {
        Some((f, params)) => {
            debug!("clkgen: {} kHz requested, closest is {} kHz ({:?})", fout, f, params);
            Ok(params)
        }
        None => Err(Error::NoSolution)
    }
}

/// High/low time encoding of an MMCM counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerParams {
    pub low: u32,
    pub high: u32,
    pub edge: u32,
    pub nocount: u32,
}

impl DividerParams {
    pub fn new(divider: u32) -> DividerParams {
        let high = divider / 2;
        DividerParams {
            low: divider - high,
            high: high,
            edge: divider % 2,
            nocount: (divider == 1) as u32,
        }
    }
}

/// Loop filter settings, indexed by M - 1.
pub fn lookup_filter(m: u32) -> u32 {
    match m {
        0 => 0x01001990,
        1 => 0x01001190,
        2 => 0x01009890,
        3 => 0x01001890,
        4 => 0x01008890,
        5..=8 => 0x01009090,
        9..=11 => 0x01000890,
        12 => 0x08009090,
        13..=22 => 0x01001090,
        23..=36 => 0x01008090,
        37..=46 => 0x08001090,
        _ => 0x08008090,
    }
}

const LOCK_TABLE: [u32; 36] = [
    0x060603e8, 0x060603e8, 0x080803e8, 0x0b0b03e8,
    0x0e0e03e8, 0x111103e8, 0x131303e8, 0x161603e8,
    0x190903e8, 0x1c1c03e8, 0x1f1f0384, 0x1f1f0339,
    0x1f1f02ee, 0x1f1f02bc, 0x1f1f028a, 0x1f1f0271,
    0x1f1f023f, 0x1f1f0226, 0x1f1f020d, 0x1f1f01f4,
    0x1f1f01db, 0x1f1f01c2, 0x1f1f01a9, 0x1f1f0190,
    0x1f1f0190, 0x1f1f0177, 0x1f1f015e, 0x1f1f015e,
    0x1f1f0145, 0x1f1f0145, 0x1f1f012c, 0x1f1f012c,
    0x1f1f012c, 0x1f1f0113, 0x1f1f0113, 0x1f1f0113,
];

/// Lock detect settings, indexed by M - 1.
pub fn lookup_lock(m: u32) -> u32 {
    LOCK_TABLE.get(m as usize).cloned().unwrap_or(0x1f1f00fa)
}
