//! Arria 10 fractional PLL (integer mode) counter search.
//!
//! fVCO = fREF * M / N, fOUT = fVCO / C0.

use core::cmp;

use super::{abs_diff, div_round_closest, div_round_up, Error};

pub const PFD_MIN_KHZ: u64 = 25_000;
pub const PFD_MAX_KHZ: u64 = 60_000;
pub const VCO_MIN_KHZ: u64 = 4_800_000;
pub const VCO_MAX_KHZ: u64 = 14_025_000;

pub const N_MAX: u64 = 31;
pub const M_MIN: u64 = 8;
pub const M_MAX: u64 = 127;
pub const C0_MAX: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpllParams {
    pub n: u32,
    pub m: u32,
    pub c0: u32,
}

impl FpllParams {
    pub fn vco_khz(&self, fref_khz: u64) -> u64 {
        fref_khz * self.m as u64 / self.n as u64
    }

    pub fn output_khz(&self, fref_khz: u64) -> u64 {
        self.vco_khz(fref_khz) / self.c0 as u64
    }
}

pub fn calc_params(fref_hz: u64, fout_hz: u64) -> Result<FpllParams, Error> {
    let fref = fref_hz / 1000;
    let fout = fout_hz / 1000;
    if fref == 0 || fout == 0 {
        return Err(Error::NoSolution)
    }

    let n_min = cmp::max(div_round_up(fref, PFD_MAX_KHZ), 1);
    let n_max = cmp::min(fref / PFD_MIN_KHZ, N_MAX);

    let m_min = cmp::max(div_round_up(VCO_MIN_KHZ, fref) * n_min, M_MIN);
    let m_max = cmp::min(VCO_MAX_KHZ * n_max / fref, M_MAX);

    let mut best: Option<(u64, FpllParams)> = None;
    for n in n_min..=n_max {
        for m in m_min..=m_max {
            let fvco = fref * m / n;
            if fvco < VCO_MIN_KHZ || fvco > VCO_MAX_KHZ {
                continue
            }

            let c0 = div_round_closest(fvco, fout).clamp(1, C0_MAX);
            let f = fvco / c0;

            let better = match best {
                None => true,
                Some((best_f, _)) => abs_diff(f, fout) < abs_diff(best_f, fout),
            };
            if better {
                let params = FpllParams { n: n as u32, m: m as u32, c0: c0 as u32 };
                if f == fout {
                    return Ok(params)
                }
                best = Some((f, params));
            }
        }
    }

    best.map(|(_, params)| params).ok_or(Error::NoSolution)
}

fn vco_band(fvco_khz: u64) -> usize {
    if fvco_khz < 7_200_000 {
        0
    } else if fvco_khz < 10_400_000 {
        1
    } else {
        2
    }
}

fn m_range(m: u32) -> usize {
    match m {
        0..=23 => 0,
        24..=47 => 1,
        48..=71 => 2,
        72..=95 => 3,
        _ => 4,
    }
}

// Placeholder bench values, not taken from device documentation. Replace them
// with the vendor's loop settings before relying on loop bandwidth. Rows are
// VCO bands, columns are feedback divider ranges.
const LF_RESISTANCE: [[u8; 5]; 3] = [
    [0, 0, 1, 1, 2],
    [0, 1, 1, 2, 2],
    [1, 1, 2, 2, 3],
];

const CP_CURRENT: [[u8; 5]; 3] = [
    [2, 3, 3, 4, 4],
    [3, 3, 4, 4, 5],
    [3, 4, 4, 5, 5],
];

/// Loop filter resistance setting from the placeholder bench table.
pub fn lookup_lf_resistance(fvco_khz: u64, m: u32) -> u8 {
    LF_RESISTANCE[vco_band(fvco_khz)][m_range(m)]
}

/// Charge pump current setting from the placeholder bench table.
pub fn lookup_cp_current(fvco_khz: u64, m: u32) -> u8 {
    CP_CURRENT[vco_band(fvco_khz)][m_range(m)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_250mhz_from_100mhz() {
        let p = calc_params(100_000_000, 250_000_000).unwrap();
        assert_eq!(p.output_khz(100_000), 250_000);
        assert_eq!(p, FpllParams { n: 2, m: 100, c0: 20 });
    }

    #[test]
    fn vco_stays_in_window() {
        let p = calc_params(122_880_000, 245_760_000).unwrap();
        let vco = p.vco_khz(122_880);
        assert!(vco >= VCO_MIN_KHZ && vco <= VCO_MAX_KHZ);
        assert_eq!(p.output_khz(122_880), 245_760);
    }

    #[test]
    fn slow_reference_has_no_solution() {
        assert_eq!(calc_params(20_000_000, 100_000_000), Err(Error::NoSolution));
    }

    #[test]
    fn tables_grow_with_band() {
        assert_eq!(lookup_lf_resistance(5_000_000, 10), 0);
        assert_eq!(lookup_lf_resistance(12_000_000, 120), 3);
        assert_eq!(lookup_cp_current(8_000_000, 50), 4);
    }
}
