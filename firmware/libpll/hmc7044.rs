//! HMC7044 dual-loop clock planning.
//!
//! PLL1 cleans the reference: fVCXO / N1 = fLCM / R1. PLL2 multiplies the
//! VCXO: fVCO / N2 = fVCXO * doubler / R2. Frequencies are in kHz inside the
//! planner, as the R/N products overflow 32 bits otherwise.

use super::rational::{best_approximation, gcd};
use super::{abs_diff, div_round_closest, Error};

pub const LOW_VCO_MIN_KHZ: u64 = 2_150_000;
pub const LOW_VCO_MAX_KHZ: u64 = 2_880_000;
pub const HIGH_VCO_MIN_KHZ: u64 = 2_650_000;
pub const HIGH_VCO_MAX_KHZ: u64 = 3_200_000;

pub const RECOMM_LCM_MAX_KHZ: u64 = 70_000;
pub const RECOMM_FPD1_KHZ: u64 = 10_000;

pub const R1_MAX: u64 = 65535;
pub const N1_MAX: u64 = 65535;
pub const R2_MAX: u64 = 4095;
pub const N2_MIN: u64 = 8;
pub const N2_MAX: u64 = 65535;

pub const OUT_DIV_MIN: u64 = 1;
pub const OUT_DIV_MAX: u64 = 4094;

pub const NUM_CLKIN: usize = 4;

/// Channel divider for `rate` out of `parent`. The dividers support even
/// ratios plus 1, 3 and 5.
pub fn calc_out_div(rate: u64, parent: u64) -> u32 {
    if rate == 0 {
        return OUT_DIV_MAX as u32
    }
    let mut div = div_round_closest(parent, rate);
    if div != 1 && div != 3 && div != 5 && div % 2 == 1 {
        div = div_round_closest(parent, rate * 2) * 2;
    }
    div.clamp(OUT_DIV_MIN, OUT_DIV_MAX) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub lcm_khz: u32,
    /// CLKIN0..3 prescalers followed by the OSCIN prescaler.
    pub in_prescaler: [u32; NUM_CLKIN + 1],
    pub ref_en: u8,
    pub pll1_lock_detect: u32,
    pub n1: u32,
    pub r1: u32,
    pub pfd1_khz: u32,
    pub high_vco: bool,
    pub doubler: bool,
    pub n2: u32,
    pub r2: u32,
}

fn log2_floor(x: u64) -> u32 {
    if x == 0 { 0 } else { 63 - x.leading_zeros() }
}

pub fn plan(vcxo_hz: u64, clkin_hz: &[u64; NUM_CLKIN], pll2_hz: u64, pll1_loop_bw: u32)
           -> Result<Plan, Error> {
    let vcxo = vcxo_hz / 1000;
    let pll2 = pll2_hz / 1000;
    if vcxo == 0 || pll1_loop_bw == 0 {
        return Err(Error::NoSolution)
    }

    let mut lcm = vcxo;
    let mut ref_en = 0u8;
    for (i, &f) in clkin_hz.iter().enumerate() {
        let f = f / 1000;
        if f != 0 {
            lcm = gcd(f, lcm);
            ref_en |= 1 << i;
        }
    }
    while lcm > RECOMM_LCM_MAX_KHZ {
        lcm /= 2;
    }

    let mut in_prescaler = [1u32; NUM_CLKIN + 1];
    for (i, &f) in clkin_hz.iter().enumerate() {
        let f = f / 1000;
        if f != 0 {
            in_prescaler[i] = (f / lcm) as u32;
        }
    }
    in_prescaler[NUM_CLKIN] = (vcxo / lcm) as u32;

    let pll1_lock_detect = log2_floor(lcm * 4000 / pll1_loop_bw as u64);

    let (mut n1, mut r1) = best_approximation(vcxo, lcm, N1_MAX, R1_MAX);
    if n1 == 0 || r1 == 0 {
        return Err(Error::NoSolution)
    }
    let mut pfd1 = vcxo / n1;
    while pfd1 > RECOMM_FPD1_KHZ && n1 <= N1_MAX / 2 && r1 <= R1_MAX / 2 {
        pfd1 /= 2;
        n1 *= 2;
        r1 *= 2;
    }

    if pll2 < LOW_VCO_MIN_KHZ || pll2 > HIGH_VCO_MAX_KHZ {
        return Err(Error::OutOfRange {
            what: "PLL2 frequency (kHz)",
            value: pll2,
            min: LOW_VCO_MIN_KHZ,
            max: HIGH_VCO_MAX_KHZ,
        })
    }
    let high_vco = pll2 >= (LOW_VCO_MAX_KHZ + HIGH_VCO_MIN_KHZ) / 2;

    let mut doubler = true;
    let (mut n2, mut r2) = best_approximation(pll2, vcxo * 2, N2_MAX, R2_MAX);
    if n2 == 0 || r2 == 0 {
        return Err(Error::NoSolution)
    }
    if pll2 != vcxo * 2 * n2 / r2 {
        let (n2_nodbl, r2_nodbl) = best_approximation(pll2, vcxo, N2_MAX, R2_MAX);
        if r2_nodbl != 0 &&
                abs_diff(pll2, vcxo * 2 * n2 / r2) > abs_diff(pll2, vcxo * n2_nodbl / r2_nodbl) {
            n2 = n2_nodbl;
            r2 = r2_nodbl;
            doubler = false;
        }
    }

    while n2 < N2_MIN && r2 <= R2_MAX / 2 {
        n2 *= 2;
        r2 *= 2;
    }
    if n2 < N2_MIN {
        return Err(Error::InvalidDivider { what: "N2", value: n2 as u32 })
    }

    Ok(Plan {
        lcm_khz: lcm as u32,
        in_prescaler: in_prescaler,
        ref_en: ref_en,
        pll1_lock_detect: pll1_lock_detect,
        n1: n1 as u32,
        r1: r1 as u32,
        pfd1_khz: pfd1 as u32,
        high_vco: high_vco,
        doubler: doubler,
        n2: n2 as u32,
        r2: r2 as u32,
    })
}

/// Checks that an LMFC/LEMC rate can be derived from PLL2 together with the
/// SYSREF rates already accepted. Returns the updated common SYSREF rate.
///
/// `dividend` is PLL2 for the first link and the running common rate for the
/// following ones.
pub fn validate_lmfc(pll2_hz: u64, dividend: u64, divisor: u32, current_gcd: u32)
                    -> Result<u32, Error> {
    if divisor < 2 {
        return Err(Error::InvalidDivider { what: "LMFC", value: divisor })
    }
    let divisor = divisor as u64;

    let gcd_val = gcd(dividend, divisor);
    let min = div_round_closest(pll2_hz, OUT_DIV_MAX);
    if gcd_val >= min {
        debug!("LMFC: dividend={} divisor={} gcd={} min={}", dividend, divisor, gcd_val, min);
        return Ok(gcd_val as u32)
    }

    let rem = dividend % divisor;
    let rem_l = dividend % (divisor - 1);
    let rem_u = dividend % (divisor + 1);
    if rem_l > rem && rem_u > rem {
        if current_gcd != 0 {
            Ok(current_gcd.min(divisor as u32))
        } else {
            Ok(divisor as u32)
        }
    } else {
        Err(Error::NoSolution)
    }
}

/// Final SYSREF rate: the requested one when it divides the common rate,
/// otherwise the common rate halved while above `max_hz` and still exact.
pub fn sysref_rate(lmfc_gcd: u32, desired_hz: u32, max_hz: u32) -> u32 {
    if desired_hz != 0 && lmfc_gcd % desired_hz == 0 {
        return desired_hz
    }
    let mut rate = lmfc_gcd;
    while rate > max_hz && rate > 1 && rate % (rate >> 1) == 0 {
        rate >>= 1;
    }
    rate
}

/// SYSREF timer divide ratio: a submultiple of the SYSREF rate, no faster
/// than 4 MHz.
pub fn sysref_timer(pll2_hz: u64, sysref_hz: u32) -> Result<u32, Error> {
    let mut timer = sysref_hz / 2;
    while timer >= 4_000_000 {
        timer >>= 1;
    }
    if timer == 0 {
        return Err(Error::InvalidDivider { what: "SYSREF timer", value: sysref_hz })
    }
    Ok((pll2_hz / timer as u64) as u32)
}
