//! AD9517 dual-modulus PLL and channel divider planning.
//!
//! fVCO = fREF / R * (P * B + A).

use super::Error;

pub const MAX_PFD_HZ: u64 = 100_000_000;
pub const R_MAX: u32 = 16383;

const PRESCALERS: [(u32, u64); 5] = [
    (2, 200_000_000),
    (4, 1_000_000_000),
    (8, 2_400_000_000),
    (16, 3_000_000_000),
    (32, 3_000_000_000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualModulus {
    pub r: u32,
    pub p: u32,
    /// PRESCALER_P field value.
    pub p_code: u8,
    pub b: u32,
    pub a: u32,
}

impl DualModulus {
    pub fn pfd_hz(&self, ref_hz: u64) -> u64 {
        ref_hz / self.r as u64
    }

    pub fn vco_hz(&self, ref_hz: u64) -> u64 {
        self.pfd_hz(ref_hz) * (self.p as u64 * self.b as u64 + self.a as u64)
    }

    /// Antibacklash pulse widening is needed above 50 MHz PFD.
    pub fn wide_antibacklash(&self, ref_hz: u64) -> bool {
        self.pfd_hz(ref_hz) > 50_000_000
    }
}

/// R, P, B and A counters for a VCO frequency. R starts at the lowest value
/// keeping the PFD under its limit and grows until some prescaler gives
/// B >= 3 and B > A.
pub fn vco_counters(ref_hz: u64, vco_hz: u64) -> Result<DualModulus, Error> {
    if ref_hz == 0 {
        return Err(Error::NoSolution)
    }

    let mut r = 1;
    while ref_hz / r as u64 > MAX_PFD_HZ {
        r += 1;
    }

    while r <= R_MAX {
        let pfd = ref_hz / r as u64;
        if pfd == 0 {
            break
        }
        let n = vco_hz / pfd;
        for (index, &(p, limit)) in PRESCALERS.iter().enumerate() {
            if vco_hz > limit {
                continue
            }
            let b = (n / p as u64) as u32;
            let a = (n % p as u64) as u32;
            if b >= 3 && b > a {
                return Ok(DualModulus { r: r, p: p, p_code: index as u8 + 2, b: b, a: a })
            }
        }
        r += 1;
    }

    Err(Error::NoSolution)
}

/// Splits a divider into two cascaded dividers of at most 32 each.
pub fn split_divider(d: u32) -> Option<(u32, u32)> {
    (1..=32).rev()
        .find(|&d2| d % d2 == 0 && d / d2 <= 32)
        .map(|d2| (d / d2, d2))
}

/// Whether a channel divider can be programmed, directly or split in two.
pub fn valid_divider(d: u32) -> bool {
    d >= 1 && (d <= 32 || split_divider(d).is_some())
}

/// Divider closest to `target` out of `input`, at most `max`. Dividers above
/// 32 must be splittable; `max` itself is lowered to the nearest one that is.
pub fn nearest_divider(input: u64, target: u64, max: u32) -> Result<u32, Error> {
    if target == 0 {
        return Err(Error::InvalidDivider { what: "channel", value: 0 })
    }
    let max = match (1..=max).rev().find(|&d| valid_divider(d)) {
        Some(max) => max,
        None => return Err(Error::InvalidDivider { what: "channel", value: max })
    };
    if input <= target {
        return Ok(1)
    }
    if input / target > max as u64 {
        return Ok(max)
    }

    let mut below = 1;
    let mut d = 1;
    while input / d as u64 >= target && d < max {
        below = d;
        d += 1;
        while !valid_divider(d) {
            d += 1;
        }
    }
    if input / d as u64 >= target {
        return Ok(d)
    }

    let f_below = input / below as u64;
    let f_above = input / d as u64;
    if target - f_above > f_below - target {
        Ok(below)
    } else {
        Ok(d)
    }
}

/// Low and high cycle counts, duty cycle closest to 50%. `None` for a
/// divider of 1, which is programmed as a bypass.
pub fn divider_cycles(d: u32) -> Option<(u32, u32)> {
    if d < 2 {
        return None
    }
    Some((d / 2 - 1, d / 2 + d % 2 - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_r_works() {
        let c = vco_counters(30_720_000, 2_457_600_000).unwrap();
        assert_eq!(c, DualModulus { r: 1, p: 16, p_code: 5, b: 5, a: 0 });
        assert_eq!(c.vco_hz(30_720_000), 2_457_600_000);
    }

    #[test]
    fn r_grows_until_b_valid() {
        let c = vco_counters(250_000_000, 2_500_000_000).unwrap();
        assert_eq!(c, DualModulus { r: 5, p: 16, p_code: 5, b: 3, a: 2 });
        assert_eq!(c.vco_hz(250_000_000), 2_500_000_000);
        assert!(!c.wide_antibacklash(250_000_000));
    }

    #[test]
    fn splitting() {
        assert_eq!(split_divider(100), Some((4, 25)));
        assert_eq!(split_divider(1024), Some((32, 32)));
        assert_eq!(split_divider(1023), None);
    }

    #[test]
    fn nearest() {
        assert_eq!(nearest_divider(1_000_000_000, 250_000_000, 32), Ok(4));
        assert_eq!(nearest_divider(1_000_000_000, 240_000_000, 32), Ok(4));
        assert_eq!(nearest_divider(1_000_000_000, 1_000, 32), Ok(32));
    }

    #[test]
    fn nearest_clamped_to_valid() {
        // nothing between 993 and 1021 splits into two dividers of 32 or less
        assert_eq!(nearest_divider(10_000_000_000, 1_000, 1021), Ok(992));
        // 962 to 991 are skipped as well
        assert_eq!(nearest_divider(1_000_000_000, 1_030_000, 1021), Ok(961));
        assert!(nearest_divider(1_000_000, 1_000, 0).is_err());
    }

    #[test]
    fn bypass() {
        assert_eq!(nearest_divider(100, 200, 32), Ok(1));
        assert_eq!(divider_cycles(1), None);
        assert_eq!(divider_cycles(0), None);
    }

    #[test]
    fn cycles() {
        assert_eq!(divider_cycles(2), Some((0, 0)));
        assert_eq!(divider_cycles(4), Some((1, 1)));
        assert_eq!(divider_cycles(5), Some((1, 2)));
    }
}
