//! ADF4382 fractional-N synthesizer arithmetic.
//!
//! fOUT * 2^CLKOUT_DIV = fVCO, and fOUT = fPFD * (N_INT + (FRAC1 + FRAC2 / MOD2) / MOD1)
//! with MOD1 fixed at 2^25. All frequencies are in Hz.

use super::rational::gcd;
use super::{div_round_closest, div_round_up, Error};

pub const MOD1WORD: u64 = 1 << 25;
pub const MOD2WORD_MAX: u64 = 0xFF_FFFF;
pub const PHASE_RESYNC_MOD2WORD_MAX: u64 = 0x1_FFFF;
pub const CHANNEL_SPACING_MAX: u64 = 78_125;
pub const N_INT_MAX: u64 = 0xFFF;

pub const DCLK_DIV1_0_MAX: u64 = 160_000_000;
pub const DCLK_DIV1_1_MAX: u64 = 320_000_000;

pub const PHASE_BLEED_CNST: u64 = 2_044_000;

const MHZ: u64 = 1_000_000;

/// Charge pump current in uA, indexed by the CP_I field.
pub const CP_CURRENT_UA: [u32; 16] = [
    700, 900, 1100, 1300, 1400, 1800, 2200, 2500,
    2900, 3600, 4300, 5000, 5800, 7200, 8600, 11100,
];

pub fn charge_pump_ua(cp_i: u8) -> Option<u32> {
    CP_CURRENT_UA.get(cp_i as usize).cloned()
}

/// First output division (as the CLKOUT_DIV field value) that puts the VCO
/// inside its window, and the resulting VCO frequency.
pub fn select_vco(freq: u64, vco_min: u64, vco_max: u64, clkout_div_max: u8)
                 -> Result<(u8, u64), Error> {
    for clkout_div in 0..=clkout_div_max {
        let vco = freq << clkout_div;
        if vco >= vco_min && vco <= vco_max {
            return Ok((clkout_div, vco))
        }
    }
    Err(Error::OutOfRange { what: "VCO frequency", value: freq, min: vco_min, max: vco_max })
}

pub fn pfd(ref_hz: u64, ref_div: u8, doubler: bool) -> u64 {
    let pfd = div_round_closest(ref_hz, ref_div.max(1) as u64);
    if doubler { pfd * 2 } else { pfd }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FracN {
    pub n_int: u16,
    pub frac1: u32,
    pub frac2: u32,
    pub mod2: u32,
}

impl FracN {
    pub fn is_integer(&self) -> bool {
        self.frac1 == 0 && self.frac2 == 0
    }
}

fn mod2_compute(pfd: u64, phase_resync: bool) -> u64 {
    let mod2_max = if phase_resync { PHASE_RESYNC_MOD2WORD_MAX } else { MOD2WORD_MAX };

    let mut mod2 = 1;
    let mut channel_spacing = 1;
    while channel_spacing < CHANNEL_SPACING_MAX {
        let g = gcd(channel_spacing * MOD1WORD, pfd);
        let candidate = div_round_up(pfd, g);
        if candidate <= mod2_max {
            mod2 = candidate;
            break
        }
        channel_spacing *= 5;
    }

    // Without phase resync the largest multiple keeps the frac2 rounding finest.
    if !phase_resync {
        mod2 *= mod2_max / mod2;
    }
    mod2
}

/// Splits `freq / pfd` into the integer and the two fractional words.
pub fn frac_n(freq: u64, pfd: u64, phase_resync: bool) -> Result<FracN, Error> {
    if pfd == 0 {
        return Err(Error::InvalidDivider { what: "PFD", value: 0 })
    }
    let n_int = freq / pfd;
    if n_int > N_INT_MAX {
        return Err(Error::OutOfRange { what: "N_INT", value: n_int, min: 0, max: N_INT_MAX })
    }
    let res = (freq % pfd) * MOD1WORD;
    let frac1 = res / pfd;
    let rem = res % pfd;

    let mut out = FracN { n_int: n_int as u16, frac1: frac1 as u32, frac2: 0, mod2: 0 };
    if rem > 0 {
        let mod2 = mod2_compute(pfd, phase_resync);
        out.frac2 = div_round_closest(rem * mod2, pfd) as u32;
        out.mod2 = mod2 as u32;
    }
    Ok(out)
}

/// Inverse of `frac_n`.
pub fn output_frequency(pfd: u64, f: &FracN) -> u64 {
    let mut freq = 0;
    if f.mod2 != 0 {
        freq = f.frac2 as u64 * pfd / f.mod2 as u64;
    }
    freq += f.frac1 as u64 * pfd;
    freq /= MOD1WORD;
    freq + f.n_int as u64 * pfd
}

/// Lock detector pulse window (LDWIN_PW field).
pub fn ldwin_pw(pfd: u64, freq: u64, fractional: bool, bleed_word: u16, cp_ua: u32) -> u8 {
    if fractional {
        if pfd <= 40 * MHZ {
            7
        } else if pfd <= 50 * MHZ {
            6
        } else if pfd <= 100 * MHZ {
            5
        } else if pfd <= 200 * MHZ {
            4
        } else if pfd <= 250 * MHZ {
            if freq >= 5000 * MHZ && freq < 6400 * MHZ { 3 } else { 2 }
        } else {
            0
        }
    } else {
        let per_ua = div_round_up(pfd, MHZ) * cp_ua as u64;
        if per_ua == 0 || div_round_up(bleed_word as u64, per_ua) <= 85 { 0 } else { 1 }
    }
}

/// DCLK_DIV1 field value and the matching division.
pub fn dclk_div1(pfd: u64) -> (u8, u32) {
    if pfd <= DCLK_DIV1_0_MAX {
        (0, 1)
    } else if pfd <= DCLK_DIV1_1_MAX {
        (1, 2)
    } else {
        (2, 8)
    }
}

/// VCO calibration Vtune timeout register value.
pub fn cal_vtune_to(pfd: u64, div1: u32) -> u8 {
    let ticks = (pfd / (div1 as u64 * 400_000)).saturating_sub(2);
    div_round_up(ticks, 4).min(255) as u8
}

/// Phase adjust register value for a delay of `phase_ps`. Only valid with
/// the bleed current enabled.
pub fn phase_adjust_word(freq: u64, pfd: u64, cp_ua: u32, phase_ps: u32) -> Result<u8, Error> {
    if freq == 0 {
        return Err(Error::InvalidDivider { what: "RF output", value: 0 })
    }
    let rfout_deg_ns = 360 * freq / 1_000_000_000;
    let phase_deg = rfout_deg_ns * phase_ps as u64 / 1000;
    if phase_deg > 360 {
        return Err(Error::OutOfRange { what: "phase (deg)", value: phase_deg, min: 0, max: 360 })
    }

    let phase_ci = phase_deg * PHASE_BLEED_CNST * cp_ua as u64 / 1_000_000;
    let mut word = phase_ci * pfd / (360 * freq);
    if word > 255 {
        word -= 255;
    }
    Ok(word.min(255) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vco_selection() {
        assert_eq!(select_vco(20_000_000_000, 11_500_000_000, 21_000_000_000, 4),
                   Ok((0, 20_000_000_000)));
        assert_eq!(select_vco(3_000_000_000, 11_500_000_000, 21_000_000_000, 4),
                   Ok((2, 12_000_000_000)));
        assert!(select_vco(1_000_000_000, 11_500_000_000, 16_000_000_000, 2).is_err());
    }

    #[test]
    fn pfd_with_doubler() {
        assert_eq!(pfd(125_000_000, 1, false), 125_000_000);
        assert_eq!(pfd(125_000_000, 2, true), 125_000_000);
        assert_eq!(pfd(100_000_000, 3, false), 33_333_333);
    }

    #[test]
    fn integer_mode() {
        let f = frac_n(20_000_000_000, 125_000_000, false).unwrap();
        assert_eq!(f, FracN { n_int: 160, frac1: 0, frac2: 0, mod2: 0 });
        assert!(f.is_integer());
        assert_eq!(output_frequency(125_000_000, &f), 20_000_000_000);
    }

    #[test]
    fn fractional_mode_is_exact() {
        let f = frac_n(10_000_100_000, 125_000_000, false).unwrap();
        assert_eq!(f, FracN { n_int: 80, frac1: 26_843, frac2: 8_525_000, mod2: 15_625_000 });
        assert_eq!(output_frequency(125_000_000, &f), 10_000_100_000);
    }

    #[test]
    fn phase_resync_keeps_small_mod2() {
        let f = frac_n(10_000_100_000, 125_000_000, true).unwrap();
        assert_eq!(f.mod2, 78_125);
        assert!(f.mod2 as u64 <= PHASE_RESYNC_MOD2WORD_MAX);
    }

    #[test]
    fn lock_window() {
        assert_eq!(ldwin_pw(125_000_000, 10_000_000_000, true, 0, 11_100), 4);
        assert_eq!(ldwin_pw(250_000_000, 6_000_000_000, true, 0, 11_100), 3);
        assert_eq!(ldwin_pw(250_000_000, 7_000_000_000, true, 0, 11_100), 2);
        assert_eq!(ldwin_pw(125_000_000, 10_000_000_000, false, 4903, 11_100), 0);
    }

    #[test]
    fn calibration_timing() {
        assert_eq!(dclk_div1(125_000_000), (0, 1));
        assert_eq!(dclk_div1(250_000_000), (1, 2));
        assert_eq!(dclk_div1(500_000_000), (2, 8));
        assert_eq!(cal_vtune_to(125_000_000, 1), 78);
        assert_eq!(cal_vtune_to(100_000, 1), 0);
    }

    #[test]
    fn phase_adjust() {
        assert_eq!(phase_adjust_word(10_000_000_000, 125_000_000, 11_100, 10), Ok(28));
        assert!(phase_adjust_word(10_000_000_000, 125_000_000, 11_100, 200).is_err());
    }
}
