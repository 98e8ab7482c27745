//! Board clock plan: the FPGA-side clock generator and the transceiver lane
//! rate, read from the configuration store.

use core::fmt;

use embedded_hal::delay::DelayNs;

use board_noos::config::{Config, Storage};
use board_noos::mmio::Mmio;

use crate::axi_clkgen::AxiClkgen;
use crate::xilinx_xcvr::{Drp, Lane, Xcvr, SYSCLK_CPLL, SYSCLK_QPLL0, SYSCLK_QPLL1};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSettings {
    /// Reference feeding both the clock generator and the transceivers.
    pub fpga_ref_khz: u32,
    /// Clock generator output, the link clock.
    pub fpga_rate_khz: u32,
    pub lane_rate_khz: u32,
    pub xcvr_sys_clk_sel: u32,
}

impl Default for ClockSettings {
    fn default() -> ClockSettings {
        ClockSettings {
            fpga_ref_khz: 125_000,
            fpga_rate_khz: 62_500,
            lane_rate_khz: 2_500_000,
            xcvr_sys_clk_sel: SYSCLK_CPLL,
        }
    }
}

fn read_khz<S, const N: usize>(config: &Config<S, N>, key: &str, default: u32) -> u32
    where S: Storage, S::Error: fmt::Debug
{
    match config.read_int(key) {
        Ok(Some(0)) => {
            warn!("{} is zero, using default {}", key, default);
            default
        }
        Ok(Some(value)) => value,
        Ok(None) => {
            info!("{} not set, using default {}", key, default);
            default
        }
        Err(err) => {
            warn!("error reading {} ({}), using default {}", key, err, default);
            default
        }
    }
}

impl ClockSettings {
    pub fn from_config<S, const N: usize>(config: &Config<S, N>) -> ClockSettings
        where S: Storage, S::Error: fmt::Debug
    {
        let default = ClockSettings::default();
        let xcvr_sys_clk_sel = match config.read_str("xcvr_sys_clk_sel") {
            Ok("cpll") => SYSCLK_CPLL,
            Ok("qpll0") | Ok("qpll") => SYSCLK_QPLL0,
            Ok("qpll1") => SYSCLK_QPLL1,
            Ok("") => {
                info!("xcvr_sys_clk_sel not set, using CPLL");
                default.xcvr_sys_clk_sel
            }
            _ => {
                warn!("xcvr_sys_clk_sel setting not recognised, falling back to CPLL");
                default.xcvr_sys_clk_sel
            }
        };
        ClockSettings {
            fpga_ref_khz: read_khz(config, "fpga_ref_khz", default.fpga_ref_khz),
            fpga_rate_khz: read_khz(config, "fpga_rate_khz", default.fpga_rate_khz),
            lane_rate_khz: read_khz(config, "lane_rate_khz", default.lane_rate_khz),
            xcvr_sys_clk_sel: xcvr_sys_clk_sel,
        }
    }

    /// Programs the link clock, then the lane. `lane.sys_clk_sel` is
    /// replaced by the configured selection. Returns the lane output divider.
    pub fn apply<M, C, X>(&self, clkgen: &mut AxiClkgen<M, C>, xcvr: &mut Xcvr<X>, lane: &Lane)
                         -> Result<u32, X::Error>
        where M: Mmio, C: DelayNs, X: Drp
    {
        let lane = Lane { sys_clk_sel: self.xcvr_sys_clk_sel, ..*lane };
        let ref_hz = self.fpga_ref_khz as u64 * 1000;

        clkgen.set_rate(self.fpga_rate_khz as u64 * 1000, ref_hz).map_err(|err| err.widen())?;
        let out_div = xcvr.set_lane_rate(&lane, self.fpga_ref_khz, self.lane_rate_khz)?;
        info!("clocking: link clock {} kHz, lane rate {} kHz (out div {})",
              self.fpga_rate_khz, self.lane_rate_khz, out_div);
        Ok(out_div)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_noos::mock::MemStorage;

    #[test]
    fn defaults_for_blank_store() {
        let config: Config<_, 64> = Config::load(MemStorage::new(64)).unwrap();
        assert_eq!(ClockSettings::from_config(&config), ClockSettings::default());
    }

    #[test]
    fn partial_and_invalid_settings() {
        let mut config: Config<_, 256> = Config::load(MemStorage::new(256)).unwrap();
        config.write_int("lane_rate_khz", 10_000_000).unwrap();
        config.write("fpga_ref_khz", b"fast").unwrap();
        config.write_int("fpga_rate_khz", 0).unwrap();
        config.write("xcvr_sys_clk_sel", b"qpll1").unwrap();

        let settings = ClockSettings::from_config(&config);
        assert_eq!(settings, ClockSettings {
            fpga_ref_khz: 125_000,
            fpga_rate_khz: 62_500,
            lane_rate_khz: 10_000_000,
            xcvr_sys_clk_sel: SYSCLK_QPLL1,
        });

        config.write("xcvr_sys_clk_sel", b"lcpll").unwrap();
        assert_eq!(ClockSettings::from_config(&config).xcvr_sys_clk_sel, SYSCLK_CPLL);
    }
}
