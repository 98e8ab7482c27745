use board_noos::config::Config;
use board_noos::mock::{MockI2c, MockMmio, NoDelay};

use board_adi::axi_clkgen::AxiClkgen;
use board_adi::clocking::ClockSettings;
use board_adi::i2c_eeprom::Eeprom;
use board_adi::xilinx_xcvr::{adxcvr, AdxcvrDrp, Direction, Lane, Port, Xcvr, SYSCLK_CPLL};
use pll::xcvr::{XcvrInfo, XcvrType};

const CLKGEN_STATUS: u32 = 0x5c;
const CLKGEN_DRP_CNTRL: u32 = 0x70;
const CLKGEN_DRP_STATUS: u32 = 0x74;
const CLKGEN_DRP_READ: u32 = 1 << 28;
const DRP_SHADOW: u32 = 0x1_0000;

fn clkgen_mmio() -> MockMmio {
    let mut mmio = MockMmio::new();
    mmio.set(CLKGEN_STATUS, 1);
    mmio.on_write(|regs, offset, val| {
        if offset != CLKGEN_DRP_CNTRL {
            return
        }
        let reg = (val >> 16) & 0xfff;
        if val & CLKGEN_DRP_READ != 0 {
            let data = regs.get(&(DRP_SHADOW + reg)).cloned().unwrap_or(0);
            regs.insert(CLKGEN_DRP_STATUS, data & 0xffff);
        } else {
            regs.insert(DRP_SHADOW + reg, val & 0xffff);
        }
    });
    mmio
}

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
fn clock_plan_from_eeprom() {
    let rom = Eeprom::new(MockI2c::new(0x50, 256, 8).with_write_cycle(2), NoDelay::new(),
                          0x50, 256, 8);
    let mut config: Config<_, 128> = Config::load(rom).unwrap();
    config.write_int("fpga_ref_khz", 125_000).unwrap();
    config.write_int("fpga_rate_khz", 62_500).unwrap();
    config.write_int("lane_rate_khz", 2_500_000).unwrap();
    config.write("xcvr_sys_clk_sel", b"cpll").unwrap();

    // settings survive a reload from the EEPROM
    let config: Config<_, 128> = Config::load(config.release()).unwrap();
    let settings = ClockSettings::from_config(&config);
    assert_eq!(settings.lane_rate_khz, 2_500_000);
    assert_eq!(settings.xcvr_sys_clk_sel, SYSCLK_CPLL);

    let mut clkgen = AxiClkgen::new(clkgen_mmio(), NoDelay::new(), "link_clkgen");
    let mut xcvr = Xcvr::new(AdxcvrDrp::new(adxcvr_mmio(), NoDelay::new()),
                             XcvrInfo::new(XcvrType::Gtx2));
    let lane = Lane {
        channel: Port::Channel(0),
        common: Port::Common(0),
        sys_clk_sel: 3,
        dir: Direction::Rx,
        lpm: false,
    };

    assert_eq!(settings.apply(&mut clkgen, &mut xcvr, &lane), Ok(2));
    assert_eq!(clkgen.recalc_rate(125_000_000), Ok(62_500_000));
    let lane = Lane { sys_clk_sel: SYSCLK_CPLL, ..lane };
    assert_eq!(xcvr.lane_rate(&lane, 125_000_000), Ok(2_500_000));
}

#[test]
fn unlocked_link_clock() {
    let mut mmio = clkgen_mmio();
    mmio.set(CLKGEN_STATUS, 0);
    let mut clkgen = AxiClkgen::new(mmio, NoDelay::new(), "link_clkgen");
    let mut xcvr = Xcvr::new(AdxcvrDrp::new(adxcvr_mmio(), NoDelay::new()),
                             XcvrInfo::new(XcvrType::Gtx2));
    let lane = Lane {
        channel: Port::Channel(0),
        common: Port::Common(0),
        sys_clk_sel: SYSCLK_CPLL,
        dir: Direction::Tx,
        lpm: false,
    };
    assert_eq!(ClockSettings::default().apply(&mut clkgen, &mut xcvr, &lane),
               Err(board_adi::Error::NotLocked));
}
