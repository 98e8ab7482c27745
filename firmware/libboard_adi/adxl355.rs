//! ADXL355/ADXL357/ADXL359 3-axis accelerometers.
//!
//! Use `SpiRegisters` with `Framing::Shifted` or `I2cRegisters` as the bus.
//! Acceleration is returned in m/s^2 and temperature in degrees Celsius, both
//! split into an integer part and a fractional part in units of 1e-9.

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::delay::DelayNs;

use board_noos::clock::poll;
use board_noos::regmap::RegisterBus;

use crate::{Error, Result};

const REG_DEVID_AD: u16 = 0x00;
const REG_DEVID_MST: u16 = 0x01;
const REG_PARTID: u16 = 0x02;
const REG_STATUS: u16 = 0x04;
const REG_FIFO_ENTRIES: u16 = 0x05;
const REG_TEMP: u16 = 0x06;
const REG_XDATA: u16 = 0x08;
const REG_YDATA: u16 = 0x0b;
const REG_ZDATA: u16 = 0x0e;
const REG_FIFO_DATA: u16 = 0x11;
const REG_OFFSET_X: u16 = 0x1e;
const REG_OFFSET_Y: u16 = 0x20;
const REG_OFFSET_Z: u16 = 0x22;
const REG_ACT_EN: u16 = 0x24;
const REG_ACT_THRESH: u16 = 0x25;
const REG_ACT_COUNT: u16 = 0x27;
const REG_FILTER: u16 = 0x28;
const REG_FIFO_SAMPLES: u16 = 0x29;
const REG_INT_MAP: u16 = 0x2a;
const REG_RANGE: u16 = 0x2c;
const REG_POWER_CTL: u16 = 0x2d;
const REG_SELF_TEST: u16 = 0x2e;
const REG_RESET: u16 = 0x2f;
const REG_SHADOW: u16 = 0x50;

const DEVID_AD: u8 = 0xad;
const DEVID_MST: u8 = 0x1d;
const PARTID_ADXL355: u8 = 0xed;
const PARTID_ADXL359: u8 = 0xe9;

const RESET_CODE: u8 = 0x52;
const SELF_TEST_TRIGGER: u8 = 0x03;

const RANGE_MASK: u8 = 0x03;
const INT_POL_MASK: u8 = 1 << 6;
const ODR_LPF_MASK: u8 = 0x0f;
const HPF_MASK: u8 = 0x70;

const RESET_RANGE: u8 = 0x81;
const RESET_FIFO_SAMPLES: u8 = 0x60;
const RESET_POWER_CTL: u8 = 0x01;
const RESET_ACT_COUNT: u8 = 0x01;

pub const MAX_FIFO_SAMPLES: u8 = 96;
const FIFO_X_MARKER: u8 = 1 << 0;
const FIFO_EMPTY: u8 = 1 << 1;

const SHADOW_LEN: usize = 5;
const NVM_POLL_ITERATIONS: u32 = 255;

const NANO: i64 = 1_000_000_000;

/// Nano-m/s^2 per LSB at the lowest range.
const ADXL355_ACC_SCALE: i64 = 38_245;
const ADXL359_ACC_SCALE: i64 = 191_229;
/// Temperature offset in hundredths of an LSB, and nano-degrees per LSB.
const ADXL355_TEMP_OFFSET: i64 = -211_125;
const ADXL359_TEMP_OFFSET: i64 = -207_825;
const TEMP_SCALE: i64 = -110_497_238;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Adxl355,
    Adxl357,
    Adxl359,
}

impl Chip {
    fn part_id(self) -> u8 {
        match self {
            Chip::Adxl355 | Chip::Adxl357 => PARTID_ADXL355,
            Chip::Adxl359 => PARTID_ADXL359,
        }
    }

    fn acc_scale(self) -> i64 {
        match self {
            Chip::Adxl355 => ADXL355_ACC_SCALE,
            Chip::Adxl357 | Chip::Adxl359 => ADXL359_ACC_SCALE,
        }
    }

    fn temp_offset(self) -> i64 {
        match self {
            Chip::Adxl355 | Chip::Adxl357 => ADXL355_TEMP_OFFSET,
            Chip::Adxl359 => ADXL359_TEMP_OFFSET,
        }
    }
}

/// Full scale. ADXL357 and ADXL359 ranges are 10/20/40 g.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    G2 = 1,
    G4 = 2,
    G8 = 3,
}

impl Range {
    fn from_bits(bits: u8) -> Option<Range> {
        match bits & RANGE_MASK {
            1 => Some(Range::G2),
            2 => Some(Range::G4),
            3 => Some(Range::G8),
            _ => None,
        }
    }

    fn scale_mul(self) -> i64 {
        match self {
            Range::G2 => 1,
            Range::G4 => 2,
            Range::G8 => 4,
        }
    }
}

/// Output data rate and matching low-pass corner, 4 kHz halving down to 3.906 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdrLpf {
    Odr4000 = 0,
    Odr2000,
    Odr1000,
    Odr500,
    Odr250,
    Odr125,
    Odr62_5,
    Odr31_25,
    Odr15_625,
    Odr7_813,
    Odr3_906,
}

/// High-pass corner as a fraction of the ODR. `Off` disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpfCorner {
    Off = 0,
    Corner24_7,
    Corner6_2084,
    Corner1_5545,
    Corner0_3862,
    Corner0_0954,
    Corner0_0238,
}

/// POWER_CTL contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpMode {
    pub measure: bool,
    pub temp_off: bool,
    pub drdy_off: bool,
}

impl OpMode {
    pub const STANDBY: OpMode = OpMode { measure: false, temp_off: false, drdy_off: false };
    pub const MEASURE: OpMode = OpMode { measure: true, temp_off: false, drdy_off: false };

    fn bits(self) -> u8 {
        (!self.measure as u8) | (self.temp_off as u8) << 1 | (self.drdy_off as u8) << 2
    }

    fn from_bits(bits: u8) -> OpMode {
        OpMode {
            measure: bits & 0x01 == 0,
            temp_off: bits & 0x02 != 0,
            drdy_off: bits & 0x04 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub data_ready: bool,
    pub fifo_full: bool,
    pub fifo_overrun: bool,
    pub activity: bool,
    pub nvm_busy: bool,
}

impl Status {
    fn from_bits(bits: u8) -> Status {
        Status {
            data_ready: bits & 0x01 != 0,
            fifo_full: bits & 0x02 != 0,
            fifo_overrun: bits & 0x04 != 0,
            activity: bits & 0x08 != 0,
            nvm_busy: bits & 0x10 != 0,
        }
    }
}

/// Axes taking part in activity detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityEnable {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl ActivityEnable {
    fn bits(self) -> u8 {
        self.x as u8 | (self.y as u8) << 1 | (self.z as u8) << 2
    }
}

/// INT_MAP: bits 0-3 route data ready, FIFO full, FIFO overrun and activity
/// to INT1, bits 4-7 the same to INT2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntMap(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPolarity {
    ActiveLow = 0,
    ActiveHigh = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FracRepr {
    pub integer: i64,
    pub fractional: i32,
}

impl FracRepr {
    fn from_nano(val: i64) -> FracRepr {
        FracRepr { integer: val / NANO, fractional: (val % NANO) as i32 }
    }
}

/// 20-bit sample left-justified in three bytes.
fn raw_sample(bytes: &[u8]) -> u32 {
    BigEndian::read_u24(bytes) >> 4
}

pub struct Adxl355<B, D> {
    bus: B,
    delay: D,
    chip: Chip,
    shadow: [u8; SHADOW_LEN],
    op_mode: OpMode,
    range: Range,
    odr_lpf: OdrLpf,
    hpf_corner: HpfCorner,
    offsets: [u16; 3],
    fifo_samples: u8,
    act_en: ActivityEnable,
    act_thr: u16,
    act_cnt: u8,
}

impl<B: RegisterBus, D: DelayNs> Adxl355<B, D> {
    /// Checks the device and part IDs and caches the shadow registers used
    /// to validate later soft resets.
    pub fn init(bus: B, delay: D, chip: Chip) -> Result<Adxl355<B, D>, B::Error> {
        let mut dev = Adxl355 {
            bus: bus,
            delay: delay,
            chip: chip,
            shadow: [0; SHADOW_LEN],
            op_mode: OpMode::from_bits(RESET_POWER_CTL),
            range: Range::G2,
            odr_lpf: OdrLpf::Odr4000,
            hpf_corner: HpfCorner::Off,
            offsets: [0; 3],
            fifo_samples: RESET_FIFO_SAMPLES,
            act_en: ActivityEnable::default(),
            act_thr: 0,
            act_cnt: RESET_ACT_COUNT,
        };

        dev.check_id("ADXL355 device ID", REG_DEVID_AD, DEVID_AD)?;
        dev.check_id("ADXL355 MEMS ID", REG_DEVID_MST, DEVID_MST)?;
        dev.check_id("ADXL355 part ID", REG_PARTID, chip.part_id())?;

        let mut shadow = [0; SHADOW_LEN];
        dev.bus.read(REG_SHADOW, &mut shadow).map_err(Error::Bus)?;
        dev.shadow = shadow;
        if let Some(range) = Range::from_bits(RESET_RANGE) {
            dev.range = range;
        }
        info!("{:?} detected", chip);
        Ok(dev)
    }

    pub fn remove(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn check_id(&mut self, what: &'static str, reg: u16, expected: u8) -> Result<(), B::Error> {
        let found = self.read(reg)?;
        if found != expected {
            error!("{} 0x{:02x}, expected 0x{:02x}", what, found, expected);
            return Err(Error::InvalidId { what: what, expected: expected as u32, found: found as u32 })
        }
        Ok(())
    }

    fn read(&mut self, reg: u16) -> Result<u8, B::Error> {
        self.bus.read_u8(reg).map_err(Error::Bus)
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<(), B::Error> {
        self.bus.write_u8(reg, val).map_err(Error::Bus)
    }

    fn write_u16(&mut self, reg: u16, val: u16) -> Result<(), B::Error> {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, val);
        self.bus.write(reg, &buf).map_err(Error::Bus)
    }

    fn modify(&mut self, reg: u16, mask: u8, val: u8) -> Result<(), B::Error> {
        let old = self.read(reg)?;
        self.write(reg, (old & !mask) | (val & mask))
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn set_op_mode(&mut self, mode: OpMode) -> Result<(), B::Error> {
        self.write(REG_POWER_CTL, mode.bits())?;
        self.op_mode = mode;
        Ok(())
    }

    pub fn op_mode(&mut self) -> Result<OpMode, B::Error> {
        self.op_mode = OpMode::from_bits(self.read(REG_POWER_CTL)?);
        Ok(self.op_mode)
    }

    /// Resets the part and checks that the shadow registers reloaded from
    /// NVM match the values seen at init.
    pub fn soft_reset(&mut self) -> Result<(), B::Error> {
        self.write(REG_RESET, RESET_CODE)?;

        let bus = &mut self.bus;
        let ready = poll(&mut self.delay, NVM_POLL_ITERATIONS, 10,
                         || Ok::<_, B::Error>(!Status::from_bits(bus.read_u8(REG_STATUS)?).nvm_busy))
            .map_err(Error::Bus)?;
        if !ready {
            error!("ADXL355: NVM busy after reset");
            return Err(Error::Timeout("ADXL355 NVM"))
        }
        self.delay.delay_ms(1);

        let mut shadow = [0; SHADOW_LEN];
        self.bus.read(REG_SHADOW, &mut shadow).map_err(Error::Bus)?;
        if shadow != self.shadow {
            warn!("ADXL355: shadow registers changed across reset: {:02x?} -> {:02x?}",
                  self.shadow, shadow);
            let idx = shadow.iter().zip(self.shadow.iter()).position(|(a, b)| a != b).unwrap_or(0);
            return Err(Error::ReadWriteCheck { wrote: self.shadow[idx], read: shadow[idx] })
        }

        self.op_mode = OpMode::from_bits(RESET_POWER_CTL);
        self.fifo_samples = RESET_FIFO_SAMPLES;
        self.act_cnt = RESET_ACT_COUNT;
        if let Some(range) = Range::from_bits(RESET_RANGE) {
            self.range = range;
        }
        Ok(())
    }

    pub fn set_self_test(&mut self, enable: bool) -> Result<(), B::Error> {
        self.write(REG_SELF_TEST, if enable { SELF_TEST_TRIGGER } else { 0 })
    }

    pub fn set_range(&mut self, range: Range) -> Result<(), B::Error> {
        self.modify(REG_RANGE, RANGE_MASK, range as u8)?;
        self.range = range;
        Ok(())
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// Runs `f` with the part in standby, then restores the previous mode.
    fn in_standby<F>(&mut self, f: F) -> Result<(), B::Error>
        where F: FnOnce(&mut Self) -> Result<(), B::Error>
    {
        let mode = self.op_mode;
        if mode.measure {
            self.set_op_mode(OpMode::STANDBY)?;
        }
        f(self)?;
        self.set_op_mode(mode)
    }

    /// Filter settings do not apply cleanly while measuring.
    pub fn set_odr_lpf(&mut self, odr_lpf: OdrLpf) -> Result<(), B::Error> {
        self.in_standby(|dev| {
            dev.modify(REG_FILTER, ODR_LPF_MASK, odr_lpf as u8)?;
            dev.odr_lpf = odr_lpf;
            Ok(())
        })
    }

    pub fn odr_lpf(&self) -> OdrLpf {
        self.odr_lpf
    }

    pub fn set_hpf_corner(&mut self, corner: HpfCorner) -> Result<(), B::Error> {
        self.in_standby(|dev| {
            dev.modify(REG_FILTER, HPF_MASK, (corner as u8) << 4)?;
            dev.hpf_corner = corner;
            Ok(())
        })
    }

    pub fn hpf_corner(&self) -> HpfCorner {
        self.hpf_corner
    }

    pub fn set_offset(&mut self, x: u16, y: u16, z: u16) -> Result<(), B::Error> {
        self.write_u16(REG_OFFSET_X, x)?;
        self.write_u16(REG_OFFSET_Y, y)?;
        self.write_u16(REG_OFFSET_Z, z)?;
        self.offsets = [x, y, z];
        Ok(())
    }

    pub fn offset(&self) -> [u16; 3] {
        self.offsets
    }

    fn read_raw_axis(&mut self, reg: u16) -> Result<u32, B::Error> {
        let mut buf = [0; 3];
        self.bus.read(reg, &mut buf).map_err(Error::Bus)?;
        Ok(raw_sample(&buf))
    }

    /// Unscaled 20-bit two's complement samples.
    pub fn raw_xyz(&mut self) -> Result<[u32; 3], B::Error> {
        Ok([self.read_raw_axis(REG_XDATA)?,
            self.read_raw_axis(REG_YDATA)?,
            self.read_raw_axis(REG_ZDATA)?])
    }

    fn accel_nano(&self, raw: u32) -> i64 {
        let signed = ((raw << 12) as i32 >> 12) as i64;
        signed * self.chip.acc_scale() * self.range.scale_mul()
    }

    pub fn accel(&self, raw: u32) -> FracRepr {
        FracRepr::from_nano(self.accel_nano(raw))
    }

    pub fn xyz(&mut self) -> Result<[FracRepr; 3], B::Error> {
        let raw = self.raw_xyz()?;
        Ok([self.accel(raw[0]), self.accel(raw[1]), self.accel(raw[2])])
    }

    pub fn raw_temp(&mut self) -> Result<u16, B::Error> {
        let mut buf = [0; 2];
        self.bus.read(REG_TEMP, &mut buf).map_err(Error::Bus)?;
        Ok(BigEndian::read_u16(&buf) & 0x0fff)
    }

    pub fn temp(&mut self) -> Result<FracRepr, B::Error> {
        let raw = self.raw_temp()? as i64;
        let nano = (raw * 100 + self.chip.temp_offset()) * TEMP_SCALE / 100;
        Ok(FracRepr::from_nano(nano))
    }

    pub fn status(&mut self) -> Result<Status, B::Error> {
        Ok(Status::from_bits(self.read(REG_STATUS)?))
    }

    /// Number of valid 3-byte entries in the FIFO, one axis each.
    pub fn fifo_entries(&mut self) -> Result<u8, B::Error> {
        self.read(REG_FIFO_ENTRIES)
    }

    pub fn set_fifo_samples(&mut self, samples: u8) -> Result<(), B::Error> {
        if samples > MAX_FIFO_SAMPLES {
            return Err(Error::InvalidArgument("FIFO samples"))
        }
        self.write(REG_FIFO_SAMPLES, samples)?;
        self.fifo_samples = samples;
        Ok(())
    }

    pub fn fifo_samples(&self) -> u8 {
        self.fifo_samples
    }

    /// Drains the FIFO into `out` as X/Y/Z triples, resynchronizing on the
    /// X marker. Returns the number of complete triples stored.
    pub fn raw_fifo_data(&mut self, out: &mut [[u32; 3]]) -> Result<usize, B::Error> {
        let entries = self.fifo_entries()?.min(MAX_FIFO_SAMPLES) as usize;
        let mut buf = [0; MAX_FIFO_SAMPLES as usize * 3];
        let buf = &mut buf[..entries * 3];
        if buf.is_empty() {
            return Ok(0)
        }
        self.bus.read(REG_FIFO_DATA, buf).map_err(Error::Bus)?;

        let mut count = 0;
        let mut idx = 0;
        while idx + 9 <= buf.len() && count < out.len() {
            let marker = buf[idx + 2];
            if marker & FIFO_X_MARKER == 0 || marker & FIFO_EMPTY != 0 {
                idx += 3;
                continue
            }
            out[count] = [raw_sample(&buf[idx..]),
                          raw_sample(&buf[idx + 3..]),
                          raw_sample(&buf[idx + 6..])];
            count += 1;
            idx += 9;
        }
        Ok(count)
    }

    pub fn fifo_data(&mut self, out: &mut [[FracRepr; 3]]) -> Result<usize, B::Error> {
        let mut raw = [[0; 3]; MAX_FIFO_SAMPLES as usize / 3];
        let len = out.len().min(raw.len());
        let count = self.raw_fifo_data(&mut raw[..len])?;
        for (dst, src) in out.iter_mut().zip(raw[..count].iter()) {
            *dst = [self.accel(src[0]), self.accel(src[1]), self.accel(src[2])];
        }
        Ok(count)
    }

    pub fn set_activity_enable(&mut self, en: ActivityEnable) -> Result<(), B::Error> {
        self.write(REG_ACT_EN, en.bits())?;
        self.act_en = en;
        Ok(())
    }

    pub fn activity_enable(&self) -> ActivityEnable {
        self.act_en
    }

    pub fn set_activity_threshold(&mut self, thr: u16) -> Result<(), B::Error> {
        self.write_u16(REG_ACT_THRESH, thr)?;
        self.act_thr = thr;
        Ok(())
    }

    pub fn activity_threshold(&self) -> u16 {
        self.act_thr
    }

    pub fn set_activity_count(&mut self, count: u8) -> Result<(), B::Error> {
        self.write(REG_ACT_COUNT, count)?;
        self.act_cnt = count;
        Ok(())
    }

    pub fn activity_count(&self) -> u8 {
        self.act_cnt
    }

    pub fn set_int_map(&mut self, map: IntMap) -> Result<(), B::Error> {
        self.write(REG_INT_MAP, map.0)
    }

    pub fn set_int_polarity(&mut self, pol: IntPolarity) -> Result<(), B::Error> {
        self.modify(REG_RANGE, INT_POL_MASK, (pol as u8) << 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_noos::mock::{MockRegisters, NoDelay};

    const SHADOW: [u8; SHADOW_LEN] = [0x12, 0x34, 0x56, 0x78, 0x9a];

    fn regs(part_id: u8) -> MockRegisters {
        let mut regs = MockRegisters::new();
        regs.set(REG_DEVID_AD, DEVID_AD);
        regs.set(REG_DEVID_MST, DEVID_MST);
        regs.set(REG_PARTID, part_id);
        regs.set(REG_RANGE, RESET_RANGE);
        regs.set(REG_POWER_CTL, RESET_POWER_CTL);
        for (i, &val) in SHADOW.iter().enumerate() {
            regs.set(REG_SHADOW + i as u16, val);
        }
        regs
    }

    fn adxl355() -> Adxl355<MockRegisters, NoDelay> {
        Adxl355::init(regs(PARTID_ADXL355), NoDelay::new(), Chip::Adxl355).unwrap()
    }

    #[test]
    fn wrong_part() {
        let res = Adxl355::init(regs(PARTID_ADXL355), NoDelay::new(), Chip::Adxl359);
        assert_eq!(res.err(), Some(Error::InvalidId {
            what: "ADXL355 part ID", expected: PARTID_ADXL359 as u32, found: PARTID_ADXL355 as u32
        }));
    }

    #[test]
    fn soft_reset_checks_shadow() {
        let mut dev = adxl355();
        dev.set_fifo_samples(10).unwrap();
        dev.soft_reset().unwrap();
        assert_eq!(dev.fifo_samples(), RESET_FIFO_SAMPLES);

        dev.bus.set(REG_SHADOW + 3, 0);
        assert_eq!(dev.soft_reset(), Err(Error::ReadWriteCheck { wrote: 0x78, read: 0 }));
    }

    #[test]
    fn soft_reset_nvm_busy() {
        let mut dev = adxl355();
        dev.bus.set(REG_STATUS, 0x10);
        assert_eq!(dev.soft_reset(), Err(Error::Timeout("ADXL355 NVM")));
        let (regs, delay) = dev.remove();
        assert_eq!(regs.written(REG_RESET), &[RESET_CODE]);
        assert_eq!(delay.elapsed_ns(), NVM_POLL_ITERATIONS as u64 * 10_000);
    }

    #[test]
    fn filters_in_standby() {
        let mut dev = adxl355();
        dev.set_op_mode(OpMode::MEASURE).unwrap();
        dev.set_odr_lpf(OdrLpf::Odr125).unwrap();
        dev.set_hpf_corner(HpfCorner::Corner0_3862).unwrap();
        assert_eq!(dev.op_mode(), Ok(OpMode::MEASURE));

        let (regs, _) = dev.remove();
        assert_eq!(regs.get(REG_FILTER), (4 << 4) | 5);
        assert_eq!(regs.written(REG_POWER_CTL), &[0, 1, 0, 1, 0]);
    }

    #[test]
    fn filters_from_standby() {
        let mut dev = adxl355();
        dev.set_odr_lpf(OdrLpf::Odr3_906).unwrap();
        let (regs, _) = dev.remove();
        assert_eq!(regs.written(REG_POWER_CTL), &[1]);
    }

    #[test]
    fn range_and_polarity_share_register() {
        let mut dev = adxl355();
        dev.set_range(Range::G8).unwrap();
        dev.set_int_polarity(IntPolarity::ActiveHigh).unwrap();
        assert_eq!(dev.range(), Range::G8);
        assert_eq!(dev.bus.get(REG_RANGE), 0x80 | INT_POL_MASK | 3);
    }

    #[test]
    fn acceleration() {
        let mut dev = adxl355();
        // about 1 g at 3.9 ug/LSB
        dev.bus.write(REG_XDATA, &[0x3e, 0x80, 0x00]).unwrap();
        // -1 LSB
        dev.bus.write(REG_YDATA, &[0xff, 0xff, 0xf0]).unwrap();
        assert_eq!(dev.raw_xyz(), Ok([0x3e800, 0xfffff, 0]));

        let xyz = dev.xyz().unwrap();
        assert_eq!(xyz[0], FracRepr { integer: 9, fractional: 790_720_000 });
        assert_eq!(xyz[1], FracRepr { integer: 0, fractional: -38_245 });
        assert_eq!(xyz[2], FracRepr::default());

        dev.set_range(Range::G4).unwrap();
        assert_eq!(dev.accel(0x3e800), FracRepr { integer: 19, fractional: 581_440_000 });
    }

    #[test]
    fn temperature() {
        let mut dev = adxl355();
        // nominal intercept, 1885 LSB at 25 C
        dev.bus.write(REG_TEMP, &[0x07, 0x5d]).unwrap();
        assert_eq!(dev.raw_temp(), Ok(1885));
        assert_eq!(dev.temp(), Ok(FracRepr { integer: 25, fractional: 97 }));
    }

    #[test]
    fn fifo_resyncs_on_x_marker() {
        let mut dev = adxl355();
        dev.bus.set(REG_FIFO_ENTRIES, 7);
        dev.bus.push_fifo(REG_FIFO_DATA, &[
            0x00, 0x00, 0x30,             // stray Z
            0x00, 0x01, 0x01,             // X
            0x00, 0x02, 0x00,             // Y
            0x00, 0x03, 0x00,             // Z
            0x00, 0x04, 0x01,             // X
            0x00, 0x05, 0x00,             // Y
            0x00, 0x06, 0x00,             // Z
        ]);
        let mut out = [[0; 3]; 4];
        assert_eq!(dev.raw_fifo_data(&mut out), Ok(2));
        assert_eq!(out[0], [0x10, 0x20, 0x30]);
        assert_eq!(out[1], [0x40, 0x50, 0x60]);
    }

    #[test]
    fn fifo_scaled() {
        let mut dev = adxl355();
        dev.bus.set(REG_FIFO_ENTRIES, 3);
        dev.bus.push_fifo(REG_FIFO_DATA, &[0x3e, 0x80, 0x01, 0, 0, 0, 0xff, 0xff, 0xf0]);
        let mut out = [[FracRepr::default(); 3]; 2];
        assert_eq!(dev.fifo_data(&mut out), Ok(1));
        assert_eq!(out[0][0].integer, 9);
        assert_eq!(out[0][2].fractional, -38_245);
    }

    #[test]
    fn fifo_limits() {
        let mut dev = adxl355();
        assert_eq!(dev.set_fifo_samples(97), Err(Error::InvalidArgument("FIFO samples")));
        dev.set_fifo_samples(MAX_FIFO_SAMPLES).unwrap();
        let mut out = [[0; 3]; 1];
        assert_eq!(dev.raw_fifo_data(&mut out), Ok(0));
    }

    #[test]
    fn activity() {
        let mut dev = adxl355();
        dev.set_activity_enable(ActivityEnable { x: true, y: false, z: true }).unwrap();
        dev.set_activity_threshold(0x1234).unwrap();
        dev.set_activity_count(5).unwrap();
        dev.set_int_map(IntMap(0x88)).unwrap();
        dev.set_offset(0x0102, 0x0304, 0x0506).unwrap();
        dev.set_self_test(true).unwrap();
        assert_eq!(dev.activity_threshold(), 0x1234);
        assert_eq!(dev.offset(), [0x0102, 0x0304, 0x0506]);

        let (regs, _) = dev.remove();
        assert_eq!(regs.get(REG_ACT_EN), 0x05);
        assert_eq!((regs.get(REG_ACT_THRESH), regs.get(REG_ACT_THRESH + 1)), (0x12, 0x34));
        assert_eq!(regs.get(REG_ACT_COUNT), 5);
        assert_eq!(regs.get(REG_INT_MAP), 0x88);
        assert_eq!(regs.get(REG_OFFSET_Z + 1), 0x06);
        assert_eq!(regs.get(REG_SELF_TEST), SELF_TEST_TRIGGER);
    }
}
