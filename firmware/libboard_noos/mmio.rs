use core::ptr;

/// 32-bit register window of an AXI peripheral. Offsets are in bytes.
pub trait Mmio {
    fn read(&self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, val: u32);

    fn update(&mut self, offset: u32, mask: u32, val: u32) {
        let reg = (self.read(offset) & !mask) | (val & mask);
        self.write(offset, reg)
    }
}

impl<'a, T: Mmio + ?Sized> Mmio for &'a mut T {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: u32, val: u32) {
        (**self).write(offset, val)
    }
}

pub struct MmioRegion {
    base: usize,
}

impl MmioRegion {
    /// `base` must be the address of a mapped peripheral that nothing else
    /// accesses while this region is alive.
    pub unsafe fn new(base: usize) -> MmioRegion {
        MmioRegion { base: base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl Mmio for MmioRegion {
    fn read(&self, offset: u32) -> u32 {
        unsafe { ptr::read_volatile((self.base + offset as usize) as *const u32) }
    }

    fn write(&mut self, offset: u32, val: u32) {
        unsafe { ptr::write_volatile((self.base + offset as usize) as *mut u32, val) }
    }
}
