//! Simulated physical memory for host-side tests.

use crate::phys_mapper::PhysMapper;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber, PhysicalAddress};

/// A 4 KiB-aligned raw frame.
#[repr(C, align(4096))]
struct Aligned4K(UnsafeCell<[u8; 4096]>);

impl Aligned4K {
    const fn new_zeroed() -> Self {
        Self(UnsafeCell::new([0u8; 4096]))
    }
}

/// A tiny in-memory "RAM".
///
/// Physical memory is a contiguous vector of 4 KiB-aligned frames. Physical
/// addresses are byte offsets from 0, so frame `n` lives at `n * 4096` and
/// multi-frame structures (bitmaps) are contiguous just like on hardware.
///
/// This is *only* for tests. Real mappers must honor the actual mapping.
pub struct TestPhys {
    frames: Vec<Aligned4K>,
}

impl TestPhys {
    /// Zeroed memory covering physical frames `0..n`.
    #[must_use]
    pub fn with_frames(n: usize) -> Self {
        let mut frames = Vec::with_capacity(n);
        frames.resize_with(n, Aligned4K::new_zeroed);
        Self { frames }
    }

    /// Number of simulated frames.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn byte_ptr(&self, pa: PhysicalAddress, len: usize) -> *mut u8 {
        let end = pa.as_usize() + len;
        assert!(
            end <= self.frames.len() * FRAME_SIZE as usize,
            "physical access {pa}..+{len:#x} outside simulated memory"
        );
        // Frames are `repr(C)` and contiguous; interior mutability comes from `UnsafeCell`.
        let base = UnsafeCell::raw_get(self.frames.as_ptr().cast::<UnsafeCell<[u8; 4096]>>());
        unsafe { base.cast::<u8>().add(pa.as_usize()) }
    }

    /// Read a little-endian `u32` at `pa`.
    #[must_use]
    pub fn read_u32(&self, pa: PhysicalAddress) -> u32 {
        let ptr = self.byte_ptr(pa, 4).cast::<u32>();
        unsafe { ptr.read_unaligned() }
    }

    /// Write a little-endian `u32` at `pa`.
    pub fn write_u32(&self, pa: PhysicalAddress, value: u32) {
        let ptr = self.byte_ptr(pa, 4).cast::<u32>();
        unsafe { ptr.write_unaligned(value) }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = self.byte_ptr(pa, size_of::<T>());
        debug_assert!(ptr.cast::<T>().is_aligned(), "misaligned physical access at {pa}");
        // SAFETY: The caller promises `T` matches the bytes at `pa`.
        unsafe { &mut *ptr.cast::<T>() }
    }

    unsafe fn phys_to_slice_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        let ptr = self.byte_ptr(pa, len);
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_contiguous_and_aligned() {
        let phys = TestPhys::with_frames(4);
        let a: &mut [u8; 4096] = unsafe { phys.phys_to_mut(PhysicalAddress::new(0x1000)) };
        assert_eq!(core::ptr::from_mut(a).addr() % 4096, 0);
        a[4095] = 0xAB;
        let straddling = unsafe { phys.phys_to_slice_mut(PhysicalAddress::new(0x1FFF), 2) };
        assert_eq!(straddling[0], 0xAB);
        straddling[1] = 0xCD;
        assert_eq!(phys.read_u32(PhysicalAddress::new(0x2000)) & 0xFF, 0xCD);
    }

    #[test]
    #[should_panic(expected = "outside simulated memory")]
    fn access_past_end_panics() {
        let phys = TestPhys::with_frames(1);
        let _ = phys.read_u32(PhysicalAddress::new(0x1000));
    }
}
