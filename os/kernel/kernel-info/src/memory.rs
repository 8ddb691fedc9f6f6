//! # Memory Layout

use kernel_memory_addresses::{FrameNumber, PhysicalAddress};

/// A half-open range of physical frames, `[base, base + count)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameRange {
    pub base: FrameNumber,
    pub count: u32,
}

impl FrameRange {
    #[must_use]
    pub const fn new(base: u32, count: u32) -> Self {
        Self {
            base: FrameNumber::new(base),
            count,
        }
    }

    /// One past the last frame of the range.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.base.as_u32() + self.count
    }

    #[must_use]
    pub const fn contains(&self, frame: FrameNumber) -> bool {
        frame.as_u32() >= self.base.as_u32() && frame.as_u32() < self.end()
    }

    /// Whether `other` lies completely inside this range.
    #[must_use]
    pub const fn covers(&self, other: &Self) -> bool {
        other.base.as_u32() >= self.base.as_u32() && other.end() <= self.end()
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.base.as_u32() < other.end() && other.base.as_u32() < self.end()
    }

    #[must_use]
    pub const fn start_address(&self) -> PhysicalAddress {
        self.base.address()
    }
}

/// Physical memory layout the memory manager is initialised with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    /// Frames for kernel data structures: page directories, page tables and
    /// the bitmaps of other pools.
    pub kernel_pool: FrameRange,

    /// Frames backing process memory on demand.
    pub process_pool: FrameRange,

    /// A range inside the process pool that is not backed by RAM.
    pub memory_hole: Option<FrameRange>,

    /// Bytes at the bottom of every address space that are identity-mapped
    /// and shared with the kernel.
    pub shared_size: u32,
}

/// Frame size in bytes.
pub const FRAME_SIZE: u32 = kernel_memory_addresses::FRAME_SIZE;

/// Default size of the shared, identity-mapped kernel region (4 MiB).
pub const SHARED_SIZE: u32 = 4 * 1024 * 1024;

impl MemoryLayout {
    /// Kernel pool at 2 MiB..4 MiB, process pool at 4 MiB..32 MiB with a
    /// hole at 15 MiB..16 MiB.
    pub const DEFAULT: Self = Self {
        kernel_pool: FrameRange::new(512, 512),
        process_pool: FrameRange::new(1024, 7168),
        memory_hole: Some(FrameRange::new(3840, 256)),
        shared_size: SHARED_SIZE,
    };

    /// Checks the constraints the frame pools rely on.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        if self.kernel_pool.count == 0 || !self.kernel_pool.count.is_multiple_of(4) {
            return false;
        }
        if self.process_pool.count == 0 || !self.process_pool.count.is_multiple_of(4) {
            return false;
        }
        if self.kernel_pool.overlaps(&self.process_pool) {
            return false;
        }
        if !self.shared_size.is_multiple_of(FRAME_SIZE) {
            return false;
        }
        match self.memory_hole {
            Some(hole) => self.process_pool.covers(&hole),
            None => true,
        }
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = {
    assert!(MemoryLayout::DEFAULT.is_valid());
    assert!(MemoryLayout::DEFAULT.kernel_pool.end() * FRAME_SIZE <= SHARED_SIZE);
};
