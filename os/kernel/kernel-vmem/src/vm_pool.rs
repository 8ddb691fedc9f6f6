//! # Virtual memory pools
//!
//! A [`VmPool`] hands out variable-sized regions of virtual address space
//! inside `[base, base + size)`. Nothing is mapped up front; pages are backed
//! lazily by the page-fault path, which asks the pool whether a faulting
//! address is [legitimate](VmPool::is_legitimate).
//!
//! The first page of a pool is reserved for bookkeeping; regions are placed
//! back to back after it, each new region directly after the last one in the
//! list.

use core::fmt;
use kernel_alloc::registry::PoolId;
use kernel_memory_addresses::{FRAME_SIZE, PageSize, Size4K, VirtualAddress, VirtualPage};
use log::{debug, info, warn};

/// Maximum number of regions a single pool tracks.
pub const MAX_REGIONS: usize = 128;

/// One allocated range of pages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    start: VirtualAddress,
    pages: u32,
}

impl Region {
    const EMPTY: Self = Self {
        start: VirtualAddress::zero(),
        pages: 0,
    };

    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    /// Length in pages.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    /// Exclusive end address, widened so a region ending at 4 GiB is
    /// representable.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start.as_u32() as u64 + self.pages as u64 * Size4K::SIZE as u64
    }

    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u32() >= self.start.as_u32() && (va.as_u32() as u64) < self.end()
    }

    /// The pages of this region in ascending order.
    pub fn iter_pages(&self) -> impl Iterator<Item = VirtualPage<Size4K>> + use<> {
        let first = self.start.page::<Size4K>();
        (0..self.pages).filter_map(move |i| first.checked_add_pages(i))
    }
}

/// Which addresses the fault handler may back with frames.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Legitimacy {
    /// Anything inside `[base, base + size)`.
    #[default]
    WholePool,
    /// Only addresses inside a currently allocated region.
    AllocatedRegions,
}

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum VmPoolError {
    #[error("region of {requested} bytes does not fit, {available} bytes left in the pool")]
    Exhausted { requested: u32, available: u64 },
}

/// Allocator of virtual regions.
pub struct VmPool {
    base: VirtualAddress,
    size: u32,
    frame_pool: PoolId,
    legitimacy: Legitimacy,
    regions: [Region; MAX_REGIONS],
    count: usize,
}

impl VmPool {
    /// A pool over `[base, base + size)` whose pages are backed from
    /// `frame_pool`. `base` is aligned down to a page boundary.
    ///
    /// # Panics
    /// If the pool would extend past the top of the address space.
    #[must_use]
    pub fn new(base: VirtualAddress, size: u32, frame_pool: PoolId) -> Self {
        let base = base.align_down::<Size4K>();
        assert!(
            u64::from(base.as_u32()) + u64::from(size) <= 1 << 32,
            "VM pool at {base} with {size:#x} bytes extends past the top of the address space"
        );
        info!("Constructed VM pool at {base}, {size:#x} bytes, frames from {frame_pool:?}");
        Self {
            base,
            size,
            frame_pool,
            legitimacy: Legitimacy::WholePool,
            regions: [Region::EMPTY; MAX_REGIONS],
            count: 0,
        }
    }

    #[must_use]
    pub const fn with_legitimacy(mut self, legitimacy: Legitimacy) -> Self {
        self.legitimacy = legitimacy;
        self
    }

    /// Reserve a region of at least `size` bytes (rounded up to whole pages)
    /// and return its start address.
    ///
    /// # Errors
    /// [`VmPoolError::Exhausted`] if the region would extend past the end of
    /// the pool.
    ///
    /// # Panics
    /// If `size` is zero or the region list is full.
    pub fn allocate(&mut self, size: u32) -> Result<VirtualAddress, VmPoolError> {
        assert!(size > 0, "cannot allocate a zero-length region");
        assert!(
            self.count < MAX_REGIONS,
            "VM pool at {} has no room for another region ({MAX_REGIONS} allocated)",
            self.base
        );

        let start = match self.regions().last() {
            None => u64::from(self.base.as_u32()) + u64::from(FRAME_SIZE),
            Some(last) => last.end(),
        };
        let pages = size.div_ceil(FRAME_SIZE);
        let available = self.end().saturating_sub(start);
        if u64::from(pages) * u64::from(FRAME_SIZE) > available {
            warn!(
                "VM pool at {}: region of {size:#x} bytes does not fit ({available:#x} bytes left)",
                self.base
            );
            return Err(VmPoolError::Exhausted {
                requested: size,
                available,
            });
        }

        // `start < end <= 2^32`: bounded in `new` and by the check above.
        #[allow(clippy::cast_possible_truncation)]
        let start = VirtualAddress::new(start as u32);
        self.regions[self.count] = Region { start, pages };
        self.count += 1;
        debug!("Allocated region {start} ({pages} pages)");
        Ok(start)
    }

    /// Release the region starting at `start`, calling `unmap` for each of
    /// its pages, and return it.
    ///
    /// # Panics
    /// If no region starts at `start`.
    pub fn release(
        &mut self,
        start: VirtualAddress,
        mut unmap: impl FnMut(VirtualPage<Size4K>),
    ) -> Region {
        let Some(index) = self.regions().iter().position(|r| r.start == start) else {
            panic!("no region of VM pool at {} starts at {start}", self.base);
        };

        let region = self.regions[index];
        region.iter_pages().for_each(&mut unmap);

        self.regions.copy_within(index + 1..self.count, index);
        self.count -= 1;
        debug!("Released region {start} ({} pages)", region.pages);
        region
    }

    /// Whether the fault handler may back `va` with a frame.
    #[must_use]
    pub fn is_legitimate(&self, va: VirtualAddress) -> bool {
        match self.legitimacy {
            Legitimacy::WholePool => {
                va.as_u32() >= self.base.as_u32() && u64::from(va.as_u32()) < self.end()
            }
            Legitimacy::AllocatedRegions => self.regions().iter().any(|r| r.contains(va)),
        }
    }

    /// Allocated regions in address order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions[..self.count]
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Frame pool backing this pool's pages.
    #[must_use]
    pub const fn frame_pool(&self) -> PoolId {
        self.frame_pool
    }

    #[must_use]
    pub const fn legitimacy(&self) -> Legitimacy {
        self.legitimacy
    }

    const fn end(&self) -> u64 {
        self.base.as_u32() as u64 + self.size as u64
    }
}

impl fmt::Display for VmPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VM pool at {} size {:#x} ({} regions)",
            self.base,
            self.size,
            self.count
        )
    }
}

impl fmt::Debug for VmPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmPool")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("frame_pool", &self.frame_pool)
            .field("legitimacy", &self.legitimacy)
            .field("regions", &self.regions())
            .finish()
    }
}
