//! # Address Space (two-level, directory-rooted)
//!
//! One virtual address space: a page directory, the page tables hanging off
//! it, and the VM pools that say which addresses the fault handler may back
//! with frames.
//!
//! ## Highlights
//!
//! - [`AddressSpace::new`] builds a directory whose first table identity-maps
//!   the shared low 4 MiB.
//! - [`AddressSpace::handle_fault`] installs missing tables and data frames
//!   on demand.
//! - [`AddressSpace::free_page`] and [`AddressSpace::release`] hand frames
//!   back to their pools and unmap the pages.
//! - [`AddressSpace::translate`] walks the tables in software.
//!
//! ## Reaching the tables
//!
//! With [`DirectoryLayout::Flat`] every table frame is reached physically
//! through the [`PhysMapper`]. With [`DirectoryLayout::SelfMapped`] the last
//! directory slot points at the directory itself; once paging is on and this
//! space is loaded, tables are reached through the window in the top 4 MiB
//! (see [`recursive`](crate::recursive)).
//!
//! ## Safety
//!
//! Any change to the loaded space leaves stale TLB entries behind; releasing
//! a region reloads CR3 after each page when this space is the current one.

use crate::PageEntryBits;
use crate::context::{PagingContext, PagingError};
use crate::fault::{FaultOutcome, PageFault, PageFaultError};
use crate::mmu::Mmu;
use crate::page_table::pd::{L2Index, PageDirectory, PdEntry};
use crate::page_table::pt::{L1Index, PageTable, PtEntry};
use crate::page_table::split_indices;
use crate::recursive::{DIRECTORY_WINDOW, SELF_MAP_SLOT, table_window};
use crate::vm_pool::{Region, VmPool, VmPoolError};
use core::fmt;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::registry::{FramePoolRegistry, PoolId};
use kernel_memory_addresses::{
    FrameNumber, PhysicalAddress, Size4K, VirtualAddress, VirtualPage,
};
use log::{debug, info, warn};

/// Most VM pools one address space tracks.
pub const MAX_VM_POOLS: usize = 8;

/// Where the directory and its first table come from and how tables are
/// reached afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DirectoryLayout {
    /// Structures from the kernel pool, always reached physically.
    Flat,
    /// Structures from the process pool, self-mapped through the last slot.
    SelfMapped,
}

/// Handle for a VM pool registered with an [`AddressSpace`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VmPoolId(usize);

pub struct AddressSpace {
    directory: FrameNumber,
    layout: DirectoryLayout,
    pools: [Option<VmPool>; MAX_VM_POOLS],
    pool_count: usize,
}

/// Reaches the directory and tables of one address space.
struct Tables<'c, M, H> {
    mapper: &'c M,
    mmu: &'c H,
    directory: FrameNumber,
    layout: DirectoryLayout,
    recursive: bool,
}

impl<M: PhysMapper, H: Mmu> Tables<'_, M, H> {
    /// # Safety
    /// No other reference to the directory may be live.
    unsafe fn directory<'a>(&self) -> &'a mut PageDirectory {
        if self.recursive {
            // SAFETY: the self-map slot makes the directory visible here.
            unsafe { self.mmu.virt_to_mut(DIRECTORY_WINDOW) }
        } else {
            unsafe { self.mapper.phys_to_mut(self.directory.address()) }
        }
    }

    /// # Safety
    /// `frame` must be the table installed at `slot`, `slot` must not be the
    /// self-map slot, and no other reference to the table may be live.
    unsafe fn table<'a>(&self, slot: L2Index, frame: FrameNumber) -> &'a mut PageTable {
        debug_assert!(!self.is_self_map(slot));
        if self.recursive {
            unsafe { self.mmu.virt_to_mut(table_window(slot)) }
        } else {
            unsafe { self.mapper.phys_to_mut(frame.address()) }
        }
    }

    fn is_self_map(&self, slot: L2Index) -> bool {
        self.layout == DirectoryLayout::SelfMapped && slot == SELF_MAP_SLOT
    }
}

impl AddressSpace {
    /// Build a fresh address space.
    ///
    /// The directory and its first table come from the kernel pool
    /// ([`Flat`](DirectoryLayout::Flat)) or the process pool
    /// ([`SelfMapped`](DirectoryLayout::SelfMapped)). The first table
    /// identity-maps frames `0..1024` supervisor read/write; every other
    /// directory slot is marked not present. Paging must not be on yet, or
    /// the new frames must be reachable through the mapper.
    ///
    /// # Errors
    /// [`PagingError::OutOfFrames`] if the pool cannot supply the frames.
    ///
    /// # Panics
    /// If the pool has fewer than two free frames.
    pub fn new<M: PhysMapper, H: Mmu>(
        ctx: &mut PagingContext<'_, M, H>,
        layout: DirectoryLayout,
    ) -> Result<Self, PagingError> {
        let pool = match layout {
            DirectoryLayout::Flat => ctx.kernel_pool,
            DirectoryLayout::SelfMapped => ctx.process_pool,
        };

        let directory = ctx.frames.get_frames(pool, 1)?;
        let first_table = match ctx.frames.get_frames(pool, 1) {
            Ok(frame) => frame,
            Err(e) => {
                ctx.frames.release_frames(directory);
                return Err(e.into());
            }
        };

        // SAFETY: both frames were just handed out and nothing else refers to them.
        let table: &mut PageTable = unsafe { ctx.mapper.phys_to_mut(first_table.address()) };
        for index in L1Index::all() {
            let frame = FrameNumber::new(u32::from(index.as_u16()));
            table.set(index, PtEntry::make_4k(frame, PageEntryBits::supervisor_rw()));
        }

        let dir: &mut PageDirectory = unsafe { ctx.mapper.phys_to_mut(directory.address()) };
        dir.fill(PdEntry::not_present());
        dir.set(
            L2Index::new(0),
            PdEntry::make_table(first_table, PageEntryBits::supervisor_rw()),
        );
        if layout == DirectoryLayout::SelfMapped {
            dir.set(
                SELF_MAP_SLOT,
                PdEntry::make_table(directory, PageEntryBits::supervisor_rw()),
            );
        }

        info!("Created {layout:?} address space with directory at {directory}");
        Ok(Self {
            directory,
            layout,
            pools: [const { None }; MAX_VM_POOLS],
            pool_count: 0,
        })
    }

    #[must_use]
    pub const fn directory_frame(&self) -> FrameNumber {
        self.directory
    }

    #[must_use]
    pub const fn layout(&self) -> DirectoryLayout {
        self.layout
    }

    /// Whether this space's directory is the one loaded in CR3.
    #[must_use]
    pub fn is_current<M: PhysMapper, H: Mmu>(&self, ctx: &PagingContext<'_, M, H>) -> bool {
        ctx.current == Some(self.directory.address())
    }

    /// Make this the active address space.
    pub fn load<M: PhysMapper, H: Mmu>(&self, ctx: &mut PagingContext<'_, M, H>) {
        let directory = self.directory.address();
        ctx.mmu.load_directory(directory);
        ctx.current = Some(directory);
        info!("Loaded address space with directory at {directory}");
    }

    /// Track `pool` for legitimacy checks and region allocation.
    ///
    /// # Panics
    /// If [`MAX_VM_POOLS`] pools are already registered.
    pub fn register_pool(&mut self, pool: VmPool) -> VmPoolId {
        assert!(
            self.pool_count < MAX_VM_POOLS,
            "address space is at capacity ({MAX_VM_POOLS} VM pools)"
        );
        let id = VmPoolId(self.pool_count);
        info!("Registered {pool}");
        self.pools[id.0] = Some(pool);
        self.pool_count += 1;
        id
    }

    /// Create a VM pool over `[base, base + size)` backed by `frame_pool`
    /// and register it.
    pub fn create_pool(
        &mut self,
        base: VirtualAddress,
        size: u32,
        frame_pool: PoolId,
    ) -> VmPoolId {
        self.register_pool(VmPool::new(base, size, frame_pool))
    }

    /// # Panics
    /// If `id` was not issued by this address space.
    #[must_use]
    pub fn vm_pool(&self, id: VmPoolId) -> &VmPool {
        match self.pools.get(id.0) {
            Some(Some(pool)) => pool,
            _ => panic!("no VM pool {id:?} in this address space"),
        }
    }

    /// # Panics
    /// If `id` was not issued by this address space.
    pub fn vm_pool_mut(&mut self, id: VmPoolId) -> &mut VmPool {
        match self.pools.get_mut(id.0) {
            Some(Some(pool)) => pool,
            _ => panic!("no VM pool {id:?} in this address space"),
        }
    }

    /// Registered pools in registration order.
    pub fn vm_pools(&self) -> impl Iterator<Item = &VmPool> {
        self.pools.iter().flatten()
    }

    /// Reserve `size` bytes of address space in pool `id`. No frames are
    /// taken until the pages are touched.
    ///
    /// # Errors
    /// [`VmPoolError::Exhausted`] if the pool has no room left.
    pub fn allocate(&mut self, id: VmPoolId, size: u32) -> Result<VirtualAddress, VmPoolError> {
        self.vm_pool_mut(id).allocate(size)
    }

    /// Release the region starting at `start` in pool `id`: every backed page
    /// gives its frame back and is unmapped.
    ///
    /// # Panics
    /// If no region of the pool starts at `start`.
    pub fn release<M: PhysMapper, H: Mmu>(
        &mut self,
        ctx: &mut PagingContext<'_, M, H>,
        id: VmPoolId,
        start: VirtualAddress,
    ) -> Region {
        let reload = self.is_current(ctx);
        let directory = self.directory.address();
        let tables = self.tables(ctx.mapper, &ctx.mmu, ctx.paging_enabled, ctx.current);
        let frames = &mut ctx.frames;
        let shared_size = ctx.shared_size;

        self.vm_pool_mut(id).release(start, |page| {
            unmap_page(&tables, frames, shared_size, page);
            if reload {
                tables.mmu.load_directory(directory);
            }
        })
    }

    /// Release the frame behind `page` and mark it not present.
    ///
    /// Returns `false` without touching anything if the page is not mapped
    /// or lies in the shared region.
    pub fn free_page<M: PhysMapper, H: Mmu>(
        &mut self,
        ctx: &mut PagingContext<'_, M, H>,
        page: VirtualPage<Size4K>,
    ) -> bool {
        let tables = self.tables(ctx.mapper, &ctx.mmu, ctx.paging_enabled, ctx.current);
        unmap_page(&tables, &mut ctx.frames, ctx.shared_size, page)
    }

    /// Resolve a not-present fault by mapping a fresh frame at the faulting
    /// page, installing a page table first if the directory slot is empty.
    ///
    /// Page tables always come from the kernel pool. Data frames come from
    /// the frame pool of the VM pool that claims the address.
    ///
    /// # Errors
    /// - [`PageFaultError::ProtectionViolation`] if the page was present.
    /// - [`PageFaultError::IllegitimateAddress`] if no registered pool claims
    ///   the address. A flat space without any pools accepts every address
    ///   and backs it from the process pool.
    /// - [`PageFaultError::OutOfFrames`] if a pool cannot supply the frame.
    ///
    /// # Panics
    /// If the pool supplying a frame has none left free.
    pub fn handle_fault<M: PhysMapper, H: Mmu>(
        &mut self,
        ctx: &mut PagingContext<'_, M, H>,
        fault: PageFault,
    ) -> Result<FaultOutcome, PageFaultError> {
        let address = fault.address;
        if fault.error.present() {
            return Err(PageFaultError::ProtectionViolation {
                address,
                error: fault.error,
            });
        }

        let claimed = self
            .vm_pools()
            .find(|pool| pool.is_legitimate(address))
            .map(VmPool::frame_pool);
        let data_pool = match claimed {
            Some(pool) => pool,
            None if self.layout == DirectoryLayout::Flat && self.pool_count == 0 => {
                ctx.process_pool
            }
            None => return Err(PageFaultError::IllegitimateAddress(address)),
        };

        let (slot, index) = split_indices(address);
        let tables = self.tables(ctx.mapper, &ctx.mmu, ctx.paging_enabled, ctx.current);
        if tables.is_self_map(slot) {
            return Err(PageFaultError::IllegitimateAddress(address));
        }

        // SAFETY: the directory and the table are distinct frames and no
        // other reference into this space is live.
        let directory = unsafe { tables.directory() };
        let mut new_table = None;
        let table = if let Some(frame) = directory.get(slot).next_table() {
            unsafe { tables.table(slot, frame) }
        } else {
            let frame = ctx.frames.get_frames(ctx.kernel_pool, 1)?;
            directory.set(
                slot,
                PdEntry::make_table(frame, PageEntryBits::supervisor_rw()),
            );
            let table = unsafe { tables.table(slot, frame) };
            table.fill(PtEntry::not_present());
            debug!("Installed page table {frame} for directory slot {}", slot.as_usize());
            new_table = Some(frame);
            table
        };

        if table.get(index).is_present() {
            debug!("Spurious fault at {address}");
            return Ok(FaultOutcome::Spurious);
        }

        // On failure a freshly installed table stays; the next fault reuses it.
        let frame = ctx.frames.get_frames(data_pool, 1)?;
        table.set(index, PtEntry::make_4k(frame, PageEntryBits::supervisor_rw()));
        debug!("Mapped {} to {frame}", address.align_down::<Size4K>());
        Ok(FaultOutcome::Mapped { frame, new_table })
    }

    /// Translate `va` by walking this space's tables.
    #[must_use]
    pub fn translate<M: PhysMapper, H: Mmu>(
        &self,
        ctx: &PagingContext<'_, M, H>,
        va: VirtualAddress,
    ) -> Option<PhysicalAddress> {
        let tables = self.tables(ctx.mapper, &ctx.mmu, ctx.paging_enabled, ctx.current);
        let (slot, index) = split_indices(va);

        // SAFETY: read-only walk; nothing else holds a reference into the tables.
        let directory = unsafe { tables.directory() };
        let table_frame = directory.get(slot).next_table()?;
        let entry = if tables.is_self_map(slot) {
            PtEntry::from_raw(directory.get(L2Index::new(index.as_u16())).raw())
        } else {
            unsafe { tables.table(slot, table_frame) }.get(index)
        };

        let frame = entry.frame()?;
        Some(frame.page().join(va.offset::<Size4K>()))
    }

    fn tables<'c, M: PhysMapper, H: Mmu>(
        &self,
        mapper: &'c M,
        mmu: &'c H,
        paging_enabled: bool,
        current: Option<PhysicalAddress>,
    ) -> Tables<'c, M, H> {
        let recursive = self.layout == DirectoryLayout::SelfMapped
            && paging_enabled
            && current == Some(self.directory.address());
        Tables {
            mapper,
            mmu,
            directory: self.directory,
            layout: self.layout,
            recursive,
        }
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("directory", &self.directory)
            .field("layout", &self.layout)
            .field("pools", &self.pool_count)
            .finish_non_exhaustive()
    }
}

fn unmap_page<M: PhysMapper, H: Mmu>(
    tables: &Tables<'_, M, H>,
    frames: &mut FramePoolRegistry<'_>,
    shared_size: u32,
    page: VirtualPage<Size4K>,
) -> bool {
    let va = page.base();
    if va.as_u32() < shared_size {
        warn!("Not freeing {va}: inside the shared region");
        return false;
    }

    let (slot, index) = split_indices(va);
    if tables.is_self_map(slot) {
        warn!("Not freeing {va}: inside the table window");
        return false;
    }

    // SAFETY: the directory and the table are distinct frames and no other
    // reference into this space is live.
    let directory = unsafe { tables.directory() };
    let Some(table_frame) = directory.get(slot).next_table() else {
        return false;
    };
    let table = unsafe { tables.table(slot, table_frame) };
    let entry = table.get(index);
    let Some(frame) = entry.frame() else {
        return false;
    };

    frames.release_frames(frame);
    table.set(index, entry.without_present());
    debug!("Freed {va} (frame {frame})");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::PageFaultErrorCode;
    use crate::recursive::table_window;
    use crate::testing::{SMALL_LAYOUT_FRAMES, TestContext, boot, read, touch, write};
    use crate::vm_pool::Legitimacy;
    use kernel_alloc::testing::TestPhys;

    const MB: u32 = 1 << 20;
    const POOL_BASE: VirtualAddress = VirtualAddress::new(0x4000_0000);

    fn va(v: u32) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    fn free(ctx: &TestContext<'_>, pool: PoolId) -> u32 {
        ctx.frames().pool(pool).free_frames()
    }

    fn fault(
        ctx: &mut TestContext<'_>,
        space: &mut AddressSpace,
        address: u32,
    ) -> Result<FaultOutcome, PageFaultError> {
        space.handle_fault(ctx, PageFault::not_present(va(address), true))
    }

    /// Self-mapped space, loaded, paging on, one 1 MiB pool at 1 GiB.
    fn running(ctx: &mut TestContext<'_>) -> (AddressSpace, VmPoolId) {
        let mut space = AddressSpace::new(ctx, DirectoryLayout::SelfMapped).unwrap();
        space.load(ctx);
        ctx.enable_paging().unwrap();
        let pool = space.create_pool(POOL_BASE, MB, ctx.process_pool());
        (space, pool)
    }

    #[test]
    fn flat_space_identity_maps_shared_region() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let kernel_free = free(&ctx, ctx.kernel_pool());

        let space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        assert_eq!(space.directory_frame(), FrameNumber::new(514));
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free - 2);

        for addr in [0, 0x1000, 0x0012_3456, 0x003F_FFFC] {
            assert_eq!(space.translate(&ctx, va(addr)), Some(PhysicalAddress::new(addr)));
        }
        assert_eq!(space.translate(&ctx, va(0x0040_0000)), None);
        assert_eq!(space.translate(&ctx, va(0xFFFF_F000)), None);
        assert!(!space.is_current(&ctx));
    }

    #[test]
    fn self_mapped_directory_is_visible_through_the_window() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let process_free = free(&ctx, ctx.process_pool());

        let space = AddressSpace::new(&mut ctx, DirectoryLayout::SelfMapped).unwrap();
        let directory = space.directory_frame();
        assert_eq!(directory, FrameNumber::new(1024));
        assert_eq!(free(&ctx, ctx.process_pool()), process_free - 2);

        space.load(&mut ctx);
        ctx.enable_paging().unwrap();
        assert!(space.is_current(&ctx));
        assert_eq!(ctx.mmu().cr3(), Some(directory.address()));

        let mmu = ctx.mmu();
        assert_eq!(mmu.try_translate(DIRECTORY_WINDOW), Some(directory.address()));
        assert_eq!(
            mmu.try_translate(table_window(L2Index::new(0))),
            Some(FrameNumber::new(1025).address())
        );
        assert_eq!(mmu.try_translate(table_window(L2Index::new(1))), None);

        // Walks through the window agree with the physical walk.
        assert_eq!(space.translate(&ctx, va(0x2345)), Some(PhysicalAddress::new(0x2345)));
        assert_eq!(
            space.translate(&ctx, DIRECTORY_WINDOW + 0x10),
            Some(directory.address() + 0x10)
        );
    }

    #[test]
    fn first_touch_installs_table_and_frame() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, _) = running(&mut ctx);
        let kernel_free = free(&ctx, ctx.kernel_pool());
        let process_free = free(&ctx, ctx.process_pool());

        assert_eq!(space.translate(&ctx, va(0x4000_0010)), None);
        write(&mut ctx, &mut space, va(0x4000_0010), 0xDEAD_BEEF);
        assert_eq!(read(&mut ctx, &mut space, va(0x4000_0010)), 0xDEAD_BEEF);
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free - 1);
        assert_eq!(free(&ctx, ctx.process_pool()), process_free - 1);

        // Same directory slot: only a data frame.
        write(&mut ctx, &mut space, va(0x4000_1000), 7);
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free - 1);
        assert_eq!(free(&ctx, ctx.process_pool()), process_free - 2);

        let a = space.translate(&ctx, va(0x4000_0000)).unwrap();
        let b = space.translate(&ctx, va(0x4000_1000)).unwrap();
        assert_ne!(a.frame_number(), b.frame_number());
        assert_eq!(read(&mut ctx, &mut space, va(0x4000_0010)), 0xDEAD_BEEF);
    }

    #[test]
    fn repeated_fault_is_spurious() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        space.create_pool(POOL_BASE, 8 * MB, ctx.process_pool());

        let Ok(FaultOutcome::Mapped { frame, new_table }) = fault(&mut ctx, &mut space, 0x4000_0000)
        else {
            panic!("first fault must map");
        };
        assert_eq!(frame, FrameNumber::new(1024));
        let table = new_table.unwrap();
        assert!(ctx.frames().pool(ctx.kernel_pool()).contains(table));

        assert_eq!(fault(&mut ctx, &mut space, 0x4000_0ABC), Ok(FaultOutcome::Spurious));
        assert_eq!(
            fault(&mut ctx, &mut space, 0x4000_5000),
            Ok(FaultOutcome::Mapped {
                frame: FrameNumber::new(1025),
                new_table: None
            })
        );
        // Next 4 MiB needs another table.
        assert!(matches!(
            fault(&mut ctx, &mut space, 0x4040_0000),
            Ok(FaultOutcome::Mapped { new_table: Some(_), .. })
        ));
    }

    #[test]
    fn flat_space_without_pools_accepts_any_address() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();

        let outcome = fault(&mut ctx, &mut space, 0x8000_0000).unwrap();
        assert!(matches!(outcome, FaultOutcome::Mapped { frame, .. } if frame == FrameNumber::new(1024)));
        assert_eq!(
            space.translate(&ctx, va(0x8000_0123)),
            Some(FrameNumber::new(1024).address() + 0x123)
        );
    }

    #[test]
    fn addresses_outside_every_pool_are_rejected() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);

        let mut flat = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        flat.create_pool(POOL_BASE, MB, ctx.process_pool());
        assert_eq!(
            fault(&mut ctx, &mut flat, 0x4010_0000),
            Err(PageFaultError::IllegitimateAddress(va(0x4010_0000)))
        );

        let mut self_mapped = AddressSpace::new(&mut ctx, DirectoryLayout::SelfMapped).unwrap();
        assert_eq!(
            fault(&mut ctx, &mut self_mapped, 0x8000_0000),
            Err(PageFaultError::IllegitimateAddress(va(0x8000_0000)))
        );
    }

    #[test]
    fn the_table_window_is_never_backed() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, _) = running(&mut ctx);
        space.create_pool(va(0xFFC0_0000), 4 * MB - 4096, ctx.process_pool());
        assert_eq!(
            fault(&mut ctx, &mut space, 0xFFC0_5000),
            Err(PageFaultError::IllegitimateAddress(va(0xFFC0_5000)))
        );
    }

    #[test]
    fn protection_faults_are_errors() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        let error = PageFaultErrorCode::from_bits(0b011);
        let fault = PageFault {
            address: va(0x1000),
            error,
        };
        assert_eq!(
            space.handle_fault(&mut ctx, fault),
            Err(PageFaultError::ProtectionViolation {
                address: va(0x1000),
                error
            })
        );
    }

    #[test]
    fn allocated_regions_legitimacy() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::SelfMapped).unwrap();
        let pool = space.register_pool(
            VmPool::new(POOL_BASE, MB, ctx.process_pool())
                .with_legitimacy(Legitimacy::AllocatedRegions),
        );

        assert!(fault(&mut ctx, &mut space, 0x4000_1000).is_err());
        let start = space.allocate(pool, 2 * 4096).unwrap();
        assert_eq!(start, va(0x4000_1000));
        assert!(fault(&mut ctx, &mut space, 0x4000_1000).is_ok());
        assert!(fault(&mut ctx, &mut space, 0x4000_2FFF).is_ok());
        assert!(fault(&mut ctx, &mut space, 0x4000_3000).is_err());
    }

    #[test]
    fn release_returns_frames_and_reloads_cr3() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, pool) = running(&mut ctx);

        let start = space.allocate(pool, 3 * 4096).unwrap();
        write(&mut ctx, &mut space, start, 1);
        write(&mut ctx, &mut space, start + 0x1000, 2);
        let process_free = free(&ctx, ctx.process_pool());
        let loads = ctx.mmu().loads();

        let region = space.release(&mut ctx, pool, start);
        assert_eq!(region.start(), start);
        assert_eq!(region.pages(), 3);
        assert_eq!(free(&ctx, ctx.process_pool()), process_free + 2);
        assert_eq!(ctx.mmu().loads(), loads + 3);
        assert_eq!(space.translate(&ctx, start), None);
        assert_eq!(space.translate(&ctx, start + 0x1000), None);
        assert!(space.vm_pool(pool).regions().is_empty());

        // The page table stays; touching again only maps a data frame.
        let kernel_free = free(&ctx, ctx.kernel_pool());
        touch(&mut ctx, &mut space, start);
        assert!(space.translate(&ctx, start).is_some());
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free);
    }

    #[test]
    fn release_of_inactive_space_does_not_touch_cr3() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        let pool = space.create_pool(POOL_BASE, MB, ctx.process_pool());

        let start = space.allocate(pool, 4096).unwrap();
        fault(&mut ctx, &mut space, start.as_u32()).unwrap();
        space.release(&mut ctx, pool, start);
        assert_eq!(ctx.mmu().loads(), 0);
        assert_eq!(space.translate(&ctx, start), None);
    }

    #[test]
    fn frames_go_back_to_the_pool_that_supplied_them() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, _) = running(&mut ctx);
        let heap = space.create_pool(va(0x8000_0000), MB, ctx.kernel_pool());

        let start = space.allocate(heap, 4096).unwrap();
        write(&mut ctx, &mut space, start, 42);
        let frame = space.translate(&ctx, start).unwrap().frame_number();
        assert!(ctx.frames().pool(ctx.kernel_pool()).contains(frame));

        let kernel_free = free(&ctx, ctx.kernel_pool());
        space.release(&mut ctx, heap, start);
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free + 1);
    }

    #[test]
    fn free_page_spares_the_shared_region() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, _) = running(&mut ctx);
        let kernel_free = free(&ctx, ctx.kernel_pool());

        assert!(!space.free_page(&mut ctx, VirtualPage::containing_address(va(0x0020_0000))));
        assert_eq!(space.translate(&ctx, va(0x0020_0000)), Some(PhysicalAddress::new(0x0020_0000)));
        assert_eq!(free(&ctx, ctx.kernel_pool()), kernel_free);
    }

    #[test]
    fn free_page_of_unmapped_page_is_a_no_op() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let (mut space, _) = running(&mut ctx);

        assert!(!space.free_page(&mut ctx, VirtualPage::containing_address(va(0x4000_0000))));
        write(&mut ctx, &mut space, va(0x4000_0000), 1);
        let page = VirtualPage::containing_address(va(0x4000_0000));
        assert!(space.free_page(&mut ctx, page));
        assert!(!space.free_page(&mut ctx, page));
        assert!(!space.free_page(&mut ctx, VirtualPage::containing_address(va(0xFFFF_F000))));
    }

    #[test]
    #[should_panic(expected = "at capacity")]
    fn vm_pool_capacity_is_bounded() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        for i in 0..=u32::try_from(MAX_VM_POOLS).unwrap() {
            space.create_pool(va(0x4000_0000 + i * MB), MB, ctx.process_pool());
        }
    }

    #[test]
    #[should_panic(expected = "only 0 are free")]
    fn exhausted_pool_halts_the_fault_path() {
        let phys = TestPhys::with_frames(SMALL_LAYOUT_FRAMES);
        let mut ctx = boot(&phys);
        let mut space = AddressSpace::new(&mut ctx, DirectoryLayout::Flat).unwrap();
        space.create_pool(POOL_BASE, 8 * MB, ctx.process_pool());
        for page in 0..=1024 {
            fault(&mut ctx, &mut space, 0x4000_0000 + page * 4096).unwrap();
        }
    }
}
