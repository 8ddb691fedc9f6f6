//! Software MMU and boot helpers for host-side tests.

use crate::address_space::AddressSpace;
use crate::bootstrap::init_memory;
use crate::context::PagingContext;
use crate::fault::FaultOutcome;
use crate::mmu::Mmu;
use crate::trap::on_page_fault;
use core::cell::Cell;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::testing::TestPhys;
use kernel_info::memory::{FrameRange, MemoryLayout, SHARED_SIZE};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Error code of a not-present write fault.
pub const NOT_PRESENT_WRITE: u32 = 0b010;

/// Kernel pool at 2 MiB..4 MiB, process pool at 4 MiB..8 MiB, no hole.
pub const SMALL_LAYOUT: MemoryLayout = MemoryLayout {
    kernel_pool: FrameRange::new(512, 512),
    process_pool: FrameRange::new(1024, 1024),
    memory_hole: None,
    shared_size: SHARED_SIZE,
};

/// Frames needed to back [`SMALL_LAYOUT`].
pub const SMALL_LAYOUT_FRAMES: usize = 2048;

/// Translation hardware over [`TestPhys`].
///
/// Records CR3/CR0 writes and walks the loaded directory exactly as the CPU
/// would. Until paging is enabled, virtual addresses are physical.
pub struct SoftMmu<'p> {
    phys: &'p TestPhys,
    cr3: Cell<Option<PhysicalAddress>>,
    paging: Cell<bool>,
    cr2: Cell<VirtualAddress>,
    loads: Cell<u32>,
}

impl<'p> SoftMmu<'p> {
    pub const fn new(phys: &'p TestPhys) -> Self {
        Self {
            phys,
            cr3: Cell::new(None),
            paging: Cell::new(false),
            cr2: Cell::new(VirtualAddress::zero()),
            loads: Cell::new(0),
        }
    }

    /// Number of CR3 writes so far.
    pub fn loads(&self) -> u32 {
        self.loads.get()
    }

    pub fn cr3(&self) -> Option<PhysicalAddress> {
        self.cr3.get()
    }

    pub fn paging(&self) -> bool {
        self.paging.get()
    }

    /// Latch `va` into CR2, as the CPU does when raising a fault.
    pub fn raise(&self, va: VirtualAddress) {
        self.cr2.set(va);
    }

    /// Translate through the loaded directory; `None` means the access
    /// would fault.
    pub fn try_translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.paging.get() {
            return Some(PhysicalAddress::new(va.as_u32()));
        }
        let directory = self.cr3.get()?;
        let pde = self
            .phys
            .read_u32(directory + 4 * u32::try_from(va.directory_index()).ok()?);
        if pde & 1 == 0 {
            return None;
        }
        let table = PhysicalAddress::new(pde & !0xFFF);
        let pte = self
            .phys
            .read_u32(table + 4 * u32::try_from(va.table_index()).ok()?);
        if pte & 1 == 0 {
            return None;
        }
        Some(PhysicalAddress::new((pte & !0xFFF) | (va.as_u32() & 0xFFF)))
    }
}

impl Mmu for SoftMmu<'_> {
    fn load_directory(&self, directory: PhysicalAddress) {
        self.cr3.set(Some(directory));
        self.loads.set(self.loads.get() + 1);
    }

    fn enable_paging(&self) {
        self.paging.set(true);
    }

    fn fault_address(&self) -> VirtualAddress {
        self.cr2.get()
    }

    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        let Some(pa) = self.try_translate(va) else {
            panic!("unhandled page fault at {va} in kernel code");
        };
        unsafe { self.phys.phys_to_mut(pa) }
    }
}

pub type TestContext<'p> = PagingContext<'p, TestPhys, SoftMmu<'p>>;

/// Bring up [`SMALL_LAYOUT`] on `phys`.
pub fn boot(phys: &TestPhys) -> TestContext<'_> {
    init_memory(phys, SoftMmu::new(phys), &SMALL_LAYOUT).unwrap()
}

/// Access `va` the way a running program would: fault until it translates.
pub fn touch(ctx: &mut TestContext<'_>, space: &mut AddressSpace, va: VirtualAddress) -> PhysicalAddress {
    for _ in 0..3 {
        if let Some(pa) = ctx.mmu().try_translate(va) {
            return pa;
        }
        ctx.mmu().raise(va);
        let outcome = on_page_fault(ctx, space, NOT_PRESENT_WRITE);
        assert_ne!(outcome, FaultOutcome::Spurious, "fault at {va} resolved nothing");
    }
    panic!("{va} still faults after the handler ran");
}

/// Write `value` at `va` through the MMU, faulting pages in as needed.
pub fn write(ctx: &mut TestContext<'_>, space: &mut AddressSpace, va: VirtualAddress, value: u32) {
    let pa = touch(ctx, space, va);
    ctx.mapper().write_u32(pa, value);
}

/// Read the `u32` at `va`, faulting it in if needed.
pub fn read(ctx: &mut TestContext<'_>, space: &mut AddressSpace, va: VirtualAddress) -> u32 {
    let pa = touch(ctx, space, va);
    ctx.mapper().read_u32(pa)
}
