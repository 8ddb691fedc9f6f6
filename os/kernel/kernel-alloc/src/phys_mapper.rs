//! # Physical Memory Access
//!
//! Frame pools keep their bitmaps in physical frames, and page directories and
//! page tables live in physical frames too. Code can only dereference
//! addresses of the current address space, so every such access goes through
//! a [`PhysMapper`], which turns a physical address into a usable reference.
//!
//! - Before paging is enabled, and for the identity-mapped shared region
//!   afterwards, physical and virtual addresses coincide:
//!   [`IdentityPhysMapper`].
//! - Host-side tests back "physical memory" with a heap buffer:
//!   [`TestPhys`](crate::testing::TestPhys).

use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to usable references in the current address
/// space.
///
/// # Safety
/// - `pa` must be mapped writable in the current address space for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` and must not alias another live
///   reference.
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// Convert `len` bytes of contiguous physical memory starting at `pa` to
    /// a mutable byte slice.
    ///
    /// # Safety
    /// As for [`phys_to_mut`](Self::phys_to_mut); additionally, the whole
    /// range `pa..pa + len` must be mapped contiguously.
    unsafe fn phys_to_slice_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        let first: &'a mut u8 = unsafe { self.phys_to_mut(pa) };
        unsafe { core::slice::from_raw_parts_mut(core::ptr::from_mut(first), len) }
    }
}

/// [`PhysMapper`] for identity-mapped memory: the physical address *is* the
/// pointer.
///
/// Valid before paging is enabled and, once it is, for the shared low region
/// every address space identity-maps.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_usize() as *mut T;
        // SAFETY: Caller guarantees `pa` is identity mapped and typed as `T`.
        unsafe { &mut *ptr }
    }
}
