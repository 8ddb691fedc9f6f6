//! # Translation hardware boundary
//!
//! Everything the paging code needs from the CPU: loading CR3, setting
//! CR0.PG, reading CR2, and dereferencing virtual addresses (for the
//! recursive table windows). [`X86Mmu`] talks to the real registers; tests
//! substitute a software walker.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

pub trait Mmu {
    /// Make the directory at `directory` the active one (writes CR3, which
    /// also flushes non-global TLB entries).
    fn load_directory(&self, directory: PhysicalAddress);

    /// Set the paging-enable bit.
    fn enable_paging(&self);

    /// The linear address of the most recent page fault (CR2).
    fn fault_address(&self) -> VirtualAddress;

    /// Convert a *virtual* address of the active address space to a mutable
    /// reference.
    ///
    /// # Safety
    /// - `va` must be mapped writable in the active address space.
    /// - Type `T` must match the bytes at `va` and must not alias another
    ///   live reference.
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T;
}

#[cfg(target_arch = "x86")]
pub use x86::X86Mmu;

#[cfg(target_arch = "x86")]
mod x86 {
    use super::Mmu;
    use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
    use kernel_registers::cr0::Cr0;
    use kernel_registers::cr2::Cr2;
    use kernel_registers::cr3::Cr3;
    use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

    /// The processor's own MMU.
    #[derive(Debug)]
    pub struct X86Mmu {
        _private: (),
    }

    impl X86Mmu {
        /// # Safety
        /// Must run at CPL0. Every directory later passed to
        /// [`load_directory`](Mmu::load_directory) must identity-map the code
        /// that is executing.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Mmu for X86Mmu {
        fn load_directory(&self, directory: PhysicalAddress) {
            unsafe { Cr3::from_directory_phys(directory).store_unsafe() }
        }

        fn enable_paging(&self) {
            unsafe {
                let cr0 = Cr0::load_unsafe();
                cr0.with_pg_paging(true).store_unsafe();
            }
        }

        fn fault_address(&self) -> VirtualAddress {
            unsafe { Cr2::load_unsafe() }.fault_address()
        }

        unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
            let ptr = va.as_usize() as *mut T;
            // SAFETY: Caller guarantees `va` is mapped and typed as `T`.
            unsafe { &mut *ptr }
        }
    }
}
