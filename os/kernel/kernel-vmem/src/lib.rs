//! # Virtual Memory Support
//!
//! Two-level x86 (32-bit, non-PAE) paging for the kernel: page directories
//! and page tables, demand paging driven by the page-fault handler, and VM
//! pools that carve a virtual range into regions.
//!
//! ## What you get
//! - An [`address space`](address_space) rooted at a page directory, built
//!   flat or self-mapped.
//! - Typed [`PageDirectory`]/[`PageTable`] wrappers and their entries over a
//!   shared [`PageEntryBits`] layout.
//! - A page-fault path ([`fault`], [`trap`]) that installs tables and frames
//!   on first touch.
//! - [`VmPool`]s that hand out page-granular regions and tell the fault
//!   handler which addresses are legitimate.
//! - The [`Mmu`] boundary to CR0/CR2/CR3, and [`bootstrap`] to build the
//!   frame pools from a [`MemoryLayout`](kernel_info::memory::MemoryLayout).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |   PD  |   PT  | Offset |
//! ```
//!
//! Both levels hold 1024 entries of 4 bytes, so each table fills exactly one
//! 4 KiB frame. A directory entry covers 4 MiB, a table entry 4 KiB.
//!
//! ```text
//!  CR3 → PD ─► PDE → PT ─► PTE → Physical Page
//! ```
//!
//! | Level | Table | Entry | Description |
//! |:------|:------|:------|:------------|
//! | 2 | **PD** (Page Directory) | **PDE** | One per address space, referenced by CR3. Each entry points to a PT. |
//! | 1 | **PT** (Page Table) | **PTE** | Each entry maps a 4 KiB physical frame. |
//!
//! ## Self-mapping
//!
//! A self-mapped directory points its last entry at itself. The walk for
//! `0xFFC0_0000 | i << 12` then ends in the page table of slot `i`, and
//! `0xFFFF_F000` ends in the directory. See [`recursive`].
//!
//! ## Demand paging
//!
//! ```text
//! touch va ──► #PF (CR2 = va) ──► trap::on_page_fault
//!                                   │
//!                                   ├─ present?             → halt
//!                                   ├─ no pool claims va?   → halt
//!                                   ├─ PDE missing?         → table from kernel pool
//!                                   └─ PTE ← frame from the claiming pool
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
pub mod bootstrap;
pub mod context;
pub mod fault;
pub mod mmu;
mod page_entry_bits;
pub mod page_table;
pub mod recursive;
pub mod trap;
pub mod vm_pool;

#[cfg(test)]
mod testing;

pub use crate::address_space::{AddressSpace, DirectoryLayout, VmPoolId};
pub use crate::context::{PagingContext, PagingError};
pub use crate::fault::{FaultOutcome, PageFault, PageFaultError, PageFaultErrorCode};
pub use crate::mmu::Mmu;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry};
pub use crate::vm_pool::{Legitimacy, Region, VmPool, VmPoolError};

/// Re-export of the memory layout configuration.
pub use kernel_info::memory as info;
