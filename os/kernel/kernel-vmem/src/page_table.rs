//! # Two-level page tables (IA-32, 4 KiB pages)
//!
//! A 32-bit virtual address is split into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! The page directory (one frame, referenced by CR3) holds 1024 entries, each
//! pointing to a page table; each page table holds 1024 entries, each mapping
//! one 4 KiB page. One directory entry therefore covers 4 MiB.

pub mod pd;
pub mod pt;

use crate::page_table::pd::L2Index;
use crate::page_table::pt::L1Index;
use kernel_memory_addresses::VirtualAddress;

/// Entries in a page directory or a page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (L2Index, L1Index) {
    (L2Index::from(va), L1Index::from(va))
}
