//! # Recursive (self-referential) directory mapping
//!
//! Directory slot [`SELF_MAP_SLOT`] points back at the directory itself. The
//! hardware walk then treats the directory as a page table for the top 4 MiB
//! of the address space, which makes every page table visible at a fixed
//! address:
//!
//! ```text
//! 0xFFC0_0000 + i * 4 KiB   page table behind directory slot i
//! 0xFFFF_F000               the directory itself (i = 1023)
//! ```
//!
//! A table window only resolves while its directory slot is present.

use crate::page_table::pd::L2Index;
use kernel_memory_addresses::VirtualAddress;

/// Directory slot holding the self-mapping.
pub const SELF_MAP_SLOT: L2Index = L2Index::new(1023);

/// Base of the 4 MiB window through which all page tables are visible.
pub const TABLE_WINDOW_BASE: VirtualAddress = VirtualAddress::new(0xFFC0_0000);

/// Where the directory itself is visible.
pub const DIRECTORY_WINDOW: VirtualAddress = table_window(SELF_MAP_SLOT);

/// Where the page table behind directory slot `index` is visible.
#[inline]
#[must_use]
pub const fn table_window(index: L2Index) -> VirtualAddress {
    VirtualAddress::new(TABLE_WINDOW_BASE.as_u32() | (index.as_u32() << 12))
}
