//! # Page faults
//!
//! The processor reports a page fault with the faulting linear address (CR2)
//! and an error code pushed on the stack. [`PageFault`] bundles both;
//! [`AddressSpace::handle_fault`](crate::AddressSpace::handle_fault) turns a
//! not-present fault inside a VM pool into a fresh mapping.

use bitfield_struct::bitfield;
use kernel_alloc::frame_pool::FramePoolError;
use kernel_memory_addresses::{FrameNumber, VirtualAddress};

/// Page-fault error code layout (IA-32).
///
/// Reference: Intel SDM Vol. 3A, §6.15 “Page-Fault Exception (#PF)”.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageFaultErrorCode {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch.
    pub instruction_fetch: bool, // bit 4

    /// 1 = protection-key violation.
    pub protection_key: bool, // bit 5

    /// 1 = shadow stack access.
    pub shadow_stack: bool, // bit 6

    #[bits(25)]
    __: u32,
}

impl PageFaultErrorCode {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

/// A page fault as delivered by the trap path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageFault {
    pub address: VirtualAddress,
    pub error: PageFaultErrorCode,
}

impl PageFault {
    /// Fault on a missing mapping.
    #[must_use]
    pub const fn not_present(address: VirtualAddress, write: bool) -> Self {
        Self {
            address,
            error: PageFaultErrorCode::new().with_write(write),
        }
    }
}

/// What resolving a fault did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultOutcome {
    /// A data frame was mapped; `new_table` names the page-table frame
    /// installed on the way, if the directory slot was empty.
    Mapped {
        frame: FrameNumber,
        new_table: Option<FrameNumber>,
    },
    /// The page was already mapped (stale translation); nothing changed.
    Spurious,
}

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum PageFaultError {
    #[error("protection violation at {address}: {}", .error.explain())]
    ProtectionViolation {
        address: VirtualAddress,
        error: PageFaultErrorCode,
    },
    #[error("address {0} is not part of any VM pool")]
    IllegitimateAddress(VirtualAddress),
    #[error("out of frames: {0}")]
    OutOfFrames(#[from] FramePoolError),
}
