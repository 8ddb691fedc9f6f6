//! Page-fault trap entry.
//!
//! The exception stub hands over the error code pushed by the CPU; the
//! faulting address is read from CR2. A fault that cannot be resolved is
//! fatal.

use crate::address_space::AddressSpace;
use crate::context::PagingContext;
use crate::fault::{FaultOutcome, PageFault, PageFaultErrorCode};
use crate::mmu::Mmu;
use kernel_alloc::phys_mapper::PhysMapper;
use log::error;

/// Handle exception 14 for the loaded address space `space`.
///
/// # Panics
/// If `space` is not the loaded address space, or the fault cannot be
/// resolved (protection violation, illegitimate address, no frames left).
pub fn on_page_fault<M: PhysMapper, H: Mmu>(
    ctx: &mut PagingContext<'_, M, H>,
    space: &mut AddressSpace,
    error_code: u32,
) -> FaultOutcome {
    assert!(
        space.is_current(ctx),
        "page fault delivered to an address space that is not loaded"
    );

    let fault = PageFault {
        address: ctx.mmu().fault_address(),
        error: PageFaultErrorCode::from_bits(error_code),
    };

    match space.handle_fault(ctx, fault) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Unrecoverable page fault (error code {error_code:#x}): {e}");
            panic!("unrecoverable page fault: {e}");
        }
    }
}
