//! # Memory bring-up
//!
//! The kernel entry sequence before the first address space exists:
//!
//! 1. The kernel pool is built over its range and keeps its bitmap in its
//!    own first frames.
//! 2. The process pool's bitmap frames are taken from the kernel pool.
//! 3. The process pool is built over its range with that external bitmap.
//! 4. The memory hole, if any, is marked inaccessible.
//! 5. Paging state is set up over both pools.

use crate::context::PagingContext;
use crate::mmu::Mmu;
use kernel_alloc::frame_pool::{BitmapPlacement, FramePoolError, needed_info_frames};
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::registry::FramePoolRegistry;
use kernel_info::memory::MemoryLayout;
use log::info;

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum BootstrapError {
    #[error("no frames for the process pool bitmap: {0}")]
    OutOfFrames(#[from] FramePoolError),
}

/// Build the frame pools for `layout` and the paging context over them.
///
/// # Errors
/// [`BootstrapError::OutOfFrames`] if the kernel pool has no contiguous run
/// for the process pool's bitmap.
///
/// # Panics
/// - If `layout` is inconsistent (see [`MemoryLayout::is_valid`]).
/// - If the kernel pool has fewer free frames than that bitmap needs.
pub fn init_memory<'m, M: PhysMapper, H: Mmu>(
    mapper: &'m M,
    mmu: H,
    layout: &MemoryLayout,
) -> Result<PagingContext<'m, M, H>, BootstrapError> {
    assert!(layout.is_valid(), "invalid memory layout: {layout:?}");

    let mut frames = FramePoolRegistry::new();
    let kernel = frames.create(
        mapper,
        layout.kernel_pool.base,
        layout.kernel_pool.count,
        BitmapPlacement::InPool,
    );

    let info_count = needed_info_frames(layout.process_pool.count);
    let info_first = frames.get_frames(kernel, info_count)?;
    let process = frames.create(
        mapper,
        layout.process_pool.base,
        layout.process_pool.count,
        BitmapPlacement::External {
            first: info_first,
            count: info_count,
        },
    );

    if let Some(hole) = layout.memory_hole {
        frames.mark_inaccessible(process, hole.base, hole.count);
        info!(
            "Marked memory hole {}..{} inaccessible",
            hole.start_address(),
            hole.base + hole.count
        );
    }

    Ok(PagingContext::new(
        frames,
        kernel,
        process,
        layout.shared_size,
        mapper,
        mmu,
    ))
}
