//! # Paging context
//!
//! Process-wide paging state: the frame pools, which of them serves kernel
//! structures and which serves process memory, how physical memory and the
//! MMU are reached, and which directory is currently loaded.
//!
//! It is passed explicitly to every operation that needs it (including the
//! fault handler) instead of living in globals.

use crate::mmu::Mmu;
use kernel_alloc::frame_pool::FramePoolError;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::registry::{FramePoolRegistry, PoolId};
use kernel_memory_addresses::PhysicalAddress;
use log::{debug, info};

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum PagingError {
    #[error("paging cannot be enabled before an address space is loaded")]
    NoActiveAddressSpace,
    #[error("out of frames for paging structures: {0}")]
    OutOfFrames(#[from] FramePoolError),
}

pub struct PagingContext<'m, M: PhysMapper, H: Mmu> {
    pub(crate) frames: FramePoolRegistry<'m>,
    pub(crate) kernel_pool: PoolId,
    pub(crate) process_pool: PoolId,
    pub(crate) shared_size: u32,
    pub(crate) mapper: &'m M,
    pub(crate) mmu: H,
    pub(crate) current: Option<PhysicalAddress>,
    pub(crate) paging_enabled: bool,
}

impl<'m, M: PhysMapper, H: Mmu> PagingContext<'m, M, H> {
    /// Set up paging state over already registered pools.
    ///
    /// `shared_size` bytes at the bottom of every address space are
    /// identity-mapped kernel memory.
    pub fn new(
        frames: FramePoolRegistry<'m>,
        kernel_pool: PoolId,
        process_pool: PoolId,
        shared_size: u32,
        mapper: &'m M,
        mmu: H,
    ) -> Self {
        info!(
            "Initialized paging: kernel pool at {}, process pool at {}, shared size {shared_size:#x}",
            frames.pool(kernel_pool).base_frame(),
            frames.pool(process_pool).base_frame()
        );
        Self {
            frames,
            kernel_pool,
            process_pool,
            shared_size,
            mapper,
            mmu,
            current: None,
            paging_enabled: false,
        }
    }

    /// Turn on address translation.
    ///
    /// # Errors
    /// [`PagingError::NoActiveAddressSpace`] if no address space was loaded.
    pub fn enable_paging(&mut self) -> Result<(), PagingError> {
        if self.current.is_none() {
            return Err(PagingError::NoActiveAddressSpace);
        }
        if self.paging_enabled {
            debug!("Paging already enabled");
            return Ok(());
        }
        self.mmu.enable_paging();
        self.paging_enabled = true;
        info!("Enabled paging");
        Ok(())
    }

    #[must_use]
    pub const fn frames(&self) -> &FramePoolRegistry<'m> {
        &self.frames
    }

    pub const fn frames_mut(&mut self) -> &mut FramePoolRegistry<'m> {
        &mut self.frames
    }

    /// Pool for directories and page tables.
    #[must_use]
    pub const fn kernel_pool(&self) -> PoolId {
        self.kernel_pool
    }

    /// Pool backing process memory.
    #[must_use]
    pub const fn process_pool(&self) -> PoolId {
        self.process_pool
    }

    #[must_use]
    pub const fn shared_size(&self) -> u32 {
        self.shared_size
    }

    #[must_use]
    pub const fn paging_enabled(&self) -> bool {
        self.paging_enabled
    }

    /// Physical address of the loaded directory.
    #[must_use]
    pub const fn current_directory(&self) -> Option<PhysicalAddress> {
        self.current
    }

    #[must_use]
    pub const fn mmu(&self) -> &H {
        &self.mmu
    }

    #[must_use]
    pub const fn mapper(&self) -> &'m M {
        self.mapper
    }
}
