//! # Frame pool registry
//!
//! Frames are released by number alone; the caller does not know which pool
//! a frame came from. The registry owns every live [`FramePool`] and resolves
//! ownership by range containment.
//!
//! Pools are kept in fixed slots and chained newest first, so a lookup walks
//! the most recently created pools before older ones.

use crate::frame_pool::{BitmapPlacement, FramePool, FramePoolError};
use crate::phys_mapper::PhysMapper;
use core::fmt;
use kernel_memory_addresses::FrameNumber;
use log::{debug, info};

/// Maximum number of pools registered at once.
pub const MAX_FRAME_POOLS: usize = 8;

/// Handle to a registered pool.
///
/// Only valid until the pool is [removed](FramePoolRegistry::remove).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PoolId(usize);

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

struct Slot<'m> {
    pool: FramePool<'m>,
    next: Option<PoolId>,
}

/// All live frame pools.
pub struct FramePoolRegistry<'m> {
    slots: [Option<Slot<'m>>; MAX_FRAME_POOLS],
    head: Option<PoolId>,
}

impl Default for FramePoolRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'m> FramePoolRegistry<'m> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_FRAME_POOLS],
            head: None,
        }
    }

    /// Construct a pool and register it.
    ///
    /// # Panics
    /// See [`FramePool::new`] and [`add`](Self::add).
    pub fn create<M: PhysMapper>(
        &mut self,
        mapper: &M,
        base: FrameNumber,
        count: u32,
        placement: BitmapPlacement,
    ) -> PoolId {
        self.add(FramePool::new(mapper, base, count, placement))
    }

    /// Register `pool` at the head of the list.
    ///
    /// # Panics
    /// If all slots are taken or the pool overlaps a registered one.
    pub fn add(&mut self, pool: FramePool<'m>) -> PoolId {
        let first = pool.base_frame();
        let end = pool.end_frame();
        let overlaps =
            |other: &FramePool<'_>| other.base_frame() < end && first < other.end_frame();
        if let Some((other, _)) = self.iter().find(|(_, p)| overlaps(p)) {
            panic!("frame pool at {first} overlaps registered pool {other:?}");
        }

        let Some(index) = self.slots.iter().position(Option::is_none) else {
            panic!("frame pool registry is full ({MAX_FRAME_POOLS} pools)");
        };

        let id = PoolId(index);
        self.slots[index] = Some(Slot {
            pool,
            next: self.head,
        });
        self.head = Some(id);
        debug!("Registered frame pool {id:?} at {first}");
        id
    }

    /// Unregister a pool and hand it back.
    ///
    /// # Panics
    /// If `id` does not name a registered pool.
    pub fn remove(&mut self, id: PoolId) -> FramePool<'m> {
        let Some(slot) = self.slots[id.0].take() else {
            panic!("{id:?} is not registered");
        };

        if self.head == Some(id) {
            self.head = slot.next;
        } else {
            let mut cursor = self.head;
            while let Some(current) = cursor {
                let entry = self.slot_mut(current);
                if entry.next == Some(id) {
                    entry.next = slot.next;
                    break;
                }
                cursor = entry.next;
            }
        }

        info!(
            "Removed frame pool {id:?} at {}",
            slot.pool.base_frame()
        );
        slot.pool
    }

    /// The pool that owns `frame`, if any.
    #[must_use]
    pub fn find_owner(&self, frame: FrameNumber) -> Option<PoolId> {
        self.iter()
            .find(|(_, pool)| pool.contains(frame))
            .map(|(id, _)| id)
    }

    /// Release the run headed by `frame`, whichever pool owns it.
    ///
    /// # Panics
    /// If no registered pool owns `frame`, or `frame` is not the head of an
    /// allocated run.
    pub fn release_frames(&mut self, frame: FrameNumber) {
        let Some(owner) = self.find_owner(frame) else {
            panic!("no frame pool owns frame {frame}");
        };
        let released = self.pool_mut(owner).deallocate_frames(frame);
        debug!("release_frames({frame}): {released} frames back to {owner:?}");
    }

    /// Allocate `n` contiguous frames from pool `id`.
    ///
    /// # Errors
    /// See [`FramePool::get_frames`].
    pub fn get_frames(&mut self, id: PoolId, n: u32) -> Result<FrameNumber, FramePoolError> {
        self.pool_mut(id).get_frames(n)
    }

    /// See [`FramePool::mark_inaccessible`].
    pub fn mark_inaccessible(&mut self, id: PoolId, base: FrameNumber, n: u32) {
        self.pool_mut(id).mark_inaccessible(base, n);
    }

    /// # Panics
    /// If `id` does not name a registered pool.
    #[must_use]
    pub fn pool(&self, id: PoolId) -> &FramePool<'m> {
        match &self.slots[id.0] {
            Some(slot) => &slot.pool,
            None => panic!("{id:?} is not registered"),
        }
    }

    /// # Panics
    /// If `id` does not name a registered pool.
    pub fn pool_mut(&mut self, id: PoolId) -> &mut FramePool<'m> {
        &mut self.slot_mut(id).pool
    }

    fn slot_mut(&mut self, id: PoolId) -> &mut Slot<'m> {
        match &mut self.slots[id.0] {
            Some(slot) => slot,
            None => panic!("{id:?} is not registered"),
        }
    }

    /// Registered pools, newest first.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &FramePool<'m>)> {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let id = cursor?;
            let slot = self.slots[id.0].as_ref()?;
            cursor = slot.next;
            Some((id, &slot.pool))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}
