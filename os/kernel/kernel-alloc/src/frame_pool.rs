//! # Contiguous frame pool
//!
//! A [`FramePool`] manages a fixed range of physical frames and hands out
//! *runs* of contiguous frames. Per-frame state lives in a packed
//! [`FrameBitmap`] which is itself stored in physical frames, either at the
//! start of the pool ([`BitmapPlacement::InPool`]) or in frames borrowed from
//! another pool ([`BitmapPlacement::External`]).
//!
//! Allocation is linear first-fit. Releasing the head of a run frees the
//! whole run; the run's extent is implied by the `Allocated` frames following
//! the head.

use crate::frame_state::{FRAMES_PER_BYTE, FrameBitmap, FrameState};
use crate::phys_mapper::PhysMapper;
use core::fmt;
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber};
use log::{debug, info, warn};

/// Where a pool keeps its bitmap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BitmapPlacement {
    /// At the first frames of the pool itself; those frames are reserved as
    /// an ordinary allocated run at construction.
    InPool,
    /// In `count` frames starting at `first`, obtained from another pool.
    External { first: FrameNumber, count: u32 },
}

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum FramePoolError {
    #[error("no run of {requested} contiguous free frames ({free} frames free)")]
    NoContiguousRun { requested: u32, free: u32 },
}

/// Number of frames needed to hold the bitmap of a pool of `n_frames` frames.
///
/// ```rust
/// # use kernel_alloc::frame_pool::needed_info_frames;
/// assert_eq!(needed_info_frames(16 * 1024), 1);
/// assert_eq!(needed_info_frames(16 * 1024 + 1), 2);
/// ```
#[must_use]
pub const fn needed_info_frames(n_frames: u32) -> u32 {
    n_frames.div_ceil(FRAMES_PER_BYTE * FRAME_SIZE)
}

/// A pool of physical frames `[base, base + count)`.
pub struct FramePool<'m> {
    bitmap: FrameBitmap<'m>,
    base: FrameNumber,
    count: u32,
    free: u32,
    info_frames: u32,
}

impl<'m> FramePool<'m> {
    /// Create a pool over `count` frames starting at `base`.
    ///
    /// The bitmap is accessed through `mapper` for as long as the pool lives;
    /// its frames must not be used for anything else.
    ///
    /// # Panics
    /// - If `count` is zero or not a multiple of four.
    /// - If the pool would run past the last frame number.
    /// - If the bitmap does not fit into the pool or the supplied frames.
    pub fn new<M: PhysMapper>(
        mapper: &M,
        base: FrameNumber,
        count: u32,
        placement: BitmapPlacement,
    ) -> Self {
        assert!(count > 0, "frame pool must not be empty");
        assert!(
            count.is_multiple_of(FRAMES_PER_BYTE),
            "frame count {count} is not a multiple of {FRAMES_PER_BYTE}"
        );
        assert!(
            base.as_u32().checked_add(count).is_some(),
            "frame pool at {base} with {count} frames runs past the last frame number"
        );

        let needed = needed_info_frames(count);
        let (bitmap_frame, self_hosted) = match placement {
            BitmapPlacement::InPool => {
                assert!(
                    needed < count,
                    "pool of {count} frames cannot host its own bitmap"
                );
                (base, needed)
            }
            BitmapPlacement::External { first, count: supplied } => {
                assert!(
                    supplied >= needed,
                    "bitmap needs {needed} info frames, {supplied} supplied"
                );
                (first, 0)
            }
        };

        // SAFETY: The bitmap frames belong to this pool (or were handed to it)
        // and are reachable through `mapper`.
        let bytes = unsafe {
            mapper.phys_to_slice_mut(
                bitmap_frame.address(),
                (count / FRAMES_PER_BYTE) as usize,
            )
        };

        let mut pool = Self {
            bitmap: FrameBitmap::new_free(bytes),
            base,
            count,
            free: count,
            info_frames: self_hosted,
        };
        if self_hosted > 0 {
            pool.allocate_frames(0, self_hosted);
        }

        info!(
            "Frame pool {base}..{end}: {count} frames, bitmap at frame {bitmap_frame} ({placement:?}), {free} free",
            end = base + count,
            free = pool.free
        );
        pool
    }

    /// Allocate `n` contiguous frames and return the first one.
    ///
    /// # Errors
    /// [`FramePoolError::NoContiguousRun`] if enough frames are free but no
    /// run of `n` of them is contiguous.
    ///
    /// # Panics
    /// If `n` is zero or exceeds the number of free frames.
    pub fn get_frames(&mut self, n: u32) -> Result<FrameNumber, FramePoolError> {
        assert!(n > 0, "requested zero frames");
        assert!(
            n <= self.free,
            "requested {n} frames from pool at {} but only {} are free",
            self.base,
            self.free
        );

        let Some(start) = self.find_free_run(n) else {
            warn!(
                "Frame pool at {}: no run of {n} contiguous frames ({} free)",
                self.base, self.free
            );
            return Err(FramePoolError::NoContiguousRun {
                requested: n,
                free: self.free,
            });
        };

        self.allocate_frames(start, n);
        let head = self.base + start;
        debug!("Allocated {n} frames at {head} ({} free)", self.free);
        Ok(head)
    }

    /// Reserve `n` frames starting at `base` so they are never handed out.
    ///
    /// # Panics
    /// If the range leaves the pool or any of its frames is not free.
    pub fn mark_inaccessible(&mut self, base: FrameNumber, n: u32) {
        assert!(n > 0, "cannot mark an empty range inaccessible");
        assert!(
            self.contains(base)
                && base.as_u32().checked_add(n).is_some_and(|end| end <= self.end()),
            "range of {n} frames at {base} is outside pool {}..{}",
            self.base,
            self.end()
        );
        let start = base - self.base;
        assert!(
            self.bitmap.is_free_run(start, n),
            "range {base}..{} is not entirely free",
            base + n
        );
        self.allocate_frames(start, n);
        info!("Marked frames {base}..{} inaccessible", base + n);
    }

    /// Free the run whose head is `first` and return its length.
    ///
    /// Frees the head and every following `Allocated` frame; stops at the next
    /// head, a free frame or the end of the pool.
    ///
    /// # Panics
    /// If `first` is outside the pool or not the head of a run.
    pub(crate) fn deallocate_frames(&mut self, first: FrameNumber) -> u32 {
        assert!(
            self.contains(first),
            "frame {first} is outside pool {}..{}",
            self.base,
            self.end()
        );
        let start = first - self.base;
        let state = self.bitmap.get(start);
        assert!(
            state == FrameState::HeadOfSequence,
            "frame {first} is not the head of an allocated run (state {state})"
        );

        self.bitmap.set(start, FrameState::Free);
        let mut index = start + 1;
        while index < self.count && self.bitmap.get(index) == FrameState::Allocated {
            self.bitmap.set(index, FrameState::Free);
            index += 1;
        }

        let released = index - start;
        self.free += released;
        debug!("Released {released} frames at {first} ({} free)", self.free);
        released
    }

    fn allocate_frames(&mut self, start: u32, n: u32) {
        self.bitmap.set(start, FrameState::HeadOfSequence);
        for index in start + 1..start + n {
            self.bitmap.set(index, FrameState::Allocated);
        }
        self.free -= n;
    }

    fn find_free_run(&self, n: u32) -> Option<u32> {
        let mut run = 0;
        for index in 0..self.count {
            if self.bitmap.get(index) == FrameState::Free {
                run += 1;
                if run == n {
                    return Some(index + 1 - n);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    /// Whether `frame` lies inside this pool.
    #[must_use]
    pub const fn contains(&self, frame: FrameNumber) -> bool {
        frame.as_u32() >= self.base.as_u32() && frame.as_u32() < self.end()
    }

    /// State of `frame`.
    ///
    /// # Panics
    /// If `frame` is outside the pool.
    #[must_use]
    pub fn frame_state(&self, frame: FrameNumber) -> FrameState {
        assert!(self.contains(frame), "frame {frame} is outside pool {}", self.base);
        self.bitmap.get(frame - self.base)
    }

    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.free
    }

    #[must_use]
    pub const fn base_frame(&self) -> FrameNumber {
        self.base
    }

    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.count
    }

    /// Frames of this pool occupied by its own bitmap (zero for external
    /// placement).
    #[must_use]
    pub const fn info_frames(&self) -> u32 {
        self.info_frames
    }

    /// One past the last frame of the pool.
    #[must_use]
    pub const fn end_frame(&self) -> FrameNumber {
        FrameNumber::new(self.end())
    }

    // Cannot overflow; `new` rejects pools that wrap.
    const fn end(&self) -> u32 {
        self.base.as_u32() + self.count
    }
}

impl fmt::Debug for FramePool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("base", &self.base)
            .field("count", &self.count)
            .field("free", &self.free)
            .field("info_frames", &self.info_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestPhys;

    fn pool_at(phys: &TestPhys, base: u32, count: u32) -> FramePool<'static> {
        FramePool::new(phys, FrameNumber::new(base), count, BitmapPlacement::InPool)
    }

    fn free_states(pool: &FramePool<'_>) -> u32 {
        let base = pool.base_frame();
        let free = (0..pool.frame_count())
            .filter(|&i| pool.frame_state(base + i) == FrameState::Free)
            .count();
        u32::try_from(free).unwrap()
    }

    #[test]
    fn needed_info_frames_is_exact_on_multiples() {
        for k in 1..5 {
            assert_eq!(needed_info_frames(k * 4 * FRAME_SIZE), k);
            assert_eq!(needed_info_frames(k * 4 * FRAME_SIZE + 1), k + 1);
        }
        assert_eq!(needed_info_frames(0), 0);
        let mut last = 0;
        for n in (0..100_000).step_by(997) {
            let now = needed_info_frames(n);
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn self_hosted_pool_reserves_its_bitmap() {
        let phys = TestPhys::with_frames(64);
        let pool = pool_at(&phys, 32, 32);
        assert_eq!(pool.info_frames(), 1);
        assert_eq!(pool.free_frames(), 31);
        assert_eq!(free_states(&pool), 31);
        assert_eq!(pool.frame_state(FrameNumber::new(32)), FrameState::HeadOfSequence);
        assert_eq!(pool.frame_state(FrameNumber::new(33)), FrameState::Free);
    }

    #[test]
    fn external_bitmap_leaves_every_frame_free() {
        let phys = TestPhys::with_frames(8);
        let pool = FramePool::new(
            &phys,
            FrameNumber::new(1024),
            7168,
            BitmapPlacement::External {
                first: FrameNumber::new(2),
                count: 1,
            },
        );
        assert_eq!(pool.info_frames(), 0);
        assert_eq!(pool.free_frames(), 7168);
        assert_eq!(free_states(&pool), 7168);
    }

    #[test]
    fn runs_are_first_fit_and_contiguous() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);

        let a = pool.get_frames(3).unwrap();
        let b = pool.get_frames(1).unwrap();
        assert_eq!(a, FrameNumber::new(1));
        assert_eq!(b, FrameNumber::new(4));
        assert_eq!(pool.frame_state(a), FrameState::HeadOfSequence);
        assert_eq!(pool.frame_state(a + 1), FrameState::Allocated);
        assert_eq!(pool.frame_state(a + 2), FrameState::Allocated);
        assert_eq!(pool.frame_state(b), FrameState::HeadOfSequence);
        assert_eq!(pool.free_frames(), 64 - 1 - 4);
    }

    #[test]
    fn release_restores_free_count_and_states() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let before = pool.free_frames();

        let head = pool.get_frames(10).unwrap();
        assert_eq!(pool.deallocate_frames(head), 10);
        assert_eq!(pool.free_frames(), before);
        assert_eq!(free_states(&pool), before);
    }

    #[test]
    fn release_stops_at_the_next_run() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let a = pool.get_frames(4).unwrap();
        let b = pool.get_frames(4).unwrap();
        assert_eq!(b, a + 4);

        assert_eq!(pool.deallocate_frames(a), 4);
        assert_eq!(pool.frame_state(b), FrameState::HeadOfSequence);
        assert_eq!(pool.frame_state(b + 3), FrameState::Allocated);
    }

    #[test]
    fn release_stops_at_the_pool_end() {
        let phys = TestPhys::with_frames(16);
        let mut pool = pool_at(&phys, 8, 8);
        let head = pool.get_frames(7).unwrap();
        assert_eq!(pool.free_frames(), 0);
        assert_eq!(pool.deallocate_frames(head), 7);
        assert_eq!(pool.free_frames(), 7);
    }

    #[test]
    #[should_panic(expected = "not the head")]
    fn releasing_the_middle_of_a_run_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let head = pool.get_frames(4).unwrap();
        pool.deallocate_frames(head + 2);
    }

    #[test]
    #[should_panic(expected = "not the head")]
    fn double_release_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let head = pool.get_frames(4).unwrap();
        pool.deallocate_frames(head);
        pool.deallocate_frames(head);
    }

    #[test]
    fn exhausting_the_pool_succeeds_once() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let all = pool.free_frames();
        assert!(pool.get_frames(all).is_ok());
        assert_eq!(pool.free_frames(), 0);
    }

    #[test]
    #[should_panic(expected = "only 0 are free")]
    fn allocating_from_an_exhausted_pool_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let all = pool.free_frames();
        pool.get_frames(all).unwrap();
        let _ = pool.get_frames(1);
    }

    #[test]
    #[should_panic(expected = "zero frames")]
    fn zero_frames_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        let _ = pool.get_frames(0);
    }

    #[test]
    fn fragmentation_is_a_recoverable_error() {
        let phys = TestPhys::with_frames(16);
        let mut pool = pool_at(&phys, 0, 16);
        let runs: Vec<_> = (0..5).map(|_| pool.get_frames(3).unwrap()).collect();
        pool.deallocate_frames(runs[1]);
        pool.deallocate_frames(runs[3]);
        assert_eq!(pool.free_frames(), 6);

        let err = pool.get_frames(4).unwrap_err();
        assert_eq!(
            err,
            FramePoolError::NoContiguousRun {
                requested: 4,
                free: 6
            }
        );
        assert_eq!(pool.free_frames(), 6);
        assert_eq!(pool.get_frames(3).unwrap(), runs[1]);
    }

    #[test]
    fn mark_inaccessible_reserves_an_exact_range() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        pool.mark_inaccessible(FrameNumber::new(8), 4);
        assert_eq!(pool.frame_state(FrameNumber::new(8)), FrameState::HeadOfSequence);
        assert_eq!(pool.frame_state(FrameNumber::new(11)), FrameState::Allocated);
        assert_eq!(pool.free_frames(), 64 - 1 - 4);

        // First fit skips the hole.
        let head = pool.get_frames(8).unwrap();
        assert_eq!(head, FrameNumber::new(12));
    }

    #[test]
    #[should_panic(expected = "not entirely free")]
    fn mark_inaccessible_over_allocated_frames_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        pool.get_frames(4).unwrap();
        pool.mark_inaccessible(FrameNumber::new(3), 4);
    }

    #[test]
    #[should_panic(expected = "outside pool")]
    fn mark_inaccessible_past_the_end_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        pool.mark_inaccessible(FrameNumber::new(62), 4);
    }

    #[test]
    #[should_panic(expected = "outside pool")]
    fn mark_inaccessible_with_a_wrapping_length_panics() {
        let phys = TestPhys::with_frames(64);
        let mut pool = pool_at(&phys, 0, 64);
        pool.mark_inaccessible(FrameNumber::new(10), u32::MAX - 5);
    }

    #[test]
    #[should_panic(expected = "runs past the last frame number")]
    fn pool_wrapping_the_frame_numbers_panics() {
        let phys = TestPhys::with_frames(8);
        let _ = pool_at(&phys, u32::MAX - 3, 8);
    }

    #[test]
    #[should_panic(expected = "not a multiple of 4")]
    fn unaligned_frame_count_panics() {
        let phys = TestPhys::with_frames(64);
        let _ = pool_at(&phys, 0, 30);
    }

    #[test]
    #[should_panic(expected = "info frames")]
    fn undersized_external_bitmap_panics() {
        let phys = TestPhys::with_frames(8);
        let _ = FramePool::new(
            &phys,
            FrameNumber::new(0),
            4 * 4096 * 2,
            BitmapPlacement::External {
                first: FrameNumber::new(0),
                count: 1,
            },
        );
    }
}
