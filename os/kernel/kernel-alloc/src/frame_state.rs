//! # Packed frame-state bitmap
//!
//! Every frame of a pool is described by two bits. Four frames share one
//! byte, most significant pair first:
//!
//! ```text
//!  bit   7 6   5 4   3 2   1 0
//!       ┌─────┬─────┬─────┬─────┐
//!  byte │ i+0 │ i+1 │ i+2 │ i+3 │     i = 4 * byte index
//!       └─────┴─────┴─────┴─────┘
//! ```
//!
//! A freshly initialised bitmap is all ones, i.e. every frame [`FrameState::Free`].

use core::fmt;

/// Number of frames described by a single bitmap byte.
pub const FRAMES_PER_BYTE: u32 = 4;

const STATE_MASK: u8 = 0b11;

/// The state of a single frame.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameState {
    /// Part of an allocated run, but not its first frame.
    Allocated = 0b00,
    /// First frame of an allocated run (also used for single-frame runs).
    HeadOfSequence = 0b10,
    /// Available for allocation.
    Free = 0b11,
}

impl FrameState {
    /// Decode a 2-bit field.
    ///
    /// # Panics
    /// On the reserved pattern `0b01`, which never appears in an intact
    /// bitmap.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & STATE_MASK {
            0b00 => Self::Allocated,
            0b10 => Self::HeadOfSequence,
            0b11 => Self::Free,
            _ => panic!("corrupt frame bitmap: reserved state 0b01"),
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allocated => "allocated",
            Self::HeadOfSequence => "head-of-sequence",
            Self::Free => "free",
        })
    }
}

/// Bit offset of the 2-bit field of frame `index` within its byte.
#[inline]
const fn shift_of(index: u32) -> u32 {
    6 - 2 * (index % FRAMES_PER_BYTE)
}

/// A 2-bit-per-frame state map over borrowed bytes.
pub struct FrameBitmap<'m> {
    bytes: &'m mut [u8],
}

impl<'m> FrameBitmap<'m> {
    /// Wrap `bytes` and mark every frame free.
    pub fn new_free(bytes: &'m mut [u8]) -> Self {
        bytes.fill(0xFF);
        Self { bytes }
    }

    /// Number of frames this bitmap can describe.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32 * FRAMES_PER_BYTE
    }

    /// State of frame `index` (relative to the pool base).
    ///
    /// # Panics
    /// If `index` is outside the bitmap.
    #[must_use]
    pub fn get(&self, index: u32) -> FrameState {
        assert!(
            index < self.capacity(),
            "frame index {index} outside bitmap of {} frames",
            self.capacity()
        );
        let byte = self.bytes[(index / FRAMES_PER_BYTE) as usize];
        FrameState::from_bits(byte >> shift_of(index))
    }

    /// Set frame `index` (relative to the pool base) to `state`.
    ///
    /// # Panics
    /// If `index` is outside the bitmap.
    pub fn set(&mut self, index: u32, state: FrameState) {
        assert!(
            index < self.capacity(),
            "frame index {index} outside bitmap of {} frames",
            self.capacity()
        );
        let shift = shift_of(index);
        let byte = &mut self.bytes[(index / FRAMES_PER_BYTE) as usize];
        *byte &= !(STATE_MASK << shift);
        *byte |= state.into_bits() << shift;
    }

    /// Whether all frames in `start..start + count` are free.
    #[must_use]
    pub fn is_free_run(&self, start: u32, count: u32) -> bool {
        start
            .checked_add(count)
            .is_some_and(|end| end <= self.capacity())
            && (start..start + count).all(|i| self.get(i) == FrameState::Free)
    }
}
