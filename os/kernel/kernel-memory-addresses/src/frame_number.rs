use crate::{PhysicalAddress, PhysicalPage, Size4K};
use core::fmt;
use core::ops::{Add, Sub};

/// Index of a 4 KiB physical frame, i.e. its physical address shifted right
/// by 12.
///
/// Frame pools speak in frame numbers; page-table entries store the same
/// value in their upper 20 bits.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameNumber(u32);

impl FrameNumber {
    /// Highest frame number addressable with 32-bit physical addresses.
    pub const MAX: Self = Self(0x000F_FFFF);

    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        debug_assert!(n <= Self::MAX.0, "frame number exceeds 20 bits");
        Self(n)
    }

    /// The frame that contains `address`.
    #[inline]
    #[must_use]
    pub const fn containing(address: PhysicalAddress) -> Self {
        Self(address.as_u32() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Physical address of the first byte of this frame.
    #[inline]
    #[must_use]
    pub const fn address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << 12)
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_frame_number(self)
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FrameNumber {
    #[inline]
    fn from(n: u32) -> Self {
        Self::new(n)
    }
}

impl From<FrameNumber> for u32 {
    #[inline]
    fn from(f: FrameNumber) -> Self {
        f.0
    }
}

impl Add<u32> for FrameNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Distance in frames between two frame numbers.
impl Sub for FrameNumber {
    type Output = u32;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}
