use crate::{MemoryAddress, PageSize};
use core::marker::PhantomData;

/// Byte offset of an address inside its page of size `S`.
///
/// Only produced by splitting an address, so it is always below `S::SIZE`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryAddressOffset<S: PageSize> {
    value: u32,
    _size: PhantomData<S>,
}

impl<S: PageSize> MemoryAddressOffset<S> {
    #[inline]
    #[must_use]
    pub(crate) const fn of(addr: MemoryAddress) -> Self {
        Self {
            value: addr.as_u32() & (S::SIZE - 1),
            _size: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.value
    }
}
