//! Non-owning specializations of [`FixedArray`].

use core::{mem::MaybeUninit, ptr::NonNull};

use crate::{allocator::ArrayAllocator, array::FixedArray, error::ArrayError, policy::KeepElements};

/// A fixed array of pointers to values owned elsewhere.
///
/// Neither the pointers nor their targets are ever dropped through the array.
pub type PointerArray<'a, T> = FixedArray<'a, NonNull<T>, KeepElements>;

/// A fixed array that skips element destructors.
///
/// Meant for trivially destructible values, or for values whose cleanup is
/// handled some other way.
pub type ValueArray<'a, T> = FixedArray<'a, T, KeepElements>;

impl<'a, T> PointerArray<'a, T> {
    /// Allocates a block from `alloc` holding pointers to each of `refs`.
    pub fn from_refs_in<A>(refs: &[&'a T], alloc: &'a A) -> Result<Self, ArrayError>
    where
        A: ArrayAllocator + ?Sized,
    {
        Self::from_iter_in(refs.iter().map(|r| NonNull::from(*r)), alloc)
    }

    /// Places pointers to each of `refs` in `buf`.
    pub fn from_refs_in_buffer(
        buf: &'a mut [MaybeUninit<u8>],
        refs: &[&'a T],
    ) -> Result<Self, ArrayError> {
        Self::from_iter_in_buffer(buf, refs.iter().map(|r| NonNull::from(*r)))
    }
}
