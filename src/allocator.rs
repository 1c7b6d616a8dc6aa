//! The allocator capability consumed by [`FixedArray`](crate::FixedArray).
//!
//! Every type whose shared reference is an [`allocator_api2::alloc::Allocator`]
//! is an [`ArrayAllocator`], so the global heap ([`Global`]) and bump arenas
//! ([`bumpalo::Bump`]) work directly. Implement the trait by hand when the
//! allocator wants to know how many elements a released block held.
//!
//! Arrays borrow their allocator for their whole lifetime, so an allocator
//! cannot be dropped while an array still points into its memory.
//!
//! [`bumpalo::Bump`]: https://docs.rs/bumpalo/latest/bumpalo/struct.Bump.html

use core::{alloc::Layout, ptr::NonNull};

pub use allocator_api2::alloc::{AllocError, Global};
use allocator_api2::alloc::Allocator;

/// Supplies and reclaims raw blocks for fixed arrays.
///
/// # Safety
///
/// A block returned by `allocate` must be valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and must stay valid
/// until it is passed back to `deallocate` or the allocator is dropped,
/// whichever comes first.
pub unsafe trait ArrayAllocator {
    /// Returns a block of at least `layout.size()` bytes.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block obtained from [`allocate`](Self::allocate).
    ///
    /// `len` is the element count stored in the block, `layout` the same
    /// layout the block was requested with.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by `allocate` on this allocator (or one
    /// it shares its memory with) for `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, block: NonNull<u8>, len: usize, layout: Layout);
}

// Bounded on `&A` rather than `A`: `bumpalo::Bump` only implements
// `Allocator` through `&Bump`, and any `A: Allocator` gets `&A: Allocator`.
unsafe impl<A> ArrayAllocator for A
where
    A: ?Sized,
    for<'x> &'x A: Allocator,
{
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        <&A as Allocator>::allocate(&self, layout).map(NonNull::cast)
    }

    #[inline]
    unsafe fn deallocate(&self, block: NonNull<u8>, _len: usize, layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { <&A as Allocator>::deallocate(&self, block, layout) }
    }
}
