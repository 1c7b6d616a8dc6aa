//! Block layout arithmetic.
//!
//! Every populated array lives in one block:
//!
//! ```text
//! block ──▶ [pad | len: usize | data: T * len]
//!                              ▲
//!                              └── pointer held by FixedArray
//! ```
//!
//! `pad` is only non-empty when `T` is aligned more strictly than `usize`.
//! The length word always sits immediately before the first element.

use core::{alloc::Layout, mem};

use crate::error::ArrayError;

/// Size in bytes of the length word.
pub const LENGTH_WORD: usize = mem::size_of::<usize>();

/// Offset from the start of a block to its first element.
pub const fn header_size<T>() -> usize {
    // Both values are powers of two, so the larger one is a multiple of the
    // smaller: the data stays aligned for T and the length word for usize.
    let align = mem::align_of::<T>();
    if align > LENGTH_WORD { align } else { LENGTH_WORD }
}

/// Alignment of the whole block.
pub const fn block_align<T>() -> usize {
    let align = mem::align_of::<T>();
    let word = mem::align_of::<usize>();
    if align > word { align } else { word }
}

/// Bytes needed to store `len` elements of `T` plus the length header,
/// or `None` on overflow.
pub const fn try_space<T>(len: usize) -> Option<usize> {
    match mem::size_of::<T>().checked_mul(len) {
        Some(bytes) => bytes.checked_add(header_size::<T>()),
        None => None,
    }
}

/// Bytes needed to store `len` elements of `T` plus the length header.
///
/// # Panics
///
/// Panics if the size overflows `usize`.
pub const fn space<T>(len: usize) -> usize {
    match try_space::<T>(len) {
        Some(bytes) => bytes,
        None => panic!("capacity overflow"),
    }
}

/// Returns the layout of a block holding `len` elements of `T`.
pub fn block_layout<T>(len: usize) -> Result<Layout, ArrayError> {
    let size = try_space::<T>(len).ok_or(ArrayError::CapacityOverflow { len })?;
    Layout::from_size_align(size, block_align::<T>())
        .map_err(|_| ArrayError::CapacityOverflow { len })
}
