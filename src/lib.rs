//! Fixed-size arrays that keep their length next to their elements.
//!
//! A [`FixedArray`] is a single pointer. Its length is not stored in the
//! array value but in a `usize` word placed immediately before the first
//! element, inside the same block:
//!
//! ```text
//! FixedArray:  ptr ──────────────┐
//!                                ▼
//!              [len: usize][T][T][T]...
//!              └──────────────────────┘
//!                 one block, space(len) bytes
//! ```
//!
//! An array of `n` elements therefore needs exactly one allocation of
//! [`space(n)`](FixedArray::space) bytes, and none at all when it is placed in
//! a buffer the caller already owns.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use fixed_array::FixedArray;
//!
//! let arena = Bump::new();
//! let mut array = FixedArray::<i32>::from_slice_in(&[1, 2, 3, 4, 5], &arena).unwrap();
//! assert_eq!(array.len(), 5);
//! assert_eq!(array[2], 3);
//!
//! array[2] = 30;
//! assert_eq!(array.iter().copied().collect::<Vec<_>>(), [1, 2, 30, 4, 5]);
//!
//! // SAFETY: the block came from `arena`.
//! unsafe { array.finalize(&arena) };
//! assert!(array.is_empty());
//! ```
//!
//! Placing an array in caller memory:
//!
//! ```
//! use core::mem::MaybeUninit;
//! use fixed_array::ValueArray;
//!
//! #[repr(align(8))]
//! struct Storage([MaybeUninit<u8>; 64]);
//!
//! let mut storage = Storage([MaybeUninit::uninit(); 64]);
//! let array = ValueArray::<u16>::from_slice_in_buffer(&mut storage.0, &[7, 8, 9]).unwrap();
//! assert_eq!(array, [7, 8, 9]);
//! ```
//!
//! # Memory ownership
//!
//! | Built with | Elements dropped on scope exit | Block released on scope exit |
//! |------------|-------------------------------|------------------------------|
//! | buffer     | if `D = DropElements`         | never (caller owns it)       |
//! | allocator  | if `D = DropElements`         | never, call `finalize`       |
//!
//! # Gotchas
//!
//! - **No automatic free**: dropping an allocator-backed array without
//!   [`finalize`](FixedArray::finalize) leaks its block. Arena allocators such
//!   as `bumpalo` reclaim it when the arena goes away.
//! - **`is_empty` means "no block"**: a populated array of zero elements is not
//!   empty.
//! - **Fixed length**: there is no push, pop or resize.
//!
//! # Features
//!
//! - `std`: link the standard library. Without it the crate is `no_std`.
//! - `checked`: keep the precondition assertions of
//!   [`get_unchecked`](FixedArray::get_unchecked) in release builds.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

/// Asserts a caller precondition in debug builds or with the `checked` feature.
macro_rules! precondition {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(any(debug_assertions, feature = "checked")) {
            assert!($cond, $($arg)+);
        }
    };
}

pub mod allocator;
mod array;
pub mod error;
pub mod layout;
pub mod policy;
mod specialized;

pub use allocator::{AllocError, ArrayAllocator, Global};
pub use array::FixedArray;
pub use error::ArrayError;
pub use policy::{DropElements, DropPolicy, KeepElements};
pub use specialized::{PointerArray, ValueArray};
