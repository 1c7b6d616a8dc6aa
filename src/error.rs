//! Errors reported while populating a fixed array.
//!
//! Contract violations (repopulating an array, releasing through the wrong
//! allocator) are not errors: they panic or are undefined behavior. Only
//! failures a caller can reasonably recover from show up here.

use thiserror::Error;

/// Reasons a fixed array could not be populated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayError {
    /// The block size for `len` elements does not fit in the address space.
    #[error("capacity overflow: a block for {len} elements does not fit in memory")]
    CapacityOverflow { len: usize },

    /// The allocator refused to provide a block.
    ///
    /// The allocator's own [`AllocError`](crate::AllocError) carries no
    /// detail, so it is translated into this variant with the layout that
    /// was requested.
    #[error("allocation of {size} bytes (align {align}) failed")]
    AllocFailed { size: usize, align: usize },

    /// A caller-supplied buffer is shorter than the block it must hold.
    #[error("buffer too small: {required} bytes required, {actual} available")]
    BufferTooSmall { required: usize, actual: usize },

    /// A caller-supplied buffer does not start at the block alignment.
    #[error("buffer is not aligned to {align} bytes")]
    Misaligned { align: usize },
}
