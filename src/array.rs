use core::{
    alloc::Layout,
    fmt,
    marker::PhantomData,
    mem::{self, MaybeUninit},
    ops::{Index, IndexMut, Range},
    ptr::{self, NonNull},
    slice,
};

use crate::{
    allocator::ArrayAllocator,
    error::ArrayError,
    layout,
    policy::{DropElements, DropPolicy},
};

/// A fixed-size array whose length lives in the same block as its elements.
///
/// The array is a single pointer. When populated it points at element 0 of a
/// block laid out as `[len: usize][T; len]`; see [`layout`](crate::layout).
///
/// The array never frees its block on drop. Memory obtained from an allocator
/// is only released by [`finalize`](Self::finalize); memory supplied by the
/// caller as a buffer stays the caller's. Whether the elements themselves are
/// dropped is decided by `D`.
///
/// See [crate-level docs](crate) for examples.
pub struct FixedArray<'a, T, D: DropPolicy = DropElements> {
    data: Option<NonNull<T>>,
    _marker: PhantomData<(&'a mut [T], D)>,
}

static_assertions::assert_eq_size!(FixedArray<'static, u8>, usize);
static_assertions::assert_eq_size!(FixedArray<'static, [u64; 4]>, usize);

impl<'a, T, D: DropPolicy> FixedArray<'a, T, D> {
    /// Creates an empty array that holds no block.
    pub const fn new() -> Self {
        Self {
            data: None,
            _marker: PhantomData,
        }
    }

    /// Bytes a block for `len` elements occupies, length word included.
    ///
    /// This is `len * size_of::<T>() + size_of::<usize>()`, except for `T`
    /// aligned more strictly than `usize`: the header then grows to
    /// `align_of::<T>()` bytes, so the result is `len * size_of::<T>() +
    /// align_of::<T>()`.
    ///
    /// # Panics
    ///
    /// Panics if the size overflows `usize`.
    pub const fn space(len: usize) -> usize {
        layout::space::<T>(len)
    }

    /// Layout of a block for `len` elements.
    pub fn layout(len: usize) -> Result<Layout, ArrayError> {
        layout::block_layout::<T>(len)
    }

    // ---------------------------------------------------------------------
    // Caller-supplied memory
    // ---------------------------------------------------------------------

    /// Places clones of `values` in `buf`.
    ///
    /// `buf` must hold at least [`space(values.len())`](Self::space) bytes and
    /// start at the block alignment. The array borrows `buf` but does not own it.
    pub fn from_slice_in_buffer(
        buf: &'a mut [MaybeUninit<u8>],
        values: &[T],
    ) -> Result<Self, ArrayError>
    where
        T: Clone,
    {
        let mut array = Self::new();
        array.set_from_slice_in_buffer(buf, values)?;
        Ok(array)
    }

    /// Places the items of `values` in `buf`, in iteration order.
    pub fn from_iter_in_buffer(
        buf: &'a mut [MaybeUninit<u8>],
        values: impl IntoIterator<Item = T, IntoIter: ExactSizeIterator>,
    ) -> Result<Self, ArrayError> {
        let mut values = values.into_iter();
        let len = values.len();
        let block = Self::claim(buf, len)?;
        let mut array = Self::new();
        // SAFETY: `claim` checked the size and alignment of the buffer, which
        // stays borrowed for 'a.
        unsafe { array.populate(block, len, |data| Self::fill_from(data, len, &mut values)) };
        Ok(array)
    }

    /// Places `len` default values in `buf`.
    pub fn with_default_in_buffer(
        buf: &'a mut [MaybeUninit<u8>],
        len: usize,
    ) -> Result<Self, ArrayError>
    where
        T: Default,
    {
        let block = Self::claim(buf, len)?;
        let mut array = Self::new();
        // SAFETY: as in `from_iter_in_buffer`.
        unsafe { array.populate(block, len, |data| Self::fill(data, len, T::default)) };
        Ok(array)
    }

    /// Writes the length word into `buf` and adopts the `len` elements that
    /// already follow it.
    ///
    /// Use this to reattach an array to bytes moved from another populated
    /// block with the same element type.
    ///
    /// # Safety
    ///
    /// The `len` elements after the header of `buf` must be initialized, valid
    /// values of `T`.
    pub unsafe fn assume_init_in_buffer(
        buf: &'a mut [MaybeUninit<u8>],
        len: usize,
    ) -> Result<Self, ArrayError> {
        let block = Self::claim(buf, len)?;
        let mut array = Self::new();
        // SAFETY: the caller vouches for the elements.
        unsafe { array.populate(block, len, |_| {}) };
        Ok(array)
    }

    /// Places clones of `values` in `buf`, which must be empty.
    ///
    /// # Panics
    ///
    /// Panics if the array is already populated.
    pub fn set_from_slice_in_buffer(
        &mut self,
        buf: &'a mut [MaybeUninit<u8>],
        values: &[T],
    ) -> Result<(), ArrayError>
    where
        T: Clone,
    {
        self.assert_unpopulated();
        let len = values.len();
        let block = Self::claim(buf, len)?;
        let mut values = values.iter().cloned();
        // SAFETY: as in `from_iter_in_buffer`.
        unsafe { self.populate(block, len, |data| Self::fill_from(data, len, &mut values)) };
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Allocator-supplied memory
    // ---------------------------------------------------------------------

    /// Allocates a block from `alloc` and fills it with clones of `values`.
    ///
    /// The array borrows `alloc` for as long as it lives, so the allocator
    /// cannot go away underneath it. Release the block with
    /// [`finalize`](Self::finalize), or it leaks.
    ///
    /// ```compile_fail
    /// use bumpalo::Bump;
    /// use fixed_array::FixedArray;
    ///
    /// // The temporary arena is dropped while the array still points into it.
    /// let array = FixedArray::<u32>::from_slice_in(&[1, 2, 3], &Bump::new()).unwrap();
    /// assert_eq!(array.len(), 3);
    /// ```
    pub fn from_slice_in<A>(values: &[T], alloc: &'a A) -> Result<Self, ArrayError>
    where
        T: Clone,
        A: ArrayAllocator + ?Sized,
    {
        let mut array = Self::new();
        array.set_from_slice_in(values, alloc)?;
        Ok(array)
    }

    /// Allocates a block from `alloc` and fills it with the items of `values`.
    pub fn from_iter_in<A>(
        values: impl IntoIterator<Item = T, IntoIter: ExactSizeIterator>,
        alloc: &'a A,
    ) -> Result<Self, ArrayError>
    where
        A: ArrayAllocator + ?Sized,
    {
        let mut values = values.into_iter();
        let len = values.len();
        let block = Self::allocate(alloc, len)?;
        let mut array = Self::new();
        // SAFETY: `allocate` returned a block sized and aligned for `len`.
        unsafe { array.populate(block, len, |data| Self::fill_from(data, len, &mut values)) };
        Ok(array)
    }

    /// Allocates a block from `alloc` holding `len` default values.
    pub fn with_default_in<A>(len: usize, alloc: &'a A) -> Result<Self, ArrayError>
    where
        T: Default,
        A: ArrayAllocator + ?Sized,
    {
        let block = Self::allocate(alloc, len)?;
        let mut array = Self::new();
        // SAFETY: as in `from_iter_in`.
        unsafe { array.populate(block, len, |data| Self::fill(data, len, T::default)) };
        Ok(array)
    }

    /// Allocates a block from `alloc` for `len` elements without initializing
    /// them.
    ///
    /// # Safety
    ///
    /// Every element must be written through [`as_mut_ptr`](Self::as_mut_ptr)
    /// before the array is read, dropped with `D = DropElements`, or finalized.
    pub unsafe fn uninit_in<A>(len: usize, alloc: &'a A) -> Result<Self, ArrayError>
    where
        A: ArrayAllocator + ?Sized,
    {
        let block = Self::allocate(alloc, len)?;
        let mut array = Self::new();
        // SAFETY: the block is valid; the caller initializes the elements.
        unsafe { array.populate(block, len, |_| {}) };
        Ok(array)
    }

    /// Allocates a block from `alloc` for clones of `values`. The array must
    /// be empty.
    ///
    /// # Panics
    ///
    /// Panics if the array is already populated. Nothing is allocated then.
    pub fn set_from_slice_in<A>(
        &mut self,
        values: &[T],
        alloc: &'a A,
    ) -> Result<(), ArrayError>
    where
        T: Clone,
        A: ArrayAllocator + ?Sized,
    {
        self.assert_unpopulated();
        let len = values.len();
        let block = Self::allocate(alloc, len)?;
        let mut values = values.iter().cloned();
        // SAFETY: as in `from_iter_in`.
        unsafe { self.populate(block, len, |data| Self::fill_from(data, len, &mut values)) };
        Ok(())
    }

    /// Drops the elements (if `D` says so), returns the block to `alloc` and
    /// leaves the array empty. Does nothing on an empty array.
    ///
    /// # Safety
    ///
    /// The block must have come from `alloc`, or from an allocator that
    /// accepts blocks `alloc` handed out. Finalizing an array placed in a
    /// caller buffer is undefined behavior.
    pub unsafe fn finalize<A>(&mut self, alloc: &A)
    where
        A: ArrayAllocator + ?Sized,
    {
        let Some(block) = self.raw_block() else {
            return;
        };
        let len = self.len();
        let elements = ptr::slice_from_raw_parts_mut(self.as_mut_ptr(), len);
        self.data = None;
        if D::DROP_ELEMENTS {
            // SAFETY: elements [0, len) are live and no longer reachable
            // through `self`.
            unsafe { ptr::drop_in_place(elements) };
        }
        // SAFETY: this layout was valid when the block was allocated.
        let layout =
            unsafe { Layout::from_size_align_unchecked(Self::space(len), layout::block_align::<T>()) };
        tracing::trace!(len, bytes = layout.size(), "releasing fixed array block");
        // SAFETY: the caller guarantees the block belongs to `alloc`.
        unsafe { alloc.deallocate(block, len, layout) };
    }

    // ---------------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------------

    /// Number of elements; 0 for an empty array.
    #[inline]
    pub fn len(&self) -> usize {
        match self.data {
            None => 0,
            // SAFETY: a populated array always has a length word before its data.
            Some(data) => unsafe { data.cast::<usize>().sub(1).read() },
        }
    }

    /// Returns `true` if the array holds no block.
    ///
    /// A populated array of zero elements is *not* empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// Returns `true` if the array holds a block.
    #[inline]
    pub fn is_populated(&self) -> bool {
        self.data.is_some()
    }

    pub fn as_slice(&self) -> &[T] {
        match self.data {
            None => &[],
            // SAFETY: elements [0, len) are initialized.
            Some(data) => unsafe { slice::from_raw_parts(data.as_ptr(), self.len()) },
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.data {
            None => &mut [],
            // SAFETY: elements [0, len) are initialized and `self` is borrowed mutably.
            Some(data) => unsafe { slice::from_raw_parts_mut(data.as_ptr(), self.len()) },
        }
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.as_slice().get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(idx)
    }

    /// Returns element `idx` without a bounds check.
    ///
    /// # Safety
    ///
    /// `idx < self.len()`. Checked in debug builds and with the `checked`
    /// feature.
    #[inline]
    pub unsafe fn get_unchecked(&self, idx: usize) -> &T {
        precondition!(idx < self.len(), "index {idx} out of range for length {}", self.len());
        // SAFETY: idx < len implies the array is populated.
        unsafe { &*self.as_ptr().add(idx) }
    }

    /// Mutable counterpart of [`get_unchecked`](Self::get_unchecked).
    ///
    /// # Safety
    ///
    /// `idx < self.len()`.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, idx: usize) -> &mut T {
        precondition!(idx < self.len(), "index {idx} out of range for length {}", self.len());
        // SAFETY: idx < len implies the array is populated.
        unsafe { &mut *self.as_mut_ptr().add(idx) }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Pointer to element 0, or null for an empty array.
    pub fn as_ptr(&self) -> *const T {
        self.data.map_or(ptr::null(), |data| data.as_ptr().cast_const())
    }

    /// Mutable pointer to element 0, or null for an empty array.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The half-open `[begin, end)` range of element pointers.
    pub fn as_ptr_range(&self) -> Range<*const T> {
        self.as_slice().as_ptr_range()
    }

    /// Start of the block, i.e. the address handed out by the allocator or
    /// the start of the caller's buffer.
    pub fn raw_block(&self) -> Option<NonNull<u8>> {
        // SAFETY: the data pointer is exactly `header_size` bytes into the block.
        self.data
            .map(|data| unsafe { data.cast::<u8>().sub(layout::header_size::<T>()) })
    }

    // ---------------------------------------------------------------------
    // Raw parts
    // ---------------------------------------------------------------------

    /// Gives up the block without dropping elements, returning the data
    /// pointer (`None` for an empty array).
    pub fn into_raw(self) -> Option<NonNull<T>> {
        let data = self.data;
        mem::forget(self);
        data
    }

    /// Rebuilds an array from a pointer returned by [`into_raw`](Self::into_raw).
    ///
    /// The drop policy may differ from the array that produced the pointer.
    ///
    /// # Safety
    ///
    /// `data` must be `None` or come from `into_raw` on an array of the same
    /// element type, and its block must stay valid for `'a`. At most one array
    /// may own a given block at a time.
    pub unsafe fn from_raw(data: Option<NonNull<T>>) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn assert_unpopulated(&self) {
        assert!(
            self.data.is_none(),
            "fixed array is already populated with {} elements",
            self.len()
        );
    }

    /// Checks that `buf` can hold a block for `len` elements.
    fn claim(buf: &'a mut [MaybeUninit<u8>], len: usize) -> Result<NonNull<u8>, ArrayError> {
        let layout = Self::layout(len)?;
        if buf.len() < layout.size() {
            return Err(ArrayError::BufferTooSmall {
                required: layout.size(),
                actual: buf.len(),
            });
        }
        let block = NonNull::from(buf).cast::<u8>();
        if block.as_ptr().addr() % layout.align() != 0 {
            return Err(ArrayError::Misaligned {
                align: layout.align(),
            });
        }
        Ok(block)
    }

    fn allocate<A>(alloc: &A, len: usize) -> Result<NonNull<u8>, ArrayError>
    where
        A: ArrayAllocator + ?Sized,
    {
        let layout = Self::layout(len)?;
        let block = alloc.allocate(layout).map_err(|_| {
            tracing::debug!(len, bytes = layout.size(), "allocator refused fixed array block");
            ArrayError::AllocFailed {
                size: layout.size(),
                align: layout.align(),
            }
        })?;
        tracing::trace!(len, bytes = layout.size(), "allocated fixed array block");
        Ok(block)
    }

    /// Writes the length word into `block`, runs `init` on the data pointer,
    /// then adopts the block.
    ///
    /// # Safety
    ///
    /// `block` must be valid for `space(len)` bytes at the block alignment for
    /// `'a`, and `init` must leave elements [0, len) initialized.
    unsafe fn populate(&mut self, block: NonNull<u8>, len: usize, init: impl FnOnce(NonNull<T>)) {
        debug_assert!(self.data.is_none());
        // SAFETY: the header fits in the block and keeps both the length word
        // and the data aligned.
        let data = unsafe { block.add(layout::header_size::<T>()) }.cast::<T>();
        unsafe { data.cast::<usize>().sub(1).write(len) };
        init(data);
        self.data = Some(data);
    }

    /// Fills `len` elements starting at `data` from an iterator.
    ///
    /// # Panics
    ///
    /// Panics if `values` yields fewer than `len` items.
    ///
    /// # Safety
    ///
    /// Same as [`fill`](Self::fill).
    unsafe fn fill_from(data: NonNull<T>, len: usize, values: &mut impl Iterator<Item = T>) {
        // SAFETY: forwarded from the caller.
        unsafe { Self::fill(data, len, || values.next().expect("iterator exhausted too early")) };
    }

    /// Fills `len` elements starting at `data`, in index order.
    ///
    /// If `next` panics, the elements already written are dropped according
    /// to `D` and the block is left to the caller.
    ///
    /// # Safety
    ///
    /// `data` must be valid for writes of `len` elements.
    unsafe fn fill(data: NonNull<T>, len: usize, mut next: impl FnMut() -> T) {
        let mut guard = InitGuard::<T, D> {
            data,
            written: 0,
            _policy: PhantomData,
        };
        while guard.written < len {
            let value = next();
            // SAFETY: written < len.
            unsafe { data.add(guard.written).write(value) };
            guard.written += 1;
        }
        mem::forget(guard);
    }
}

/// Drops a partially filled prefix if element construction panics.
struct InitGuard<T, D: DropPolicy> {
    data: NonNull<T>,
    written: usize,
    _policy: PhantomData<D>,
}

impl<T, D: DropPolicy> Drop for InitGuard<T, D> {
    fn drop(&mut self) {
        if D::DROP_ELEMENTS {
            // SAFETY: exactly `written` elements were initialized.
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.data.as_ptr(), self.written))
            }
        }
    }
}

impl<T, D: DropPolicy> Drop for FixedArray<'_, T, D> {
    fn drop(&mut self) {
        // The block itself is never released here, see `finalize`.
        if D::DROP_ELEMENTS && mem::needs_drop::<T>() {
            // SAFETY: elements [0, len) are live and dropped once.
            unsafe { ptr::drop_in_place(self.as_mut_slice()) }
        }
    }
}

impl<T, D: DropPolicy> Default for FixedArray<'_, T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, D: DropPolicy> fmt::Debug for FixedArray<'_, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, D: DropPolicy> Index<usize> for FixedArray<'_, T, D> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &T {
        &self.as_slice()[idx]
    }
}

impl<T, D: DropPolicy> IndexMut<usize> for FixedArray<'_, T, D> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.as_mut_slice()[idx]
    }
}

impl<'s, T, D: DropPolicy> IntoIterator for &'s FixedArray<'_, T, D> {
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, T, D: DropPolicy> IntoIterator for &'s mut FixedArray<'_, T, D> {
    type Item = &'s mut T;
    type IntoIter = slice::IterMut<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, D: DropPolicy> AsRef<[T]> for FixedArray<'_, T, D> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, D: DropPolicy> AsMut<[T]> for FixedArray<'_, T, D> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, U, D, E> PartialEq<FixedArray<'_, U, E>> for FixedArray<'_, T, D>
where
    T: PartialEq<U>,
    D: DropPolicy,
    E: DropPolicy,
{
    fn eq(&self, other: &FixedArray<'_, U, E>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialEq<U>, U, D: DropPolicy> PartialEq<[U]> for FixedArray<'_, T, D> {
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq<U>, U, D: DropPolicy, const N: usize> PartialEq<[U; N]> for FixedArray<'_, T, D> {
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == other
    }
}
