//! Integration tests for the public API.
//!
//! These tests exercise the array lifecycle end-to-end against allocators that
//! record every request, and against caller-owned buffers.

use core::{alloc::Layout, cell::Cell, cell::RefCell, mem::MaybeUninit, ptr::NonNull};

use allocator_api2::alloc::Allocator;

use bumpalo::Bump;
use fixed_array::{
    AllocError, ArrayAllocator, ArrayError, DropElements, FixedArray, KeepElements, ValueArray,
};
use pretty_assertions::assert_eq;

/// Hands out blocks from a bump arena and records every call.
#[derive(Default)]
struct RecordingAllocator {
    arena: Bump,
    allocations: RefCell<Vec<(NonNull<u8>, usize)>>,
    releases: RefCell<Vec<(usize, NonNull<u8>)>>,
}

unsafe impl ArrayAllocator for RecordingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let block = self.arena.try_alloc_layout(layout).map_err(|_| AllocError)?;
        self.allocations.borrow_mut().push((block, layout.size()));
        Ok(block)
    }

    unsafe fn deallocate(&self, block: NonNull<u8>, len: usize, _layout: Layout) {
        // The arena frees everything when it is dropped.
        self.releases.borrow_mut().push((len, block));
    }
}

/// Refuses every request.
struct ExhaustedAllocator;

unsafe impl ArrayAllocator for ExhaustedAllocator {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _block: NonNull<u8>, _len: usize, _layout: Layout) {
        unreachable!("nothing was ever allocated");
    }
}

/// A standalone arena implementing the standard allocator trait, owned by
/// value. Its memory goes away with it.
#[derive(Default)]
struct OwnedArena {
    arena: Bump,
    live: Cell<usize>,
}

unsafe impl Allocator for OwnedArena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let block = self.arena.try_alloc_layout(layout).map_err(|_| AllocError)?;
        self.live.set(self.live.get() + 1);
        Ok(NonNull::slice_from_raw_parts(block, layout.size()))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
struct DropCounter(Cell<usize>);

#[derive(Clone)]
struct Tracked<'c> {
    value: u32,
    counter: &'c DropCounter,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.counter.0.set(self.counter.0.get() + 1);
    }
}

#[repr(C, align(16))]
struct Storage<const N: usize>([MaybeUninit<u8>; N]);

impl<const N: usize> Storage<N> {
    fn new() -> Self {
        Storage([MaybeUninit::uninit(); N])
    }
}

#[test]
fn test_default_array_is_empty() {
    let array = FixedArray::<u64>::default();
    assert_eq!(array.len(), 0);
    assert!(array.is_empty());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_five_i32_in_a_28_byte_buffer() {
    assert_eq!(FixedArray::<i32>::space(5), 28);

    let mut storage = Storage::<28>::new();
    let array = FixedArray::<i32>::from_slice_in_buffer(&mut storage.0, &[1, 2, 3, 4, 5])
        .expect("28 bytes is enough for five i32");

    assert_eq!(array.len(), 5);
    assert_eq!(array[2], 3);
    assert_eq!(array.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_space_formula() {
    for n in [0, 1, 2, 17, 1000] {
        assert_eq!(
            FixedArray::<u32>::space(n),
            n * size_of::<u32>() + size_of::<usize>()
        );
        assert_eq!(
            FixedArray::<(u8, u16)>::space(n),
            n * size_of::<(u8, u16)>() + size_of::<usize>()
        );
    }
}

#[test]
fn test_copies_source_sequence_in_order() {
    let source: Vec<String> = ["a", "bb", "ccc"].iter().map(|s| s.to_string()).collect();
    let allocator = RecordingAllocator::default();
    let array = FixedArray::<String>::from_slice_in(&source, &allocator).unwrap();

    assert_eq!(array.len(), source.len());
    for (i, expected) in source.iter().enumerate() {
        assert_eq!(&array[i], expected);
    }
    assert_eq!(array.iter().collect::<Vec<_>>(), source.iter().collect::<Vec<_>>());

    // Iteration is restartable.
    assert_eq!(array.iter().count(), 3);
    assert_eq!(array.iter().count(), 3);

    let range = array.as_ptr_range();
    // SAFETY: both pointers bound the same block.
    let distance = unsafe { range.end.offset_from(range.start) };
    assert_eq!(distance as usize, array.len());
}

#[test]
fn test_allocate_default_then_finalize() {
    let allocator = RecordingAllocator::default();
    let mut array = FixedArray::<u32>::with_default_in(3, &allocator).unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array, [0, 0, 0]);

    let block = array.raw_block().unwrap();
    assert_eq!(
        *allocator.allocations.borrow(),
        vec![(block, FixedArray::<u32>::space(3))]
    );
    assert!(allocator.releases.borrow().is_empty());

    // SAFETY: the block came from `allocator`.
    unsafe { array.finalize(&allocator) };
    assert!(array.is_empty());
    assert_eq!(array.len(), 0);
    assert_eq!(*allocator.releases.borrow(), vec![(3, block)]);

    // Finalizing an empty array is a no-op.
    unsafe { array.finalize(&allocator) };
    assert_eq!(allocator.releases.borrow().len(), 1);
}

#[test]
fn test_finalize_drops_owned_elements_once() {
    let counter = DropCounter::default();
    let source = [1, 2, 3, 4].map(|value| Tracked {
        value,
        counter: &counter,
    });
    let allocator = RecordingAllocator::default();

    let mut array = FixedArray::<Tracked, DropElements>::from_slice_in(&source, &allocator).unwrap();
    assert_eq!(array.iter().map(|t| t.value).sum::<u32>(), 10);
    // SAFETY: the block came from `allocator`.
    unsafe { array.finalize(&allocator) };
    assert_eq!(counter.0.get(), 4);

    // Dropping the now-empty array does not drop anything again.
    drop(array);
    assert_eq!(counter.0.get(), 4);
    assert_eq!(allocator.releases.borrow().len(), 1);
}

#[test]
fn test_finalize_keeps_elements_of_views() {
    let counter = DropCounter::default();
    let source = [7, 8].map(|value| Tracked {
        value,
        counter: &counter,
    });
    let allocator = RecordingAllocator::default();

    let mut array = ValueArray::<Tracked>::from_slice_in(&source, &allocator).unwrap();
    // SAFETY: the block came from `allocator`.
    unsafe { array.finalize(&allocator) };
    assert_eq!(counter.0.get(), 0);
    assert_eq!(allocator.releases.borrow()[0].0, 2);
}

#[test]
fn test_drop_without_finalize_never_releases() {
    let counter = DropCounter::default();
    let source = [1, 2, 3].map(|value| Tracked {
        value,
        counter: &counter,
    });
    let allocator = RecordingAllocator::default();

    {
        let _owned = FixedArray::<Tracked, DropElements>::from_slice_in(&source, &allocator).unwrap();
        let _view = FixedArray::<Tracked, KeepElements>::from_slice_in(&source, &allocator).unwrap();
    }

    assert_eq!(counter.0.get(), 3);
    assert_eq!(allocator.allocations.borrow().len(), 2);
    assert!(allocator.releases.borrow().is_empty());
}

#[test]
fn test_set_populates_an_empty_array() {
    let allocator = RecordingAllocator::default();
    let mut array = FixedArray::<u8>::new();
    array.set_from_slice_in(b"xyz", &allocator).unwrap();
    assert_eq!(array, *b"xyz");
}

#[test]
#[should_panic(expected = "already populated")]
fn test_set_on_populated_array_panics() {
    let mut storage = Storage::<64>::new();
    let mut other = Storage::<64>::new();
    let mut array = FixedArray::<u8>::from_slice_in_buffer(&mut storage.0, b"abc").unwrap();
    let _ = array.set_from_slice_in_buffer(&mut other.0, b"def");
}

#[test]
fn test_set_on_populated_array_does_not_allocate() {
    let allocator = RecordingAllocator::default();
    let mut array = FixedArray::<u8>::from_slice_in(b"abc", &allocator).unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        array.set_from_slice_in(b"def", &allocator)
    }));
    assert!(result.is_err());
    assert_eq!(allocator.allocations.borrow().len(), 1);
    assert_eq!(array, *b"abc");
}

#[test]
fn test_allocation_failure_is_propagated() {
    let err = FixedArray::<u64>::with_default_in(4, &ExhaustedAllocator).unwrap_err();
    let layout = FixedArray::<u64>::layout(4).unwrap();
    assert_eq!(
        err,
        ArrayError::AllocFailed {
            size: layout.size(),
            align: layout.align(),
        }
    );

    let mut array = FixedArray::<u64>::new();
    assert!(array.set_from_slice_in(&[1, 2], &ExhaustedAllocator).is_err());
    assert!(array.is_empty());
}

#[test]
fn test_capacity_overflow_is_an_error() {
    let err = FixedArray::<u64>::with_default_in(usize::MAX, &ExhaustedAllocator).unwrap_err();
    assert_eq!(err, ArrayError::CapacityOverflow { len: usize::MAX });
}

#[test]
fn test_reattach_moved_bytes() {
    let mut original = Storage::<64>::new();
    {
        let array = ValueArray::<u32>::from_slice_in_buffer(&mut original.0, &[10, 20, 30]).unwrap();
        assert_eq!(array.len(), 3);
    }

    // Move the populated block to new memory, header and all.
    let mut moved = Storage::<64>::new();
    moved.0 = original.0;

    // SAFETY: `moved` holds three initialized u32 after the header.
    let array = unsafe { ValueArray::<u32>::assume_init_in_buffer(&mut moved.0, 3) }.unwrap();
    assert_eq!(array, [10, 20, 30]);
}

#[test]
fn test_from_iter_in_global() {
    let mut array =
        FixedArray::<u32>::from_iter_in((1..5).map(|i| i * i), &fixed_array::Global).unwrap();
    assert_eq!(array, [1, 4, 9, 16]);
    // SAFETY: the block came from `Global`.
    unsafe { array.finalize(&fixed_array::Global) };
}

#[test]
fn test_owned_allocator_outlives_its_arrays() {
    let target = 7u32;
    let allocator = OwnedArena::default();
    let mut array = FixedArray::<u32>::from_slice_in(&[1, 2, 3], &allocator).unwrap();
    let mut pointers = fixed_array::PointerArray::from_refs_in(&[&target], &allocator).unwrap();
    assert_eq!(allocator.live.get(), 2);

    // The arrays borrow `allocator`, so its memory is still there.
    assert_eq!(array.len(), 3);
    assert_eq!(array, [1, 2, 3]);
    assert_eq!(pointers[0], NonNull::from(&target));

    // SAFETY: both blocks came from `allocator`.
    unsafe {
        pointers.finalize(&allocator);
        array.finalize(&allocator);
    }
    assert_eq!(allocator.live.get(), 0);
}
