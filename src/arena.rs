use std::{
  fmt, mem,
  ptr::{self, NonNull},
};

use log::{debug, trace};

use crate::{
  align_up,
  block::BlockHeader,
  error::{AllocError, InvariantViolation},
};

/// A first-fit allocator bound to one fixed, caller-supplied region.
///
/// `ALIGN` is the allocation granularity and payload alignment: a power of
/// two no smaller than the header's own alignment (8 on 64-bit targets).
/// The default of 16 matches what `malloc` guarantees on mainstream 64-bit
/// platforms.
///
/// The whole region is tiled by an address-ordered, singly linked list of
/// blocks, each starting with an embedded block header. Allocation
/// takes the first free block that fits (first-fit: deterministic and
/// easy to reason about in tests, at some fragmentation cost versus
/// best-fit), splitting off the tail when the leftover can hold a header
/// plus at least one `ALIGN`-byte payload. Release merges free neighbours
/// immediately, so the list never holds two adjacent free blocks.
///
/// `Arena` is not thread-safe. It holds raw pointers and is therefore
/// neither `Send` nor `Sync`; callers sharing one arena across threads
/// must serialize every call behind their own lock.
pub struct Arena<const ALIGN: usize = 16> {
  head: *mut BlockHeader,
  len: usize,
}

impl<const ALIGN: usize> Arena<ALIGN> {
  /// Per-block overhead: the header size rounded up to `ALIGN`, so that
  /// payloads always start on an `ALIGN` boundary.
  pub const fn overhead() -> usize {
    align_up!(mem::size_of::<BlockHeader>(), ALIGN)
  }

  /// Binds an allocator to the `total_size` bytes starting at `base` and
  /// writes one spanning free block header at `base`.
  ///
  /// `total_size` is trimmed down to a multiple of `ALIGN`; the trimmed
  /// span becomes the managed capacity reported by
  /// [`capacity`](Self::capacity).
  ///
  /// # Errors
  ///
  /// [`AllocError::InvalidArena`] when `base` is null or not aligned to
  /// `ALIGN`, when `ALIGN` is not a power of two at least as large as the
  /// header's own alignment, or when the trimmed region cannot hold one
  /// header plus one `ALIGN`-byte payload.
  ///
  /// # Safety
  ///
  /// `base` must point to `total_size` bytes that are valid for reads and
  /// writes, and nothing else may read or write them for as long as this
  /// arena or any pointer returned by [`allocate`](Self::allocate) is in
  /// use.
  pub unsafe fn new(
    base: *mut u8,
    total_size: usize,
  ) -> Result<Self, AllocError> {
    if !ALIGN.is_power_of_two() || ALIGN < mem::align_of::<BlockHeader>() {
      return Err(AllocError::InvalidArena);
    }

    if base.is_null() || base as usize % ALIGN != 0 {
      return Err(AllocError::InvalidArena);
    }

    let len = total_size & !(ALIGN - 1);

    if len < Self::overhead() + ALIGN {
      return Err(AllocError::InvalidArena);
    }

    let head = base as *mut BlockHeader;

    unsafe {
      head.write(BlockHeader::new(len - Self::overhead(), true, ptr::null_mut()));
    }

    debug!("arena bound to {:?}, managing {} bytes", base, len);

    Ok(Self { head, len })
  }

  /// Total managed bytes, headers included.
  pub const fn capacity(&self) -> usize {
    self.len
  }

  /// Hands out an `ALIGN`-aligned payload of at least `requested_size`
  /// bytes, carved from the first free block large enough in address
  /// order.
  ///
  /// A zero-byte request is backed by a minimum `ALIGN`-byte block, so
  /// the returned pointer is valid, distinct from every other live
  /// pointer, and releasable like any other.
  ///
  /// # Errors
  ///
  /// [`AllocError::OutOfMemory`] when no free block fits; the scan is
  /// read-only, so a failed call leaves the arena untouched.
  pub fn allocate(
    &mut self,
    requested_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let aligned_size = match requested_size.checked_add(ALIGN - 1) {
      Some(bumped) => (bumped & !(ALIGN - 1)).max(ALIGN),
      None => return Err(AllocError::OutOfMemory),
    };

    let block = self.find_free_block(aligned_size);

    if block.is_null() {
      trace!("allocate({}): no free block fits", requested_size);
      return Err(AllocError::OutOfMemory);
    }

    unsafe {
      if (*block).size - aligned_size >= Self::overhead() + ALIGN {
        self.split(block, aligned_size);
      }

      (*block).is_free = false;

      trace!(
        "allocate({}) -> block {:?}, {} payload bytes",
        requested_size,
        block,
        (*block).size
      );

      Ok(NonNull::new_unchecked((block as *mut u8).add(Self::overhead())))
    }
  }

  /// Returns a payload previously handed out by
  /// [`allocate`](Self::allocate) to the free list, merging it with a
  /// free successor and/or predecessor so that no two neighbouring free
  /// blocks remain. Releasing a null pointer is a no-op, mirroring
  /// `free(NULL)`.
  ///
  /// # Errors
  ///
  /// [`AllocError::InvalidFree`] when `pointer` is not the payload
  /// address of a currently-used block of this arena (a double free, a
  /// foreign pointer, or a pointer into a payload's interior). The check
  /// is compiled into every build; a rejected call mutates nothing.
  ///
  /// # Safety
  ///
  /// The payload must not be read or written after this call returns
  /// successfully.
  pub unsafe fn release(
    &mut self,
    pointer: *mut u8,
  ) -> Result<(), AllocError> {
    if pointer.is_null() {
      return Ok(());
    }

    // One walk finds both the owning block and the predecessor that
    // backward coalescing needs.
    let mut prev: *mut BlockHeader = ptr::null_mut();
    let mut current = self.head;

    unsafe {
      while !current.is_null() && (current as *mut u8).add(Self::overhead()) != pointer {
        prev = current;
        current = (*current).next;
      }

      if current.is_null() || (*current).is_free {
        trace!("release({:?}): not a used payload address", pointer);
        return Err(AllocError::InvalidFree);
      }

      (*current).is_free = true;

      let next = (*current).next;

      if !next.is_null() && (*next).is_free {
        (*current).size += Self::overhead() + (*next).size;
        (*current).next = (*next).next;
        trace!("merged block {:?} into {:?}", next, current);
      }

      if !prev.is_null() && (*prev).is_free {
        (*prev).size += Self::overhead() + (*current).size;
        (*prev).next = (*current).next;
        trace!("merged block {:?} into {:?}", current, prev);
      }
    }

    Ok(())
  }

  /// Walks the whole block list once and verifies that it still tiles
  /// the arena: headers chain contiguously in ascending address order, no
  /// two neighbouring blocks are both free, payload sizes are nonzero
  /// multiples of `ALIGN`, and headers plus payloads account for every
  /// managed byte.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    let mut expected = self.head as *mut u8;
    let mut accounted = 0usize;
    let mut prev_free = false;
    let mut current = self.head;

    unsafe {
      while !current.is_null() {
        let addr = current as *mut u8;

        if addr != expected {
          return Err(InvariantViolation::BrokenChain {
            expected: expected as usize,
            found: addr as usize,
          });
        }

        if prev_free && (*current).is_free {
          return Err(InvariantViolation::AdjacentFreeBlocks { at: addr as usize });
        }

        if (*current).size == 0 || (*current).size % ALIGN != 0 {
          return Err(InvariantViolation::BadBlockSize {
            at: addr as usize,
            size: (*current).size,
          });
        }

        accounted += Self::overhead() + (*current).size;
        prev_free = (*current).is_free;
        expected = addr.add(Self::overhead() + (*current).size);
        current = (*current).next;
      }
    }

    // Contiguity is already checked block by block, so an exact byte
    // count also pins the last block's end to the arena end.
    if accounted != self.len {
      return Err(InvariantViolation::CapacityMismatch {
        accounted,
        capacity: self.len,
      });
    }

    Ok(())
  }

  /// Byte and block accounting for the current arena state.
  pub fn stats(&self) -> ArenaStats {
    let mut stats = ArenaStats {
      capacity: self.len,
      used_bytes: 0,
      free_bytes: 0,
      block_count: 0,
      free_block_count: 0,
      largest_free: 0,
    };

    let mut current = self.head;

    unsafe {
      while !current.is_null() {
        stats.block_count += 1;

        if (*current).is_free {
          stats.free_block_count += 1;
          stats.free_bytes += (*current).size;
          stats.largest_free = stats.largest_free.max((*current).size);
        } else {
          stats.used_bytes += (*current).size;
        }

        current = (*current).next;
      }
    }

    stats
  }

  fn find_free_block(
    &self,
    size: usize,
  ) -> *mut BlockHeader {
    let mut current = self.head;

    unsafe {
      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }
    }

    ptr::null_mut()
  }

  /// Carves the tail of `block` into a new free block. The caller has
  /// already checked that the remainder holds a header plus at least
  /// `ALIGN` payload bytes.
  unsafe fn split(
    &mut self,
    block: *mut BlockHeader,
    aligned_size: usize,
  ) {
    unsafe {
      let remainder =
        (block as *mut u8).add(Self::overhead() + aligned_size) as *mut BlockHeader;

      remainder.write(BlockHeader::new(
        (*block).size - aligned_size - Self::overhead(),
        true,
        (*block).next,
      ));

      (*block).size = aligned_size;
      (*block).next = remainder;

      trace!(
        "split block {:?}, remainder {:?} holds {} bytes",
        block,
        remainder,
        (*remainder).size
      );
    }
  }
}

impl<const ALIGN: usize> fmt::Debug for Arena<ALIGN> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(
      f,
      "Arena {{ base: {:?}, capacity: {}, align: {} }}",
      self.head, self.len, ALIGN
    )?;

    let mut current = self.head;

    unsafe {
      while !current.is_null() {
        writeln!(
          f,
          "  {:?}: {} payload bytes, {}",
          current,
          (*current).size,
          if (*current).is_free { "free" } else { "used" }
        )?;
        current = (*current).next;
      }
    }

    Ok(())
  }
}

/// Point-in-time accounting of an [`Arena`], as reported by
/// [`Arena::stats`]. `used_bytes + free_bytes` plus one
/// [`overhead`](Arena::overhead) per block always equals `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
  /// Managed bytes, headers included.
  pub capacity: usize,
  /// Payload bytes currently lent out.
  pub used_bytes: usize,
  /// Payload bytes available for allocation.
  pub free_bytes: usize,
  /// Blocks in the list, free and used.
  pub block_count: usize,
  /// Blocks currently free.
  pub free_block_count: usize,
  /// Payload size of the largest free block, i.e. the biggest request
  /// that can currently succeed.
  pub largest_free: usize,
}

#[cfg(test)]
mod tests {
  use std::alloc::{self, Layout};

  use rand::{Rng, SeedableRng, rngs::StdRng};

  use super::*;

  const OVERHEAD: usize = Arena::<16>::overhead();

  /// Backing memory for one test arena: aligned on creation, freed on
  /// drop.
  struct TestRegion {
    base: *mut u8,
    layout: Layout,
  }

  impl TestRegion {
    fn new(size: usize) -> Self {
      let layout = Layout::from_size_align(size, 16).unwrap();
      let base = unsafe { alloc::alloc(layout) };
      assert!(!base.is_null());

      Self { base, layout }
    }
  }

  impl Drop for TestRegion {
    fn drop(&mut self) {
      unsafe { alloc::dealloc(self.base, self.layout) };
    }
  }

  #[test]
  fn test_rejects_unusable_regions() {
    let region = TestRegion::new(1024);

    let err = unsafe { Arena::<16>::new(ptr::null_mut(), 1024) }.unwrap_err();
    assert_eq!(err, AllocError::InvalidArena);

    let err = unsafe { Arena::<16>::new(region.base.add(1), 1023) }.unwrap_err();
    assert_eq!(err, AllocError::InvalidArena);

    let err = unsafe { Arena::<16>::new(region.base, OVERHEAD + 8) }.unwrap_err();
    assert_eq!(err, AllocError::InvalidArena);

    // Alignment below the header's own alignment is unusable.
    let err = unsafe { Arena::<2>::new(region.base, 1024) }.unwrap_err();
    assert_eq!(err, AllocError::InvalidArena);
  }

  #[test]
  fn test_allocate_and_reuse() {
    let region = TestRegion::new(1024);
    let mut arena = unsafe { Arena::<16>::new(region.base, 1024) }.unwrap();

    let first = arena.allocate(mem::size_of::<u64>()).unwrap().as_ptr() as *mut u64;

    unsafe {
      *first = 3u64;

      assert_eq!(*first, 3);

      let count: usize = 6;

      let second = arena
        .allocate(count * mem::size_of::<u16>())
        .unwrap()
        .as_ptr() as *mut u16;

      for i in 0..count {
        *second.add(i) = (i + 1) as u16;
      }

      assert_eq!(*first, 3);

      for i in 0..count {
        assert_eq!((i + 1) as u16, *second.add(i));
      }

      arena.release(first as *mut u8).unwrap();

      // First-fit hands the freed block straight back out.
      let third = arena.allocate(mem::size_of::<u32>()).unwrap().as_ptr() as *mut u32;
      assert_eq!(first as *mut u32, third);

      arena.release(third as *mut u8).unwrap();
      arena.release(second as *mut u8).unwrap();
    }

    assert_eq!(arena.stats().block_count, 1);
    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_payloads_are_aligned() {
    let region = TestRegion::new(1024);
    let mut arena = unsafe { Arena::<16>::new(region.base, 1024) }.unwrap();

    for size in [1usize, 2, 7, 13, 100] {
      let payload = arena.allocate(size).unwrap().as_ptr();
      assert_eq!(payload as usize % 16, 0);
    }

    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_first_fit_reuses_and_splits_freed_block() {
    let region = TestRegion::new(1024);
    let mut arena = unsafe { Arena::<16>::new(region.base, 1024) }.unwrap();

    let p1 = arena.allocate(100).unwrap().as_ptr(); // 112-byte block
    let p2 = arena.allocate(200).unwrap().as_ptr();
    assert!(p2 > p1);

    unsafe { arena.release(p1) }.unwrap();

    // A 50-byte request rounds to 64 and goes back into the 112-byte
    // hole at p1, leaving a free remainder behind the split.
    let p3 = arena.allocate(50).unwrap().as_ptr();
    assert_eq!(p1, p3);

    let remainder = 112 - 64 - OVERHEAD;

    // The remainder sits right after p3's payload and is handed out next.
    let p4 = arena.allocate(remainder).unwrap().as_ptr();
    assert_eq!(p4 as usize, p3 as usize + 64 + OVERHEAD);

    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_small_remainder_is_granted_wholesale() {
    let region = TestRegion::new(1024);
    let mut arena = unsafe { Arena::<16>::new(region.base, 1024) }.unwrap();

    let p1 = arena.allocate(100).unwrap().as_ptr(); // 112-byte block
    let _guard = arena.allocate(64).unwrap();

    unsafe { arena.release(p1) }.unwrap();

    // 96 rounds to 96; the 16 spare bytes cannot hold a header plus a
    // payload, so the whole 112-byte block is granted.
    let p2 = arena.allocate(96).unwrap();
    assert_eq!(p1, p2.as_ptr());
    assert_eq!(arena.stats().used_bytes, 112 + 64);

    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_release_coalesces_neighbours_in_any_order() {
    let region = TestRegion::new(1024);
    let mut arena = unsafe { Arena::<16>::new(region.base, 1024) }.unwrap();

    let a = arena.allocate(48).unwrap().as_ptr();
    let b = arena.allocate(48).unwrap().as_ptr();
    let c = arena.allocate(48).unwrap().as_ptr();
    let guard = arena.allocate(48).unwrap().as_ptr();

    unsafe {
      arena.release(b).unwrap();
      arena.check_invariants().unwrap();

      arena.release(a).unwrap();
      arena.check_invariants().unwrap();

      arena.release(c).unwrap();
      arena.check_invariants().unwrap();
    }

    // A, B and C collapsed into one free block spanning their combined
    // range, reusable as a whole.
    assert_eq!(arena.stats().free_block_count, 2); // the hole + trailing space

    let combined = 3 * 48 + 2 * OVERHEAD;
    let reused = arena.allocate(combined).unwrap().as_ptr();
    assert_eq!(a, reused);

    unsafe {
      arena.release(reused).unwrap();
      arena.release(guard).unwrap();
    }

    let stats = arena.stats();
    assert_eq!(stats.block_count, 1);
    assert_eq!(stats.free_bytes, stats.capacity - OVERHEAD);
    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_exhaustion_is_recoverable() {
    let region = TestRegion::new(512);
    let mut arena = unsafe { Arena::<16>::new(region.base, 512) }.unwrap();

    let mut blocks = Vec::new();

    loop {
      match arena.allocate(48) {
        Ok(payload) => blocks.push(payload.as_ptr()),
        Err(err) => {
          assert_eq!(err, AllocError::OutOfMemory);
          break;
        }
      }
    }

    assert!(blocks.len() >= 2);
    arena.check_invariants().unwrap();

    // A failed allocation must not disturb anything.
    let before = arena.stats();
    assert_eq!(arena.allocate(48).unwrap_err(), AllocError::OutOfMemory);
    assert_eq!(arena.allocate(usize::MAX).unwrap_err(), AllocError::OutOfMemory);
    assert_eq!(before, arena.stats());
    arena.check_invariants().unwrap();

    // Freeing one 48-byte block admits a 48-byte request, nothing larger.
    let victim = blocks[1];
    unsafe { arena.release(victim) }.unwrap();

    assert_eq!(arena.allocate(64).unwrap_err(), AllocError::OutOfMemory);

    let reused = arena.allocate(48).unwrap();
    assert_eq!(victim, reused.as_ptr());

    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_zero_size_allocations_are_distinct_and_releasable() {
    let region = TestRegion::new(256);
    let mut arena = unsafe { Arena::<16>::new(region.base, 256) }.unwrap();

    let p1 = arena.allocate(0).unwrap().as_ptr();
    let p2 = arena.allocate(0).unwrap().as_ptr();
    assert_ne!(p1, p2);

    unsafe {
      arena.release(p1).unwrap();
      arena.release(p2).unwrap();
    }

    assert_eq!(arena.stats().block_count, 1);
    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_release_rejects_bad_pointers() {
    let region = TestRegion::new(256);
    let mut arena = unsafe { Arena::<16>::new(region.base, 256) }.unwrap();

    let payload = arena.allocate(32).unwrap().as_ptr();

    unsafe {
      // Pointer into a payload's interior.
      assert_eq!(
        arena.release(payload.add(8)).unwrap_err(),
        AllocError::InvalidFree
      );

      // Pointer this arena never produced.
      let mut foreign = 0u64;
      assert_eq!(
        arena.release(&mut foreign as *mut u64 as *mut u8).unwrap_err(),
        AllocError::InvalidFree
      );

      // Null is the usual free(NULL) no-op.
      arena.release(ptr::null_mut()).unwrap();

      arena.release(payload).unwrap();

      // Double free.
      assert_eq!(arena.release(payload).unwrap_err(), AllocError::InvalidFree);
    }

    arena.check_invariants().unwrap();
  }

  #[test]
  fn test_accounting_always_balances() {
    let region = TestRegion::new(2048);
    let mut arena = unsafe { Arena::<16>::new(region.base, 2048) }.unwrap();

    let balances = |stats: &ArenaStats| {
      stats.used_bytes + stats.free_bytes + stats.block_count * OVERHEAD == stats.capacity
    };

    let mut live = Vec::new();

    for size in [0usize, 8, 24, 100, 500] {
      live.push(arena.allocate(size).unwrap().as_ptr());
      assert!(balances(&arena.stats()));
    }

    for payload in live {
      unsafe { arena.release(payload) }.unwrap();
      assert!(balances(&arena.stats()));
      arena.check_invariants().unwrap();
    }
  }

  #[test]
  fn test_default_alignment() {
    let region = TestRegion::new(256);
    let mut arena: Arena = unsafe { Arena::new(region.base, 256) }.unwrap();

    let payload = arena.allocate(1).unwrap().as_ptr();
    assert_eq!(payload as usize % 16, 0);
  }

  #[test]
  fn test_random_workload_preserves_invariants() {
    let region = TestRegion::new(8192);
    let mut arena = unsafe { Arena::<16>::new(region.base, 8192) }.unwrap();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    // (payload, size, fill byte) for every live allocation.
    let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();

    for round in 0..4_000usize {
      if live.is_empty() || rng.gen_bool(0.55) {
        let size = rng.gen_range(0..300);

        match arena.allocate(size) {
          Ok(payload) => {
            let fill = (round % 251) as u8;
            unsafe { ptr::write_bytes(payload.as_ptr(), fill, size) };
            live.push((payload.as_ptr(), size, fill));
          }
          Err(err) => assert_eq!(err, AllocError::OutOfMemory),
        }
      } else {
        let idx = rng.gen_range(0..live.len());
        let (payload, size, fill) = live.swap_remove(idx);

        unsafe {
          for i in 0..size {
            assert_eq!(payload.add(i).read(), fill, "payload was clobbered");
          }
          arena.release(payload).unwrap();
        }
      }

      if round % 64 == 0 {
        arena.check_invariants().unwrap();
      }
    }

    for (payload, size, fill) in live.drain(..) {
      unsafe {
        for i in 0..size {
          assert_eq!(payload.add(i).read(), fill);
        }
        arena.release(payload).unwrap();
      }
    }

    assert_eq!(arena.stats().block_count, 1);
    arena.check_invariants().unwrap();
  }
}
