use std::{error, fmt};

/// Errors reported by arena operations.
///
/// A failing operation never mutates the arena, so every error here is
/// recoverable from the caller's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The arena parameters are unusable: a null or misaligned base
  /// pointer, an alignment that is not a power of two (or is smaller than
  /// the header's own alignment), or a region too small to hold one
  /// header plus one aligned payload.
  InvalidArena,
  /// No free block is large enough for the request. Release something and
  /// retry, or propagate the failure upward.
  OutOfMemory,
  /// The released pointer does not name a currently-used block of this
  /// arena: a double free, a foreign pointer, or a pointer into a
  /// payload's interior.
  InvalidFree,
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::InvalidArena => write!(f, "arena base pointer or size is unusable"),
      Self::OutOfMemory => write!(f, "no free block large enough"),
      Self::InvalidFree => write!(f, "pointer does not name a currently-used block"),
    }
  }
}

impl error::Error for AllocError {}

/// A broken free-list invariant, as diagnosed by
/// [`Arena::check_invariants`](crate::Arena::check_invariants).
///
/// Addresses are carried as plain integers so a violation can be printed
/// long after the arena is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
  /// A header is not where its predecessor's size says it should be; the
  /// chain no longer tiles the arena.
  BrokenChain { expected: usize, found: usize },
  /// Two neighbouring blocks are both free: a merge was missed.
  AdjacentFreeBlocks { at: usize },
  /// A block's payload size is zero or not a multiple of the alignment.
  BadBlockSize { at: usize, size: usize },
  /// Headers plus payloads do not add up to the arena's managed capacity.
  CapacityMismatch { accounted: usize, capacity: usize },
}

impl fmt::Display for InvariantViolation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::BrokenChain { expected, found } => write!(
        f,
        "block chain broken: expected a header at {expected:#x}, found {found:#x}"
      ),
      Self::AdjacentFreeBlocks { at } => {
        write!(f, "two adjacent free blocks at {at:#x}: a merge was missed")
      }
      Self::BadBlockSize { at, size } => {
        write!(f, "block at {at:#x} has unusable payload size {size}")
      }
      Self::CapacityMismatch { accounted, capacity } => {
        write!(f, "blocks account for {accounted} of {capacity} managed bytes")
      }
    }
  }
}

impl error::Error for InvariantViolation {}
