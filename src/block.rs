/// Metadata embedded at the start of every block in the arena, free or
/// used. The payload follows the header, after padding it out to the
/// arena's alignment boundary.
#[repr(C)]
pub struct BlockHeader {
  /// Usable payload bytes, excluding the header itself.
  pub size: usize,
  pub is_free: bool,
  /// Next block in ascending address order; null for the last block.
  pub next: *mut BlockHeader,
}

impl BlockHeader {
  pub fn new(
    size: usize,
    is_free: bool,
    next: *mut BlockHeader,
  ) -> Self {
    Self { size, is_free, next }
  }
}
