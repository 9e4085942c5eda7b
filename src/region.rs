use std::{io, ptr};

use libc::{
  _SC_PAGESIZE, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap, munmap,
  sysconf,
};
use log::debug;

/// Page size reported by the OS.
pub fn page_size() -> usize {
  unsafe { sysconf(_SC_PAGESIZE) as usize }
}

/// An anonymous, private, read-write mapping that owns its pages and
/// unmaps them on drop.
///
/// Handy as the backing region of an [`Arena`]: pages are page-aligned,
/// which satisfies any reasonable arena alignment, and the arena itself
/// never talks to the OS.
///
/// [`Arena`]: crate::Arena
pub struct MmapRegion {
  base: *mut u8,
  len: usize,
}

impl MmapRegion {
  /// Maps at least `min_len` bytes, rounded up to whole pages.
  pub fn new(min_len: usize) -> io::Result<Self> {
    let page = page_size();
    let len = (min_len.max(1) + page - 1) / page * page;

    let base = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if base == MAP_FAILED {
      return Err(io::Error::last_os_error());
    }

    debug!("mapped {} bytes at {:?}", len, base);

    Ok(Self {
      base: base as *mut u8,
      len,
    })
  }

  pub fn as_mut_ptr(&self) -> *mut u8 {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

impl Drop for MmapRegion {
  fn drop(&mut self) {
    debug!("unmapping {} bytes at {:?}", self.len, self.base);

    unsafe {
      munmap(self.base as *mut _, self.len);
    }
  }
}
