//! # arenalloc - A Fixed-Arena Memory Allocator Library
//!
//! This crate provides a **first-fit free-list allocator** that manages a
//! single caller-supplied region of raw memory ("the arena") and services
//! allocation/release requests from it, `malloc`/`free` style, without
//! asking the host allocator or the OS for anything.
//!
//! ## Overview
//!
//! ```text
//!   Arena Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        ARENA (fixed size)                            │
//!   │                                                                      │
//!   │   ┌────┬─────────┬────┬──────┬────┬───────────────────────────────┐  │
//!   │   │ H1 │  used   │ H2 │ free │ H3 │            used               │  │
//!   │   └────┴─────────┴────┴──────┴────┴───────────────────────────────┘  │
//!   │   ▲                                                                  │
//!   │   │                                                                  │
//!   │   head of an address-ordered, singly linked list of block headers    │
//!   │   that always tiles the whole arena                                  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation walks the list and takes the first free block that fits,
//!   splitting off the tail when the leftover is worth keeping.
//!   Release marks the block free and merges it with free neighbours.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   arenalloc
//!   ├── align      - Alignment macro (align_up!)
//!   ├── block      - Block header structure (internal)
//!   ├── arena      - Arena allocator implementation
//!   ├── error      - Error and invariant-violation types
//!   └── region     - mmap-backed memory source (Unix only)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use arenalloc::{Arena, MmapRegion};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Obtain backing memory; any exclusively-owned byte range works.
//!     let region = MmapRegion::new(4096)?;
//!
//!     let mut arena = unsafe { Arena::<16>::new(region.as_mut_ptr(), region.len())? };
//!
//!     // Allocate memory for a u64
//!     let ptr = arena.allocate(std::mem::size_of::<u64>())?.as_ptr() as *mut u64;
//!
//!     unsafe {
//!         // Use the memory
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         // Free the memory
//!         arena.release(ptr as *mut u8)?;
//!     }
//!
//!     arena.check_invariants()?;
//!     Ok(())
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block, free or used, starts with an embedded header:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │           Payload              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ is_free: false  │  │  │                          │  │
//!   │  │ next: null/ptr  │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │   padded to ALIGN     │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to the caller
//! ```
//!
//! Initialization writes one giant free block spanning the whole arena.
//! When an allocation would waste most of a free block, the block is
//! split in place:
//!
//! ```text
//!   Before:  ┌────┬────────────────── free ──────────────────┐
//!   After:   ┌────┬── used ──┬────┬───────── free ───────────┐
//!                            ▲
//!                            new header written at the split point
//! ```
//!
//! Releasing a block merges it with a free successor and/or predecessor,
//! so free space never stays fragmented into adjacent slivers:
//!
//! ```text
//!   Before:  ┌────┬─ free ─┬────┬─ used ─┬────┬─ free ─┐
//!   Release the middle block:
//!   After:   ┌────┬───────────── free ────────────────┐
//! ```
//!
//! ## Features
//!
//! - **Caller-supplied memory**: a static buffer, an `mmap`-ed region
//!   ([`MmapRegion`] is provided on Unix), or any byte range the caller
//!   exclusively owns
//! - **First-fit, address-ordered**: deterministic placement, easy to test
//! - **Splitting and coalescing**: oversized blocks are split, freed
//!   neighbours are merged eagerly
//! - **Hardened release**: double frees and foreign pointers are reported
//!   as errors instead of corrupting the list
//! - **Self-checking**: `check_invariants()` audits the whole block list
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal locking; wrap the arena in a
//!   mutex to share it across threads
//! - **Fixed capacity**: the arena never grows; exhaustion is reported as
//!   a recoverable `OutOfMemory` error
//! - **Linear scans**: allocation and release are O(number of blocks)
//!
//! ## Safety
//!
//! Binding an arena to raw memory and releasing payloads are `unsafe`:
//! the caller vouches for exclusive ownership of the region and promises
//! not to touch a payload after releasing it. Everything else, including
//! allocation itself, is safe.

pub mod align;
mod arena;
mod block;
mod error;
#[cfg(unix)]
mod region;

pub use arena::{Arena, ArenaStats};
pub use error::{AllocError, InvariantViolation};
#[cfg(unix)]
pub use region::{MmapRegion, page_size};
