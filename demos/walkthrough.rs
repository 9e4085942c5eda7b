use std::{io::Read, ptr};

use arenalloc::{Arena, MmapRegion};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the process with tools like `pmap`,
/// `htop`, `gdb`, or just follow the arena state step by step.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  env_logger::init();

  // Page-aligned backing memory; the arena itself never talks to the OS.
  let region = MmapRegion::new(4096).expect("mmap failed");
  let mut arena =
    unsafe { Arena::<16>::new(region.as_mut_ptr(), region.len()) }.expect("region unusable");

  println!("[0] Fresh arena, one spanning free block:\n{:?}", arena);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32 and prove the memory is usable.
  // --------------------------------------------------------------------
  let first_block = arena.allocate(4).expect("out of memory").as_ptr();
  println!("\n[1] Allocate 4 bytes -> {:?}", first_block);

  let first_ptr = first_block as *mut u32;
  unsafe {
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes and fill them with a byte pattern.
  // --------------------------------------------------------------------
  let second_block = arena.allocate(12).expect("out of memory").as_ptr();
  println!("\n[2] Allocate 12 bytes -> {:?}", second_block);

  unsafe {
    ptr::write_bytes(second_block, 0xAB, 12);
  }
  println!("[2] Initialized second block with 0xAB");
  println!("{:?}", arena);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the first block; its slot becomes a hole in the list.
  // --------------------------------------------------------------------
  unsafe { arena.release(first_block) }.expect("release failed");
  println!("\n[3] Released first_block at {:?}", first_block);
  println!("{:?}", arena);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Allocate a small block and watch first-fit reuse the hole.
  // --------------------------------------------------------------------
  let third_block = arena.allocate(2).expect("out of memory").as_ptr();
  println!(
    "\n[4] Allocate 2 bytes -> {:?} ({})",
    third_block,
    if third_block == first_block {
      "reused the freed block"
    } else {
      "allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Exhaust the arena, then recover by releasing one block.
  // --------------------------------------------------------------------
  let mut hogs = Vec::new();
  while let Ok(payload) = arena.allocate(256) {
    hogs.push(payload.as_ptr());
  }
  println!("\n[5] Arena exhausted after {} extra 256-byte blocks", hogs.len());
  println!("[5] stats: {:?}", arena.stats());

  let victim = hogs.pop().expect("arena too small for the demo");
  unsafe { arena.release(victim) }.expect("release failed");

  let recovered = arena.allocate(256).expect("out of memory").as_ptr();
  println!("[5] Released one block and allocated again -> {:?}", recovered);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Tear everything down; coalescing leaves one spanning free block.
  // --------------------------------------------------------------------
  unsafe {
    arena.release(recovered).expect("release failed");
    for hog in hogs {
      arena.release(hog).expect("release failed");
    }
    arena.release(second_block).expect("release failed");
    arena.release(third_block).expect("release failed");
  }

  arena.check_invariants().expect("invariants violated");
  println!("\n[6] Everything released:\n{:?}", arena);
  println!("[6] End of example. The region is unmapped when it drops.");
}
