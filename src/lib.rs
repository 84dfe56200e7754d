//! # fitalloc - A First-Fit Free-List Allocator
//!
//! This crate manages one fixed region of memory mapped from the operating
//! system and serves `allocate`/`free` requests from it with **first-fit**
//! placement, **block splitting** and **boundary coalescing**. After the
//! initial `mmap` it never asks the system for memory again.
//!
//! ## Overview
//!
//! The arena is tiled by blocks. Every block, free or allocated, starts with
//! a header; free blocks are additionally threaded onto an address-ordered,
//! doubly-linked free list:
//!
//! ```text
//!   Arena:
//!
//!   base                                                           base + heap_size
//!   ┌────────────┬──────────────────┬──────────┬──────────────────────────────┐
//!   │ A (alloc)  │   F1 (free)      │ B (alloc)│          F2 (free)           │
//!   └────────────┴──────────────────┴──────────┴──────────────────────────────┘
//!                      ▲                                  ▲
//!        head ─────────┘ ──────────── next ──────────────►┘
//!                        ◄─────────── prev ───────────────
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align        - Alignment macro (align!) and the 8-byte / page units
//!   ├── arena        - The mmap'd region and its bounds-checked header view
//!   ├── block        - Block header layout and free-list links
//!   ├── free_list    - Address-ordered doubly-linked list of free blocks
//!   ├── allocator    - FirstFitAllocator: init, first-fit search, splitting
//!   ├── coalesce     - Deallocation and merging with free neighbors
//!   ├── diagnostics  - Per-call outcome, heap walk, stats, invariant check
//!   ├── error        - Error types
//!   └── trace        - Trace file reader and replay driver
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::FirstFitAllocator;
//!
//! let mut heap = FirstFitAllocator::init(4096).unwrap();
//!
//! let (ptr, diagnostics) = heap.allocate(100);
//! assert!(diagnostics.success);
//! assert_eq!(diagnostics.payload_offset, Some(24));
//! assert_eq!(diagnostics.hops, Some(0));
//!
//! unsafe {
//!     let ptr = ptr.unwrap();
//!     ptr.cast::<u64>().write(42);
//!     heap.deallocate(Some(ptr)).unwrap();
//! }
//!
//! assert!(heap.check().is_ok());
//! ```
//!
//! ## How It Works
//!
//! Each block carries a 24-byte header. Links hold offsets from the arena
//! base, not addresses:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ allocated: 0/1  │  │  │                          │  │
//!   │  │ prev: offset    │  │  │  N - 24 bytes usable     │  │
//!   │  │ next: offset    │  │  │                          │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │      24 bytes         │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! Allocating walks the free list from the head and takes the first block
//! whose size covers `align!(24 + payload)`. If what is left over can hold a
//! header, it becomes a new free block in the same list slot:
//!
//! ```text
//!   Split:
//!   ┌──────────────────────────────────────┐
//!   │              free (size S)           │
//!   └──────────────────────────────────────┘
//!                      │
//!                      ▼
//!   ┌──────────────┬───────────────────────┐
//!   │ alloc (need) │   free (S - need)     │
//!   └──────────────┴───────────────────────┘
//! ```
//!
//! Freeing finds the nearest free blocks below and above the block and
//! merges with whichever of them touch it, so two free blocks are never
//! adjacent.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `&mut self` on every operation, no locking
//! - **Fixed size**: the arena never grows
//! - **Linear search**: allocation and free are O(free blocks)
//! - **Unix-only**: Requires `libc` and `mmap` (POSIX systems)
//!
//! ## Safety
//!
//! Payload pointers are raw memory. [`FirstFitAllocator::deallocate`] is
//! `unsafe` because the pointer it receives is turned back into a block
//! header; it must come from this allocator.

pub mod align;
mod allocator;
mod arena;
mod block;
mod coalesce;
mod diagnostics;
pub mod error;
mod free_list;
pub mod trace;

pub use align::{ALIGNMENT, PAGE_SIZE};
pub use allocator::FirstFitAllocator;
pub use block::HEADER_SIZE;
pub use diagnostics::{BlockInfo, Blocks, Diagnostics, HeapStats};
pub use error::{Corruption, FreeError, InitError, TraceError};
