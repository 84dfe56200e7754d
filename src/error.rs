//! Error types for arena setup, deallocation, heap verification and trace replay.
//!
//! Allocation failure has no error type: it is reported as a `None` pointer
//! with an unsuccessful [`Diagnostics`](crate::Diagnostics) record.

use std::io;

use thiserror::Error;

use crate::block::Offset;

/// Errors from [`FirstFitAllocator::init`](crate::FirstFitAllocator::init).
#[derive(Debug, Error)]
pub enum InitError {
  /// The region could not be mapped.
  #[error("requested heap of {requested} bytes exceeds available memory")]
  OutOfMemory {
    requested: usize,
    #[source]
    source: io::Error,
  },
}

/// Recoverable errors from [`FirstFitAllocator::deallocate`](crate::FirstFitAllocator::deallocate).
///
/// Neither variant changes the heap.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FreeError {
  /// The block behind the pointer is already free.
  #[error("block at offset {offset} has already been freed")]
  DoubleFree { offset: Offset },

  /// The pointer cannot be the payload of a block in this arena.
  #[error("pointer {addr:#x} was not returned by this allocator")]
  ForeignPointer { addr: usize },
}

/// A broken heap invariant found by [`FirstFitAllocator::check`](crate::FirstFitAllocator::check).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Corruption {
  #[error("block at offset {offset} has invalid size {size}")]
  BadSize { offset: Offset, size: usize },

  #[error("blocks cover {covered} bytes of a {heap_size}-byte heap")]
  Conservation { covered: usize, heap_size: usize },

  #[error("free blocks at offsets {left} and {right} are adjacent")]
  AdjacentFree { left: Offset, right: Offset },

  #[error("free list is not in address order at offset {offset}")]
  Unordered { offset: Offset },

  #[error("free list back-link of block at offset {offset} is broken")]
  BrokenLink { offset: Offset },

  #[error("allocated block at offset {offset} is on the free list")]
  AllocatedOnList { offset: Offset },

  #[error("free block at offset {offset} is missing from the free list")]
  FreeNotListed { offset: Offset },
}

/// Errors from reading or replaying a trace file.
#[derive(Debug, Error)]
pub enum TraceError {
  #[error("failed to read trace: {0}")]
  Io(#[from] io::Error),

  #[error("trace header is incomplete or malformed")]
  Header,

  #[error("line {line}: {reason}")]
  Parse { line: usize, reason: String },

  #[error("line {line}: id {id} is out of range for {num_ids} ids")]
  IdOutOfRange { line: usize, id: usize, num_ids: usize },

  #[error("trace declares {declared} operations but contains {found}")]
  OpCount { declared: usize, found: usize },

  #[error("line {line}: realloc requests are not supported")]
  UnsupportedRealloc { line: usize },

  #[error(transparent)]
  Init(#[from] InitError),
}

/// Result type for trace operations.
pub type Result<T> = std::result::Result<T, TraceError>;
