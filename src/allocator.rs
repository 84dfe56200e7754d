use std::ptr::NonNull;

use crate::{
  align,
  align::ALIGNMENT,
  arena::Arena,
  block::{HEADER_SIZE, Header, Offset},
  diagnostics::Diagnostics,
  error::{FreeError, InitError},
  free_list::FreeList,
};

/// First-fit allocator over one fixed arena.
///
/// Owns the arena and the free-list head. Every operation takes `&mut self`,
/// so the whole heap is a single exclusive-access domain.
pub struct FirstFitAllocator {
  pub(crate) arena: Arena,
  pub(crate) free_list: FreeList,
}

impl FirstFitAllocator {
  /// Maps a heap of `region_size` bytes (rounded up to a page multiple) and
  /// makes it one free block.
  pub fn init(region_size: usize) -> Result<Self, InitError> {
    let mut arena = Arena::map(region_size)?;
    arena.write_header(0, Header::free(arena.len(), None, None));

    Ok(Self {
      arena,
      free_list: FreeList::new(Some(0)),
    })
  }

  /// Carves `payload_size` bytes out of the first free block that fits.
  ///
  /// Returns the payload pointer, or `None` when no block is large enough or
  /// the request cannot be represented. The heap is untouched on failure.
  pub fn allocate(
    &mut self,
    payload_size: usize,
  ) -> (Option<NonNull<u8>>, Diagnostics) {
    let Some(alloc_size) = footprint(payload_size) else {
      tracing::debug!(payload_size, "request too large to describe");
      return (None, Diagnostics::failed());
    };

    let Some((block, hops)) = self.find_fit(alloc_size) else {
      tracing::debug!(payload_size, alloc_size, "no free block fits");
      return (None, Diagnostics::failed());
    };

    self.place(block, alloc_size);
    debug_assert!(self.free_list.is_address_ordered(&self.arena));

    let payload = block + HEADER_SIZE;
    (Some(self.arena.ptr_at(payload)), Diagnostics::placed(payload, hops))
  }

  /// Allocates `count * elem_size` bytes and zero-fills them.
  ///
  /// Recycled blocks keep whatever their previous owner wrote, so the payload
  /// is cleared explicitly.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    elem_size: usize,
  ) -> (Option<NonNull<u8>>, Diagnostics) {
    let Some(payload_size) = count.checked_mul(elem_size) else {
      return (None, Diagnostics::failed());
    };

    let (ptr, diagnostics) = self.allocate(payload_size);
    if let Some(offset) = diagnostics.payload_offset {
      self.arena.zero(offset, payload_size);
    }

    (ptr, diagnostics)
  }

  /// First block in list order with room for `alloc_size` bytes, and the
  /// number of blocks rejected before it.
  fn find_fit(
    &self,
    alloc_size: usize,
  ) -> Option<(Offset, usize)> {
    self
      .free_list
      .iter(&self.arena)
      .enumerate()
      .find(|&(hops, block)| {
        let size = self.arena.header(block).size();
        tracing::trace!(hops, block, size, alloc_size, "first-fit candidate");
        size >= alloc_size
      })
      .map(|(hops, block)| (block, hops))
  }

  /// Marks `block` allocated with a footprint of `alloc_size`.
  ///
  /// A remainder that can hold a header becomes a new free block in the same
  /// list slot; anything smaller stays inside the allocation.
  fn place(
    &mut self,
    block: Offset,
    alloc_size: usize,
  ) {
    let remainder = self.arena.header(block).size() - alloc_size;

    if remainder >= HEADER_SIZE {
      let rest = block + alloc_size;
      self.arena.write_header(rest, Header::free(remainder, None, None));
      self.free_list.replace(&mut self.arena, block, rest);
      self.arena.update(block, |h| {
        h.size = alloc_size as u32;
        h.allocated = 1;
      });
      tracing::debug!(block, alloc_size, rest, remainder, "split free block");
    } else {
      self.free_list.unlink(&mut self.arena, block);
      self.arena.update(block, |h| h.allocated = 1);
      tracing::debug!(block, slack = remainder, "took whole free block");
    }
  }

  /// Recovers the header offset of a payload pointer.
  ///
  /// This is the only place a caller's pointer is turned back into a block.
  /// Pointers outside the arena, misaligned, or fronting an impossible header
  /// are rejected.
  ///
  /// # Safety
  ///
  /// `payload` must have come from a successful [`allocate`](Self::allocate)
  /// on this allocator. A pointer into the middle of a block passes the
  /// checks above and would be misread as a header.
  pub(crate) unsafe fn block_of(
    &self,
    payload: NonNull<u8>,
  ) -> Result<Offset, FreeError> {
    let foreign = || FreeError::ForeignPointer {
      addr: payload.addr().get(),
    };

    let offset = self.arena.offset_of(payload).ok_or_else(foreign)?;
    if offset < HEADER_SIZE || offset % ALIGNMENT != 0 {
      return Err(foreign());
    }

    let block = offset - HEADER_SIZE;
    let size = self.arena.header(block).size();
    if size < HEADER_SIZE || size % ALIGNMENT != 0 || block + size > self.arena.len() {
      return Err(foreign());
    }

    Ok(block)
  }

  /// Start of the arena.
  pub fn base(&self) -> NonNull<u8> {
    self.arena.base()
  }

  /// Arena length after page rounding.
  pub fn heap_size(&self) -> usize {
    self.arena.len()
  }

  /// Offset of `ptr` from the arena base, if it points into the arena.
  pub fn payload_offset(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<usize> {
    self.arena.offset_of(ptr)
  }

  pub fn free_list_len(&self) -> usize {
    self.free_list.len(&self.arena)
  }
}

/// Total block size for a payload: header plus payload, rounded up to
/// [`ALIGNMENT`]. `None` if it would not fit a header's size field.
fn footprint(payload_size: usize) -> Option<usize> {
  Some(payload_size)
    .filter(|&size| size <= u32::MAX as usize)
    .map(|size| align!(size + HEADER_SIZE))
    .filter(|&size| size <= u32::MAX as usize)
}
