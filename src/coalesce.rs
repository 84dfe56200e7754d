use std::ptr::NonNull;

use crate::{allocator::FirstFitAllocator, error::FreeError};

impl FirstFitAllocator {
  /// Returns a block to the free list, merging it with free neighbors.
  ///
  /// `None` is a no-op. A block that is already free, or a pointer that
  /// cannot belong to this arena, is logged and reported without touching
  /// the heap.
  ///
  /// # Safety
  ///
  /// `ptr` must be `None` or a pointer returned by [`allocate`](Self::allocate)
  /// on this allocator. Freed pointers may be passed again (that is reported
  /// as a double free) as long as the block has not been handed out anew.
  pub unsafe fn deallocate(
    &mut self,
    ptr: Option<NonNull<u8>>,
  ) -> Result<(), FreeError> {
    let Some(ptr) = ptr else {
      return Ok(());
    };

    let block = unsafe { self.block_of(ptr) }.inspect_err(|err| tracing::warn!(%err, "ignoring free"))?;

    let header = self.arena.header(block);
    if !header.is_allocated() {
      let err = FreeError::DoubleFree { offset: block };
      tracing::warn!(%err, "ignoring free");
      return Err(err);
    }

    self.arena.update(block, |h| h.allocated = 0);

    if self.free_list.is_empty() {
      self.free_list.make_sole(&mut self.arena, block);
      tracing::debug!(block, "freed into empty list");
      return Ok(());
    }

    let size = header.size();
    let (left, right) = self.free_list.neighbors(&self.arena, block);
    let touching_left = left.filter(|&l| l + self.arena.header(l).size() == block);
    let touching_right = right.filter(|&r| block + size == r);

    match (touching_left, touching_right) {
      (None, None) => {
        self.free_list.insert_between(&mut self.arena, left, block, right);
        tracing::debug!(block, size, "freed without merge");
      }
      (None, Some(right)) => {
        let right_size = self.arena.header(right).size();
        self.arena.update(block, |h| h.size += right_size as u32);
        self.free_list.replace(&mut self.arena, right, block);
        tracing::debug!(block, right, "merged with right neighbor");
      }
      (Some(left), None) => {
        self.arena.update(left, |h| h.size += size as u32);
        tracing::debug!(block, left, "merged into left neighbor");
      }
      (Some(left), Some(right)) => {
        let right_size = self.arena.header(right).size();
        self.free_list.unlink(&mut self.arena, right);
        self.arena.update(left, |h| h.size += (size + right_size) as u32);
        tracing::debug!(block, left, right, "merged with both neighbors");
      }
    }

    debug_assert!(self.free_list.is_address_ordered(&self.arena));
    Ok(())
  }
}
