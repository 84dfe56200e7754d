use std::fmt;

use crate::{
  align::ALIGNMENT,
  allocator::FirstFitAllocator,
  arena::Arena,
  block::{HEADER_SIZE, Offset},
  error::Corruption,
};

/// Outcome of one `allocate` call.
///
/// Displays as the trace output line `success\tpayload_offset\thops`, with
/// `-1` standing in for the fields a failed call does not have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diagnostics {
  pub success: bool,
  /// Payload start relative to the arena base.
  pub payload_offset: Option<usize>,
  /// Free blocks rejected before the chosen one.
  pub hops: Option<usize>,
}

impl Diagnostics {
  pub fn failed() -> Self {
    Self {
      success: false,
      payload_offset: None,
      hops: None,
    }
  }

  pub(crate) fn placed(
    payload_offset: usize,
    hops: usize,
  ) -> Self {
    Self {
      success: true,
      payload_offset: Some(payload_offset),
      hops: Some(hops),
    }
  }
}

impl fmt::Display for Diagnostics {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let signed = |value: Option<usize>| value.map_or(-1, |v| v as i64);

    write!(
      f,
      "{}\t{}\t{}",
      u8::from(self.success),
      signed(self.payload_offset),
      signed(self.hops)
    )
  }
}

/// One block as found by walking the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub offset: Offset,
  pub size: usize,
  pub allocated: bool,
}

/// Physical walk from the arena base, block by block.
///
/// Stops after a block whose size would not advance the walk.
pub struct Blocks<'a> {
  arena: &'a Arena,
  cursor: Offset,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor + HEADER_SIZE > self.arena.len() {
      return None;
    }

    let header = self.arena.header(self.cursor);
    let info = BlockInfo {
      offset: self.cursor,
      size: header.size(),
      allocated: header.is_allocated(),
    };

    self.cursor = if info.size < HEADER_SIZE || info.size % ALIGNMENT != 0 {
      self.arena.len()
    } else {
      self.cursor.saturating_add(info.size)
    };

    Some(info)
  }
}

/// Totals over the whole heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub free_bytes: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub allocated_blocks: usize,
  pub largest_free: usize,
}

impl FirstFitAllocator {
  /// Every block in address order, free or allocated.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      arena: &self.arena,
      cursor: 0,
    }
  }

  /// Free blocks in free-list order.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.free_list.iter(&self.arena).map(|offset| {
      let header = self.arena.header(offset);
      BlockInfo {
        offset,
        size: header.size(),
        allocated: header.is_allocated(),
      }
    })
  }

  pub fn stats(&self) -> HeapStats {
    self.blocks().fold(
      HeapStats {
        heap_size: self.heap_size(),
        ..HeapStats::default()
      },
      |mut stats, block| {
        if block.allocated {
          stats.allocated_bytes += block.size;
          stats.allocated_blocks += 1;
        } else {
          stats.free_bytes += block.size;
          stats.free_blocks += 1;
          stats.largest_free = stats.largest_free.max(block.size);
        }
        stats
      },
    )
  }

  /// Verifies the heap invariants.
  ///
  /// - block sizes are aligned, at least a header, and tile the arena exactly
  /// - no two free blocks are adjacent
  /// - the free list holds exactly the free blocks, in address order, with
  ///   consistent back-links
  pub fn check(&self) -> Result<(), Corruption> {
    let heap_size = self.heap_size();
    let mut covered = 0;
    let mut previous: Option<BlockInfo> = None;
    let mut free = Vec::new();

    for block in self.blocks() {
      if block.size < HEADER_SIZE || block.size % ALIGNMENT != 0 || block.offset + block.size > heap_size {
        return Err(Corruption::BadSize {
          offset: block.offset,
          size: block.size,
        });
      }

      if let Some(left) = previous.filter(|p| !p.allocated && !block.allocated) {
        return Err(Corruption::AdjacentFree {
          left: left.offset,
          right: block.offset,
        });
      }

      if !block.allocated {
        free.push(block.offset);
      }
      covered += block.size;
      previous = Some(block);
    }

    if covered != heap_size {
      return Err(Corruption::Conservation { covered, heap_size });
    }

    let mut listed = Vec::new();
    let mut prev: Option<Offset> = None;
    let mut cursor = self.free_list.head();

    while let Some(node) = cursor {
      if prev.is_some_and(|p| p >= node) {
        return Err(Corruption::Unordered { offset: node });
      }
      if free.binary_search(&node).is_err() {
        return Err(if self.is_block_start(node) {
          Corruption::AllocatedOnList { offset: node }
        } else {
          Corruption::BrokenLink { offset: node }
        });
      }

      let header = self.arena.header(node);
      if header.prev() != prev {
        return Err(Corruption::BrokenLink { offset: node });
      }

      listed.push(node);
      prev = Some(node);
      cursor = header.next();
    }

    match free.iter().find(|offset| listed.binary_search(offset).is_err()) {
      Some(&offset) => Err(Corruption::FreeNotListed { offset }),
      None => Ok(()),
    }
  }

  fn is_block_start(
    &self,
    offset: Offset,
  ) -> bool {
    self.blocks().any(|block| block.offset == offset)
  }
}
