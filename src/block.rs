use std::mem;

use crate::align::ALIGNMENT;

/// Byte offset of a block from the arena base.
pub type Offset = usize;

/// A free-list link stored inside a header.
///
/// Links are arena offsets rather than addresses, so a header never holds a
/// pointer into the mapping. `Link::NONE` terminates the list.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Link(u64);

impl Link {
  pub const NONE: Link = Link(u64::MAX);

  pub fn get(self) -> Option<Offset> {
    if self == Link::NONE { None } else { Some(self.0 as Offset) }
  }
}

impl From<Option<Offset>> for Link {
  fn from(offset: Option<Offset>) -> Self {
    match offset {
      Some(offset) => Link(offset as u64),
      None => Link::NONE,
    }
  }
}

/// The boundary tag written at the start of every block.
///
/// `prev`/`next` are only meaningful while the block is on the free list.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Header {
  pub size: u32,
  pub allocated: u32,
  pub prev: Link,
  pub next: Link,
}

pub const HEADER_SIZE: usize = mem::size_of::<Header>();

const _: () = assert!(HEADER_SIZE == 24);
const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(mem::align_of::<Header>() <= ALIGNMENT);

impl Header {
  pub fn free(
    size: usize,
    prev: Option<Offset>,
    next: Option<Offset>,
  ) -> Self {
    Self {
      size: size as u32,
      allocated: 0,
      prev: prev.into(),
      next: next.into(),
    }
  }

  pub fn size(&self) -> usize {
    self.size as usize
  }

  pub fn is_allocated(&self) -> bool {
    self.allocated != 0
  }

  pub fn prev(&self) -> Option<Offset> {
    self.prev.get()
  }

  pub fn next(&self) -> Option<Offset> {
    self.next.get()
  }
}
