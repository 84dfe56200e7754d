use crate::{
  arena::Arena,
  block::{Header, Offset},
};

/// Explicit doubly-linked list of free blocks, threaded through their headers.
///
/// The list only stores its head; every other link lives inside the arena.
/// Blocks are kept in increasing address order: splitting puts the remainder
/// at the position of the block it came from, and coalescing inserts at the
/// position found by [`FreeList::neighbors`]. [`FreeList::is_address_ordered`]
/// checks it.
#[derive(Debug, Default)]
pub struct FreeList {
  head: Option<Offset>,
}

impl FreeList {
  pub fn new(head: Option<Offset>) -> Self {
    Self { head }
  }

  pub fn head(&self) -> Option<Offset> {
    self.head
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// Walks the list in list order.
  pub fn iter<'a>(
    &self,
    arena: &'a Arena,
  ) -> Iter<'a> {
    Iter {
      arena,
      cursor: self.head,
    }
  }

  pub fn len(
    &self,
    arena: &Arena,
  ) -> usize {
    self.iter(arena).count()
  }

  /// Makes `node` the only entry.
  pub fn make_sole(
    &mut self,
    arena: &mut Arena,
    node: Offset,
  ) {
    arena.update(node, |h| {
      h.prev = None.into();
      h.next = None.into();
    });
    self.head = Some(node);
  }

  /// Puts `new` where `old` was, taking over its links. `old` leaves the list.
  pub fn replace(
    &mut self,
    arena: &mut Arena,
    old: Offset,
    new: Offset,
  ) {
    let Header { prev, next, .. } = arena.header(old);

    arena.update(new, |h| {
      h.prev = prev;
      h.next = next;
    });
    self.set_next_of(arena, prev.get(), Some(new));
    if let Some(next) = next.get() {
      arena.update(next, |h| h.prev = Some(new).into());
    }
  }

  /// Links `node`'s neighbors around it.
  pub fn unlink(
    &mut self,
    arena: &mut Arena,
    node: Offset,
  ) {
    let header = arena.header(node);

    self.set_next_of(arena, header.prev(), header.next());
    if let Some(next) = header.next() {
      arena.update(next, |h| h.prev = header.prev);
    }
  }

  /// Splices `node` between two adjacent list entries.
  pub fn insert_between(
    &mut self,
    arena: &mut Arena,
    left: Option<Offset>,
    node: Offset,
    right: Option<Offset>,
  ) {
    debug_assert_eq!(left.map_or(self.head, |l| arena.header(l).next()), right);

    arena.update(node, |h| {
      h.prev = left.into();
      h.next = right.into();
    });
    self.set_next_of(arena, left, Some(node));
    if let Some(right) = right {
      arena.update(right, |h| h.prev = Some(node).into());
    }
  }

  /// Nearest free blocks below and above `offset`.
  ///
  /// Walks from the head while the cursor sits below `offset`; relies on the
  /// list being address ordered.
  pub fn neighbors(
    &self,
    arena: &Arena,
    offset: Offset,
  ) -> (Option<Offset>, Option<Offset>) {
    let mut left = None;
    let mut right = self.head;

    while let Some(cursor) = right.filter(|&r| r < offset) {
      left = Some(cursor);
      right = arena.header(cursor).next();
    }

    (left, right)
  }

  /// Whether offsets strictly increase along the list and every back-link
  /// points at the entry before it.
  pub fn is_address_ordered(
    &self,
    arena: &Arena,
  ) -> bool {
    self.first_disorder(arena).is_none()
  }

  /// First entry that breaks ordering or back-linking, if any.
  pub(crate) fn first_disorder(
    &self,
    arena: &Arena,
  ) -> Option<Offset> {
    let mut prev: Option<Offset> = None;

    for node in self.iter(arena) {
      if arena.header(node).prev() != prev || prev.is_some_and(|p| p >= node) {
        return Some(node);
      }
      prev = Some(node);
    }

    None
  }

  fn set_next_of(
    &mut self,
    arena: &mut Arena,
    node: Option<Offset>,
    next: Option<Offset>,
  ) {
    match node {
      Some(node) => arena.update(node, |h| h.next = next.into()),
      None => self.head = next,
    }
  }
}

pub struct Iter<'a> {
  arena: &'a Arena,
  cursor: Option<Offset>,
}

impl Iterator for Iter<'_> {
  type Item = Offset;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.cursor?;
    self.cursor = self.arena.header(current).next();
    Some(current)
  }
}
