use std::{io, ptr::{self, NonNull}};

use crate::{
  align,
  align::{ALIGNMENT, PAGE_SIZE},
  block::{HEADER_SIZE, Header, Offset},
  error::InitError,
};

/// The single region every block lives in.
///
/// Backed by an anonymous, zero-filled mapping that is never resized and is
/// unmapped on drop. Headers are read and written through [`Arena::header`]
/// and [`Arena::write_header`], which bounds-check every offset.
pub struct Arena {
  base: NonNull<u8>,
  len: usize,
}

impl Arena {
  /// Maps `region_size` bytes, rounded up to a multiple of [`PAGE_SIZE`].
  pub fn map(region_size: usize) -> Result<Self, InitError> {
    let len = Some(region_size)
      .filter(|&size| size <= u32::MAX as usize)
      .map(|size| align!(size, PAGE_SIZE))
      .filter(|&len| len <= u32::MAX as usize)
      .ok_or_else(|| InitError::OutOfMemory {
        requested: region_size,
        source: io::Error::new(
          io::ErrorKind::InvalidInput,
          "region does not fit a 32-bit block size",
        ),
      })?;

    let base = unsafe { os_mmap(len) }.ok_or_else(|| InitError::OutOfMemory {
      requested: region_size,
      source: io::Error::last_os_error(),
    })?;

    tracing::debug!(requested = region_size, len, base = ?base, "arena mapped");

    Ok(Self { base, len })
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Pointer to the byte at `offset`.
  pub fn ptr_at(
    &self,
    offset: Offset,
  ) -> NonNull<u8> {
    assert!(offset <= self.len, "offset {offset} outside arena of {} bytes", self.len);
    unsafe { self.base.add(offset) }
  }

  /// Offset of `addr` from the base, if it lies inside the mapping or one
  /// byte past its end (where an empty payload at the top of the arena sits).
  pub fn offset_of(
    &self,
    addr: NonNull<u8>,
  ) -> Option<Offset> {
    let offset = addr.addr().get().checked_sub(self.base.addr().get())?;
    (offset <= self.len).then_some(offset)
  }

  pub fn header(
    &self,
    offset: Offset,
  ) -> Header {
    self.check_header_bounds(offset);
    unsafe { self.base.add(offset).cast::<Header>().read() }
  }

  pub fn write_header(
    &mut self,
    offset: Offset,
    header: Header,
  ) {
    self.check_header_bounds(offset);
    unsafe { self.base.add(offset).cast::<Header>().write(header) }
  }

  /// Read-modify-write of one header.
  pub fn update(
    &mut self,
    offset: Offset,
    f: impl FnOnce(&mut Header),
  ) {
    let mut header = self.header(offset);
    f(&mut header);
    self.write_header(offset, header);
  }

  /// Zero-fills `len` bytes starting at `offset`.
  pub fn zero(
    &mut self,
    offset: Offset,
    len: usize,
  ) {
    assert!(
      offset.checked_add(len).is_some_and(|end| end <= self.len),
      "zeroing {len} bytes at {offset} overruns arena of {} bytes",
      self.len
    );
    unsafe { ptr::write_bytes(self.base.add(offset).as_ptr(), 0, len) }
  }

  fn check_header_bounds(
    &self,
    offset: Offset,
  ) {
    assert!(
      offset % ALIGNMENT == 0 && offset + HEADER_SIZE <= self.len,
      "header offset {offset} invalid for arena of {} bytes",
      self.len
    );
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { os_munmap(self.base, self.len) };
  }
}

unsafe fn os_mmap(len: usize) -> Option<NonNull<u8>> {
  let ptr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      len,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if ptr == libc::MAP_FAILED {
    None
  } else {
    NonNull::new(ptr.cast::<u8>())
  }
}

unsafe fn os_munmap(
  base: NonNull<u8>,
  len: usize,
) {
  unsafe { libc::munmap(base.as_ptr().cast(), len) };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_map_rounds_to_page() {
    let arena = Arena::map(100).unwrap();

    assert_eq!(arena.len(), PAGE_SIZE);
    assert_eq!(arena.base().addr().get() % PAGE_SIZE, 0);

    let arena = Arena::map(PAGE_SIZE + 1).unwrap();
    assert_eq!(arena.len(), 2 * PAGE_SIZE);
  }

  #[test]
  fn test_map_is_zeroed() {
    let arena = Arena::map(PAGE_SIZE).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(arena.base().as_ptr(), arena.len()) };

    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn test_map_rejects_oversized_region() {
    let err = Arena::map(u32::MAX as usize + 1).err().unwrap();
    assert!(matches!(err, InitError::OutOfMemory { .. }));

    assert!(Arena::map(usize::MAX).is_err());
  }

  #[test]
  fn test_map_zero_fails() {
    assert!(matches!(Arena::map(0), Err(InitError::OutOfMemory { .. })));
  }

  #[test]
  fn test_header_round_trip() {
    let mut arena = Arena::map(PAGE_SIZE).unwrap();

    arena.write_header(48, Header::free(96, Some(0), None));
    arena.update(48, |h| h.allocated = 1);

    let header = arena.header(48);
    assert_eq!(header.size(), 96);
    assert!(header.is_allocated());
    assert_eq!(header.prev(), Some(0));
  }

  #[test]
  #[should_panic]
  fn test_header_out_of_bounds() {
    let arena = Arena::map(PAGE_SIZE).unwrap();
    arena.header(PAGE_SIZE - 8);
  }

  #[test]
  fn test_offset_of() {
    let arena = Arena::map(PAGE_SIZE).unwrap();

    let mut outside = 0u64;

    assert_eq!(arena.offset_of(arena.ptr_at(24)), Some(24));
    assert_eq!(arena.offset_of(arena.ptr_at(PAGE_SIZE)), Some(PAGE_SIZE));
    assert_eq!(arena.offset_of(NonNull::from(&mut outside).cast()), None);
  }
}
