use std::ptr::NonNull;

use fitalloc::{ALIGNMENT, BlockInfo, FirstFitAllocator, HEADER_SIZE, PAGE_SIZE};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn free_bytes(heap: &FirstFitAllocator) -> usize {
  heap.free_blocks().map(|block| block.size).sum()
}

#[test]
fn test_first_allocation_then_oversized_request() {
  let mut heap = FirstFitAllocator::init(4096).unwrap();

  let (ptr, first) = heap.allocate(100);
  assert!(ptr.is_some());
  assert!(first.success);
  assert_eq!(first.hops, Some(0));
  assert_eq!(first.payload_offset, Some(HEADER_SIZE));

  let (ptr, second) = heap.allocate(4096);
  assert!(ptr.is_none());
  assert!(!second.success);
  assert_eq!(second.payload_offset, None);
  assert_eq!(second.hops, None);

  heap.check().unwrap();
}

#[test]
fn test_three_blocks_coalesce() {
  let mut heap = FirstFitAllocator::init(PAGE_SIZE).unwrap();
  let block_size = 64;
  let payload = block_size - HEADER_SIZE;

  let a = heap.allocate(payload).0.unwrap();
  let b = heap.allocate(payload).0.unwrap();
  let c = heap.allocate(payload).0.unwrap();
  // keep the tail of the arena allocated so C has no free right neighbor
  let tail = heap.allocate(PAGE_SIZE - 3 * block_size - HEADER_SIZE).0.unwrap();
  assert!(heap.free_blocks().next().is_none());

  unsafe {
    heap.deallocate(Some(b)).unwrap();
    heap.deallocate(Some(a)).unwrap();
  }
  assert_eq!(
    heap.free_blocks().collect::<Vec<_>>(),
    vec![BlockInfo { offset: 0, size: 2 * block_size, allocated: false }]
  );

  unsafe { heap.deallocate(Some(c)).unwrap() };
  assert_eq!(
    heap.free_blocks().collect::<Vec<_>>(),
    vec![BlockInfo { offset: 0, size: 3 * block_size, allocated: false }]
  );

  unsafe { heap.deallocate(Some(tail)).unwrap() };
  assert_eq!(heap.free_list_len(), 1);
  assert_eq!(free_bytes(&heap), PAGE_SIZE);
  heap.check().unwrap();
}

#[test]
fn test_double_free_changes_nothing() {
  let mut heap = FirstFitAllocator::init(PAGE_SIZE).unwrap();
  let a = heap.allocate(40).0;
  heap.allocate(40).0.unwrap();

  unsafe { heap.deallocate(a).unwrap() };
  let before: Vec<_> = heap.blocks().collect();

  assert!(unsafe { heap.deallocate(a) }.is_err());
  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
  heap.check().unwrap();
}

#[test]
fn test_null_free_is_noop() {
  let mut heap = FirstFitAllocator::init(PAGE_SIZE).unwrap();
  heap.allocate(40).0.unwrap();
  let before: Vec<_> = heap.blocks().collect();

  assert!(unsafe { heap.deallocate(None) }.is_ok());
  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
}

#[test]
fn test_first_fit_reports_hops() {
  let mut heap = FirstFitAllocator::init(PAGE_SIZE).unwrap();
  let small = heap.allocate(8).0;
  heap.allocate(8).0.unwrap();
  let medium = heap.allocate(200).0;
  heap.allocate(8).0.unwrap();

  unsafe {
    heap.deallocate(small).unwrap();
    heap.deallocate(medium).unwrap();
  }

  // list: [small (32), medium (224), tail]; 100 bytes skips the small block
  let (_, diagnostics) = heap.allocate(100);
  assert_eq!(diagnostics.hops, Some(1));
  assert_eq!(diagnostics.payload_offset, Some(64 + HEADER_SIZE));

  // same state, same choice
  let mut twin = FirstFitAllocator::init(PAGE_SIZE).unwrap();
  let small = twin.allocate(8).0;
  twin.allocate(8).0.unwrap();
  let medium = twin.allocate(200).0;
  twin.allocate(8).0.unwrap();
  unsafe {
    twin.deallocate(small).unwrap();
    twin.deallocate(medium).unwrap();
  }
  assert_eq!(twin.allocate(100).1, diagnostics);
}

#[test]
fn test_allocate_then_free_restores_free_bytes() {
  let mut heap = FirstFitAllocator::init(2 * PAGE_SIZE).unwrap();
  let keep = heap.allocate(300).0.unwrap();
  let before = free_bytes(&heap);

  for size in [0, 1, 7, 8, 100, 1000, 4000] {
    let ptr = heap.allocate(size).0;
    assert!(ptr.is_some());
    unsafe { heap.deallocate(ptr).unwrap() };

    assert_eq!(free_bytes(&heap), before);
    heap.check().unwrap();
  }

  unsafe { heap.deallocate(Some(keep)).unwrap() };
  assert_eq!(free_bytes(&heap), 2 * PAGE_SIZE);
}

#[test]
fn test_heap_size_rounds_to_page() {
  assert_eq!(FirstFitAllocator::init(1).unwrap().heap_size(), PAGE_SIZE);
  assert_eq!(FirstFitAllocator::init(PAGE_SIZE + 1).unwrap().heap_size(), 2 * PAGE_SIZE);
  assert!(FirstFitAllocator::init(0).is_err());
}

#[test]
fn test_random_requests_keep_invariants() {
  let mut heap = FirstFitAllocator::init(16 * PAGE_SIZE).unwrap();
  let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);
  let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

  for step in 0..4000 {
    if live.is_empty() || rng.gen_range(0..3) != 0 {
      let size = rng.gen_range(0..512);
      let (ptr, diagnostics) = heap.allocate(size);

      match ptr {
        Some(ptr) => {
          assert!(diagnostics.success);
          assert_eq!(ptr.addr().get() % ALIGNMENT, 0);
          assert_eq!(heap.payload_offset(ptr), diagnostics.payload_offset);

          let tag = step as u8;
          unsafe { std::ptr::write_bytes(ptr.as_ptr(), tag, size) };
          live.push((ptr, size, tag));
        }
        None => assert!(!diagnostics.success),
      }
    } else {
      let (ptr, size, tag) = live.swap_remove(rng.gen_range(0..live.len()));
      let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };
      assert!(bytes.iter().all(|&b| b == tag), "payload clobbered at step {step}");

      unsafe { heap.deallocate(Some(ptr)).unwrap() };
    }

    heap.check().unwrap();
    assert_eq!(heap.blocks().map(|b| b.size).sum::<usize>(), heap.heap_size());
    assert!(heap.blocks().all(|b| b.size % ALIGNMENT == 0));
  }

  for (ptr, _, _) in live {
    unsafe { heap.deallocate(Some(ptr)).unwrap() };
  }
  assert_eq!(heap.free_list_len(), 1);
  assert_eq!(heap.stats().largest_free, heap.heap_size());
}
