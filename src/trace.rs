//! Trace files: scripted allocate/free request streams and their replay.
//!
//! A trace starts with four integers (suggested heap size, number of ids,
//! number of requests, weight) followed by one request per line:
//!
//! ```text
//!   a <id> <size>    allocate, remember the pointer under <id>
//!   f <id>           free the pointer remembered under <id>
//!   r <id> <size>    reallocate (parsed, rejected on replay)
//! ```
//!
//! Replay writes one [`Diagnostics`] line per `a` request.

use std::{fs, io::Write, path::Path, ptr::NonNull, str::FromStr};

use crate::{
  FirstFitAllocator,
  block::HEADER_SIZE,
  diagnostics::{Diagnostics, HeapStats},
  error::{Result, TraceError},
};

const HEADER_FIELDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
  Alloc { id: usize, size: i64 },
  Free { id: usize },
  Realloc { id: usize, size: i64 },
}

impl Op {
  pub fn id(&self) -> usize {
    match *self {
      Op::Alloc { id, .. } | Op::Free { id } | Op::Realloc { id, .. } => id,
    }
  }
}

/// One request and the line it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
  pub line: usize,
  pub op: Op,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
  pub suggested_heap_size: usize,
  pub num_ids: usize,
  pub num_ops: usize,
  /// Carried by the format, unused by replay.
  pub weight: i64,
  pub requests: Vec<Request>,
}

impl Trace {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    Self::parse(&fs::read_to_string(path)?)
  }

  pub fn parse(input: &str) -> Result<Self> {
    let mut lines = input.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut header = Vec::with_capacity(HEADER_FIELDS);
    for (_, line) in lines.by_ref() {
      header.extend(line.split_whitespace());
      if header.len() >= HEADER_FIELDS {
        break;
      }
    }
    let [heap_size, num_ids, num_ops, weight] = header[..] else {
      return Err(TraceError::Header);
    };

    let mut trace = Trace {
      suggested_heap_size: heap_size.parse().map_err(|_| TraceError::Header)?,
      num_ids: num_ids.parse().map_err(|_| TraceError::Header)?,
      num_ops: num_ops.parse().map_err(|_| TraceError::Header)?,
      weight: weight.parse().map_err(|_| TraceError::Header)?,
      requests: Vec::new(),
    };

    for (line, text) in lines {
      let mut fields = text.split_whitespace();
      let Some(kind) = fields.next() else {
        continue;
      };

      let op = match kind {
        "a" => Op::Alloc {
          id: field(&mut fields, line, "id")?,
          size: field(&mut fields, line, "size")?,
        },
        "f" => Op::Free {
          id: field(&mut fields, line, "id")?,
        },
        "r" => Op::Realloc {
          id: field(&mut fields, line, "id")?,
          size: field(&mut fields, line, "size")?,
        },
        other => {
          return Err(TraceError::Parse {
            line,
            reason: format!("unknown request type {other:?}"),
          });
        }
      };

      if op.id() >= trace.num_ids {
        return Err(TraceError::IdOutOfRange {
          line,
          id: op.id(),
          num_ids: trace.num_ids,
        });
      }

      trace.requests.push(Request { line, op });
    }

    if trace.requests.len() != trace.num_ops {
      return Err(TraceError::OpCount {
        declared: trace.num_ops,
        found: trace.requests.len(),
      });
    }

    Ok(trace)
  }
}

fn field<'a, T: FromStr>(
  fields: &mut impl Iterator<Item = &'a str>,
  line: usize,
  name: &str,
) -> Result<T> {
  let raw = fields.next().ok_or_else(|| TraceError::Parse {
    line,
    reason: format!("missing {name}"),
  })?;

  raw.parse().map_err(|_| TraceError::Parse {
    line,
    reason: format!("invalid {name} {raw:?}"),
  })
}

/// Counts gathered while replaying a trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
  pub allocations: usize,
  pub failed_allocations: usize,
  pub frees: usize,
  pub rejected_frees: usize,
  /// Heap totals after the last request.
  pub stats: HeapStats,
}

/// What replay remembers under an id.
#[derive(Clone, Copy)]
enum Slot {
  Empty,
  Live(NonNull<u8>),
  /// Already freed. Passed to the allocator again only while it is still the
  /// payload of a free-list entry, where it is reported as a double free;
  /// once merged away or handed out anew, a repeated free is a null free.
  Freed(NonNull<u8>),
}

fn heads_free_block(
  heap: &FirstFitAllocator,
  ptr: NonNull<u8>,
) -> bool {
  heap
    .payload_offset(ptr)
    .is_some_and(|offset| heap.free_blocks().any(|block| block.offset + HEADER_SIZE == offset))
}

/// Initializes a heap of the trace's suggested size and runs every request
/// against it, writing one diagnostics line per allocation to `out`.
pub fn replay(
  trace: &Trace,
  mut out: impl Write,
) -> Result<ReplaySummary> {
  let mut heap = FirstFitAllocator::init(trace.suggested_heap_size)?;
  let mut slots = vec![Slot::Empty; trace.num_ids];
  let mut summary = ReplaySummary::default();

  for request in &trace.requests {
    match request.op {
      Op::Alloc { id, size } => {
        let (ptr, diagnostics) = match usize::try_from(size) {
          Ok(size) => heap.allocate(size),
          Err(_) => (None, Diagnostics::failed()),
        };

        tracing::trace!(line = request.line, id, size, %diagnostics, "alloc");
        writeln!(out, "{diagnostics}")?;

        summary.allocations += 1;
        if !diagnostics.success {
          summary.failed_allocations += 1;
        }
        slots[id] = ptr.map_or(Slot::Empty, Slot::Live);
      }
      Op::Free { id } => {
        summary.frees += 1;

        let ptr = match slots[id] {
          Slot::Live(ptr) => {
            slots[id] = Slot::Freed(ptr);
            Some(ptr)
          }
          Slot::Freed(ptr) if heads_free_block(&heap, ptr) => Some(ptr),
          Slot::Freed(_) => {
            tracing::debug!(line = request.line, id, "stale pointer no longer heads a free block");
            None
          }
          Slot::Empty => None,
        };

        if let Err(err) = unsafe { heap.deallocate(ptr) } {
          tracing::warn!(line = request.line, id, %err, "free rejected");
          summary.rejected_frees += 1;
        }
      }
      Op::Realloc { .. } => {
        return Err(TraceError::UnsupportedRealloc { line: request.line });
      }
    }
  }

  out.flush()?;
  debug_assert_eq!(heap.check(), Ok(()));

  summary.stats = heap.stats();
  Ok(summary)
}
