/// Every block size and every payload address is a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Granularity of the arena mapping.
pub const PAGE_SIZE: usize = 4096;

/// Rounds `value` up to the next multiple of a power-of-two boundary.
///
/// With a single argument the boundary is [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use fitalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(24), 24);
/// assert_eq!(align!(5000, fitalloc::PAGE_SIZE), 8192);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align!($value, $crate::ALIGNMENT)
  };
  ($value:expr, $to:expr) => {
    ($value + $to - 1) & !($to - 1)
  };
}
