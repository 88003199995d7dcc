/// mask covering the lowest `width` bits.
#[inline]
pub const fn low_mask(width: u32) -> usize {
    if width >= usize::BITS {
        usize::MAX
    } else {
        (1 << width) - 1
    }
}

#[inline]
pub const fn mask_lower(bin: usize, width: u32) -> usize {
    bin & low_mask(width)
}

/// extracts the `width`-bit field whose least significant bit is `lsb`.
#[inline]
pub const fn extract(bin: usize, lsb: u32, width: u32) -> usize {
    if lsb >= usize::BITS {
        0
    } else {
        mask_lower(bin >> lsb, width)
    }
}

/// integer log2, `None` unless `v` is an exact power of two.
#[inline]
pub const fn exact_log2(v: usize) -> Option<u32> {
    if v.is_power_of_two() {
        Some(v.trailing_zeros())
    } else {
        None
    }
}
