//! DNA base helpers used when reverse complementing tag values.

/// Complements a single base.
///
/// `A/C/G/T` in either case complement to uppercase; `N`, `n` and anything else are returned as is.
#[inline]
#[must_use]
pub const fn complement_base(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'T' | b't' => b'A',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        _ => base,
    }
}

/// Reverse complements a base sequence.
///
/// ```
/// use fgmerge_sam::dna::reverse_complement;
///
/// assert_eq!(reverse_complement(b"AACGN"), b"NCGTT".to_vec());
/// assert_eq!(reverse_complement(b"acgt"), b"ACGT".to_vec());
/// ```
#[must_use]
pub fn reverse_complement(bases: &[u8]) -> Vec<u8> {
    bases.iter().rev().map(|&b| complement_base(b)).collect()
}
