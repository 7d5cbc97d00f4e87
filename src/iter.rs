//! Iterator helpers.

use std::iter::Zip;

/// Zips two iterators that must have the same length.
///
/// # Panics
///
/// Panics if the lengths differ, where [`Iterator::zip`] would stop at the shorter one.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    if a.len() != b.len() {
        panic!("zip_exact: length mismatch ({} vs. {})", a.len(), b.len());
    }
    a.zip(b)
}
