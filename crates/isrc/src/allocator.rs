//! Deterministic per-user designation ranges.
//!
//! Users never coordinate on code issuance, so each user id hashes to one of
//! [`RANGE_COUNT`] fixed ranges of [`RANGE_SIZE`] designation numbers.
//! Within a range, designations are handed out sequentially per code year.

use serde::{Deserialize, Serialize};

use beatschain_core::{DomainError, UserId};

use crate::code::Isrc;

/// Number of non-overlapping designation ranges.
pub const RANGE_COUNT: u32 = 90;

/// Designations per range.
pub const RANGE_SIZE: u32 = 1000;

/// First designation of range 0.
pub const RANGE_BASE: u32 = 200;

/// A contiguous block of designation numbers owned by one user-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignationRange(u32);

impl DesignationRange {
    /// Range by index. Indexes at or beyond [`RANGE_COUNT`] are invalid.
    pub fn from_index(index: u32) -> Result<Self, DomainError> {
        if index >= RANGE_COUNT {
            return Err(DomainError::validation(format!(
                "range index out of bounds: {index}"
            )));
        }
        Ok(Self(index))
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// First designation in the range.
    pub fn start(&self) -> u32 {
        RANGE_BASE + self.0 * RANGE_SIZE
    }

    /// Last designation in the range (inclusive).
    pub fn end(&self) -> u32 {
        self.start() + RANGE_SIZE - 1
    }

    pub fn contains(&self, designation: u32) -> bool {
        (self.start()..=self.end()).contains(&designation)
    }
}

/// Map a user id onto its designation range.
///
/// FNV-1a over the id's UTF-8 bytes, reduced mod [`RANGE_COUNT`]. The hash is
/// part of the issuance contract: changing it would re-home users onto ranges
/// that may already contain other users' codes.
pub fn designation_range_for(user_id: &UserId) -> DesignationRange {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in user_id.as_str().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    DesignationRange((hash % u64::from(RANGE_COUNT)) as u32)
}

/// Compute the next designation for a range, given the highest designation
/// already issued in it for the current code year (`None` when the range is
/// untouched this year).
pub fn next_designation(
    range: DesignationRange,
    highest_issued: Option<u32>,
) -> Result<u32, DomainError> {
    match highest_issued {
        None => Ok(range.start()),
        Some(last) if !range.contains(last) => Err(DomainError::invariant(format!(
            "issued designation {last} outside range {}..={}",
            range.start(),
            range.end()
        ))),
        Some(last) if last >= range.end() => Err(DomainError::range_exhausted(format!(
            "range {} has no designations left this year",
            range.index()
        ))),
        Some(last) => Ok(last + 1),
    }
}

/// Allocate the next code for a user: range lookup + sequential designation.
pub fn allocate(
    user_id: &UserId,
    year: u8,
    highest_issued: Option<u32>,
) -> Result<Isrc, DomainError> {
    let range = designation_range_for(user_id);
    let designation = next_designation(range, highest_issued)?;
    Isrc::new(year, designation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn ranges_tile_without_overlap() {
        for i in 0..RANGE_COUNT - 1 {
            let a = DesignationRange::from_index(i).unwrap();
            let b = DesignationRange::from_index(i + 1).unwrap();
            assert_eq!(a.end() + 1, b.start());
        }
        let last = DesignationRange::from_index(RANGE_COUNT - 1).unwrap();
        assert!(last.end() <= 99_999);
    }

    #[test]
    fn same_user_always_lands_in_same_range() {
        let a = designation_range_for(&user("artist-42"));
        let b = designation_range_for(&user("artist-42"));
        assert_eq!(a, b);
    }

    #[test]
    fn fresh_range_starts_at_range_start() {
        let range = designation_range_for(&user("artist-42"));
        assert_eq!(next_designation(range, None).unwrap(), range.start());
    }

    #[test]
    fn allocation_is_sequential() {
        let range = DesignationRange::from_index(3).unwrap();
        let first = next_designation(range, None).unwrap();
        let second = next_designation(range, Some(first)).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn exhausted_range_errors() {
        let range = DesignationRange::from_index(0).unwrap();
        let err = next_designation(range, Some(range.end())).unwrap_err();
        assert!(matches!(err, beatschain_core::DomainError::RangeExhausted(_)));
    }

    #[test]
    fn full_range_yields_exactly_range_size_codes() {
        let range = DesignationRange::from_index(89).unwrap();
        let mut issued = None;
        let mut count = 0u32;
        loop {
            match next_designation(range, issued) {
                Ok(d) => {
                    issued = Some(d);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        assert_eq!(count, RANGE_SIZE);
    }

    proptest! {
        /// Any user id maps to an in-bounds range, and every code allocated
        /// from it stays inside that range and reparses.
        #[test]
        fn allocated_codes_stay_in_the_users_range(
            id in "[a-zA-Z0-9_-]{1,32}",
            already in proptest::option::of(0u32..RANGE_SIZE),
            year in 0u8..=99,
        ) {
            let user_id = user(&id);
            let range = designation_range_for(&user_id);
            prop_assert!(range.index() < RANGE_COUNT);

            let highest = already.map(|offset| range.start() + offset);
            match allocate(&user_id, year, highest) {
                Ok(code) => {
                    prop_assert!(range.contains(code.designation()));
                    let reparsed: Isrc = code.to_string().parse().unwrap();
                    prop_assert_eq!(reparsed, code);
                }
                Err(e) => {
                    // Only the very last designation may exhaust the range.
                    prop_assert_eq!(highest, Some(range.end()));
                    prop_assert!(matches!(e, beatschain_core::DomainError::RangeExhausted(_)));
                }
            }
        }
    }
}
