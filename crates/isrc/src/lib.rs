//! `beatschain-isrc` — ISRC code issuance domain.
//!
//! An ISRC (International Standard Recording Code) is issued under our fixed
//! country/registrant prefix with a two-digit year and a five-digit
//! designation number. Each platform user is deterministically mapped to one
//! of 90 non-overlapping designation ranges so codes never collide across
//! users without any coordination.

pub mod allocator;
pub mod code;
pub mod record;

pub use allocator::{
    allocate, designation_range_for, next_designation, DesignationRange, RANGE_COUNT, RANGE_SIZE,
};
pub use code::Isrc;
pub use record::IsrcRecord;
