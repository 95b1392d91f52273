//! The ISRC value type.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use beatschain_core::DomainError;

/// Country code of our registrant allocation.
pub const COUNTRY: &str = "ZA";

/// Registrant code assigned to the platform.
pub const REGISTRANT: &str = "80G";

/// A validated ISRC under our registrant prefix: `ZA-80G-YY-NNNNN`.
///
/// Construction and parsing enforce the full format, so holding an `Isrc`
/// is proof the code is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isrc {
    year: u8,
    designation: u32,
}

impl Isrc {
    /// Build a code from its numeric parts.
    ///
    /// `year` is the two-digit code year (0..=99); `designation` must fit in
    /// five digits.
    pub fn new(year: u8, designation: u32) -> Result<Self, DomainError> {
        if year > 99 {
            return Err(DomainError::validation(format!(
                "code year must be two digits, got {year}"
            )));
        }
        if designation > 99_999 {
            return Err(DomainError::validation(format!(
                "designation must be five digits, got {designation}"
            )));
        }
        Ok(Self { year, designation })
    }

    pub fn year(&self) -> u8 {
        self.year
    }

    pub fn designation(&self) -> u32 {
        self.designation
    }

    /// Check a raw string against the issuance format without keeping the
    /// parsed value.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Self>().is_ok()
    }
}

impl core::fmt::Display for Isrc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{COUNTRY}-{REGISTRANT}-{:02}-{:05}",
            self.year, self.designation
        )
    }
}

impl From<Isrc> for String {
    fn from(value: Isrc) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Isrc {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Isrc {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let country = parts.next().unwrap_or_default();
        let registrant = parts.next().unwrap_or_default();
        let year = parts.next().unwrap_or_default();
        let designation = parts.next().unwrap_or_default();

        if parts.next().is_some() || country != COUNTRY || registrant != REGISTRANT {
            return Err(DomainError::invalid_id(format!("Isrc: {s:?}")));
        }
        if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!("Isrc year: {s:?}")));
        }
        if designation.len() != 5 || !designation.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!("Isrc designation: {s:?}")));
        }

        let year: u8 = year
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("Isrc year: {e}")))?;
        let designation: u32 = designation
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("Isrc designation: {e}")))?;

        Self::new(year, designation)
    }
}
