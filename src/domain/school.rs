//! School identity used for prompt interpolation and document letterheads.

use serde::{Deserialize, Serialize};

/// Configured school identity. Every field that appears on official
/// documents comes from here; nothing institutional is hard-coded in the
/// render pipeline or the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolProfile {
    /// First letterhead line, e.g. the regency government.
    pub government_line: String,
    /// Second letterhead line, e.g. the education office.
    pub office_line: String,
    /// Display name of the school.
    pub name: String,
    /// Street address printed under the school name.
    pub address: String,
    /// Short filename-safe tag, e.g. `SMPN3Pacet`.
    pub tag: String,
    pub principal_name: String,
    pub principal_nip: String,
    /// School year label, e.g. `2025/2026`.
    pub school_year: String,
}

/// Institutional header block rendered above exported documents. Derived
/// solely from [`SchoolProfile`] so every document variant carries the same
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letterhead {
    pub government_line: String,
    pub office_line: String,
    pub school_name: String,
    pub address: String,
}

impl From<&SchoolProfile> for Letterhead {
    fn from(profile: &SchoolProfile) -> Self {
        Self {
            government_line: profile.government_line.clone(),
            office_line: profile.office_line.clone(),
            school_name: profile.name.clone(),
            address: profile.address.clone(),
        }
    }
}

impl SchoolProfile {
    pub fn letterhead(&self) -> Letterhead {
        Letterhead::from(self)
    }
}
