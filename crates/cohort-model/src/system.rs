use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Clinical coding system a codelist is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodingSystem {
    /// ICD-10 diagnoses, used on death certificates and hospital episodes.
    Icd10,
    /// Clinical Terms Version 3 (Read v3), used in primary care records.
    Ctv3,
    /// SNOMED CT, used for medications.
    Snomed,
}

impl CodingSystem {
    pub const ALL: [CodingSystem; 3] = [CodingSystem::Icd10, CodingSystem::Ctv3, CodingSystem::Snomed];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodingSystem::Icd10 => "icd10",
            CodingSystem::Ctv3 => "ctv3",
            CodingSystem::Snomed => "snomed",
        }
    }
}

impl fmt::Display for CodingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodingSystem {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        CodingSystem::ALL
            .into_iter()
            .find(|system| system.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownCodingSystem {
                input: s.to_string(),
            })
    }
}
