//! Codelists and references to them.
//!
//! A [`Codelist`] is an immutable set of codes from one coding system,
//! optionally mapping each code to a category label. Variable rules never
//! hold codelists directly: they hold a [`CodelistRef`] naming registered
//! codelists, which a registry resolves at load time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use sha2::Digest;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::system::CodingSystem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Codelist {
    system: CodingSystem,
    codes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<BTreeMap<String, String>>,
}

impl Codelist {
    /// Build an uncategorised codelist from inline codes.
    ///
    /// Codes are trimmed. A repeated code is an error.
    pub fn new<I, S>(system: CodingSystem, codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for code in codes {
            let code = normalize_code(code.as_ref())?;
            if !set.insert(code.clone()) {
                return Err(ModelError::DuplicateCode { code });
            }
        }
        Ok(Self {
            system,
            codes: set,
            categories: None,
        })
    }

    /// Build an uncategorised codelist from tabular rows.
    ///
    /// Repeated codes collapse into one entry.
    pub fn from_rows<I, S>(system: CodingSystem, codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for code in codes {
            let code = normalize_code(code.as_ref())?;
            if set.contains(&code) {
                debug!(code = %code, "collapsing repeated code");
                continue;
            }
            set.insert(code);
        }
        Ok(Self {
            system,
            codes: set,
            categories: None,
        })
    }

    /// Build a categorised codelist from `(code, category)` rows.
    ///
    /// A repeated row with the same category collapses; a repeated code
    /// with a different category is an error.
    pub fn from_categorised_rows<I, C, L>(system: CodingSystem, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, L)>,
        C: AsRef<str>,
        L: AsRef<str>,
    {
        let mut categories: BTreeMap<String, String> = BTreeMap::new();
        for (code, category) in rows {
            let code = normalize_code(code.as_ref())?;
            let category = category.as_ref().trim().to_string();
            match categories.get(&code) {
                Some(existing) if *existing == category => {
                    debug!(code = %code, category = %category, "collapsing repeated code");
                }
                Some(existing) => {
                    return Err(ModelError::ConflictingCategory {
                        code,
                        first: existing.clone(),
                        second: category,
                    });
                }
                None => {
                    categories.insert(code, category);
                }
            }
        }
        Ok(Self {
            system,
            codes: categories.keys().cloned().collect(),
            categories: Some(categories),
        })
    }

    pub fn system(&self) -> CodingSystem {
        self.system
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code.trim())
    }

    /// Codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn is_categorised(&self) -> bool {
        self.categories.is_some()
    }

    /// Category label assigned to `code`, if the codelist is categorised.
    pub fn category(&self, code: &str) -> Option<&str> {
        self.categories
            .as_ref()
            .and_then(|map| map.get(code.trim()))
            .map(String::as_str)
    }

    /// Distinct category labels present in the codelist.
    pub fn category_labels(&self) -> BTreeSet<&str> {
        self.categories
            .iter()
            .flat_map(|map| map.values().map(String::as_str))
            .collect()
    }

    /// Subset of codes whose category is in `include`.
    pub fn filter_by_category<S: AsRef<str>>(&self, include: &[S]) -> Result<Codelist> {
        let categories = self.categories.as_ref().ok_or(ModelError::NoCategories)?;
        let allowed: BTreeSet<&str> = include.iter().map(|label| label.as_ref().trim()).collect();
        let kept: BTreeMap<String, String> = categories
            .iter()
            .filter(|(_, category)| allowed.contains(category.as_str()))
            .map(|(code, category)| (code.clone(), category.clone()))
            .collect();
        Ok(Codelist {
            system: self.system,
            codes: kept.keys().cloned().collect(),
            categories: Some(kept),
        })
    }

    /// Union of several codelists from the same coding system.
    ///
    /// Categories survive only when every input is categorised.
    pub fn combine(lists: &[&Codelist]) -> Result<Codelist> {
        let (first, rest) = lists.split_first().ok_or(ModelError::EmptyCombination)?;
        let system = first.system;
        if let Some(other) = rest.iter().find(|list| list.system != system) {
            return Err(ModelError::SystemMismatch {
                expected: system,
                found: other.system,
            });
        }

        let codes: BTreeSet<String> = lists
            .iter()
            .flat_map(|list| list.codes.iter().cloned())
            .collect();

        let categories = if lists.iter().all(|list| list.is_categorised()) {
            let mut merged: BTreeMap<String, String> = BTreeMap::new();
            for map in lists.iter().filter_map(|list| list.categories.as_ref()) {
                for (code, category) in map {
                    match merged.get(code) {
                        Some(existing) if existing != category => {
                            return Err(ModelError::ConflictingCategory {
                                code: code.clone(),
                                first: existing.clone(),
                                second: category.clone(),
                            });
                        }
                        Some(_) => {}
                        None => {
                            merged.insert(code.clone(), category.clone());
                        }
                    }
                }
            }
            Some(merged)
        } else {
            None
        };

        Ok(Codelist {
            system,
            codes,
            categories,
        })
    }

    /// Whether two codelists hold exactly the same codes, ignoring system.
    pub fn same_codes(&self, other: &Codelist) -> bool {
        self.codes == other.codes
    }

    /// Stable content hash over the system, codes and categories.
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha2::Sha256::new();
        for code in &self.codes {
            hasher.update(self.system.as_str().as_bytes());
            hasher.update([0x1f_u8]);
            hasher.update(code.as_bytes());
            hasher.update([0x1f_u8]);
            if let Some(category) = self.category(code) {
                hasher.update(category.as_bytes());
            }
            hasher.update([0x1e_u8]);
        }
        hex::encode(hasher.finalize())
    }
}

fn normalize_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ModelError::EmptyCode);
    }
    Ok(code.to_string())
}

/// Reference from a variable rule to one or more registered codelists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodelistRef {
    /// A codelist registered under this name.
    Named(String),
    /// Codes of `base` whose category is in `include`.
    Filtered { base: String, include: Vec<String> },
    /// Union of the named codelists.
    Combined(Vec<String>),
}

impl CodelistRef {
    pub fn named(name: impl Into<String>) -> Self {
        CodelistRef::Named(name.into())
    }

    /// Registry names the reference depends on.
    pub fn names(&self) -> Vec<&str> {
        match self {
            CodelistRef::Named(name) => vec![name.as_str()],
            CodelistRef::Filtered { base, .. } => vec![base.as_str()],
            CodelistRef::Combined(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for CodelistRef {
    fn from(name: &str) -> Self {
        CodelistRef::named(name)
    }
}

impl fmt::Display for CodelistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodelistRef::Named(name) => f.write_str(name),
            CodelistRef::Filtered { base, include } => write!(f, "{base}[{}]", include.join(", ")),
            CodelistRef::Combined(names) => f.write_str(&names.join(" + ")),
        }
    }
}

/// Subset of a registered codelist restricted to the given categories.
pub fn filter_codes_by_category(base: &str, include: &[&str]) -> CodelistRef {
    CodelistRef::Filtered {
        base: base.to_string(),
        include: include.iter().map(|label| (*label).to_string()).collect(),
    }
}

/// Union of several registered codelists.
pub fn combine_codelists(names: &[&str]) -> CodelistRef {
    CodelistRef::Combined(names.iter().map(|name| (*name).to_string()).collect())
}
