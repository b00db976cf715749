//! Codelist loading and the named codelist registry.
//!
//! Codelists come from inline code lists or from one column of a CSV file,
//! optionally with a category column. The study's declarations live in
//! [`study_codelists`]; [`load_study_registry`] reads them from the
//! codelist directory resolved by [`codelists_root`].

pub mod csv_utils;
pub mod declarations;
pub mod error;
pub mod paths;
pub mod registry;

pub use csv_utils::{CsvTable, codelist_from_csv, read_csv_rows};
pub use declarations::{CodelistDeclaration, CodelistSource, codelist, study_codelists};
pub use error::{CodelistError, Result};
pub use paths::{CODELISTS_ENV_VAR, DEFAULT_CODELISTS_DIR, codelists_root};
pub use registry::{
    CodelistRegistry, LoadFailure, RegisteredCodelist, RegistryLoad, collect_registry,
    load_registry, load_study_registry,
};
