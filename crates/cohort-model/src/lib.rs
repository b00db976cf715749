pub mod categorise;
pub mod codelist;
pub mod date;
pub mod error;
pub mod expectations;
pub mod patients;
pub mod query;
pub mod study;
pub mod system;
pub mod variable;
pub mod window;

pub use categorise::{Categorisation, CategoryRule, DEFAULT_MARKER};
pub use codelist::{Codelist, CodelistRef, combine_codelists, filter_codes_by_category};
pub use date::{DateBound, DateExpr, DateFormat, DateUnit};
pub use error::{ModelError, Result};
pub use expectations::{CategoryRatios, DateRange, Distribution, Expectations, Rate};
pub use patients::{DatePrecision, InWindow, WithExpectations};
pub use query::{OutputShape, Query, Returning, Selection, SelectionPolicy, VariableKind};
pub use study::{
    CodelistUse, EvaluationStep, PATIENT_ID, POPULATION, Population, PredicateFilter, RuleRef,
    StudyDefinition, StudyDefinitionBuilder,
};
pub use system::CodingSystem;
pub use variable::{OutputColumn, Variable};
pub use window::{ResolvedWindow, Window};
