use std::collections::BTreeSet;

use serde::Serialize;

use crate::codelist::CodelistRef;
use crate::date::DateFormat;
use crate::expectations::Expectations;
use crate::query::{OutputShape, Query, SelectionPolicy, VariableKind};
use crate::window::Window;

/// A named rule in a study definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    #[serde(flatten)]
    pub query: Query,
}

impl Variable {
    pub fn new(name: &str, query: impl Into<Query>) -> Self {
        Self {
            name: name.trim().to_string(),
            query: query.into(),
        }
    }

    pub fn kind(&self) -> VariableKind {
        self.query.kind()
    }

    pub fn shape(&self) -> OutputShape {
        self.query.shape()
    }

    pub fn selection(&self) -> Option<SelectionPolicy> {
        self.query.selection()
    }

    pub fn window(&self) -> Window {
        self.query.window()
    }

    pub fn codelist_refs(&self) -> Vec<&CodelistRef> {
        self.query.codelist_refs()
    }

    pub fn expectations(&self) -> &Expectations {
        self.query.expectations()
    }

    /// Sub-variables of a categorisation; empty for other rules.
    pub fn sub_variables(&self) -> &[Variable] {
        match self.query.categorisation() {
            Some(categorisation) => categorisation.sub_variables(),
            None => &[],
        }
    }

    /// Names outside its own sub-variables that this rule reads.
    pub fn external_references(&self) -> BTreeSet<String> {
        let Some(categorisation) = self.query.categorisation() else {
            return BTreeSet::new();
        };
        let local: BTreeSet<&str> = categorisation
            .sub_variables()
            .iter()
            .map(|sub| sub.name.as_str())
            .collect();
        categorisation
            .references()
            .into_iter()
            .filter(|name| !local.contains(name.as_str()))
            .collect()
    }

    /// Extract columns this variable produces, main column first.
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        let mut columns = vec![OutputColumn {
            name: self.name.clone(),
            shape: self.shape(),
            date_format: self.query.date_format(),
            variable: self.name.clone(),
        }];
        if let Some(secondary) = self.query.secondary_column() {
            columns.push(OutputColumn {
                name: format!("{}{}", self.name, secondary.suffix),
                shape: OutputShape::Date,
                date_format: Some(secondary.format),
                variable: self.name.clone(),
            });
        }
        columns
    }
}

/// A column of the extract produced for a study definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub shape: OutputShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
    /// Variable the column belongs to.
    pub variable: String,
}
