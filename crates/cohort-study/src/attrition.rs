//! Attrition counting over an extract of the flow-chart definition.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use cohort_codelists::{CodelistError, CsvTable, read_csv_rows};
use cohort_expr::Value;
use cohort_model::{OutputColumn, StudyDefinition};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StudyError};
use crate::flow_chart::{ATTRITION_SEQUENCE, check_sequence};

/// Lower and upper age bound of the study population.
pub const AGE_RANGE: (i64, i64) = (0, 105);

/// One subject's typed values, keyed by column name.
pub type ExtractRow = HashMap<String, Value>;

/// An extract read with the column types a definition declares.
#[derive(Debug, Clone)]
pub struct Extract {
    rows: Vec<ExtractRow>,
}

impl Extract {
    /// Read `path`, typing each column by `study`'s output columns.
    ///
    /// Every variable column must be present; secondary date columns are
    /// read when present. A non-empty cell that does not parse at its
    /// declared type is an error.
    pub fn from_csv(path: &Path, study: &StudyDefinition) -> Result<Self> {
        let table = read_csv_rows(path).map_err(|err| match err {
            CodelistError::MissingSourceFile { path } => StudyError::MissingExtract { path },
            other => StudyError::Extract(other),
        })?;
        let columns: Vec<OutputColumn> = study
            .output_columns()
            .into_iter()
            .filter(|column| table.headers.contains(&column.name) || column.name == column.variable)
            .collect();
        for column in &columns {
            if !table.headers.contains(&column.name) {
                return Err(StudyError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.name.clone(),
                });
            }
        }

        let mut rows = Vec::with_capacity(table.rows.len());
        for (index, raw) in table.rows.iter().enumerate() {
            let mut row = ExtractRow::new();
            for column in &columns {
                let cell = CsvTable::field(raw, &column.name);
                let value = column.shape.parse_value(cell, column.date_format);
                if value == Value::Missing && !cell.trim().is_empty() {
                    return Err(StudyError::InvalidValue {
                        path: path.to_path_buf(),
                        row: index + 1,
                        column: column.name.clone(),
                        value: cell.to_string(),
                        expected: column.shape.to_string(),
                    });
                }
                row.insert(column.name.clone(), value);
            }
            rows.push(row);
        }
        debug!(path = %path.display(), rows = rows.len(), "read extract");
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ExtractRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a subject needs at one attrition step to stay in the cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Flag is set.
    Flagged,
    /// No death date, or death on or after the index date.
    AliveAtIndex,
    /// Value recorded.
    Present,
    /// Value recorded and not the zero placeholder.
    PresentNonZero,
    /// Age recorded and within [`AGE_RANGE`].
    AgeInRange,
}

impl Criterion {
    /// Criterion applied to a flow-chart variable.
    pub fn for_variable(name: &str) -> Self {
        match name {
            "alive_at_cohort_start" => Criterion::Flagged,
            "died_date_ons" => Criterion::AliveAtIndex,
            "imd" | "ethnicity" => Criterion::PresentNonZero,
            "age" => Criterion::AgeInRange,
            _ => Criterion::Present,
        }
    }

    pub fn keeps(&self, value: &Value, index_date: NaiveDate) -> bool {
        match self {
            Criterion::Flagged => value.is_truthy(),
            Criterion::AliveAtIndex => match value {
                Value::Missing => true,
                Value::Date(died) => *died >= index_date,
                _ => false,
            },
            Criterion::Present => is_present(value),
            Criterion::PresentNonZero => is_present(value) && !is_zero(value),
            Criterion::AgeInRange => match value {
                Value::Int(age) => (AGE_RANGE.0..=AGE_RANGE.1).contains(age),
                Value::Float(age) => {
                    *age >= AGE_RANGE.0 as f64 && *age <= AGE_RANGE.1 as f64
                }
                _ => false,
            },
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Criterion::Flagged => "registered at index date",
            Criterion::AliveAtIndex => "alive at index date",
            Criterion::Present => "value present",
            Criterion::PresentNonZero => "value present and non-zero",
            Criterion::AgeInRange => "age 0 to 105",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Missing => false,
        Value::Str(text) => !text.trim().is_empty(),
        _ => true,
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Int(number) => *number == 0,
        Value::Float(number) => *number == 0.0,
        Value::Str(text) => text.trim() == "0",
        _ => false,
    }
}

/// Survivors after one attrition step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttritionStep {
    pub variable: String,
    pub criterion: Criterion,
    pub remaining: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttritionTable {
    pub study: String,
    pub total: usize,
    pub steps: Vec<AttritionStep>,
}

impl AttritionTable {
    /// Subjects left after the last step.
    pub fn final_count(&self) -> usize {
        self.steps.last().map_or(self.total, |step| step.remaining)
    }
}

/// Count survivors after each step of the flow-chart sequence.
pub fn count_attrition(study: &StudyDefinition, extract: &Extract) -> Result<AttritionTable> {
    check_sequence(study)?;
    let index_date = study.index_date();

    let mut surviving: Vec<&ExtractRow> = extract.rows().iter().collect();
    let mut steps = Vec::with_capacity(ATTRITION_SEQUENCE.len());
    for variable in ATTRITION_SEQUENCE {
        let criterion = Criterion::for_variable(variable);
        let before = surviving.len();
        surviving.retain(|row| {
            let value = row.get(variable).unwrap_or(&Value::Missing);
            criterion.keeps(value, index_date)
        });
        let remaining = surviving.len();
        debug!(variable, %criterion, remaining, "attrition step");
        steps.push(AttritionStep {
            variable: variable.to_string(),
            criterion,
            remaining,
            excluded: before - remaining,
        });
    }

    let table = AttritionTable {
        study: study.name().to_string(),
        total: extract.len(),
        steps,
    };
    info!(
        total = table.total,
        remaining = table.final_count(),
        "counted attrition"
    );
    Ok(table)
}
