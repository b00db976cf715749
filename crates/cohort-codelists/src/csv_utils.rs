//! CSV reading shared by codelist and extract loaders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cohort_model::{Codelist, CodingSystem};
use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::error::{CodelistError, Result};

/// A CSV file read into header-keyed rows.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl CsvTable {
    /// Fail with `SchemaMismatch` unless `column` is a header.
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.headers.iter().any(|header| header == column) {
            return Ok(());
        }
        Err(CodelistError::SchemaMismatch {
            path: self.path.clone(),
            column: column.to_string(),
            available: self.headers.clone(),
        })
    }

    /// Value of `column` in a row, empty when absent.
    pub fn field<'a>(row: &'a BTreeMap<String, String>, column: &str) -> &'a str {
        row.get(column).map_or("", String::as_str)
    }
}

/// Read a CSV file with a header row.
///
/// Strips a byte-order mark from the headers and trims every value.
pub fn read_csv_rows(path: &Path) -> Result<CsvTable> {
    if !path.is_file() {
        return Err(CodelistError::MissingSourceFile {
            path: path.to_path_buf(),
        });
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| CodelistError::csv(path, &err))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| CodelistError::csv(path, &err))?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| CodelistError::csv(path, &err))?;
        let row: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.trim().to_string()))
            .collect();
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "read csv");
    Ok(CsvTable {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

/// Load a codelist from one column of a CSV file.
///
/// With a category column the codelist is categorised. Rows with a blank
/// code are skipped.
pub fn codelist_from_csv(
    path: &Path,
    system: CodingSystem,
    column: &str,
    category_column: Option<&str>,
) -> Result<Codelist> {
    let table = read_csv_rows(path)?;
    table.require_column(column)?;
    if let Some(category_column) = category_column {
        table.require_column(category_column)?;
    }

    let mut blank = 0usize;
    let rows: Vec<(&str, &str)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let code = CsvTable::field(row, column);
            if code.is_empty() {
                blank += 1;
                return None;
            }
            let category = category_column.map_or("", |name| CsvTable::field(row, name));
            Some((code, category))
        })
        .collect();
    if blank > 0 {
        warn!(path = %path.display(), column, blank, "skipped rows with a blank code");
    }

    let built = match category_column {
        Some(_) => Codelist::from_categorised_rows(system, rows),
        None => Codelist::from_rows(system, rows.into_iter().map(|(code, _)| code)),
    };
    built.map_err(|source| CodelistError::Invalid {
        name: path.display().to_string(),
        source,
    })
}
