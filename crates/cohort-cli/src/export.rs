//! JSON export of a definition together with the codelists it uses.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cohort_codelists::CodelistRegistry;
use cohort_model::{Codelist, CodelistRef, OutputColumn, StudyDefinition};
use serde::Serialize;
use tracing::{debug, info};

/// Everything the external engine needs to evaluate one definition.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub study: &'a StudyDefinition,
    pub output_columns: Vec<OutputColumn>,
    /// Rule paths in an order that satisfies every dependency.
    pub evaluation_order: Vec<String>,
    pub codelists: Vec<ResolvedCodelist>,
}

/// A codelist reference materialised from the registry.
#[derive(Debug, Serialize)]
pub struct ResolvedCodelist {
    pub reference: String,
    pub used_by: Vec<String>,
    pub fingerprint: String,
    #[serde(flatten)]
    pub codelist: Codelist,
}

pub fn build_export<'a>(
    study: &'a StudyDefinition,
    registry: &CodelistRegistry,
) -> Result<ExportDocument<'a>> {
    let mut references: BTreeMap<String, (&CodelistRef, Vec<String>)> = BTreeMap::new();
    for usage in study.codelist_refs() {
        references
            .entry(usage.reference.to_string())
            .or_insert_with(|| (usage.reference, Vec::new()))
            .1
            .push(usage.variable);
    }

    let mut codelists = Vec::with_capacity(references.len());
    for (reference, (codelist_ref, used_by)) in references {
        let codelist = registry
            .resolve(codelist_ref)
            .with_context(|| format!("resolve codelist {reference} for {}", used_by.join(", ")))?;
        debug!(%reference, codes = codelist.len(), "resolved codelist");
        codelists.push(ResolvedCodelist {
            reference,
            used_by,
            fingerprint: codelist.fingerprint(),
            codelist,
        });
    }

    let evaluation_order = study
        .evaluation_order()
        .with_context(|| format!("order rules of {}", study.name()))?
        .iter()
        .map(ToString::to_string)
        .collect();

    Ok(ExportDocument {
        study,
        output_columns: study.output_columns(),
        evaluation_order,
        codelists,
    })
}

/// Write the document as pretty JSON to `output`, or stdout.
pub fn write_export(document: &ExportDocument<'_>, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("serialize export")?;
    match output {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("write {}", path.display()))?;
            info!(
                study = document.study.name(),
                path = %path.display(),
                codelists = document.codelists.len(),
                "exported study definition"
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("write export to stdout")?;
        }
    }
    Ok(())
}
