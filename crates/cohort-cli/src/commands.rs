use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};

use cohort_cli::export::{build_export, write_export};
use cohort_codelists::{RegistryLoad, codelists_root, collect_registry, study_codelists};
use cohort_study::{Extract, count_attrition, definition, flow_chart_definition};
use cohort_validate::{ValidationContext, ValidationReport, validate_registry, validate_study};

use crate::cli::{
    AttritionArgs, CodelistDirArgs, CodelistsArgs, ExportArgs, ValidateArgs, VariablesArgs,
};
use crate::summary::{print_attrition, print_codelists, print_reports, print_variables};

/// Load every declared codelist, keeping going past failures.
fn load_codelists(args: &CodelistDirArgs) -> RegistryLoad {
    let dir = codelists_root(args.codelists_dir.as_deref());
    let _span = info_span!("codelists", dir = %dir.display()).entered();
    let load = collect_registry(&dir, &study_codelists());
    if !load.is_complete() {
        warn!(
            failed = load.failures.len(),
            "some codelists could not be loaded"
        );
    }
    load
}

/// Validate the selected definitions. Returns whether any report has errors.
pub fn run_validate(args: &ValidateArgs) -> Result<bool> {
    let load = load_codelists(&args.codelists);
    let ctx = ValidationContext::new().with_registry(&load.registry);

    let mut reports = vec![validate_registry(&load)];
    for name in args.study.names() {
        let study = definition(name).with_context(|| format!("build {name} definition"))?;
        reports.push(validate_study(&study, &ctx));
    }
    print_reports(&reports);
    Ok(reports.iter().any(ValidationReport::has_errors))
}

pub fn run_variables(args: &VariablesArgs) -> Result<()> {
    for name in args.study.names() {
        let study = definition(name).with_context(|| format!("build {name} definition"))?;
        print_variables(&study);
    }
    Ok(())
}

/// List the registry. Returns whether any declaration failed to load.
pub fn run_codelists(args: &CodelistsArgs) -> Result<bool> {
    let load = load_codelists(&args.codelists);
    print_codelists(&load.registry, &load.failures);
    Ok(!load.is_complete())
}

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let name = args.study.name();
    let _span = info_span!("export", study = name).entered();
    let study = definition(name).with_context(|| format!("build {name} definition"))?;
    let load = load_codelists(&args.codelists);
    let ctx = ValidationContext::new().with_registry(&load.registry);
    let reports = [validate_registry(&load), validate_study(&study, &ctx)];

    if reports.iter().any(ValidationReport::has_errors) {
        print_reports(&reports);
        if !args.no_fail_on_validation_errors {
            bail!(
                "export of {name} blocked by validation errors \
                 (use --no-fail-on-validation-errors to export anyway)"
            );
        }
        warn!(study = name, "exporting despite validation errors");
    }

    let document = build_export(&study, &load.registry)?;
    write_export(&document, args.output.as_deref())
}

pub fn run_attrition(args: &AttritionArgs) -> Result<()> {
    let study = flow_chart_definition().context("build flow-chart definition")?;
    let extract = Extract::from_csv(&args.extract, &study)
        .with_context(|| format!("read extract {}", args.extract.display()))?;
    let table = count_attrition(&study, &extract)?;
    info!(
        subjects = table.total,
        remaining = table.final_count(),
        "attrition counted"
    );
    print_attrition(&table);
    Ok(())
}
