use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use cohort_codelists::{CodelistRegistry, LoadFailure};
use cohort_model::{RuleRef, StudyDefinition};
use cohort_study::AttritionTable;
use cohort_validate::{Severity, ValidationReport};

/// Characters of a fingerprint shown in tables.
const FINGERPRINT_WIDTH: usize = 12;

pub fn print_reports(reports: &[ValidationReport]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Subject"),
        header_cell("Errors"),
        header_cell("Warnings"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for report in reports {
        table.add_row(vec![
            subject_cell(&report.subject),
            count_cell(report.error_count(), Color::Red),
            count_cell(report.warning_count(), Color::Yellow),
        ]);
    }
    println!("{table}");
    print_issue_table(reports);
}

fn print_issue_table(reports: &[ValidationReport]) {
    let mut issues: Vec<_> = reports
        .iter()
        .flat_map(|report| report.issues.iter().map(move |issue| (&report.subject, issue)))
        .collect();
    if issues.is_empty() {
        return;
    }
    issues.sort_by_key(|(subject, issue)| (issue.severity(), *subject, issue.rule_id()));

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Subject"),
        header_cell("Severity"),
        header_cell("Rule"),
        header_cell("Category"),
        header_cell("Rule / codelist"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for (subject, issue) in issues {
        table.add_row(vec![
            subject_cell(subject),
            severity_cell(issue.severity()),
            Cell::new(issue.rule_id()),
            Cell::new(issue.category().label()),
            Cell::new(issue.subject().unwrap_or("-")),
            Cell::new(issue.message()),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

pub fn print_variables(study: &StudyDefinition) {
    println!("Study: {} (index date {})", study.name(), study.index_date());
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Kind"),
        header_cell("Shape"),
        header_cell("Selection"),
        header_cell("Window"),
        header_cell("Codelists"),
    ]);
    apply_table_style(&mut table);
    for rule in study.rules() {
        table.add_row(variable_row(&rule));
    }
    println!("{table}");
}

fn variable_row(rule: &RuleRef<'_>) -> Vec<Cell> {
    let variable = rule.variable;
    let name = match rule.parent {
        Some(_) => Cell::new(format!("  -> {}", rule.path())).fg(Color::DarkGrey),
        None => Cell::new(&variable.name)
            .fg(Color::Blue)
            .add_attribute(Attribute::Bold),
    };
    let codelists: Vec<String> = variable
        .codelist_refs()
        .iter()
        .map(ToString::to_string)
        .collect();
    vec![
        name,
        Cell::new(variable.kind()),
        Cell::new(variable.shape()),
        variable
            .selection()
            .map_or_else(|| dim_cell("-"), Cell::new),
        Cell::new(variable.window()),
        if codelists.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(codelists.join("\n"))
        },
    ]
}

pub fn print_codelists(registry: &CodelistRegistry, failures: &[LoadFailure]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Codelist"),
        header_cell("System"),
        header_cell("Codes"),
        header_cell("Categories"),
        header_cell("Source"),
        header_cell("Fingerprint"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for entry in registry.iter() {
        let codelist = &entry.codelist;
        let categories: Vec<&str> = codelist.category_labels().into_iter().collect();
        let fingerprint = codelist.fingerprint();
        table.add_row(vec![
            Cell::new(&entry.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(codelist.system()),
            Cell::new(codelist.len()),
            if categories.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(categories.join(", "))
            },
            Cell::new(&entry.origin),
            dim_cell(&fingerprint[..FINGERPRINT_WIDTH.min(fingerprint.len())]),
        ]);
    }
    println!("{table}");
    if !failures.is_empty() {
        eprintln!("Failed to load:");
        for failure in failures {
            eprintln!("- {}: {}", failure.name, failure.error);
        }
    }
}

pub fn print_attrition(table_data: &AttritionTable) {
    println!("Study: {}", table_data.study);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Step"),
        header_cell("Variable"),
        header_cell("Criterion"),
        header_cell("Excluded"),
        header_cell("Remaining"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    table.add_row(vec![
        dim_cell("-"),
        Cell::new("extract"),
        dim_cell("all subjects"),
        dim_cell("-"),
        Cell::new(table_data.total).add_attribute(Attribute::Bold),
    ]);
    for (position, step) in table_data.steps.iter().enumerate() {
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(&step.variable)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(step.criterion),
            count_cell(step.excluded, Color::Yellow),
            Cell::new(step.remaining),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new("Study population")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        count_cell(table_data.total - table_data.final_count(), Color::Yellow)
            .add_attribute(Attribute::Bold),
        Cell::new(table_data.final_count()).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(180);
    if table.column_count() >= 6 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Fixed(8)),
            ColumnConstraint::UpperBoundary(Width::Fixed(16)),
            ColumnConstraint::UpperBoundary(Width::Percentage(20)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::Error => Cell::new("ERROR").fg(Color::Red),
        Severity::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn subject_cell(subject: &str) -> Cell {
    Cell::new(subject)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
