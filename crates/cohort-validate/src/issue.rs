//! Validation issue types.
//!
//! Each variant carries only the data its message needs. Rule ids,
//! categories and default severities are fixed per variant.

use serde::Serialize;

/// Issue severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Blocks evaluation and export
    Error,
    /// Should review
    Warning,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
        }
    }
}

/// Area of the definition an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Codelist,
    Window,
    Categorisation,
    Reference,
    Expectation,
    FlowChart,
}

impl Category {
    pub const fn all() -> &'static [Self] {
        &[
            Self::Codelist,
            Self::Window,
            Self::Categorisation,
            Self::Reference,
            Self::Expectation,
            Self::FlowChart,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Codelist => "Codelist",
            Self::Window => "Window",
            Self::Categorisation => "Categorisation",
            Self::Reference => "Reference",
            Self::Expectation => "Expectation",
            Self::FlowChart => "Flow chart",
        }
    }
}

/// Validation issue - each variant carries only its needed data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Issue {
    // Codelist checks
    /// Reference cannot be materialised from the registry
    UnresolvedCodelist {
        variable: String,
        reference: String,
        reason: String,
    },
    /// Filter asks for a category the base codelist never assigns
    FilterCategoryAbsent {
        variable: String,
        codelist: String,
        category: String,
    },
    /// Reference resolves to no codes
    EmptyCodelist { variable: String, reference: String },
    /// Two codelists hold the same codes under different systems
    DuplicateCodelistContent {
        first: String,
        first_system: String,
        second: String,
        second_system: String,
    },
    /// Declared codelist could not be loaded
    CodelistLoadFailed { codelist: String, message: String },

    // Window checks
    /// Lower bound falls after the upper bound
    InvertedWindow {
        variable: String,
        window: String,
        start: String,
        end: String,
    },
    /// A window date cannot be resolved against the index date
    UnresolvableWindow {
        variable: String,
        window: String,
        message: String,
    },

    // Categorisation checks
    /// A condition already holds for a subject with no records
    DefaultUnreachable {
        variable: String,
        default: String,
        label: String,
    },
    /// Condition reads a name that is not one of its sub-variables
    ConditionOutsideScope { variable: String, name: String },
    /// Expected category labels differ from the declared ones
    CategoryLabelsMismatch {
        variable: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    // Reference checks
    /// Population predicate reads an undefined name
    UndefinedPopulationReference { name: String },
    /// A rule reads the population filter
    PopulationReferenced { variable: String },
    /// Rules depend on each other in a loop
    DependencyCycle { cycle: Vec<String> },

    // Expectation checks
    /// Category ratios do not add up to one
    RatiosDoNotSumToOne { variable: String, sum: f64 },
    /// Incidence outside 0..=1
    IncidenceOutOfRange { variable: String, incidence: f64 },
    /// Earliest expected date after the latest
    InvertedDateRange {
        variable: String,
        earliest: String,
        latest: String,
    },

    // Flow-chart checks
    /// Variables are not in attrition order
    FlowChartOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// Population is filtered
    FlowChartPopulation,
}

impl Issue {
    pub fn rule_id(&self) -> &'static str {
        match self {
            Issue::UnresolvedCodelist { .. } => "CD0001",
            Issue::FilterCategoryAbsent { .. } => "CD0002",
            Issue::EmptyCodelist { .. } => "CD0003",
            Issue::DuplicateCodelistContent { .. } => "CD0004",
            Issue::CodelistLoadFailed { .. } => "CD0005",
            Issue::InvertedWindow { .. } => "CD0010",
            Issue::UnresolvableWindow { .. } => "CD0011",
            Issue::DefaultUnreachable { .. } => "CD0020",
            Issue::ConditionOutsideScope { .. } => "CD0021",
            Issue::CategoryLabelsMismatch { .. } => "CD0022",
            Issue::UndefinedPopulationReference { .. } => "CD0030",
            Issue::PopulationReferenced { .. } => "CD0031",
            Issue::DependencyCycle { .. } => "CD0032",
            Issue::RatiosDoNotSumToOne { .. } => "CD0040",
            Issue::IncidenceOutOfRange { .. } => "CD0041",
            Issue::InvertedDateRange { .. } => "CD0042",
            Issue::FlowChartOrder { .. } => "CD0050",
            Issue::FlowChartPopulation => "CD0051",
        }
    }

    /// Rule or codelist the issue is attached to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Issue::UnresolvedCodelist { variable, .. }
            | Issue::FilterCategoryAbsent { variable, .. }
            | Issue::EmptyCodelist { variable, .. }
            | Issue::InvertedWindow { variable, .. }
            | Issue::UnresolvableWindow { variable, .. }
            | Issue::DefaultUnreachable { variable, .. }
            | Issue::ConditionOutsideScope { variable, .. }
            | Issue::CategoryLabelsMismatch { variable, .. }
            | Issue::PopulationReferenced { variable }
            | Issue::RatiosDoNotSumToOne { variable, .. }
            | Issue::IncidenceOutOfRange { variable, .. }
            | Issue::InvertedDateRange { variable, .. } => Some(variable),
            Issue::DuplicateCodelistContent { first, .. } => Some(first),
            Issue::CodelistLoadFailed { codelist, .. } => Some(codelist),
            Issue::UndefinedPopulationReference { .. } => Some("population"),
            Issue::DependencyCycle { .. }
            | Issue::FlowChartOrder { .. }
            | Issue::FlowChartPopulation => None,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Issue::UnresolvedCodelist { .. }
            | Issue::FilterCategoryAbsent { .. }
            | Issue::EmptyCodelist { .. }
            | Issue::DuplicateCodelistContent { .. }
            | Issue::CodelistLoadFailed { .. } => Category::Codelist,
            Issue::InvertedWindow { .. } | Issue::UnresolvableWindow { .. } => Category::Window,
            Issue::DefaultUnreachable { .. }
            | Issue::ConditionOutsideScope { .. }
            | Issue::CategoryLabelsMismatch { .. } => Category::Categorisation,
            Issue::UndefinedPopulationReference { .. }
            | Issue::PopulationReferenced { .. }
            | Issue::DependencyCycle { .. } => Category::Reference,
            Issue::RatiosDoNotSumToOne { .. }
            | Issue::IncidenceOutOfRange { .. }
            | Issue::InvertedDateRange { .. } => Category::Expectation,
            Issue::FlowChartOrder { .. } | Issue::FlowChartPopulation => Category::FlowChart,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Issue::FilterCategoryAbsent { .. }
            | Issue::EmptyCodelist { .. }
            | Issue::DuplicateCodelistContent { .. }
            | Issue::CategoryLabelsMismatch { .. }
            | Issue::InvertedDateRange { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn message(&self) -> String {
        match self {
            Issue::UnresolvedCodelist {
                variable,
                reference,
                reason,
            } => format!("{variable} codelist {reference} does not resolve: {reason}"),
            Issue::FilterCategoryAbsent {
                variable,
                codelist,
                category,
            } => format!("{variable} filters {codelist} on category {category}, which no code carries"),
            Issue::EmptyCodelist {
                variable,
                reference,
            } => format!("{variable} matches against {reference}, which has no codes"),
            Issue::DuplicateCodelistContent {
                first,
                first_system,
                second,
                second_system,
            } => format!(
                "codelists {first} ({first_system}) and {second} ({second_system}) hold identical codes"
            ),
            Issue::CodelistLoadFailed { codelist, message } => {
                format!("codelist {codelist} failed to load: {message}")
            }
            Issue::InvertedWindow {
                variable,
                window,
                start,
                end,
            } => format!("{variable} window '{window}' starts {start} after it ends {end}"),
            Issue::UnresolvableWindow {
                variable,
                window,
                message,
            } => format!("{variable} window '{window}' cannot be resolved: {message}"),
            Issue::DefaultUnreachable {
                variable,
                default,
                label,
            } => format!(
                "{variable} assigns {label} to a subject with no records, so default {default} is unreachable"
            ),
            Issue::ConditionOutsideScope { variable, name } => {
                format!("{variable} condition reads {name}, which is not one of its sub-variables")
            }
            Issue::CategoryLabelsMismatch {
                variable,
                missing,
                unexpected,
            } => {
                let mut parts = Vec::new();
                if !missing.is_empty() {
                    parts.push(format!("no ratio for {}", missing.join(", ")));
                }
                if !unexpected.is_empty() {
                    parts.push(format!("undeclared {}", unexpected.join(", ")));
                }
                format!("{variable} expectation categories differ: {}", parts.join("; "))
            }
            Issue::UndefinedPopulationReference { name } => {
                format!("population predicate reads undefined name {name}")
            }
            Issue::PopulationReferenced { variable } => {
                format!("{variable} reads the population filter")
            }
            Issue::DependencyCycle { cycle } => {
                format!("dependency cycle: {}", cycle.join(" -> "))
            }
            Issue::RatiosDoNotSumToOne { variable, sum } => {
                format!("{variable} category ratios sum to {sum}, not 1")
            }
            Issue::IncidenceOutOfRange {
                variable,
                incidence,
            } => format!("{variable} incidence {incidence} is outside 0 to 1"),
            Issue::InvertedDateRange {
                variable,
                earliest,
                latest,
            } => format!("{variable} expected dates run from {earliest} to an earlier {latest}"),
            Issue::FlowChartOrder { expected, found } => format!(
                "flow-chart order is {}, expected {}",
                found.join(" -> "),
                expected.join(" -> ")
            ),
            Issue::FlowChartPopulation => "flow-chart population must be all subjects".to_string(),
        }
    }
}
