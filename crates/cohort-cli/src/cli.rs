//! CLI argument definitions for the study definition tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use cohort_study::{FLOW_CHART_STUDY, PRIMARY_STUDY};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "cohort-def",
    version,
    about = "Validate, list and export the cohort study definitions",
    long_about = "Validate, list and export the cohort study definitions.\n\n\
                  Checks codelist references, windows, categorisations and expectations,\n\
                  exports definitions with resolved codelists as JSON, and counts\n\
                  flow-chart attrition over an extract."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check definitions and codelists for consistency.
    Validate(ValidateArgs),

    /// List the variables of a definition.
    Variables(VariablesArgs),

    /// List the registered codelists with their fingerprints.
    Codelists(CodelistsArgs),

    /// Export a definition with its resolved codelists as JSON.
    Export(ExportArgs),

    /// Count flow-chart attrition over an extract.
    Attrition(AttritionArgs),
}

#[derive(Args)]
pub struct CodelistDirArgs {
    /// Directory holding the codelist CSV files
    /// (default: $COHORT_CODELISTS_DIR, then ./codelists).
    #[arg(long = "codelists-dir", value_name = "DIR")]
    pub codelists_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Definition to validate.
    #[arg(long = "study", value_enum, default_value = "all")]
    pub study: StudySelection,

    #[command(flatten)]
    pub codelists: CodelistDirArgs,
}

#[derive(Parser)]
pub struct VariablesArgs {
    /// Definition to list.
    #[arg(long = "study", value_enum, default_value = "primary")]
    pub study: StudySelection,
}

#[derive(Parser)]
pub struct CodelistsArgs {
    #[command(flatten)]
    pub codelists: CodelistDirArgs,
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Definition to export.
    #[arg(long = "study", value_enum)]
    pub study: StudyArg,

    /// Output file (default: stdout).
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub codelists: CodelistDirArgs,

    /// Export even if validation errors are detected.
    ///
    /// By default, export is blocked when the definition or the codelist
    /// registry has validation errors.
    #[arg(long = "no-fail-on-validation-errors")]
    pub no_fail_on_validation_errors: bool,
}

#[derive(Parser)]
pub struct AttritionArgs {
    /// Extract CSV produced for the flow-chart definition.
    #[arg(value_name = "EXTRACT_CSV")]
    pub extract: PathBuf,
}

/// A single definition.
#[derive(Clone, Copy, ValueEnum)]
pub enum StudyArg {
    Primary,
    #[value(alias = "flow_chart")]
    FlowChart,
}

impl StudyArg {
    pub fn name(self) -> &'static str {
        match self {
            StudyArg::Primary => PRIMARY_STUDY,
            StudyArg::FlowChart => FLOW_CHART_STUDY,
        }
    }
}

/// One definition or every definition.
#[derive(Clone, Copy, ValueEnum)]
pub enum StudySelection {
    Primary,
    #[value(alias = "flow_chart")]
    FlowChart,
    All,
}

impl StudySelection {
    pub fn names(self) -> Vec<&'static str> {
        match self {
            StudySelection::Primary => vec![PRIMARY_STUDY],
            StudySelection::FlowChart => vec![FLOW_CHART_STUDY],
            StudySelection::All => vec![PRIMARY_STUDY, FLOW_CHART_STUDY],
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
