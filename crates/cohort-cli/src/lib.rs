//! Library components of the `cohort-def` command-line tool.

pub mod export;
pub mod logging;
