//! `mergekit_merge` v1:
//! Merge workbooks by target sheet name and derive retroactive months.
//!
//! Modules:
//! - `conf`     : sheet/column names and default presets
//! - `spec`     : options, merged result, warnings, errors
//! - `report`   : run report and builder
//! - `sources`  : input path expansion and filtering
//! - `merger`   : workbook reading and sheet concatenation
//! - `retro`    : retroactive-months calculation
//! - `pipeline` : end-to-end merge and write
pub mod conf;
pub mod merger;
pub mod pipeline;
pub mod report;
pub mod retro;
pub mod sources;
pub mod spec;

pub use conf::{TUP_COLS_TEXT, TUP_SHEETS_MERGE_TARGET, derive_default_output_name};
pub use merger::{merge_files, merge_workbooks, read_workbooks};
pub use pipeline::{merge_sources, run_merge, write_merged_result};
pub use report::{ReportMerge, ReportMergeBuilder};
pub use retro::{apply_retro_months, derive_retro_months};
pub use sources::collect_source_files;
pub use spec::{
    EnumMergeWarning, MergeError, SpecMergeOptions, SpecMergedResult, SpecMergedSheet,
    SpecRetroPolicy, SpecYearMonth,
};
