//! Merge specification models, warnings, and top-level error types.

use std::fmt;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use mergekit_io_xlsx::{
    SpecTable, SpecXlsxSheetWriteOptions, XlsxReadError, XlsxWriteError,
};
use thiserror::Error;

use crate::conf::{
    C_COL_DATE_MOVE_IN, C_COL_DATE_REGISTRATION, C_COL_REASON_NEW, C_COL_RETRO_MONTHS,
    C_DATE_FORMAT, C_REASON_MOVE_IN, C_RETRO_MONTHS_SUFFIX, C_SHEET_STATUS, TUP_COLS_TEXT,
    TUP_PATTERNS_SOURCE, TUP_SHEETS_MERGE_TARGET,
};

////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Calendar month snapshot used by the retroactive-months calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecYearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month in `1..=12`.
    pub month: u32,
}

impl SpecYearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(&self, earlier: SpecYearMonth) -> i64 {
        i64::from(self.year - earlier.year) * 12 + i64::from(self.month) - i64::from(earlier.month)
    }
}

impl fmt::Display for SpecYearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Column names and constants of the retroactive-months calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRetroPolicy {
    /// Sheet the derived column is added to.
    pub sheet_name: String,
    /// Registration date column (`YYYY.MM.DD`).
    pub col_date_registration: String,
    /// Move-in date column (`YYYY.MM.DD`).
    pub col_date_move_in: String,
    /// New-entrant reason column.
    pub col_reason: String,
    /// Reason value meaning "moved in"; such rows count one month less.
    pub reason_move_in: String,
    /// Output column name.
    pub col_output: String,
    /// Suffix appended to the month count.
    pub suffix_months: String,
    /// chrono format string of both date columns.
    pub date_format: String,
}

impl Default for SpecRetroPolicy {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_STATUS.to_string(),
            col_date_registration: C_COL_DATE_REGISTRATION.to_string(),
            col_date_move_in: C_COL_DATE_MOVE_IN.to_string(),
            col_reason: C_COL_REASON_NEW.to_string(),
            reason_move_in: C_REASON_MOVE_IN.to_string(),
            col_output: C_COL_RETRO_MONTHS.to_string(),
            suffix_months: C_RETRO_MONTHS_SUFFIX.to_string(),
            date_format: C_DATE_FORMAT.to_string(),
        }
    }
}

/// Input options for a merge run.
#[derive(Debug, Clone)]
pub struct SpecMergeOptions {
    /// Merge target set, in output order.
    pub sheet_names: Vec<String>,
    /// Glob patterns (file name, case-insensitive) of accepted sources.
    pub patterns_source: Vec<String>,
    /// Maximum worker threads for the read stage; `None` reads serially.
    pub num_workers_max: Option<usize>,
    /// Retroactive-months calculation; `None` disables it.
    pub policy_retro: Option<SpecRetroPolicy>,
    /// Per-sheet writer options (force-text columns, autofit).
    pub write_options: SpecXlsxSheetWriteOptions,
}

impl Default for SpecMergeOptions {
    fn default() -> Self {
        Self {
            sheet_names: TUP_SHEETS_MERGE_TARGET.iter().map(|s| s.to_string()).collect(),
            patterns_source: TUP_PATTERNS_SOURCE.iter().map(|s| s.to_string()).collect(),
            num_workers_max: None,
            policy_retro: Some(SpecRetroPolicy::default()),
            write_options: SpecXlsxSheetWriteOptions {
                cols_text: TUP_COLS_TEXT.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergedResult

/// One target sheet of the merged result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecMergedSheet {
    /// Target sheet name.
    pub sheet_name: String,
    /// Row-wise concatenation of every contributing source table.
    pub table: SpecTable,
    /// Source files that contained this sheet, in merge order.
    pub sources: Vec<PathBuf>,
}

impl SpecMergedSheet {
    /// `false` when no source file contained this sheet.
    pub fn has_data(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Merged workbook restricted to the target set, in target order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecMergedResult {
    /// One entry per target sheet.
    pub sheets: Vec<SpecMergedSheet>,
}

impl SpecMergedResult {
    pub fn get(&self, sheet_name: &str) -> Option<&SpecMergedSheet> {
        self.sheets.iter().find(|sheet| sheet.sheet_name == sheet_name)
    }

    pub fn get_mut(&mut self, sheet_name: &str) -> Option<&mut SpecMergedSheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.sheet_name == sheet_name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.sheet_name.as_str()).collect()
    }

    /// Total body rows over all sheets.
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.table.height()).sum()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WarningsAndErrors

/// Non-fatal condition collected during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumMergeWarning {
    /// A source file lacks a target sheet; it contributes zero rows.
    MissingSheet {
        /// Source file.
        path: PathBuf,
        /// Missing target sheet.
        sheet_name: String,
    },
    /// No source file contained the target sheet.
    NoSheetData {
        /// Target sheet written empty.
        sheet_name: String,
    },
    /// A source sheet outside the target set was ignored.
    IgnoredSheet {
        /// Source file.
        path: PathBuf,
        /// Ignored sheet.
        sheet_name: String,
    },
    /// A source path was given more than once.
    DuplicateSource {
        /// Repeated path.
        path: PathBuf,
    },
    /// A file did not match the accepted source patterns.
    UnsupportedSource {
        /// Skipped path.
        path: PathBuf,
    },
    /// A row's dates could not be parsed; its derived value is blank.
    DateParse {
        /// Sheet of the row.
        sheet_name: String,
        /// Zero-based body row index.
        row_idx: usize,
        /// Parse failure detail.
        message: String,
    },
    /// A column needed by the calculation is missing.
    MissingColumn {
        /// Sheet missing the column.
        sheet_name: String,
        /// Missing column name.
        col_name: String,
    },
}

impl EnumMergeWarning {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSheet { .. } => "missing_sheet",
            Self::NoSheetData { .. } => "no_sheet_data",
            Self::IgnoredSheet { .. } => "ignored_sheet",
            Self::DuplicateSource { .. } => "duplicate_source",
            Self::UnsupportedSource { .. } => "unsupported_source",
            Self::DateParse { .. } => "date_parse",
            Self::MissingColumn { .. } => "missing_column",
        }
    }
}

impl fmt::Display for EnumMergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSheet { path, sheet_name } => {
                write!(f, "File {} has no sheet {sheet_name:?}.", path.display())
            }
            Self::NoSheetData { sheet_name } => {
                write!(f, "No data to merge for sheet {sheet_name:?}.")
            }
            Self::IgnoredSheet { path, sheet_name } => write!(
                f,
                "Sheet {sheet_name:?} in {} is not a merge target; ignored.",
                path.display()
            ),
            Self::DuplicateSource { path } => {
                write!(f, "File {} was already added.", path.display())
            }
            Self::UnsupportedSource { path } => {
                write!(f, "File {} is not a spreadsheet; skipped.", path.display())
            }
            Self::DateParse {
                sheet_name,
                row_idx,
                message,
            } => write!(f, "Sheet {sheet_name:?} row {row_idx}: {message}"),
            Self::MissingColumn {
                sheet_name,
                col_name,
            } => write!(f, "Sheet {sheet_name:?} has no column {col_name:?}."),
        }
    }
}

/// "Top-level call failed" errors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A source could not be read; partial merges are never returned.
    #[error(transparent)]
    Read(#[from] XlsxReadError),
    /// The output workbook could not be written.
    #[error(transparent)]
    Write(#[from] XlsxWriteError),
    /// Invalid source pattern.
    #[error("Invalid source pattern: {0}")]
    InvalidPattern(String),
    /// Invalid option combination or value.
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_months_since_crosses_year() {
        let ym_current = SpecYearMonth { year: 2025, month: 2 };
        let ym_move_in = SpecYearMonth { year: 2024, month: 11 };
        assert_eq!(ym_current.months_since(ym_move_in), 3);
        assert_eq!(ym_move_in.months_since(ym_current), -3);
        assert_eq!(ym_current.to_string(), "2025-02");
    }

    #[test]
    fn test_merged_sheet_distinguishes_no_data() {
        let sheet = SpecMergedSheet {
            sheet_name: "중지자".to_string(),
            ..Default::default()
        };
        assert!(!sheet.has_data());
        assert!(sheet.table.is_empty());
    }

    #[test]
    fn test_warning_display_and_kind() {
        let warning = EnumMergeWarning::MissingSheet {
            path: PathBuf::from("a.xlsx"),
            sheet_name: "신규자".to_string(),
        };
        assert_eq!(warning.kind(), "missing_sheet");
        assert_eq!(warning.to_string(), "File a.xlsx has no sheet \"신규자\".");
    }
}
