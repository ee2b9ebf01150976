//! Merge report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::EnumMergeWarning;

/// Aggregate counters and diagnostics for one merge run.
#[derive(Debug, Default, Clone)]
pub struct ReportMerge {
    /// Number of source files read.
    pub cnt_files: u64,
    /// Number of target sheets that received data.
    pub cnt_sheets: u64,
    /// Total merged body rows over all target sheets.
    pub cnt_rows: u64,
    /// Rows whose retroactive-months value is non-blank.
    pub cnt_rows_retro: u64,
    /// Output workbook, once written.
    pub path_out: Option<PathBuf>,
    /// Non-fatal warnings in emission order.
    pub warnings: Vec<EnumMergeWarning>,
}

impl ReportMerge {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_files".to_string(), self.cnt_files);
        dict_counts.insert("cnt_sheets".to_string(), self.cnt_sheets);
        dict_counts.insert("cnt_rows".to_string(), self.cnt_rows);
        dict_counts.insert("cnt_rows_retro".to_string(), self.cnt_rows_retro);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        let mut txt = format!(
            "{prefix} files={} sheets={} rows={} retro={} warnings={}",
            dict_counts["cnt_files"],
            dict_counts["cnt_sheets"],
            dict_counts["cnt_rows"],
            dict_counts["cnt_rows_retro"],
            dict_counts["cnt_warnings"]
        );
        if let Some(path_out) = &self.path_out {
            txt.push_str(&format!(" out={}", path_out.display()));
        }
        txt
    }
}

impl fmt::Display for ReportMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MERGE]"))
    }
}

/// Mutable accumulator for merge statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportMergeBuilder {
    /// See [`ReportMerge::cnt_files`].
    pub cnt_files: u64,
    /// See [`ReportMerge::cnt_sheets`].
    pub cnt_sheets: u64,
    /// See [`ReportMerge::cnt_rows`].
    pub cnt_rows: u64,
    /// See [`ReportMerge::cnt_rows_retro`].
    pub cnt_rows_retro: u64,
    /// See [`ReportMerge::warnings`].
    pub warnings: Vec<EnumMergeWarning>,
}

impl ReportMergeBuilder {
    pub fn add_files(&mut self, value: u64) {
        self.cnt_files += value;
    }

    pub fn add_sheet(&mut self) {
        self.cnt_sheets += 1;
    }

    pub fn add_rows(&mut self, value: u64) {
        self.cnt_rows += value;
    }

    pub fn add_rows_retro(&mut self, value: u64) {
        self.cnt_rows_retro += value;
    }

    /// Record a warning and log it.
    ///
    /// Sheet-level conditions are informational and log at `info`; skipped
    /// sources and row-level problems log at `warn`.
    pub fn add_warning(&mut self, warning: EnumMergeWarning) {
        match warning {
            EnumMergeWarning::MissingSheet { .. }
            | EnumMergeWarning::NoSheetData { .. }
            | EnumMergeWarning::IgnoredSheet { .. }
            | EnumMergeWarning::DuplicateSource { .. } => {
                tracing::info!(kind = warning.kind(), "{warning}");
            }
            _ => tracing::warn!(kind = warning.kind(), "{warning}"),
        }
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportMerge {
        ReportMerge {
            cnt_files: self.cnt_files,
            cnt_sheets: self.cnt_sheets,
            cnt_rows: self.cnt_rows,
            cnt_rows_retro: self.cnt_rows_retro,
            path_out: None,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_merge_to_dict_and_format() {
        let mut builder = ReportMergeBuilder::default();
        builder.add_files(2);
        builder.add_sheet();
        builder.add_sheet();
        builder.add_rows(7);
        builder.add_rows_retro(3);
        builder.add_warning(EnumMergeWarning::NoSheetData {
            sheet_name: "중지자".to_string(),
        });
        let mut report = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_files"], 2);
        assert_eq!(dict_counts["cnt_sheets"], 2);
        assert_eq!(dict_counts["cnt_rows"], 7);
        assert_eq!(dict_counts["cnt_rows_retro"], 3);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        assert_eq!(
            report.to_string(),
            "[MERGE] files=2 sheets=2 rows=7 retro=3 warnings=1"
        );

        report.path_out = Some(PathBuf::from("out.xlsx"));
        assert_eq!(
            report.format("[DRY]"),
            "[DRY] files=2 sheets=2 rows=7 retro=3 warnings=1 out=out.xlsx"
        );
    }
}
