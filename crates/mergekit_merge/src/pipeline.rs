//! End-to-end pipeline: collect -> read -> merge -> derive -> write.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use mergekit_io_xlsx::{
    SpecXlsxReport, SpecXlsxSheetWriteOptions, XlsxWriter, derive_default_xlsx_formats,
};

use crate::merger::merge_files;
use crate::report::{ReportMerge, ReportMergeBuilder};
use crate::retro::apply_retro_months;
use crate::sources::collect_source_files;
use crate::spec::{MergeError, SpecMergeOptions, SpecMergedResult};

/// Collect, read and merge `l_inputs`, then apply the retroactive-months
/// calculation with `today` as the month snapshot.
///
/// Returns the display-ready result; nothing is written.
pub fn merge_sources(
    l_inputs: &[PathBuf],
    options: &SpecMergeOptions,
    today: NaiveDate,
) -> Result<(SpecMergedResult, ReportMerge), MergeError> {
    let mut builder = ReportMergeBuilder::default();
    let l_paths = collect_source_files(l_inputs, &options.patterns_source, &mut builder)?;
    tracing::info!(files = l_paths.len(), "collected source files");

    let mut result = merge_files(&l_paths, options, &mut builder)?;
    if let Some(policy) = &options.policy_retro {
        apply_retro_months(&mut result, policy, today, &mut builder)
            .map_err(MergeError::InvalidOption)?;
    }

    Ok((result, builder.build()))
}

/// Write every sheet of `result`, in order, to `path_out`.
///
/// The destination is replaced atomically; on error no output file is left.
pub fn write_merged_result(
    result: &SpecMergedResult,
    path_out: &Path,
    options: &SpecXlsxSheetWriteOptions,
) -> Result<SpecXlsxReport, MergeError> {
    let mut writer = XlsxWriter::new(path_out, derive_default_xlsx_formats());
    for sheet in &result.sheets {
        writer.write_table(&sheet.table, &sheet.sheet_name, options)?;
    }
    writer.close()?;

    let report = writer.report();
    for c_warning in &report.warnings {
        tracing::warn!("{c_warning}");
    }
    tracing::info!(
        path = %path_out.display(),
        sheets = report.sheets.len(),
        "wrote merged workbook"
    );
    Ok(report)
}

/// Full run: [`merge_sources`] followed by [`write_merged_result`].
pub fn run_merge(
    l_inputs: &[PathBuf],
    path_out: &Path,
    options: &SpecMergeOptions,
    today: NaiveDate,
) -> Result<ReportMerge, MergeError> {
    let (result, mut report) = merge_sources(l_inputs, options, today)?;
    write_merged_result(&result, path_out, &options.write_options)?;
    report.path_out = Some(path_out.to_path_buf());
    tracing::info!("{report}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use mergekit_io_xlsx::{EnumCellValue, read_workbook};
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    use super::*;
    use crate::spec::EnumMergeWarning;

    fn write_status_fixture(path: &Path, l_rows: &[[&str; 5]], if_with_stopped: bool) {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("현황").expect("name");
        for (n_idx_col, c_col) in ["성명", "계좌번호", "등록일자", "전입일자", "신규사유"]
            .iter()
            .enumerate()
        {
            worksheet.write_string(0, n_idx_col as u16, *c_col).expect("header");
        }
        for (n_idx_row, row) in l_rows.iter().enumerate() {
            for (n_idx_col, value) in row.iter().enumerate() {
                if n_idx_col == 1 {
                    let n_value: f64 = value.parse().expect("number");
                    worksheet
                        .write_number(n_idx_row as u32 + 1, n_idx_col as u16, n_value)
                        .expect("number cell");
                } else {
                    worksheet
                        .write_string(n_idx_row as u32 + 1, n_idx_col as u16, *value)
                        .expect("cell");
                }
            }
        }
        if if_with_stopped {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name("중지자").expect("name");
            worksheet.write_string(0, 0, "성명").expect("header");
            worksheet.write_string(1, 0, "정지").expect("cell");
        }
        workbook.save(path).expect("save fixture");
    }

    #[test]
    fn test_run_merge_writes_all_target_sheets_with_retro_column() {
        let tmp = tempdir().expect("tempdir");
        let path_a = tmp.path().join("a.xlsx");
        let path_b = tmp.path().join("b.xlsx");
        write_status_fixture(
            &path_a,
            &[["가", "12345678901234", "2024.06.10", "2024.03.01", "전입"]],
            true,
        );
        write_status_fixture(
            &path_b,
            &[
                ["나", "42", "2024.06.11", "2024.03.01", "출생"],
                ["다", "7", "2024.05.01", "2024.03.01", "출생"],
            ],
            false,
        );
        let path_out = tmp.path().join("out.xlsx");
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).expect("date");

        let report = run_merge(
            &[path_a, path_b.clone()],
            &path_out,
            &SpecMergeOptions::default(),
            today,
        )
        .expect("run");

        assert_eq!(report.cnt_files, 2);
        assert_eq!(report.cnt_sheets, 2);
        assert_eq!(report.cnt_rows, 4);
        assert_eq!(report.cnt_rows_retro, 2);
        assert_eq!(report.path_out.as_deref(), Some(path_out.as_path()));
        assert!(report.warnings.contains(&EnumMergeWarning::MissingSheet {
            path: path_b,
            sheet_name: "중지자".to_string(),
        }));
        assert!(report.warnings.contains(&EnumMergeWarning::NoSheetData {
            sheet_name: "신규자".to_string(),
        }));

        let workbook = read_workbook(&path_out).expect("read back");
        assert_eq!(workbook.sheet_names(), ["현황", "신규자", "중지자"]);

        let status = workbook.get("현황").expect("status");
        assert_eq!(
            status.columns(),
            ["성명", "계좌번호", "등록일자", "전입일자", "신규사유", "소급필요"]
        );
        assert_eq!(status.height(), 3);
        assert_eq!(
            status.cell_by_name(0, "계좌번호"),
            Some(&EnumCellValue::text("12345678901234")),
            "force-text column is stored as text"
        );
        let l_retro: Vec<String> = (0..3)
            .map(|i| status.cell_by_name(i, "소급필요").expect("cell").to_display_text())
            .collect();
        assert_eq!(l_retro, ["2개월", "3개월", ""]);

        assert!(workbook.get("신규자").expect("new").is_empty());
        assert_eq!(workbook.get("중지자").expect("stopped").height(), 1);
    }

    #[test]
    fn test_write_merged_result_round_trips_contents() {
        let tmp = tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.xlsx");
        write_status_fixture(
            &path_src,
            &[
                ["가", "1", "2024.06.10", "2024.03.01", "전입"],
                ["나", "2", "2024.01.10", "2023.03.01", "출생"],
            ],
            true,
        );
        let options = SpecMergeOptions {
            policy_retro: None,
            ..SpecMergeOptions::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).expect("date");
        let (result, report) =
            merge_sources(std::slice::from_ref(&path_src), &options, today).expect("merge");
        assert_eq!(report.cnt_rows_retro, 0);

        let path_out = tmp.path().join("round.xlsx");
        write_merged_result(&result, &path_out, &SpecXlsxSheetWriteOptions::default())
            .expect("write");
        let (result_back, _) =
            merge_sources(std::slice::from_ref(&path_out), &options, today).expect("reread");

        for sheet in &result.sheets {
            let sheet_back = result_back.get(&sheet.sheet_name).expect("sheet");
            assert_eq!(sheet_back.table, sheet.table, "sheet {}", sheet.sheet_name);
        }
    }

    #[test]
    fn test_merge_sources_without_status_target_skips_retro() {
        let tmp = tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.xlsx");
        write_status_fixture(
            &path_src,
            &[["가", "1", "2024.06.10", "2024.03.01", "전입"]],
            true,
        );
        let options = SpecMergeOptions {
            sheet_names: vec!["신규자".to_string(), "중지자".to_string()],
            ..SpecMergeOptions::default()
        };
        assert!(options.policy_retro.is_some());
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).expect("date");

        let (result, report) =
            merge_sources(std::slice::from_ref(&path_src), &options, today).expect("merge");
        assert_eq!(result.sheet_names(), ["신규자", "중지자"]);
        assert!(result.get("현황").is_none());
        assert_eq!(result.get("중지자").expect("stopped").table.height(), 1);
        assert_eq!(report.cnt_rows_retro, 0);
    }

    #[test]
    fn test_run_merge_read_error_writes_nothing() {
        let tmp = tempdir().expect("tempdir");
        let path_bad = tmp.path().join("bad.xlsx");
        std::fs::write(&path_bad, b"broken").expect("write");
        let path_out = tmp.path().join("out.xlsx");
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).expect("date");

        let res = run_merge(&[path_bad], &path_out, &SpecMergeOptions::default(), today);
        assert!(matches!(res, Err(MergeError::Read(_))));
        assert!(!path_out.exists());
    }

    #[test]
    fn test_run_merge_unwritable_destination_is_write_error() {
        let tmp = tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.xlsx");
        write_status_fixture(
            &path_src,
            &[["가", "1", "2024.06.10", "2024.03.01", "전입"]],
            false,
        );
        let path_out = tmp.path().join("missing_dir").join("out.xlsx");
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).expect("date");

        let res = run_merge(&[path_src], &path_out, &SpecMergeOptions::default(), today);
        assert!(matches!(res, Err(MergeError::Write(_))));
        assert!(!path_out.exists());
    }
}
