//! XLSX writer kernel that turns tables into workbook output.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tempfile::Builder;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecSheetWritten, SpecTable, SpecXlsxFormats, SpecXlsxReport, XlsxWriteError,
};
use crate::util::{
    calculate_autofit_width, convert_cell_to_text, estimate_width_len, sanitize_sheet_name,
};

/// Per-sheet call options.
///
/// The header row is always frozen when the table has columns.
#[derive(Debug, Clone, Default)]
pub struct SpecXlsxSheetWriteOptions {
    /// Columns forced to text representation (missing names are ignored).
    pub cols_text: Vec<String>,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

/// Stateful workbook writer.
///
/// Sheets are buffered in memory; [`Self::close`] replaces the destination
/// file in one step, so a failed run never leaves a partial workbook behind.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    formats: SpecXlsxFormats,
    set_sheet_names_existing: BTreeSet<String>,
    report: SpecXlsxReport,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format presets.
    pub fn new(path_file_out: impl Into<PathBuf>, formats: SpecXlsxFormats) -> Self {
        Self {
            path_file_out: path_file_out.into(),
            workbook: Workbook::new(),
            formats,
            set_sheet_names_existing: BTreeSet::new(),
            report: SpecXlsxReport::default(),
            if_closed: false,
        }
    }

    /// Return snapshot of the sheets written so far.
    pub fn report(&self) -> SpecXlsxReport {
        self.report.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), XlsxWriteError> {
        if self.if_closed {
            return Ok(());
        }
        if self.report.sheets.is_empty() {
            // An xlsx file needs at least one worksheet.
            self.workbook.add_worksheet();
        }

        let v_bytes = self.workbook.save_to_buffer()?;
        save_bytes_atomic(&self.path_file_out, &v_bytes)?;
        self.if_closed = true;
        tracing::debug!(path = %self.path_file_out.display(), "workbook saved");
        Ok(())
    }

    /// Write one table as a sheet: header row, then body rows in stored order.
    pub fn write_table(
        &mut self,
        table: &SpecTable,
        sheet_name: &str,
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<(), XlsxWriteError> {
        if self.if_closed {
            return Err(XlsxWriteError::Closed);
        }
        validate_table_limits(table, sheet_name)?;

        let c_sheet_name_valid = sanitize_sheet_name(sheet_name, "_");
        if c_sheet_name_valid != sheet_name {
            self.report.warn(format!(
                "Sheet name {sheet_name:?} sanitized to {c_sheet_name_valid:?}."
            ));
        }
        let c_sheet_name_unique = self.derive_unique_sheet_name(&c_sheet_name_valid);
        if c_sheet_name_unique != c_sheet_name_valid {
            self.report.warn(format!(
                "Sheet name {c_sheet_name_valid:?} already used; renamed to {c_sheet_name_unique:?}."
            ));
        }

        let set_cols_idx_text: BTreeSet<usize> = options
            .cols_text
            .iter()
            .filter_map(|c_name| table.column_index(c_name))
            .collect();

        let fmt_header = derive_rust_xlsx_format(&self.formats.header);
        let fmt_body = derive_rust_xlsx_format(&self.formats.body);
        let fmt_text = derive_rust_xlsx_format(&self.formats.body.merge(&self.formats.text));
        let l_fmt_by_col: Vec<&Format> = (0..table.width())
            .map(|n_idx_col| {
                if set_cols_idx_text.contains(&n_idx_col) {
                    &fmt_text
                } else {
                    &fmt_body
                }
            })
            .collect();

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&c_sheet_name_unique)?;

        let mut l_width_by_col_header = vec![0usize; table.width()];
        let mut l_width_by_col_body = vec![0usize; table.width()];

        for (n_idx_col, c_name) in table.columns().iter().enumerate() {
            worksheet.write_string_with_format(
                0,
                cast_col_num(n_idx_col)?,
                c_name,
                &fmt_header,
            )?;
            l_width_by_col_header[n_idx_col] = c_name.chars().count();
        }

        for (n_idx_row, row) in table.rows().iter().enumerate() {
            for (n_idx_col, value_raw) in row.iter().enumerate() {
                let value = if set_cols_idx_text.contains(&n_idx_col) {
                    convert_cell_to_text(value_raw)
                } else {
                    value_raw.clone()
                };

                l_width_by_col_body[n_idx_col] =
                    usize::max(l_width_by_col_body[n_idx_col], estimate_width_len(&value));

                write_cell_with_format(
                    worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    &value,
                    l_fmt_by_col[n_idx_col],
                )?;
            }
        }

        if table.width() > 0 {
            worksheet.set_freeze_panes(1, 0)?;
        }

        let l_widths = apply_autofit_widths(
            worksheet,
            &l_width_by_col_header,
            &l_width_by_col_body,
            &options.policy_autofit,
        )?;

        self.report.sheets.push(SpecSheetWritten {
            sheet_name: c_sheet_name_unique,
            n_rows: table.height(),
            n_cols: table.width(),
            widths: l_widths,
        });
        Ok(())
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

fn validate_table_limits(table: &SpecTable, sheet_name: &str) -> Result<(), XlsxWriteError> {
    if table.height() + 1 > N_NROWS_EXCEL_MAX {
        return Err(XlsxWriteError::InvalidSheet {
            sheet_name: sheet_name.to_string(),
            message: format!(
                "{} body rows exceed Excel limit of {} rows.",
                table.height(),
                N_NROWS_EXCEL_MAX - 1
            ),
        });
    }
    if table.width() > N_NCOLS_EXCEL_MAX {
        return Err(XlsxWriteError::InvalidSheet {
            sheet_name: sheet_name.to_string(),
            message: format!(
                "{} columns exceed Excel limit of {N_NCOLS_EXCEL_MAX} columns.",
                table.width()
            ),
        });
    }
    Ok(())
}

fn apply_autofit_widths(
    worksheet: &mut Worksheet,
    l_width_by_col_header: &[usize],
    l_width_by_col_body: &[usize],
    policy_autofit: &SpecAutofitCellsPolicy,
) -> Result<Vec<f64>, XlsxWriteError> {
    let mut l_widths = Vec::with_capacity(l_width_by_col_header.len());
    for (n_idx_col, (n_header, n_body)) in l_width_by_col_header
        .iter()
        .zip(l_width_by_col_body)
        .enumerate()
    {
        let n_len_max = match policy_autofit.rule_columns {
            EnumAutofitColumnsRule::None => return Ok(Vec::new()),
            EnumAutofitColumnsRule::Header => *n_header,
            EnumAutofitColumnsRule::Body => *n_body,
            EnumAutofitColumnsRule::All => usize::max(*n_header, *n_body),
        };
        let n_width = calculate_autofit_width(n_len_max, policy_autofit);
        worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width)?;
        l_widths.push(n_width);
    }
    Ok(l_widths)
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), XlsxWriteError> {
    match value {
        EnumCellValue::None => {}
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(
                cast_row_num(row_idx)?,
                cast_col_num(col_idx)?,
                val,
                format,
            )?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(
                cast_row_num(row_idx)?,
                cast_col_num(col_idx)?,
                *val,
                format,
            )?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }

    format
}

/// Write `v_bytes` to a temp file next to `path`, then rename it into place.
///
/// A replaced file keeps its permissions; a new file gets the umask default.
fn save_bytes_atomic(path: &Path, v_bytes: &[u8]) -> Result<(), XlsxWriteError> {
    let map_io = |source: std::io::Error| XlsxWriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    // `Path::parent` is `Some("")` for bare file names.
    let path_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut builder_tmp = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder_tmp.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut file_tmp = builder_tmp.tempfile_in(path_dir).map_err(map_io)?;
    if let Ok(metadata) = fs::metadata(path) {
        file_tmp
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(map_io)?;
    }
    file_tmp.write_all(v_bytes).map_err(map_io)?;
    file_tmp.as_file().sync_all().map_err(map_io)?;
    file_tmp.persist(path).map_err(|err| map_io(err.error))?;
    Ok(())
}

fn cast_row_num(value: usize) -> Result<u32, XlsxWriteError> {
    u32::try_from(value).map_err(|_| XlsxWriteError::InvalidSheet {
        sheet_name: String::new(),
        message: format!("row index overflow: {value}"),
    })
}

fn cast_col_num(value: usize) -> Result<u16, XlsxWriteError> {
    u16::try_from(value).map_err(|_| XlsxWriteError::InvalidSheet {
        sheet_name: String::new(),
        message: format!("column index overflow: {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_xlsx_formats;
    use crate::reader::read_workbook;

    fn derive_status_table() -> SpecTable {
        SpecTable::from_rows(
            vec![
                "성명".to_string(),
                "계좌번호".to_string(),
                "금액".to_string(),
            ],
            vec![
                vec![
                    EnumCellValue::text("홍길동"),
                    EnumCellValue::Number(110_203_040_506.0),
                    EnumCellValue::Number(1500.5),
                ],
                vec![
                    EnumCellValue::text("김철수"),
                    EnumCellValue::text("0012-34"),
                    EnumCellValue::None,
                ],
            ],
        )
        .expect("table")
    }

    #[test]
    fn test_write_table_round_trips_through_reader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        let table = derive_status_table();

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions {
            cols_text: vec!["계좌번호".to_string(), "없는열".to_string()],
            ..Default::default()
        };
        writer.write_table(&table, "현황", &options).expect("write");
        writer.close().expect("close");

        let workbook = read_workbook(&path).expect("read back");
        let table_back = workbook.get("현황").expect("sheet");
        assert_eq!(table_back.columns(), table.columns());
        assert_eq!(
            table_back.cell(0, 1),
            Some(&EnumCellValue::text("110203040506")),
            "account numbers are stored as text"
        );
        assert_eq!(table_back.cell(0, 2), Some(&EnumCellValue::Number(1500.5)));
        assert_eq!(table_back.cell(1, 1), Some(&EnumCellValue::text("0012-34")));
        assert_eq!(table_back.cell(1, 2), Some(&EnumCellValue::None));
    }

    #[test]
    fn test_write_table_reports_sheets_and_keeps_empty_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions::default();
        writer
            .write_table(&derive_status_table(), "현황", &options)
            .expect("write");
        writer
            .write_table(&SpecTable::default(), "중지자", &options)
            .expect("write empty");
        writer.close().expect("close");
        writer.close().expect("close is idempotent");

        let report = writer.report();
        assert_eq!(report.sheets.len(), 2);
        assert_eq!(report.sheets[0].n_rows, 2);
        assert_eq!(report.sheets[1].n_cols, 0);

        let workbook = read_workbook(&path).expect("read back");
        assert_eq!(workbook.sheet_names(), ["현황", "중지자"]);
        assert!(workbook.get("중지자").expect("empty sheet").is_empty());
    }

    #[test]
    fn test_write_table_after_close_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::new(dir.path().join("out.xlsx"), derive_default_xlsx_formats());
        writer.close().expect("close");

        let err = writer
            .write_table(&SpecTable::default(), "a", &SpecXlsxSheetWriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, XlsxWriteError::Closed));
    }

    #[test]
    fn test_duplicate_and_illegal_sheet_names_are_renamed_with_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::new(dir.path().join("out.xlsx"), derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions::default();

        writer.write_table(&SpecTable::default(), "a/b", &options).expect("write");
        writer.write_table(&SpecTable::default(), "a_b", &options).expect("write");

        let report = writer.report();
        assert_eq!(report.sheets[0].sheet_name, "a_b");
        assert_eq!(report.sheets[1].sheet_name, "a_b__2");
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_close_into_missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.xlsx");

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        writer
            .write_table(&derive_status_table(), "현황", &SpecXlsxSheetWriteOptions::default())
            .expect("write");

        let err = writer.close().unwrap_err();
        assert!(matches!(err, XlsxWriteError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_close_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"stale").expect("write stale");

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        writer
            .write_table(&derive_status_table(), "현황", &SpecXlsxSheetWriteOptions::default())
            .expect("write");
        writer.close().expect("close");

        let workbook = read_workbook(&path).expect("read back");
        assert_eq!(workbook.get("현황").expect("sheet").height(), 2);
        let n_entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(n_entries, 1, "temporary file was renamed into place");
    }

    #[cfg(unix)]
    #[test]
    fn test_close_keeps_permissions_of_replaced_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"stale").expect("write stale");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640))
            .expect("chmod");

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        writer
            .write_table(&derive_status_table(), "현황", &SpecXlsxSheetWriteOptions::default())
            .expect("write");
        writer.close().expect("close");

        let n_mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(n_mode & 0o777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_close_new_file_follows_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        let path_plain = dir.path().join("plain.txt");
        std::fs::write(&path_plain, b"x").expect("write plain");
        let n_mode_plain = std::fs::metadata(&path_plain)
            .expect("metadata")
            .permissions()
            .mode();

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        writer
            .write_table(&derive_status_table(), "현황", &SpecXlsxSheetWriteOptions::default())
            .expect("write");
        writer.close().expect("close");

        let n_mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(n_mode & 0o777, n_mode_plain & 0o777);
    }

    #[test]
    fn test_numeric_identifier_columns_are_written_as_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        let table = SpecTable::from_rows(
            vec![
                "성명".to_string(),
                "계좌번호".to_string(),
                "보훈번호".to_string(),
                "금액".to_string(),
            ],
            vec![vec![
                EnumCellValue::text("홍길동"),
                EnumCellValue::Number(110_203_040_506.0),
                EnumCellValue::Number(12_345_678.0),
                EnumCellValue::Number(30000.0),
            ]],
        )
        .expect("table");

        let mut writer = XlsxWriter::new(&path, derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions {
            cols_text: vec!["계좌번호".to_string(), "보훈번호".to_string()],
            ..Default::default()
        };
        writer.write_table(&table, "현황", &options).expect("write");
        writer.close().expect("close");

        let workbook = read_workbook(&path).expect("read back");
        let table_back = workbook.get("현황").expect("sheet");
        assert_eq!(table_back.cell(0, 1), Some(&EnumCellValue::text("110203040506")));
        assert_eq!(table_back.cell(0, 2), Some(&EnumCellValue::text("12345678")));
        assert_eq!(table_back.cell(0, 3), Some(&EnumCellValue::Number(30000.0)));
    }

    #[test]
    fn test_autofit_all_uses_longest_of_header_and_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::new(dir.path().join("out.xlsx"), derive_default_xlsx_formats());
        writer
            .write_table(&derive_status_table(), "현황", &SpecXlsxSheetWriteOptions::default())
            .expect("write");

        // 성명 -> 홍길동 (3), 계좌번호 -> 110203040506 (12), 금액 -> 1500.5 (6); padding 2.
        let report = writer.report();
        assert_eq!(report.sheets[0].widths, vec![5.0 * 1.2, 14.0 * 1.2, 8.0 * 1.2]);
    }

    #[test]
    fn test_autofit_header_rule_ignores_long_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::new(dir.path().join("out.xlsx"), derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                rule_columns: EnumAutofitColumnsRule::Header,
                ..Default::default()
            },
            ..Default::default()
        };
        writer
            .write_table(&derive_status_table(), "현황", &options)
            .expect("write");

        let report = writer.report();
        assert_eq!(report.sheets[0].widths, vec![4.0 * 1.2, 6.0 * 1.2, 4.0 * 1.2]);
    }

    #[test]
    fn test_autofit_none_leaves_widths_unset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::new(dir.path().join("out.xlsx"), derive_default_xlsx_formats());
        let options = SpecXlsxSheetWriteOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                rule_columns: EnumAutofitColumnsRule::None,
                ..Default::default()
            },
            ..Default::default()
        };
        writer
            .write_table(&derive_status_table(), "현황", &options)
            .expect("write");

        assert!(writer.report().sheets[0].widths.is_empty());
    }
}
