//! Retroactive-months calculation on the merged "status" sheet.

use chrono::NaiveDate;
use mergekit_io_xlsx::{EnumCellValue, SpecTable, format_number_text};

use crate::report::ReportMergeBuilder;
use crate::spec::{EnumMergeWarning, SpecMergedResult, SpecRetroPolicy, SpecYearMonth};

/// Outcome of parsing one date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDateCell {
    /// Blank cell; the row has nothing to derive.
    Blank,
    /// Parsed calendar date.
    Date(NaiveDate),
}

/// Parse a `YYYY.MM.DD`-style date cell.
///
/// Numbers and text in any other shape are errors.
pub fn parse_date_cell(value: &EnumCellValue, c_date_format: &str) -> Result<EnumDateCell, String> {
    match value {
        EnumCellValue::None => Ok(EnumDateCell::Blank),
        EnumCellValue::String(txt) => NaiveDate::parse_from_str(txt, c_date_format)
            .map(EnumDateCell::Date)
            .map_err(|e| format!("{txt:?} does not match {c_date_format:?} ({e})")),
        EnumCellValue::Number(n) => Err(format!(
            "{} is a number, expected a {c_date_format:?} date",
            format_number_text(*n)
        )),
    }
}

/// Derive the retroactive-months value of one row.
///
/// Pure: the result depends only on the three cells, `ym_current` and
/// `policy`. `Err` carries the date parse failure; callers map it to `""`.
pub fn derive_retro_months(
    date_registration: &EnumCellValue,
    date_move_in: &EnumCellValue,
    reason: &EnumCellValue,
    ym_current: SpecYearMonth,
    policy: &SpecRetroPolicy,
) -> Result<String, String> {
    let date_registration = parse_date_cell(date_registration, &policy.date_format)
        .map_err(|e| format!("{}: {e}", policy.col_date_registration))?;
    let date_move_in = parse_date_cell(date_move_in, &policy.date_format)
        .map_err(|e| format!("{}: {e}", policy.col_date_move_in))?;

    let (EnumDateCell::Date(date_registration), EnumDateCell::Date(date_move_in)) =
        (date_registration, date_move_in)
    else {
        return Ok(String::new());
    };

    if SpecYearMonth::from_date(date_registration) != ym_current {
        return Ok(String::new());
    }

    let mut n_months_diff = ym_current.months_since(SpecYearMonth::from_date(date_move_in));
    if reason.as_str() == Some(policy.reason_move_in.as_str()) {
        n_months_diff -= 1;
    }

    if n_months_diff > 0 {
        Ok(format!("{n_months_diff}{}", policy.suffix_months))
    } else {
        Ok(String::new())
    }
}

/// Add (or overwrite) the output column on `table`.
///
/// Returns the number of rows with a non-blank value. Parse failures blank the
/// row and are collected as `DateParse` warnings; a missing date column blanks
/// every row with one `MissingColumn` warning. A missing reason column only
/// disables the move-in adjustment.
pub fn apply_retro_months_to_table(
    table: &mut SpecTable,
    sheet_name: &str,
    ym_current: SpecYearMonth,
    policy: &SpecRetroPolicy,
    builder: &mut ReportMergeBuilder,
) -> Result<usize, String> {
    let mut derive_col_index = |col_name: &str| {
        let n_idx = table.column_index(col_name);
        if n_idx.is_none() {
            builder.add_warning(EnumMergeWarning::MissingColumn {
                sheet_name: sheet_name.to_string(),
                col_name: col_name.to_string(),
            });
        }
        n_idx
    };
    let n_idx_registration = derive_col_index(&policy.col_date_registration);
    let n_idx_move_in = derive_col_index(&policy.col_date_move_in);
    let n_idx_reason = derive_col_index(&policy.col_reason);

    let l_values: Vec<EnumCellValue> = match (n_idx_registration, n_idx_move_in) {
        (Some(n_idx_registration), Some(n_idx_move_in)) => table
            .rows()
            .iter()
            .enumerate()
            .map(|(n_idx_row, row)| {
                let reason = n_idx_reason.map_or(&EnumCellValue::None, |n_idx| &row[n_idx]);
                match derive_retro_months(
                    &row[n_idx_registration],
                    &row[n_idx_move_in],
                    reason,
                    ym_current,
                    policy,
                ) {
                    Ok(value) => EnumCellValue::text(value),
                    Err(message) => {
                        builder.add_warning(EnumMergeWarning::DateParse {
                            sheet_name: sheet_name.to_string(),
                            row_idx: n_idx_row,
                            message,
                        });
                        EnumCellValue::None
                    }
                }
            })
            .collect(),
        _ => vec![EnumCellValue::None; table.height()],
    };

    let n_rows_derived = l_values.iter().filter(|value| !value.is_none()).count();
    table.set_column(&policy.col_output, l_values)?;
    Ok(n_rows_derived)
}

/// Apply the calculation to the policy's sheet of `result`.
///
/// `today` is the run's single date snapshot. A sheet without data is left
/// untouched.
pub fn apply_retro_months(
    result: &mut SpecMergedResult,
    policy: &SpecRetroPolicy,
    today: NaiveDate,
    builder: &mut ReportMergeBuilder,
) -> Result<usize, String> {
    let Some(sheet) = result.get_mut(&policy.sheet_name) else {
        return Ok(0);
    };
    if !sheet.has_data() {
        return Ok(0);
    }

    let ym_current = SpecYearMonth::from_date(today);
    let n_rows_derived =
        apply_retro_months_to_table(&mut sheet.table, &sheet.sheet_name, ym_current, policy, builder)?;
    builder.add_rows_retro(n_rows_derived as u64);

    tracing::info!(
        sheet = %sheet.sheet_name,
        month = %ym_current,
        rows = sheet.table.height(),
        derived = n_rows_derived,
        "derived retroactive months"
    );
    Ok(n_rows_derived)
}
