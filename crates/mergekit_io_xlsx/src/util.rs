//! Stateless helper utilities shared by the reader and writer.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{
    C_HEADER_UNNAMED_PREFIX, N_LEN_EXCEL_SHEET_NAME_MAX, N_WIDTH_EXCEL_COLUMN_MAX,
    TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, SpecAutofitCellsPolicy};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Render a number the way a spreadsheet shows it in General format.
///
/// Integral values drop the fractional part (`1234.0` -> `"1234"`).
pub fn format_number_text(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        return format!("{}", x as i64);
    }
    x.to_string()
}

/// Coerce a cell to its text representation (used for identifier columns).
///
/// Numbers become plain decimal text so leading zeros / long integers are not
/// reformatted by spreadsheet applications.
pub fn convert_cell_to_text(value: &EnumCellValue) -> EnumCellValue {
    match value {
        EnumCellValue::None => EnumCellValue::None,
        EnumCellValue::String(s) => EnumCellValue::String(s.clone()),
        EnumCellValue::Number(n) => EnumCellValue::String(format_number_text(*n)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Turn raw header cells into unique column names.
///
/// Blank cells become `Unnamed: {idx}`; repeated names get `.1`, `.2`, ...
pub fn derive_header_names(header_cells: &[EnumCellValue]) -> Vec<String> {
    let mut set_names_seen: BTreeSet<String> = BTreeSet::new();
    let mut dict_dup_count: BTreeMap<String, usize> = BTreeMap::new();
    let mut l_names = Vec::with_capacity(header_cells.len());

    for (n_idx, value) in header_cells.iter().enumerate() {
        let c_base = match value {
            EnumCellValue::None => format!("{C_HEADER_UNNAMED_PREFIX}{n_idx}"),
            _ => value.to_display_text(),
        };

        let mut c_name = c_base.clone();
        while set_names_seen.contains(&c_name) {
            let n_dup = dict_dup_count.entry(c_base.clone()).or_insert(0);
            *n_dup += 1;
            c_name = format!("{c_base}.{n_dup}");
        }

        set_names_seen.insert(c_name.clone());
        l_names.push(c_name);
    }

    l_names
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Printable length of a cell, counted in characters.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => s.chars().count(),
        EnumCellValue::Number(n) => format_number_text(*n).chars().count(),
    }
}

/// Final column width for the longest printable length seen in a column.
pub fn calculate_autofit_width(n_len_max: usize, policy: &SpecAutofitCellsPolicy) -> f64 {
    let n_width = (n_len_max + policy.width_cell_padding) as f64 * policy.width_cell_scale;
    n_width.min(N_WIDTH_EXCEL_COLUMN_MAX)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
