//! Workbook reader: loads every sheet of a spreadsheet file into tables.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::{NaiveDateTime, Timelike};

use crate::spec::{EnumCellValue, SpecTable, SpecWorkbook, XlsxReadError};
use crate::util::derive_header_names;

/// Read all sheets of the workbook at `path`.
///
/// The first row of each sheet's used range becomes the header; completely
/// blank body rows are dropped. Any open/parse failure is an
/// [`XlsxReadError`]; the file handle is released before returning.
pub fn read_workbook(path: impl AsRef<Path>) -> Result<SpecWorkbook, XlsxReadError> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path).map_err(|err| XlsxReadError::Open {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let l_sheet_names = workbook.sheet_names().to_owned();
    let mut workbook_out = SpecWorkbook::new();

    for c_sheet_name in l_sheet_names {
        let derive_sheet_error = |message: String| XlsxReadError::Sheet {
            path: path.to_path_buf(),
            sheet_name: c_sheet_name.clone(),
            message,
        };

        let range = workbook
            .worksheet_range(&c_sheet_name)
            .map_err(|err| derive_sheet_error(err.to_string()))?;
        let table = convert_range_to_table(&range).map_err(derive_sheet_error)?;

        tracing::debug!(
            path = %path.display(),
            sheet = %c_sheet_name,
            rows = table.height(),
            cols = table.width(),
            "read sheet"
        );
        workbook_out
            .insert(c_sheet_name.clone(), table)
            .map_err(derive_sheet_error)?;
    }

    Ok(workbook_out)
}

/// Convert a worksheet range (header row + body) into a table.
pub fn convert_range_to_table(range: &Range<Data>) -> Result<SpecTable, String> {
    let mut iter_rows = range.rows();
    let Some(row_header) = iter_rows.next() else {
        return Ok(SpecTable::default());
    };

    let l_header: Vec<EnumCellValue> = row_header.iter().map(convert_data_to_cell).collect();
    let mut table = SpecTable::new(derive_header_names(&l_header))?;

    for row in iter_rows {
        let l_cells: Vec<EnumCellValue> = row.iter().map(convert_data_to_cell).collect();
        if l_cells.iter().all(EnumCellValue::is_none) {
            continue;
        }
        table.push_row(l_cells)?;
    }

    Ok(table)
}

/// Map one calamine cell to the tagged cell model.
pub fn convert_data_to_cell(value: &Data) -> EnumCellValue {
    match value {
        Data::Empty => EnumCellValue::None,
        Data::String(s) => EnumCellValue::text(s.clone()),
        Data::Float(f) => EnumCellValue::Number(*f),
        Data::Int(i) => EnumCellValue::Number(*i as f64),
        Data::Bool(b) => EnumCellValue::String(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => EnumCellValue::String(format_datetime_text(&ndt)),
            None => EnumCellValue::Number(dt.as_f64()),
        },
        Data::Error(err) => EnumCellValue::String(format!("{err}")),
        other => EnumCellValue::text(other.to_string()),
    }
}

fn format_datetime_text(ndt: &NaiveDateTime) -> String {
    if ndt.time().num_seconds_from_midnight() == 0 {
        ndt.format("%Y-%m-%d").to_string()
    } else {
        ndt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
