//! Polars bridge: hands merged tables to display shells as DataFrames / IPC.

use polars::prelude::{
    AnyValue, Column, DataFrame, IpcWriter, PolarsResult, SerWriter,
};

use crate::spec::{EnumCellValue, SpecTable};

/// Convert a table into a DataFrame.
///
/// A column whose non-blank cells are all numbers becomes `Float64`; any other
/// column becomes `String` with numbers rendered as text. Blank cells are null.
pub fn convert_table_to_dataframe(table: &SpecTable) -> PolarsResult<DataFrame> {
    let mut l_cols = Vec::with_capacity(table.width());

    for (n_idx_col, c_name) in table.columns().iter().enumerate() {
        let if_is_numeric_col = table.rows().iter().all(|row| {
            matches!(
                row[n_idx_col],
                EnumCellValue::None | EnumCellValue::Number(_)
            )
        });

        let col = if if_is_numeric_col {
            let l_values: Vec<Option<f64>> = table
                .rows()
                .iter()
                .map(|row| match row[n_idx_col] {
                    EnumCellValue::Number(n) => Some(n),
                    _ => None,
                })
                .collect();
            Column::new(c_name.as_str().into(), l_values)
        } else {
            let l_values: Vec<Option<String>> = table
                .rows()
                .iter()
                .map(|row| match &row[n_idx_col] {
                    EnumCellValue::None => None,
                    value => Some(value.to_display_text()),
                })
                .collect();
            Column::new(c_name.as_str().into(), l_values)
        };
        l_cols.push(col);
    }

    DataFrame::new(l_cols)
}

/// Serialize a table as Arrow IPC bytes (readable with `polars.read_ipc`).
pub fn derive_ipc_bytes_from_table(table: &SpecTable) -> PolarsResult<Vec<u8>> {
    let mut df = convert_table_to_dataframe(table)?;
    let mut v_buf = Vec::new();
    IpcWriter::new(&mut v_buf).finish(&mut df)?;
    Ok(v_buf)
}

/// Convert a DataFrame back into a table.
pub fn convert_dataframe_to_table(df: &DataFrame) -> Result<SpecTable, String> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let mut table = SpecTable::new(l_colnames)?;
    let l_cols = df.get_columns();

    for n_idx_row in 0..df.height() {
        let mut l_cells = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(n_idx_row)
                .map_err(|err| format!("Failed to access cell value: {err}"))?;
            l_cells.push(derive_cell_value_from_any_value(value));
        }
        table.push_row(l_cells)?;
    }

    Ok(table)
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::text(val),
        AnyValue::StringOwned(val) => EnumCellValue::text(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::text(value.to_string()),
    }
}
