//! `mergekit_io_xlsx` v1:
//! Rust-side spreadsheet IO kernel.
//!
//! Modules:
//! - `conf`   : constants and default presets
//! - `spec`   : cell/table/workbook models, options, reports, errors
//! - `util`   : pure helper functions
//! - `reader` : calamine-backed workbook reader
//! - `writer` : rust_xlsxwriter-backed workbook writer
//! - `frame`  : polars bridge for display shells
pub mod conf;
pub mod frame;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
    derive_default_xlsx_formats,
};
pub use frame::{convert_dataframe_to_table, convert_table_to_dataframe, derive_ipc_bytes_from_table};
pub use reader::read_workbook;
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat, SpecSheet,
    SpecSheetWritten, SpecTable, SpecWorkbook, SpecXlsxFormats, SpecXlsxReport, XlsxReadError,
    XlsxWriteError,
};
pub use util::{convert_cell_to_text, format_number_text, sanitize_sheet_name};
pub use writer::{SpecXlsxSheetWriteOptions, XlsxWriter};
