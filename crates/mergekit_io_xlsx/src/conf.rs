//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecXlsxFormats};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel column width upper bound (character units).
pub const N_WIDTH_EXCEL_COLUMN_MAX: f64 = 255.0;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Excel number format code that stores cells as text.
pub const C_NUM_FORMAT_TEXT: &str = "@";
/// Header name prefix given to blank header cells.
pub const C_HEADER_UNNAMED_PREFIX: &str = "Unnamed: ";

/// Build default cell formats used by [`crate::writer::XlsxWriter`].
pub fn derive_default_xlsx_formats() -> SpecXlsxFormats {
    SpecXlsxFormats {
        header: SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        },
        body: SpecCellFormat::default(),
        text: SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_TEXT.to_string()),
            ..Default::default()
        },
    }
}
