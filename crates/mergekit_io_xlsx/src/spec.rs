//! Shared table, workbook, format, and report models.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::{format_number_text, validate_unique_columns};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Loosely typed cell value as read from, or written to, a worksheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// Build a text cell; empty text is normalized to [`EnumCellValue::None`].
    pub fn text(value: impl Into<String>) -> Self {
        let c_value = value.into();
        if c_value.is_empty() {
            Self::None
        } else {
            Self::String(c_value)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow text content, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Printable representation (blank for missing).
    pub fn to_display_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) => format_number_text(*n),
        }
    }
}

impl fmt::Display for EnumCellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_text())
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Table

/// Column-named, row-ordered table.
///
/// Every row holds exactly one cell per column and column names are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    columns: Vec<String>,
    rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTable {
    /// Create an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Result<Self, String> {
        validate_unique_columns(&columns)?;
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table from header and body rows.
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<EnumCellValue>>,
    ) -> Result<Self, String> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<EnumCellValue>] {
        &self.rows
    }

    /// Number of body rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// `true` when the table has neither columns nor rows.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c_name| c_name == name)
    }

    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&EnumCellValue> {
        self.rows.get(row_idx).and_then(|row| row.get(col_idx))
    }

    /// Cell lookup by column name.
    pub fn cell_by_name(&self, row_idx: usize, col_name: &str) -> Option<&EnumCellValue> {
        self.column_index(col_name)
            .and_then(|col_idx| self.cell(row_idx, col_idx))
    }

    /// Append one body row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<EnumCellValue>) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "Row width {} does not match column count {}.",
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of `other` below this table.
    ///
    /// Columns are unioned in first-appearance order; cells for columns a side
    /// does not have are filled with [`EnumCellValue::None`].
    pub fn append(&mut self, other: &SpecTable) {
        let l_idx_target: Vec<usize> = other
            .columns
            .iter()
            .map(|c_name| match self.column_index(c_name) {
                Some(n_idx) => n_idx,
                None => {
                    self.columns.push(c_name.clone());
                    self.columns.len() - 1
                }
            })
            .collect();

        let n_width = self.columns.len();
        for row in &mut self.rows {
            row.resize(n_width, EnumCellValue::None);
        }

        self.rows.reserve(other.rows.len());
        for row_other in &other.rows {
            let mut row = vec![EnumCellValue::None; n_width];
            for (value, n_idx) in row_other.iter().zip(&l_idx_target) {
                row[*n_idx] = value.clone();
            }
            self.rows.push(row);
        }
    }

    /// Replace the named column's cells, appending the column if absent.
    pub fn set_column(&mut self, name: &str, values: Vec<EnumCellValue>) -> Result<(), String> {
        if values.len() != self.rows.len() {
            return Err(format!(
                "Column {name:?} has {} values for {} rows.",
                values.len(),
                self.rows.len()
            ));
        }

        match self.column_index(name) {
            Some(n_idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[n_idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }
}

/// One named sheet of a workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheet {
    /// Sheet name as stored in the workbook.
    pub name: String,
    /// Sheet content.
    pub table: SpecTable,
}

/// Ordered collection of uniquely named sheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbook {
    sheets: Vec<SpecSheet>,
}

impl SpecWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet; rejects a name already present.
    pub fn insert(&mut self, name: impl Into<String>, table: SpecTable) -> Result<(), String> {
        let c_name = name.into();
        if self.get(&c_name).is_some() {
            return Err(format!("Duplicate sheet name: {c_name:?}"));
        }
        self.sheets.push(SpecSheet {
            name: c_name,
            table,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SpecTable> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .map(|sheet| &sheet.table)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[SpecSheet] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Bold style.
    pub bold: Option<bool>,
    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            bold: other.bold.or(self.bold),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

/// Named format presets used by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxFormats {
    /// Header row format.
    pub header: SpecCellFormat,
    /// Default body cell format.
    pub body: SpecCellFormat,
    /// Patch applied to body cells of force-text columns.
    pub text: SpecCellFormat,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy: `width = (max_len + width_cell_padding) * width_cell_scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Width padding added to the longest printable length.
    pub width_cell_padding: usize,
    /// Multiplier applied after padding.
    pub width_cell_scale: f64,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            width_cell_padding: 2,
            width_cell_scale: 1.2,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One sheet emitted by a write call.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetWritten {
    /// Actual sheet name in workbook.
    pub sheet_name: String,
    /// Body rows written.
    pub n_rows: usize,
    /// Columns written.
    pub n_cols: usize,
    /// Column widths applied by autofit; empty when autofit is disabled.
    pub widths: Vec<f64>,
}

/// Per-writer report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecXlsxReport {
    /// Sheets produced by the writer, in workbook order.
    pub sheets: Vec<SpecSheetWritten>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Workbook could not be opened or parsed.
#[derive(Debug, Error)]
pub enum XlsxReadError {
    /// File missing, unreadable, or not a recognized spreadsheet format.
    #[error("Failed to open workbook {}: {message}", path.display())]
    Open {
        /// Source workbook path.
        path: PathBuf,
        /// Underlying reader error text.
        message: String,
    },
    /// One sheet of an opened workbook failed to parse.
    #[error("Failed to read sheet {sheet_name:?} in {}: {message}", path.display())]
    Sheet {
        /// Source workbook path.
        path: PathBuf,
        /// Failing sheet.
        sheet_name: String,
        /// Underlying reader error text.
        message: String,
    },
}

/// Workbook could not be assembled or saved.
#[derive(Debug, Error)]
pub enum XlsxWriteError {
    /// Writer already flushed.
    #[error("Cannot write after close().")]
    Closed,
    /// Sheet content violates Excel limits or naming rules.
    #[error("Invalid sheet {sheet_name:?}: {message}")]
    InvalidSheet {
        /// Requested sheet name.
        sheet_name: String,
        /// Violation detail.
        message: String,
    },
    /// Error raised by the workbook serializer.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Destination could not be created or replaced.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
