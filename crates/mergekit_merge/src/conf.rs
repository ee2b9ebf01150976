//! Merge constants and default preset factories.

use chrono::NaiveDate;

/// "status" sheet.
pub const C_SHEET_STATUS: &str = "현황";
/// "new-entrants" sheet.
pub const C_SHEET_NEW_ENTRANTS: &str = "신규자";
/// "stopped" sheet.
pub const C_SHEET_STOPPED: &str = "중지자";
/// Merge target set, in output order.
pub const TUP_SHEETS_MERGE_TARGET: [&str; 3] =
    [C_SHEET_STATUS, C_SHEET_NEW_ENTRANTS, C_SHEET_STOPPED];

/// "registration date" column.
pub const C_COL_DATE_REGISTRATION: &str = "등록일자";
/// "move-in date" column.
pub const C_COL_DATE_MOVE_IN: &str = "전입일자";
/// "new-entrant reason" column.
pub const C_COL_REASON_NEW: &str = "신규사유";
/// "retroactive requirement" output column.
pub const C_COL_RETRO_MONTHS: &str = "소급필요";
/// "move-in" category of the new-entrant reason.
pub const C_REASON_MOVE_IN: &str = "전입";
/// Unit appended to the month count.
pub const C_RETRO_MONTHS_SUFFIX: &str = "개월";
/// Date literal format (`YYYY.MM.DD`).
pub const C_DATE_FORMAT: &str = "%Y.%m.%d";

/// Identifier columns written as text ("account number", "veteran ID number").
pub const TUP_COLS_TEXT: [&str; 2] = ["계좌번호", "보훈번호"];
/// Accepted source file name patterns.
pub const TUP_PATTERNS_SOURCE: [&str; 2] = ["*.xlsx", "*.xls"];

/// Suggested output file name for a run on `today` (`병합결과_YYYY-MM.xlsx`).
pub fn derive_default_output_name(today: NaiveDate) -> String {
    format!("병합결과_{}.xlsx", today.format("%Y-%m"))
}
