//! Error types for xlsxedit

use thiserror::Error;

/// Result type alias for xlsxedit operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all workbook operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// The input archive is corrupt, or a required part is missing or malformed
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Error occurred while writing the output archive
    #[error("Failed to write Excel file: {0}")]
    WriteError(String),

    /// Invalid sheet name or sheet not found
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// A sheet with the same name (ignoring case) already exists
    #[error("A sheet named '{0}' already exists")]
    DuplicateName(String),

    /// The sheet name breaks the workbook naming rules
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },

    /// Merging a range that intersects an existing merge
    #[error("Range {range} overlaps merged range {existing}")]
    Overlap { range: String, existing: String },

    /// Formula text that fails the syntax checks
    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },

    /// Coordinate or size outside what the format supports
    #[error("Out of bounds: {0}")]
    RangeBounds(String),

    /// Invalid cell reference
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// Style attribute that cannot be represented
    #[error("Invalid style: {0}")]
    InvalidStyle(String),

    /// Operation not allowed in the workbook's current state
    #[error("Invalid operation: {0}")]
    InvalidState(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ExcelError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ExcelError::IoError(io),
            other => ExcelError::InvalidFormat(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for ExcelError {
    fn from(err: quick_xml::Error) -> Self {
        ExcelError::InvalidFormat(format!("XML error: {err}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ExcelError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ExcelError::InvalidFormat(format!("XML attribute error: {err}"))
    }
}

impl From<std::string::FromUtf8Error> for ExcelError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ExcelError::InvalidFormat(format!("part is not valid UTF-8: {err}"))
    }
}

impl ExcelError {
    /// Whether this error was raised by input validation rather than I/O or format problems.
    ///
    /// Validation errors never leave the workbook modified.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExcelError::SheetNotFound { .. }
                | ExcelError::DuplicateName(_)
                | ExcelError::InvalidSheetName { .. }
                | ExcelError::Overlap { .. }
                | ExcelError::InvalidFormula { .. }
                | ExcelError::RangeBounds(_)
                | ExcelError::InvalidCell(_)
                | ExcelError::InvalidStyle(_)
                | ExcelError::InvalidState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_not_found_message() {
        let err = ExcelError::SheetNotFound {
            sheet: "Data".to_string(),
            available: "Sheet1, Sheet2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sheet 'Data' not found. Available sheets: Sheet1, Sheet2"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_zip_io_error_maps_to_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ExcelError = zip::result::ZipError::Io(io).into();
        assert!(matches!(err, ExcelError::IoError(_)));
        assert!(!err.is_validation());
    }
}
