//! Storage capability, export options and top-level error types.

use std::io;

use pdlog_io_xlsx::{MergeError, SpecGridWriteOptions};

////////////////////////////////////////////////////////////////////////////////
// #region Constants

/// File-name prefix shared by monthly and range workbooks.
pub const C_FILE_NAME_PREFIX_DEFAULT: &str = "治疗记录";

/// Workbook file extension, including the dot.
pub const C_FILE_EXTENSION_XLSX: &str = ".xlsx";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StoreCapability

/// Named byte storage for serialized grids.
///
/// The merge kernel never touches storage itself; callers plug in a backend
/// (filesystem, memory, platform bridge) through this trait.
pub trait SheetStore {
    /// Bytes stored under `name`, or `None` when nothing is stored yet.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace whatever is stored under `name` with `bytes`.
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

impl<S: SheetStore + ?Sized> SheetStore for &S {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).load(name)
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).save(name, bytes)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `TreatmentExporter`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportOptions {
    /// Prefix of every workbook file name.
    pub file_name_prefix: String,
    /// Grid encoding options (sheet name, defaults, formats).
    pub options_grid: SpecGridWriteOptions,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            file_name_prefix: C_FILE_NAME_PREFIX_DEFAULT.to_string(),
            options_grid: SpecGridWriteOptions::default(),
        }
    }
}

/// Inclusive date range used to name a range workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDateRange {
    /// First date, `YYYY-MM-DD`.
    pub start: String,
    /// Last date, `YYYY-MM-DD`.
    pub end: String,
}

impl SpecDateRange {
    /// Range from `start` to `end`, both inclusive.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// "Top-level call failed" errors for storage and export.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing a stored workbook failed.
    #[error("I/O error on {name}: {source}")]
    Io {
        /// Store-relative workbook name.
        name: String,
        #[source]
        source: io::Error,
    },
    /// Workbook name is not a plain file name.
    #[error("invalid workbook name: {0}")]
    InvalidName(String),
    /// Export arguments cannot be turned into a workbook.
    #[error("invalid export input: {0}")]
    InvalidInput(String),
    /// Merge kernel failure.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl StoreError {
    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            source,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
