//! `pdlog_io_fs` v1:
//! Workbook storage and export service for treatment grids.
//!
//! Module layout:
//! - `spec`   : storage trait/options/errors
//! - `store`  : filesystem and in-memory backends
//! - `export` : load -> merge -> save orchestration
//! - `report` : export report model
//! - `util`   : file naming helpers

pub mod export;
pub mod report;
pub mod spec;
pub mod store;
pub mod util;

pub use export::TreatmentExporter;
pub use report::{ReportExport, ReportExportBuilder};
pub use spec::{
    C_FILE_EXTENSION_XLSX, C_FILE_NAME_PREFIX_DEFAULT, SheetStore, SpecDateRange,
    SpecExportOptions, StoreError,
};
pub use store::{FsSheetStore, MemorySheetStore};
pub use util::{derive_month_file_name, derive_range_file_name, parse_month_file_name};
