//! `pdlog_io_xlsx` v1:
//! Date-indexed treatment grid kernel.
//!
//! Module layout:
//! - `conf`   : fixed row template, default metric values, format presets
//! - `spec`   : record/grid/options/errors
//! - `util`   : column resolution, padding, row writing
//! - `reader` : XLSX bytes -> grid
//! - `writer` : grid -> XLSX bytes
//! - `merge`  : upsert-by-date orchestration
pub mod conf;
pub mod merge;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_SHEET_NAME_DEFAULT, N_NROWS_GRID_TEMPLATE, TUP_GRID_ROW_LABELS, TUP_WEEKDAY_LABELS,
    derive_default_grid_formats, derive_default_metric_values,
};
pub use merge::{load_grid, merge, merge_many, merge_record_into_grid, merge_with_options};
pub use reader::decode_grid;
pub use spec::{
    EnumCellValue, EnumMetric, MergeError, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecGridWriteOptions, SpecMergeReport, SpecTreatmentGrid, SpecTreatmentRecord,
};
pub use util::{
    complete_template_rows, derive_machine_plus_manual_flow, derive_weekday_label,
    pad_grid_columns, resolve_date_column, write_record_column,
};
pub use writer::encode_grid;
