//! Upsert-by-date merge of treatment records into serialized grids.
//!
//! Every merge runs the same fixed sequence: decode (or start from the
//! template), resolve the date column, pad, write the column, encode.

use crate::reader::decode_grid;
use crate::spec::{
    MergeError, SpecGridWriteOptions, SpecMergeReport, SpecTreatmentGrid, SpecTreatmentRecord,
};
use crate::util::{
    complete_template_rows, pad_grid_columns, resolve_date_column, write_record_column,
};
use crate::writer::encode_grid;

/// Merge `record` into `existing` workbook bytes with default options.
///
/// `None` (no backing file yet) starts from the empty template.
pub fn merge(
    existing: Option<&[u8]>,
    record: &SpecTreatmentRecord,
) -> Result<Vec<u8>, MergeError> {
    merge_with_options(existing, record, &SpecGridWriteOptions::default())
        .map(|(v_xlsx, _)| v_xlsx)
}

/// Merge `record` into `existing` workbook bytes, returning the new bytes and a report.
pub fn merge_with_options(
    existing: Option<&[u8]>,
    record: &SpecTreatmentRecord,
    options: &SpecGridWriteOptions,
) -> Result<(Vec<u8>, SpecMergeReport), MergeError> {
    let mut grid = load_grid(existing)?;
    let report = merge_record_into_grid(&mut grid, record, options)?;
    let v_xlsx = encode_grid(&grid, options)?;

    tracing::info!(
        date = %report.date,
        col_idx = report.col_idx,
        if_new_column = report.if_new_column,
        n_data_columns = report.n_data_columns,
        "merged treatment record"
    );
    Ok((v_xlsx, report))
}

/// Merge `records` in order into one grid, decoding and encoding once.
///
/// A later record with the same date overwrites the earlier column.
pub fn merge_many(
    existing: Option<&[u8]>,
    records: &[SpecTreatmentRecord],
    options: &SpecGridWriteOptions,
) -> Result<(Vec<u8>, Vec<SpecMergeReport>), MergeError> {
    let mut grid = load_grid(existing)?;
    let mut l_reports = Vec::with_capacity(records.len());
    for record in records {
        l_reports.push(merge_record_into_grid(&mut grid, record, options)?);
    }
    let v_xlsx = encode_grid(&grid, options)?;

    tracing::info!(
        n_records = records.len(),
        n_data_columns = grid.data_column_count(),
        "merged treatment records"
    );
    Ok((v_xlsx, l_reports))
}

/// Decoded grid for `existing`, or the template when there are no bytes.
///
/// Zero-length bytes count as no file. The result always carries the
/// template rows and is rectangular.
pub fn load_grid(existing: Option<&[u8]>) -> Result<SpecTreatmentGrid, MergeError> {
    let mut grid = match existing {
        Some(v_xlsx) if !v_xlsx.is_empty() => decode_grid(v_xlsx)?,
        _ => {
            tracing::debug!("no existing grid; starting from template");
            SpecTreatmentGrid::new_template()
        }
    };
    complete_template_rows(&mut grid);
    pad_grid_columns(&mut grid, 0);
    Ok(grid)
}

/// Resolve, pad and write one record on an in-memory grid.
pub fn merge_record_into_grid(
    grid: &mut SpecTreatmentGrid,
    record: &SpecTreatmentRecord,
    options: &SpecGridWriteOptions,
) -> Result<SpecMergeReport, MergeError> {
    let c_date = record.date.trim();
    if c_date.is_empty() {
        return Err(MergeError::InvalidRecord("date is empty".to_string()));
    }

    let n_width_before = grid.width();
    let n_col_idx = resolve_date_column(grid, c_date);
    let if_new_column = n_col_idx >= n_width_before;
    tracing::debug!(date = %c_date, col_idx = n_col_idx, if_new_column, "resolved date column");

    pad_grid_columns(grid, n_col_idx);
    write_record_column(grid, n_col_idx, record, &options.metric_defaults)?;

    Ok(SpecMergeReport {
        date: c_date.to_string(),
        col_idx: n_col_idx,
        if_new_column,
        n_data_columns: grid.data_column_count(),
    })
}
