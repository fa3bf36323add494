//! Stateless grid helpers: column resolution, padding, row writing.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::conf::{
    N_COL_IDX_LABEL, N_LEN_EXCEL_SHEET_NAME_MAX, N_ROW_IDX_DATE, N_ROW_IDX_WEEKDAY,
    TUP_EXCEL_ILLEGAL, TUP_GRID_ROW_LABELS, TUP_WEEKDAY_LABELS,
};
use crate::spec::{
    EnumCellValue, EnumMetric, MergeError, SpecTreatmentGrid, SpecTreatmentRecord,
};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnResolution

/// Column index for `date`: the first data column whose trimmed date text
/// matches, else one past the widest row (never less than 1).
///
/// Dates are compared as strings; `2025-1-1` and `2025-01-01` are distinct.
pub fn resolve_date_column(grid: &SpecTreatmentGrid, date: &str) -> usize {
    grid.find_date_column(date)
        .unwrap_or_else(|| usize::max(grid.width(), N_COL_IDX_LABEL + 1))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rectangularization

/// Append blank cells until every row reaches `max(col_idx_min + 1, width)`.
///
/// Existing cells are never touched; a second call with the same argument is a no-op.
pub fn pad_grid_columns(grid: &mut SpecTreatmentGrid, col_idx_min: usize) {
    let n_width_target = usize::max(col_idx_min + 1, grid.width());
    for row in &mut grid.rows {
        if row.len() < n_width_target {
            row.resize(n_width_target, EnumCellValue::None);
        }
    }
}

/// Restore the fixed template rows on a grid read from an arbitrary sheet.
///
/// Missing trailing rows are appended and blank label cells get their
/// template label. Non-blank cells are kept as found.
pub fn complete_template_rows(grid: &mut SpecTreatmentGrid) {
    for (n_idx_row, label) in TUP_GRID_ROW_LABELS.iter().enumerate() {
        if grid.rows.len() <= n_idx_row {
            grid.rows.push(Vec::new());
        }
        let row = &mut grid.rows[n_idx_row];
        match row.get_mut(N_COL_IDX_LABEL) {
            Some(cell) if cell.is_empty() => *cell = EnumCellValue::from(*label),
            Some(_) => {}
            None => row.push(EnumCellValue::from(*label)),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowWriting

/// Weekday label of `date` (Sunday = `日`), or `None` when `date` does not parse.
pub fn derive_weekday_label(record: &SpecTreatmentRecord) -> Option<&'static str> {
    record
        .parse_date()
        .map(|date| TUP_WEEKDAY_LABELS[date.weekday().num_days_from_sunday() as usize])
}

/// `zeroCycleFlow + machineTotalFlow + dayUltrafiltration`, missing or
/// non-finite terms as 0.
///
/// Any `machine_plus_manual_flow` carried by the record is ignored.
pub fn derive_machine_plus_manual_flow(record: &SpecTreatmentRecord) -> f64 {
    [
        record.zero_cycle_flow,
        record.machine_total_flow,
        record.day_ultrafiltration,
    ]
    .into_iter()
    .map(|val| val.filter(|v| v.is_finite()).unwrap_or(0.0))
    .sum()
}

/// Fill column `col_idx` with `record`.
///
/// Writes the date, the weekday recomputed from the date, every metric (blank
/// metrics fall back to `metric_defaults`), and the derived total. The grid is
/// not resized: every template row must already reach `col_idx`.
pub fn write_record_column(
    grid: &mut SpecTreatmentGrid,
    col_idx: usize,
    record: &SpecTreatmentRecord,
    metric_defaults: &BTreeMap<EnumMetric, EnumCellValue>,
) -> Result<(), MergeError> {
    if col_idx == N_COL_IDX_LABEL {
        return Err(MergeError::Encode(
            "Refusing to overwrite the label column.".to_string(),
        ));
    }
    for n_idx_row in 0..TUP_GRID_ROW_LABELS.len() {
        let n_len_row = grid.rows.get(n_idx_row).map_or(0, Vec::len);
        if n_len_row <= col_idx {
            return Err(MergeError::Encode(format!(
                "Row {n_idx_row} has {n_len_row} cells; column {col_idx} was not padded."
            )));
        }
    }

    let weekday = match derive_weekday_label(record) {
        Some(label) => EnumCellValue::from(label),
        None => {
            tracing::warn!(date = %record.date, "date is not an ISO date; weekday left blank");
            EnumCellValue::None
        }
    };
    grid.rows[N_ROW_IDX_WEEKDAY][col_idx] = weekday;
    grid.rows[N_ROW_IDX_DATE][col_idx] = EnumCellValue::from(record.date.trim());

    for metric in EnumMetric::ALL {
        let value = if metric.is_derived() {
            EnumCellValue::from(derive_machine_plus_manual_flow(record))
        } else {
            let value_raw = record.value_of(metric);
            match (value_raw.is_empty(), metric_defaults.get(&metric)) {
                (true, Some(value_default)) => value_default.clone(),
                _ => value_raw,
            }
        };
        grid.rows[metric.row_index()][col_idx] = value;
    }

    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetHelpers

/// Sanitize a user-provided sheet name to satisfy Excel constraints.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Zero-based (row, column) of an A1 reference such as `"AB12"`.
pub fn parse_cell_reference(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().trim_start_matches('$');
    let n_len_letters = reference
        .chars()
        .take_while(|chr| chr.is_ascii_alphabetic())
        .count();
    if n_len_letters == 0 {
        return None;
    }
    let (c_letters, c_digits) = reference.split_at(n_len_letters);
    let n_col_idx = derive_col_idx_from_letters(c_letters)?;
    let n_row_num: usize = c_digits.trim_start_matches('$').parse().ok()?;
    if n_row_num == 0 {
        return None;
    }
    Some((n_row_num - 1, n_col_idx))
}

/// Zero-based column index of column letters (`"A"` -> 0, `"AA"` -> 26).
pub fn derive_col_idx_from_letters(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n_col_num = 0usize;
    for chr in letters.chars() {
        if !chr.is_ascii_alphabetic() {
            return None;
        }
        let n_digit = (chr.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n_col_num = n_col_num.checked_mul(26)?.checked_add(n_digit)?;
    }
    Some(n_col_num - 1)
}

/// Estimated display width; non-ASCII characters count as 1.6 columns.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_metric_values;

    fn derive_grid_with_dates(dates: &[&str]) -> SpecTreatmentGrid {
        let mut grid = SpecTreatmentGrid::new_template();
        for date in dates {
            let n_col_idx = resolve_date_column(&grid, date);
            pad_grid_columns(&mut grid, n_col_idx);
            grid.rows[N_ROW_IDX_DATE][n_col_idx] = EnumCellValue::from(*date);
        }
        grid
    }

    #[test]
    fn resolve_empty_grid_allocates_column_one() {
        let grid = SpecTreatmentGrid::new_template();
        assert_eq!(resolve_date_column(&grid, "2025-01-01"), 1);
        assert_eq!(resolve_date_column(&SpecTreatmentGrid::default(), "2025-01-01"), 1);
    }

    #[test]
    fn resolve_matches_trimmed_text_and_keeps_first_hit() {
        let mut grid = derive_grid_with_dates(&["2025-01-02", "2025-01-01"]);
        assert_eq!(resolve_date_column(&grid, " 2025-01-01 "), 2);

        // duplicate introduced by hand: lowest index wins
        pad_grid_columns(&mut grid, 3);
        grid.rows[N_ROW_IDX_DATE][3] = EnumCellValue::from("2025-01-02 ");
        assert_eq!(resolve_date_column(&grid, "2025-01-02"), 1);
    }

    #[test]
    fn resolve_uses_literal_string_match() {
        let grid = derive_grid_with_dates(&["2025-01-01"]);
        assert_eq!(resolve_date_column(&grid, "2025-1-1"), 2);
    }

    #[test]
    fn resolve_appends_past_widest_row() {
        let mut grid = derive_grid_with_dates(&["2025-01-01"]);
        grid.rows[5].push(EnumCellValue::from("stray"));
        grid.rows[5].push(EnumCellValue::from("stray"));
        assert_eq!(grid.width(), 4);
        assert_eq!(resolve_date_column(&grid, "2025-01-09"), 4);
    }

    #[test]
    fn numeric_date_cells_match_by_text() {
        let mut grid = SpecTreatmentGrid::new_template();
        pad_grid_columns(&mut grid, 1);
        grid.rows[N_ROW_IDX_DATE][1] = EnumCellValue::Number(20250101.0);
        assert_eq!(resolve_date_column(&grid, "20250101"), 1);
    }

    #[test]
    fn pad_is_idempotent_and_append_only() {
        let mut grid = SpecTreatmentGrid::new_template();
        grid.rows[3].push(EnumCellValue::from("61.0"));

        pad_grid_columns(&mut grid, 2);
        let grid_once = grid.clone();
        pad_grid_columns(&mut grid, 2);

        assert_eq!(grid, grid_once);
        assert!(grid.is_rectangular());
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.rows[3][1], EnumCellValue::from("61.0"));
        assert_eq!(grid.rows[0][0], EnumCellValue::from("星期"));
    }

    #[test]
    fn pad_never_shrinks_wider_rows() {
        let mut grid = SpecTreatmentGrid::new_template();
        grid.rows[7].resize(5, EnumCellValue::from("x"));
        pad_grid_columns(&mut grid, 1);
        assert!(grid.is_rectangular());
        assert_eq!(grid.width(), 5);
    }

    #[test]
    fn complete_template_rows_fills_short_sheets() {
        let mut grid = SpecTreatmentGrid::from_rows(vec![
            vec![EnumCellValue::None, EnumCellValue::from("四")],
            vec![EnumCellValue::from("日期"), EnumCellValue::from("2025-12-25")],
        ]);
        complete_template_rows(&mut grid);

        assert_eq!(grid.height(), 19);
        assert_eq!(grid.rows[0][0], EnumCellValue::from("星期"));
        assert_eq!(grid.rows[0][1], EnumCellValue::from("四"));
        assert_eq!(grid.rows[18], vec![EnumCellValue::from("饮水量")]);
    }

    #[test]
    fn weekday_label_is_derived_from_date() {
        let record = SpecTreatmentRecord {
            weekday: Some("一".to_string()),
            ..SpecTreatmentRecord::new("2025-12-25")
        };
        assert_eq!(derive_weekday_label(&record), Some(TUP_WEEKDAY_LABELS[4]));
        assert_eq!(
            derive_weekday_label(&SpecTreatmentRecord::new("2025-01-01")),
            Some("三")
        );
        assert_eq!(
            derive_weekday_label(&SpecTreatmentRecord::new("2025-12-25T08:00")),
            Some("四")
        );
        assert_eq!(derive_weekday_label(&SpecTreatmentRecord::new("soon")), None);
    }

    #[test]
    fn machine_plus_manual_flow_sums_three_terms() {
        let record = SpecTreatmentRecord {
            zero_cycle_flow: Some(100.0),
            machine_total_flow: Some(2000.0),
            day_ultrafiltration: Some(50.0),
            machine_plus_manual_flow: Some(1.0),
            ..SpecTreatmentRecord::new("2025-12-25")
        };
        assert_eq!(derive_machine_plus_manual_flow(&record), 2150.0);
        assert_eq!(
            derive_machine_plus_manual_flow(&SpecTreatmentRecord::new("2025-12-25")),
            0.0
        );
    }

    #[test]
    fn write_record_column_applies_defaults_and_derived_total() {
        let mut grid = SpecTreatmentGrid::new_template();
        pad_grid_columns(&mut grid, 1);
        let record = SpecTreatmentRecord {
            blood_pressure: Some("120/80".to_string()),
            zero_cycle_flow: Some(100.0),
            machine_total_flow: Some(2000.0),
            day_ultrafiltration: Some(50.0),
            machine_plus_manual_flow: Some(9.0),
            ..SpecTreatmentRecord::new("2025-12-25")
        };

        write_record_column(&mut grid, 1, &record, &derive_default_metric_values())
            .expect("write column");

        let cell_of = |metric: EnumMetric| grid.metric_cell(metric, 1).cloned();
        assert_eq!(grid.rows[0][1], EnumCellValue::from("四"));
        assert_eq!(grid.rows[1][1], EnumCellValue::from("2025-12-25"));
        assert_eq!(cell_of(EnumMetric::TreatmentMethod), Some("IPD".into()));
        assert_eq!(cell_of(EnumMetric::DayManualInjection), Some(2000i64.into()));
        assert_eq!(cell_of(EnumMetric::DayInjectionConcentration), Some("艾考糊精".into()));
        assert_eq!(cell_of(EnumMetric::MachinePlusManualFlow), Some(2150i64.into()));
        assert_eq!(cell_of(EnumMetric::Weight), Some(EnumCellValue::None));
        assert_eq!(cell_of(EnumMetric::WaterIntake), Some(EnumCellValue::None));
    }

    #[test]
    fn write_record_column_keeps_explicit_zero() {
        let mut grid = SpecTreatmentGrid::new_template();
        pad_grid_columns(&mut grid, 1);
        let record = SpecTreatmentRecord {
            cycle_count: Some(0.0),
            ..SpecTreatmentRecord::new("2025-12-25")
        };
        write_record_column(&mut grid, 1, &record, &derive_default_metric_values())
            .expect("write column");
        assert_eq!(
            grid.metric_cell(EnumMetric::CycleCount, 1),
            Some(&EnumCellValue::Number(0.0))
        );
    }

    #[test]
    fn write_record_column_requires_padding() {
        let mut grid = SpecTreatmentGrid::new_template();
        let err = write_record_column(
            &mut grid,
            1,
            &SpecTreatmentRecord::new("2025-12-25"),
            &BTreeMap::new(),
        )
        .expect_err("must fail");
        assert!(matches!(err, MergeError::Encode(_)));
    }

    #[test]
    fn cell_reference_parsing() {
        assert_eq!(parse_cell_reference("A1"), Some((0, 0)));
        assert_eq!(parse_cell_reference("AB12"), Some((11, 27)));
        assert_eq!(parse_cell_reference("$C$3"), Some((2, 2)));
        assert_eq!(parse_cell_reference("12"), None);
        assert_eq!(parse_cell_reference("A0"), None);
        assert_eq!(derive_col_idx_from_letters("XFD"), Some(16_383));
    }

    #[test]
    fn sanitize_sheet_name_replaces_illegal_chars() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }
}
