//! Behavioral checks of the merge kernel through its public API.

use pdlog_io_xlsx::{
    EnumCellValue, EnumMetric, SpecGridWriteOptions, SpecTreatmentGrid, SpecTreatmentRecord,
    TUP_WEEKDAY_LABELS, decode_grid, merge, merge_with_options,
};

fn derive_base_record(date: &str) -> SpecTreatmentRecord {
    SpecTreatmentRecord {
        blood_pressure: Some("120/80".to_string()),
        weight: Some(60.0),
        zero_cycle_flow: Some(0.0),
        machine_total_flow: Some(1800.0),
        day_ultrafiltration: Some(0.0),
        water_intake: Some(500.0),
        ..SpecTreatmentRecord::new(date)
    }
}

fn decode(v_xlsx: &[u8]) -> SpecTreatmentGrid {
    decode_grid(v_xlsx).expect("decode merged bytes")
}

fn column_texts(grid: &SpecTreatmentGrid, col_idx: usize) -> Vec<String> {
    grid.rows.iter().map(|row| row[col_idx].to_text()).collect()
}

#[test]
fn end_to_end_first_write_then_same_day_update() {
    let v_first = merge(None, &derive_base_record("2025-01-01")).expect("first merge");
    let grid_first = decode(&v_first);

    assert_eq!(grid_first.width(), 2);
    assert_eq!(grid_first.rows[1][1], EnumCellValue::from("2025-01-01"));
    assert_eq!(grid_first.rows[0][1], EnumCellValue::from("三"));
    assert_eq!(
        grid_first.metric_cell(EnumMetric::MachinePlusManualFlow, 1),
        Some(&EnumCellValue::Number(1800.0))
    );

    let record_update = SpecTreatmentRecord {
        machine_total_flow: Some(2000.0),
        ..derive_base_record("2025-01-01")
    };
    let v_second = merge(Some(&v_first), &record_update).expect("second merge");
    let grid_second = decode(&v_second);

    assert_eq!(grid_second.width(), 2);
    assert_eq!(
        grid_second.metric_cell(EnumMetric::MachinePlusManualFlow, 1),
        Some(&EnumCellValue::Number(2000.0))
    );
}

#[test]
fn same_date_twice_keeps_one_column_with_latest_values() {
    let v_base = merge(None, &derive_base_record("2025-03-01")).expect("base");

    let record_a = SpecTreatmentRecord {
        blood_pressure: Some("110/70".to_string()),
        ..derive_base_record("2025-03-02")
    };
    let record_b = SpecTreatmentRecord {
        blood_pressure: Some("140/90".to_string()),
        water_intake: Some(900.0),
        ..derive_base_record("2025-03-02")
    };

    let v_a = merge(Some(&v_base), &record_a).expect("merge a");
    let v_b = merge(Some(&v_a), &record_b).expect("merge b");
    let grid = decode(&v_b);

    assert_eq!(grid.dates(), vec!["2025-03-01", "2025-03-02"]);
    assert_eq!(
        grid.metric_cell(EnumMetric::BloodPressure, 2),
        Some(&EnumCellValue::from("140/90"))
    );
    assert_eq!(
        grid.metric_cell(EnumMetric::WaterIntake, 2),
        Some(&EnumCellValue::Number(900.0))
    );
}

#[test]
fn new_date_appends_exactly_one_column_and_leaves_others_alone() {
    let mut v_xlsx = merge(None, &derive_base_record("2025-05-10")).expect("seed");
    v_xlsx = merge(Some(&v_xlsx), &derive_base_record("2025-05-08")).expect("seed 2");
    let grid_before = decode(&v_xlsx);

    let record_new = SpecTreatmentRecord {
        weight: Some(58.4),
        ..derive_base_record("2025-05-09")
    };
    let grid_after = decode(&merge(Some(&v_xlsx), &record_new).expect("append"));

    assert_eq!(grid_after.width(), grid_before.width() + 1);
    for n_idx_col in 0..grid_before.width() {
        assert_eq!(
            column_texts(&grid_after, n_idx_col),
            column_texts(&grid_before, n_idx_col)
        );
    }
    // columns stay in creation order, not date order
    assert_eq!(grid_after.dates(), vec!["2025-05-10", "2025-05-08", "2025-05-09"]);
}

#[test]
fn every_merge_result_is_rectangular() {
    let mut v_xlsx: Option<Vec<u8>> = None;
    for date in ["2025-07-01", "2025-07-03", "2025-07-01", "2025-07-02", "bogus"] {
        let v_next = merge(v_xlsx.as_deref(), &derive_base_record(date)).expect("merge");
        let grid = decode(&v_next);
        assert!(grid.is_rectangular(), "{date}");
        assert_eq!(grid.height(), 19);
        v_xlsx = Some(v_next);
    }
}

#[test]
fn weekday_ignores_supplied_label() {
    let record = SpecTreatmentRecord {
        weekday: Some("一".to_string()),
        ..derive_base_record("2025-12-25")
    };
    let grid = decode(&merge(None, &record).expect("merge"));
    assert_eq!(grid.rows[0][1], EnumCellValue::from(TUP_WEEKDAY_LABELS[4]));
}

#[test]
fn derived_total_ignores_supplied_value() {
    let record = SpecTreatmentRecord {
        zero_cycle_flow: Some(100.0),
        machine_total_flow: Some(2000.0),
        day_ultrafiltration: Some(50.0),
        machine_plus_manual_flow: Some(12345.0),
        ..derive_base_record("2025-12-25")
    };
    let grid = decode(&merge(None, &record).expect("merge"));
    assert_eq!(
        grid.metric_cell(EnumMetric::MachinePlusManualFlow, 1),
        Some(&EnumCellValue::Number(2150.0))
    );
}

#[test]
fn omitted_fields_take_defaults() {
    let grid = decode(&merge(None, &derive_base_record("2025-12-25")).expect("merge"));
    let cell_text = |metric: EnumMetric| {
        grid.metric_cell(metric, 1)
            .map(EnumCellValue::to_text)
            .unwrap_or_default()
    };

    assert_eq!(cell_text(EnumMetric::TreatmentMethod), "IPD");
    assert_eq!(cell_text(EnumMetric::DayManualInjection), "2000");
    assert_eq!(cell_text(EnumMetric::HeatingBagVolume), "2.5");
    assert_eq!(cell_text(EnumMetric::TotalTreatmentVolume), "8000");
    assert_eq!(cell_text(EnumMetric::CycleCount), "4");
    assert_eq!(cell_text(EnumMetric::DayInjectionConcentration), "艾考糊精");
}

#[test]
fn custom_default_table_and_sheet_name_are_honored() {
    let mut options = SpecGridWriteOptions {
        sheet_name: "2025年12月".to_string(),
        ..SpecGridWriteOptions::default()
    };
    options
        .metric_defaults
        .insert(EnumMetric::TreatmentMethod, EnumCellValue::from("CCPD"));

    let (v_xlsx, report) =
        merge_with_options(None, &derive_base_record("2025-12-25"), &options).expect("merge");
    assert!(report.if_new_column);
    assert_eq!(report.col_idx, 1);

    let grid = decode(&v_xlsx);
    assert_eq!(
        grid.metric_cell(EnumMetric::TreatmentMethod, 1),
        Some(&EnumCellValue::from("CCPD"))
    );
}

#[test]
fn date_matching_is_literal_text() {
    let v_xlsx = merge(None, &derive_base_record("2025-01-01")).expect("seed");
    let grid = decode(&merge(Some(&v_xlsx), &derive_base_record("2025-1-1")).expect("merge"));
    assert_eq!(grid.dates(), vec!["2025-01-01", "2025-1-1"]);
}

#[test]
fn form_payload_with_string_numbers_merges() {
    let record: SpecTreatmentRecord = serde_json::from_str(
        r#"{"date":"2025-12-25","weight":"60.5","zeroCircleFlow":"100",
            "machineTotalFlow":"2000","dayUltrafiltration":50.5,"cycleCount":""}"#,
    )
    .expect("payload");
    let grid = decode(&merge(None, &record).expect("merge"));

    assert_eq!(
        grid.metric_cell(EnumMetric::Weight, 1),
        Some(&EnumCellValue::Number(60.5))
    );
    assert_eq!(
        grid.metric_cell(EnumMetric::MachinePlusManualFlow, 1),
        Some(&EnumCellValue::Number(2150.5))
    );
    assert_eq!(
        grid.metric_cell(EnumMetric::CycleCount, 1),
        Some(&EnumCellValue::Number(4.0))
    );
}
