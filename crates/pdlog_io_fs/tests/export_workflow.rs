//! Form-payload to on-disk workbook, the way the record service drives it.

use pdlog_io_fs::{
    FsSheetStore, SheetStore, SpecExportOptions, TreatmentExporter, parse_month_file_name,
};
use pdlog_io_xlsx::{EnumCellValue, EnumMetric, SpecTreatmentRecord, decode_grid};

fn parse_payload(txt: &str) -> SpecTreatmentRecord {
    serde_json::from_str(txt).expect("payload")
}

#[test]
fn daily_saves_accumulate_in_monthly_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let exporter = TreatmentExporter::new(FsSheetStore::new(tmp.path()));

    let l_payloads = [
        r#"{"date":"2025-12-30","bloodPressure":"118/76","weight":61.2,
            "zeroCircleFlow":120,"machineTotalFlow":1500,"waterIntake":600}"#,
        r#"{"date":"2025-12-31","bloodPressure":"121/80","weight":61.0,
            "zeroCycleFlow":100,"machineTotalFlow":1600,"dayUltrafiltration":200,
            "machinePlusManualFlow":1,"weekday":"一"}"#,
        r#"{"date":"2026-01-01","machineTotalFlow":1700,"treatmentMethod":"CCPD"}"#,
        r#"{"date":"2025-12-30","bloodPressure":"125/82","weight":61.4,
            "zeroCircleFlow":120,"machineTotalFlow":1550,"waterIntake":650}"#,
    ];
    for txt in l_payloads {
        exporter.export_record(&parse_payload(txt)).expect("export");
    }

    let l_names = exporter.store().list_names().expect("list");
    assert_eq!(l_names, vec!["治疗记录202512.xlsx", "治疗记录202601.xlsx"]);
    let l_months: Vec<_> = l_names
        .iter()
        .filter_map(|name| parse_month_file_name("治疗记录", name))
        .collect();
    assert_eq!(l_months, vec![(2025, 12), (2026, 1)]);

    let v_december = exporter
        .store()
        .load("治疗记录202512.xlsx")
        .expect("load")
        .expect("present");
    let grid = decode_grid(&v_december).expect("decode");
    assert_eq!(grid.dates(), vec!["2025-12-30", "2025-12-31"]);
    assert_eq!(grid.rows[0][1], EnumCellValue::from("二"));
    assert_eq!(grid.rows[0][2], EnumCellValue::from("三"));
    assert_eq!(
        grid.metric_cell(EnumMetric::BloodPressure, 1),
        Some(&EnumCellValue::from("125/82"))
    );
    assert_eq!(
        grid.metric_cell(EnumMetric::MachinePlusManualFlow, 1),
        Some(&EnumCellValue::Number(1670.0))
    );
    assert_eq!(
        grid.metric_cell(EnumMetric::MachinePlusManualFlow, 2),
        Some(&EnumCellValue::Number(1900.0))
    );

    let v_january = exporter
        .store()
        .load("治疗记录202601.xlsx")
        .expect("load")
        .expect("present");
    let grid = decode_grid(&v_january).expect("decode");
    assert_eq!(
        grid.metric_cell(EnumMetric::TreatmentMethod, 1),
        Some(&EnumCellValue::from("CCPD"))
    );
}

#[test]
fn custom_prefix_routes_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let options = SpecExportOptions {
        file_name_prefix: "PD".to_string(),
        ..SpecExportOptions::default()
    };
    let exporter = TreatmentExporter::with_options(FsSheetStore::new(tmp.path()), options);

    let report = exporter
        .export_records(&[
            parse_payload(r#"{"date":"2025-03-01"}"#),
            parse_payload(r#"{"date":"2025-04-01"}"#),
        ])
        .expect("export");

    assert_eq!(report.files_written, vec!["PD202503.xlsx", "PD202504.xlsx"]);
    assert_eq!(report.to_string(), "[EXPORT] files=2 records=2 appended=2 updated=0");
    assert!(tmp.path().join("PD202504.xlsx").is_file());
}
