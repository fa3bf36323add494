//! Fixed grid layout, default metric values and format presets.

use std::collections::BTreeMap;

use crate::spec::{EnumCellValue, EnumMetric, SpecCellFormat};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Row holding weekday labels.
pub const N_ROW_IDX_WEEKDAY: usize = 0;
/// Row holding the date of each data column.
pub const N_ROW_IDX_DATE: usize = 1;
/// Column holding row labels.
pub const N_COL_IDX_LABEL: usize = 0;
/// Number of rows in the fixed grid template.
pub const N_NROWS_GRID_TEMPLATE: usize = 19;

/// Row labels of the grid template, top to bottom.
pub const TUP_GRID_ROW_LABELS: [&str; N_NROWS_GRID_TEMPLATE] = [
    "星期",
    "日期",
    "血压",
    "体重(不带水)",
    "加热袋",
    "补充袋",
    "治疗方式",
    "总治疗量",
    "治疗时间",
    "单次注入量",
    "末袋注入量",
    "循环次数",
    "0周期超流量",
    "机器总超滤量",
    "日间手工注入量",
    "日间注入浓度",
    "日间超滤量",
    "机器+手工总超滤量",
    "饮水量",
];

/// Weekday labels indexed by days from Sunday.
pub const TUP_WEEKDAY_LABELS: [&str; 7] = ["日", "一", "二", "三", "四", "五", "六"];

/// Worksheet name used when writing a new grid.
pub const C_SHEET_NAME_DEFAULT: &str = "治疗记录";

/// Build the default value table consulted when a record omits a metric.
///
/// Metrics missing from the table are written as given, blank included.
pub fn derive_default_metric_values() -> BTreeMap<EnumMetric, EnumCellValue> {
    let mut dict_defaults = BTreeMap::new();
    dict_defaults.insert(EnumMetric::HeatingBagVolume, EnumCellValue::Number(2.5));
    dict_defaults.insert(EnumMetric::SupplementBagVolume, EnumCellValue::Number(2.5));
    dict_defaults.insert(
        EnumMetric::TreatmentMethod,
        EnumCellValue::String("IPD".to_string()),
    );
    dict_defaults.insert(
        EnumMetric::TotalTreatmentVolume,
        EnumCellValue::Number(8000.0),
    );
    dict_defaults.insert(EnumMetric::TreatmentTimeHours, EnumCellValue::Number(10.0));
    dict_defaults.insert(
        EnumMetric::SingleInjectionVolume,
        EnumCellValue::Number(2000.0),
    );
    dict_defaults.insert(
        EnumMetric::LastBagInjectionVolume,
        EnumCellValue::Number(0.0),
    );
    dict_defaults.insert(EnumMetric::CycleCount, EnumCellValue::Number(4.0));
    dict_defaults.insert(
        EnumMetric::DayManualInjection,
        EnumCellValue::Number(2000.0),
    );
    dict_defaults.insert(
        EnumMetric::DayInjectionConcentration,
        EnumCellValue::String("艾考糊精".to_string()),
    );
    dict_defaults.insert(EnumMetric::DayUltrafiltration, EnumCellValue::Number(0.0));
    dict_defaults
}

/// Build named format presets used by [`crate::writer::encode_grid`].
pub fn derive_default_grid_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Microsoft YaHei".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert("text".to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        "label".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("left".to_string()),
            bg_color: Some("#F2F2F2".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "integer".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "decimal".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.0#".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_labels_line_up_with_metric_rows() {
        for metric in EnumMetric::ALL {
            assert_eq!(TUP_GRID_ROW_LABELS[metric.row_index()], metric.label());
        }
        assert_eq!(TUP_GRID_ROW_LABELS[N_ROW_IDX_WEEKDAY], "星期");
        assert_eq!(TUP_GRID_ROW_LABELS[N_ROW_IDX_DATE], "日期");
    }

    #[test]
    fn default_table_never_covers_required_or_derived_metrics() {
        let dict_defaults = derive_default_metric_values();
        for metric in [
            EnumMetric::BloodPressure,
            EnumMetric::Weight,
            EnumMetric::ZeroCycleFlow,
            EnumMetric::MachineTotalFlow,
            EnumMetric::WaterIntake,
            EnumMetric::MachinePlusManualFlow,
        ] {
            assert!(!dict_defaults.contains_key(&metric), "{metric:?}");
        }
        assert_eq!(dict_defaults.len(), 11);
    }

    #[test]
    fn format_presets_cover_writer_keys() {
        let dict_fmt = derive_default_grid_formats();
        for key in ["text", "label", "integer", "decimal"] {
            assert!(dict_fmt.contains_key(key), "{key}");
        }
        assert_eq!(dict_fmt["label"].bold, Some(true));
        assert_eq!(dict_fmt["integer"].num_format.as_deref(), Some("0"));
    }
}
