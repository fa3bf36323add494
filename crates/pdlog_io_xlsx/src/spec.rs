//! Treatment record, grid and option models shared by the merge kernel.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::conf::{
    C_SHEET_NAME_DEFAULT, N_COL_IDX_LABEL, N_ROW_IDX_DATE, TUP_GRID_ROW_LABELS,
    derive_default_grid_formats, derive_default_metric_values,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// One grid cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Blank cell.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// String view of the cell; blank cells read as `""`.
    ///
    /// Integral numbers print without a fractional part (`2000`, not `2000.0`).
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(val) => val.clone(),
            Self::Number(val) => {
                if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e15 {
                    format!("{}", *val as i64)
                } else {
                    val.to_string()
                }
            }
        }
    }

    /// Whether the cell is blank or holds an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(val) => val.is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Numeric view; numeric-looking text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::String(val) => val.trim().parse::<f64>().ok(),
            Self::Number(val) => Some(*val),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Metric

/// Metric rows of the grid, in template order (rows 2..=18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumMetric {
    /// 血压.
    BloodPressure,
    /// 体重(不带水).
    Weight,
    /// 加热袋.
    HeatingBagVolume,
    /// 补充袋.
    SupplementBagVolume,
    /// 治疗方式.
    TreatmentMethod,
    /// 总治疗量.
    TotalTreatmentVolume,
    /// 治疗时间.
    TreatmentTimeHours,
    /// 单次注入量.
    SingleInjectionVolume,
    /// 末袋注入量.
    LastBagInjectionVolume,
    /// 循环次数.
    CycleCount,
    /// 0周期超流量.
    ZeroCycleFlow,
    /// 机器总超滤量.
    MachineTotalFlow,
    /// 日间手工注入量.
    DayManualInjection,
    /// 日间注入浓度.
    DayInjectionConcentration,
    /// 日间超滤量.
    DayUltrafiltration,
    /// 机器+手工总超滤量, always recomputed.
    MachinePlusManualFlow,
    /// 饮水量.
    WaterIntake,
}

impl EnumMetric {
    /// All metrics in row order.
    pub const ALL: [EnumMetric; 17] = [
        Self::BloodPressure,
        Self::Weight,
        Self::HeatingBagVolume,
        Self::SupplementBagVolume,
        Self::TreatmentMethod,
        Self::TotalTreatmentVolume,
        Self::TreatmentTimeHours,
        Self::SingleInjectionVolume,
        Self::LastBagInjectionVolume,
        Self::CycleCount,
        Self::ZeroCycleFlow,
        Self::MachineTotalFlow,
        Self::DayManualInjection,
        Self::DayInjectionConcentration,
        Self::DayUltrafiltration,
        Self::MachinePlusManualFlow,
        Self::WaterIntake,
    ];

    /// Zero-based grid row of this metric.
    pub fn row_index(self) -> usize {
        match self {
            Self::BloodPressure => 2,
            Self::Weight => 3,
            Self::HeatingBagVolume => 4,
            Self::SupplementBagVolume => 5,
            Self::TreatmentMethod => 6,
            Self::TotalTreatmentVolume => 7,
            Self::TreatmentTimeHours => 8,
            Self::SingleInjectionVolume => 9,
            Self::LastBagInjectionVolume => 10,
            Self::CycleCount => 11,
            Self::ZeroCycleFlow => 12,
            Self::MachineTotalFlow => 13,
            Self::DayManualInjection => 14,
            Self::DayInjectionConcentration => 15,
            Self::DayUltrafiltration => 16,
            Self::MachinePlusManualFlow => 17,
            Self::WaterIntake => 18,
        }
    }

    /// Row label shown in column 0.
    pub fn label(self) -> &'static str {
        TUP_GRID_ROW_LABELS[self.row_index()]
    }

    /// camelCase field name of the record wire form.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::BloodPressure => "bloodPressure",
            Self::Weight => "weight",
            Self::HeatingBagVolume => "heatingBagVolume",
            Self::SupplementBagVolume => "supplementBagVolume",
            Self::TreatmentMethod => "treatmentMethod",
            Self::TotalTreatmentVolume => "totalTreatmentVolume",
            Self::TreatmentTimeHours => "treatmentTimeHours",
            Self::SingleInjectionVolume => "singleInjectionVolume",
            Self::LastBagInjectionVolume => "lastBagInjectionVolume",
            Self::CycleCount => "cycleCount",
            Self::ZeroCycleFlow => "zeroCycleFlow",
            Self::MachineTotalFlow => "machineTotalFlow",
            Self::DayManualInjection => "dayManualInjection",
            Self::DayInjectionConcentration => "dayInjectionConcentration",
            Self::DayUltrafiltration => "dayUltrafiltration",
            Self::MachinePlusManualFlow => "machinePlusManualFlow",
            Self::WaterIntake => "waterIntake",
        }
    }

    /// Whether the value is computed by the row writer rather than read from input.
    pub fn is_derived(self) -> bool {
        matches!(self, Self::MachinePlusManualFlow)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TreatmentRecord

/// One day of treatment measurements, keyed by `date` (`YYYY-MM-DD`).
///
/// `weekday` and `machine_plus_manual_flow` are carried for the record store
/// only; the grid writer recomputes both. Numeric fields accept JSON numbers
/// or numeric strings, as form inputs send them; blank strings read as unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecTreatmentRecord {
    pub date: String,
    pub weekday: Option<String>,
    pub blood_pressure: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub weight: Option<f64>,
    #[serde(alias = "heatingBag", deserialize_with = "deserialize_lenient_number")]
    pub heating_bag_volume: Option<f64>,
    #[serde(alias = "supplementBag", deserialize_with = "deserialize_lenient_number")]
    pub supplement_bag_volume: Option<f64>,
    pub treatment_method: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub total_treatment_volume: Option<f64>,
    #[serde(alias = "treatmentTime", deserialize_with = "deserialize_lenient_number")]
    pub treatment_time_hours: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub single_injection_volume: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub last_bag_injection_volume: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub cycle_count: Option<f64>,
    #[serde(alias = "zeroCircleFlow", deserialize_with = "deserialize_lenient_number")]
    pub zero_cycle_flow: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub machine_total_flow: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub day_manual_injection: Option<f64>,
    pub day_injection_concentration: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub day_ultrafiltration: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub machine_plus_manual_flow: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub water_intake: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumNumberInput {
    Number(f64),
    Text(String),
}

/// Number, numeric string, blank string or `null`.
fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<EnumNumberInput>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(EnumNumberInput::Number(val)) => val,
        Some(EnumNumberInput::Text(txt)) => {
            let c_txt = txt.trim();
            if c_txt.is_empty() {
                return Ok(None);
            }
            c_txt
                .parse::<f64>()
                .map_err(|_| de::Error::custom(format!("expected a number, got {txt:?}")))?
        }
    };
    if !value.is_finite() {
        return Err(de::Error::custom(format!("expected a finite number, got {value}")));
    }
    Ok(Some(value))
}

impl SpecTreatmentRecord {
    /// Record for `date` with every metric unset.
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }

    /// Parse `date` as an ISO calendar date. Surrounding whitespace is ignored.
    ///
    /// An ISO timestamp (`2025-12-25T08:00`, `2025-12-25 08:00`) yields its date part.
    pub fn parse_date(&self) -> Option<NaiveDate> {
        let c_date = self.date.trim();
        if let Ok(date) = NaiveDate::parse_from_str(c_date, "%Y-%m-%d") {
            return Some(date);
        }
        let (c_head, c_tail) = (c_date.get(..10)?, c_date.get(10..)?);
        if !c_tail.starts_with(['T', ' ']) {
            return None;
        }
        NaiveDate::parse_from_str(c_head, "%Y-%m-%d").ok()
    }

    /// `YYYY-MM` month key, or `None` when `date` is not a calendar date.
    pub fn derive_year_month(&self) -> Option<String> {
        self.parse_date().map(|date| date.format("%Y-%m").to_string())
    }

    /// Raw input value of `metric`; empty strings and non-finite numbers read as blank.
    pub fn value_of(&self, metric: EnumMetric) -> EnumCellValue {
        match metric {
            EnumMetric::BloodPressure => derive_text_cell(&self.blood_pressure),
            EnumMetric::Weight => derive_number_cell(self.weight),
            EnumMetric::HeatingBagVolume => derive_number_cell(self.heating_bag_volume),
            EnumMetric::SupplementBagVolume => derive_number_cell(self.supplement_bag_volume),
            EnumMetric::TreatmentMethod => derive_text_cell(&self.treatment_method),
            EnumMetric::TotalTreatmentVolume => derive_number_cell(self.total_treatment_volume),
            EnumMetric::TreatmentTimeHours => derive_number_cell(self.treatment_time_hours),
            EnumMetric::SingleInjectionVolume => {
                derive_number_cell(self.single_injection_volume)
            }
            EnumMetric::LastBagInjectionVolume => {
                derive_number_cell(self.last_bag_injection_volume)
            }
            EnumMetric::CycleCount => derive_number_cell(self.cycle_count),
            EnumMetric::ZeroCycleFlow => derive_number_cell(self.zero_cycle_flow),
            EnumMetric::MachineTotalFlow => derive_number_cell(self.machine_total_flow),
            EnumMetric::DayManualInjection => derive_number_cell(self.day_manual_injection),
            EnumMetric::DayInjectionConcentration => {
                derive_text_cell(&self.day_injection_concentration)
            }
            EnumMetric::DayUltrafiltration => derive_number_cell(self.day_ultrafiltration),
            EnumMetric::MachinePlusManualFlow => {
                derive_number_cell(self.machine_plus_manual_flow)
            }
            EnumMetric::WaterIntake => derive_number_cell(self.water_intake),
        }
    }
}

fn derive_text_cell(value: &Option<String>) -> EnumCellValue {
    match value {
        Some(val) if !val.trim().is_empty() => EnumCellValue::String(val.clone()),
        _ => EnumCellValue::None,
    }
}

fn derive_number_cell(value: Option<f64>) -> EnumCellValue {
    match value {
        Some(val) if val.is_finite() => EnumCellValue::Number(val),
        _ => EnumCellValue::None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Grid

/// Wide-format treatment table: fixed metric rows, one data column per date.
///
/// Row 0 holds weekday labels, row 1 dates, rows 2..=18 the metrics of
/// [`EnumMetric`]. Column 0 holds row labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTreatmentGrid {
    /// Cells by row, then column.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTreatmentGrid {
    /// Template grid: every row labeled, no data columns.
    pub fn new_template() -> Self {
        Self {
            rows: TUP_GRID_ROW_LABELS
                .iter()
                .map(|label| vec![EnumCellValue::from(*label)])
                .collect(),
        }
    }

    /// Wrap raw rows without normalization.
    pub fn from_rows(rows: Vec<Vec<EnumCellValue>>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the widest row, label column included.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of data columns (width minus the label column).
    pub fn data_column_count(&self) -> usize {
        self.width().saturating_sub(N_COL_IDX_LABEL + 1)
    }

    /// Whether all rows have the same length.
    pub fn is_rectangular(&self) -> bool {
        let n_width = self.width();
        self.rows.iter().all(|row| row.len() == n_width)
    }

    /// Cell at (`row_idx`, `col_idx`), if present.
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&EnumCellValue> {
        self.rows.get(row_idx).and_then(|row| row.get(col_idx))
    }

    /// Cell of `metric` in data column `col_idx`, if present.
    pub fn metric_cell(&self, metric: EnumMetric, col_idx: usize) -> Option<&EnumCellValue> {
        self.cell(metric.row_index(), col_idx)
    }

    /// Date texts of all data columns, left to right.
    pub fn dates(&self) -> Vec<String> {
        self.rows
            .get(N_ROW_IDX_DATE)
            .map(|row| {
                row.iter()
                    .skip(N_COL_IDX_LABEL + 1)
                    .map(EnumCellValue::to_text)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lowest data column whose trimmed date text equals trimmed `date`.
    pub fn find_date_column(&self, date: &str) -> Option<usize> {
        let c_target = date.trim();
        let row_dates = self.rows.get(N_ROW_IDX_DATE)?;
        row_dates
            .iter()
            .enumerate()
            .skip(N_COL_IDX_LABEL + 1)
            .find(|(_, cell)| cell.to_text().trim() == c_target)
            .map(|(n_idx_col, _)| n_idx_col)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification, converted to a `rust_xlsxwriter::Format` at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Column width inference policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Infer widths from content; fixed `width_cell_min` otherwise.
    pub if_autofit: bool,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            if_autofit: true,
            width_cell_min: 8,
            width_cell_max: 40,
            width_cell_padding: 2,
        }
    }
}

/// Options for writing a grid and filling metric defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGridWriteOptions {
    /// Worksheet name.
    pub sheet_name: String,
    /// Values written when a record leaves a metric blank.
    pub metric_defaults: BTreeMap<EnumMetric, EnumCellValue>,
    /// Row-label column format.
    pub fmt_label: SpecCellFormat,
    /// Text cell format.
    pub fmt_text: SpecCellFormat,
    /// Integral number format.
    pub fmt_integer: SpecCellFormat,
    /// Fractional number format.
    pub fmt_decimal: SpecCellFormat,
    /// Frozen rows at the top (weekday + date).
    pub row_freeze: usize,
    /// Frozen columns at the left (labels).
    pub col_freeze: usize,
    /// Column width policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecGridWriteOptions {
    fn default() -> Self {
        let dict_fmt = derive_default_grid_formats();
        let fmt_of = |key: &str| dict_fmt.get(key).cloned().unwrap_or_default();
        Self {
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            metric_defaults: derive_default_metric_values(),
            fmt_label: fmt_of("label"),
            fmt_text: fmt_of("text"),
            fmt_integer: fmt_of("integer"),
            fmt_decimal: fmt_of("decimal"),
            row_freeze: N_ROW_IDX_DATE + 1,
            col_freeze: N_COL_IDX_LABEL + 1,
            policy_autofit: SpecAutofitCellsPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportAndErrors

/// Outcome of merging one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeReport {
    /// Trimmed record date.
    pub date: String,
    /// Grid column written.
    pub col_idx: usize,
    /// Whether the column was appended rather than reused.
    pub if_new_column: bool,
    /// Data column count after the merge.
    pub n_data_columns: usize,
}

/// Merge failures. A failed merge produces no bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Existing bytes are present but not a readable workbook.
    #[error("failed to decode grid: {0}")]
    Decode(String),
    /// Grid could not be serialized (shape invariant violated or writer failure).
    #[error("failed to encode grid: {0}")]
    Encode(String),
    /// Record cannot be placed in the grid.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
