//! File naming and name validation helpers.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use pdlog_io_xlsx::SpecTreatmentRecord;

use crate::spec::{C_FILE_EXTENSION_XLSX, SpecDateRange, StoreError};

////////////////////////////////////////////////////////////////////////////////
// #region FileNames

/// Monthly workbook name for `record`, e.g. `治疗记录202512.xlsx`.
pub fn derive_month_file_name(
    prefix: &str,
    record: &SpecTreatmentRecord,
) -> Result<String, StoreError> {
    let date = record.parse_date().ok_or_else(|| {
        StoreError::InvalidInput(format!(
            "record date is not YYYY-MM-DD: {:?}",
            record.date
        ))
    })?;
    Ok(format!(
        "{prefix}{:04}{:02}{C_FILE_EXTENSION_XLSX}",
        date.year(),
        date.month()
    ))
}

/// Range workbook name, e.g. `治疗记录_2025-01-01_至_2025-01-28.xlsx`.
pub fn derive_range_file_name(prefix: &str, range: &SpecDateRange) -> String {
    format!(
        "{prefix}_{}_至_{}{C_FILE_EXTENSION_XLSX}",
        range.start.trim(),
        range.end.trim()
    )
}

/// `(year, month)` encoded in a monthly workbook name, or `None` for any other name.
pub fn parse_month_file_name(prefix: &str, name: &str) -> Option<(i32, u32)> {
    let regex = Regex::new(&format!(
        r"^{}(\d{{4}})(\d{{2}}){}$",
        regex::escape(prefix),
        regex::escape(C_FILE_EXTENSION_XLSX)
    ))
    .ok()?;
    let caps = regex.captures(name)?;
    let n_year: i32 = caps[1].parse().ok()?;
    let n_month: u32 = caps[2].parse().ok()?;
    (1..=12).contains(&n_month).then_some((n_year, n_month))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region NameValidation

/// Reject names that are not a single plain path component.
pub(crate) fn validate_sheet_file_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidName("name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(format!(
            "{name} contains a path separator"
        )));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateRange

/// Earliest and latest parseable record date, formatted `YYYY-MM-DD`.
///
/// Records whose date does not parse are left out of the bounds.
pub(crate) fn derive_record_date_range(records: &[SpecTreatmentRecord]) -> Option<SpecDateRange> {
    let mut l_dates: Vec<NaiveDate> = records
        .iter()
        .filter_map(SpecTreatmentRecord::parse_date)
        .collect();
    l_dates.sort_unstable();
    let date_first = l_dates.first()?;
    let date_last = l_dates.last()?;
    Some(SpecDateRange::new(
        date_first.format("%Y-%m-%d").to_string(),
        date_last.format("%Y-%m-%d").to_string(),
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
