//! Export report model and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use pdlog_io_xlsx::SpecMergeReport;

/// Aggregate counters for one export call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportExport {
    /// Workbook names saved, in save order.
    pub files_written: Vec<String>,
    /// Records merged into some workbook.
    pub cnt_records: u64,
    /// Date columns appended.
    pub cnt_appended: u64,
    /// Existing date columns overwritten.
    pub cnt_updated: u64,
}

impl ReportExport {
    /// Number of saved workbooks.
    pub fn file_count(&self) -> usize {
        self.files_written.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_files".to_string(), self.file_count() as u64);
        dict_counts.insert("cnt_records".to_string(), self.cnt_records);
        dict_counts.insert("cnt_appended".to_string(), self.cnt_appended);
        dict_counts.insert("cnt_updated".to_string(), self.cnt_updated);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} files={} records={} appended={} updated={}",
            dict_counts["cnt_files"],
            dict_counts["cnt_records"],
            dict_counts["cnt_appended"],
            dict_counts["cnt_updated"]
        )
    }
}

impl fmt::Display for ReportExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXPORT]"))
    }
}

/// Mutable accumulator for export statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportExportBuilder {
    files_written: Vec<String>,
    cnt_records: u64,
    cnt_appended: u64,
    cnt_updated: u64,
}

impl ReportExportBuilder {
    /// Count one merged record by whether its column was new.
    pub fn add_merge(&mut self, report: &SpecMergeReport) {
        self.cnt_records += 1;
        if report.if_new_column {
            self.cnt_appended += 1;
        } else {
            self.cnt_updated += 1;
        }
    }

    pub fn add_merges(&mut self, reports: &[SpecMergeReport]) {
        for report in reports {
            self.add_merge(report);
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>) {
        self.files_written.push(name.into());
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportExport {
        ReportExport {
            files_written: self.files_written,
            cnt_records: self.cnt_records,
            cnt_appended: self.cnt_appended,
            cnt_updated: self.cnt_updated,
        }
    }
}
