//! Export service wiring a `SheetStore` to the merge kernel.
//!
//! Every export follows load -> merge -> save per workbook. A failed merge
//! saves nothing for that workbook.

use std::collections::BTreeMap;

use pdlog_io_xlsx::{SpecTreatmentRecord, merge_many, merge_with_options};

use crate::report::{ReportExport, ReportExportBuilder};
use crate::spec::{SheetStore, SpecDateRange, SpecExportOptions, StoreError};
use crate::util::{derive_month_file_name, derive_range_file_name, derive_record_date_range};

/// Writes treatment records into workbooks held by a `SheetStore`.
#[derive(Debug)]
pub struct TreatmentExporter<S: SheetStore> {
    store: S,
    options: SpecExportOptions,
}

impl<S: SheetStore> TreatmentExporter<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, SpecExportOptions::default())
    }

    pub fn with_options(store: S, options: SpecExportOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SpecExportOptions {
        &self.options
    }

    /// Upsert one record into its monthly workbook.
    pub fn export_record(&self, record: &SpecTreatmentRecord) -> Result<ReportExport, StoreError> {
        let c_name = derive_month_file_name(&self.options.file_name_prefix, record)?;
        let v_existing = self.store.load(&c_name)?;
        let (v_xlsx, report_merge) =
            merge_with_options(v_existing.as_deref(), record, &self.options.options_grid)?;
        self.store.save(&c_name, &v_xlsx)?;

        let mut builder = ReportExportBuilder::default();
        builder.add_merge(&report_merge);
        builder.add_file(c_name);
        let report = builder.build();
        tracing::info!(summary = %report, "exported record");
        Ok(report)
    }

    /// Upsert `records` into their monthly workbooks, one save per month.
    ///
    /// Every record is routed before anything is saved, so an unroutable date
    /// aborts the whole call. Within a month, input order is kept.
    pub fn export_records(
        &self,
        records: &[SpecTreatmentRecord],
    ) -> Result<ReportExport, StoreError> {
        let mut dict_records_by_name: BTreeMap<String, Vec<SpecTreatmentRecord>> =
            BTreeMap::new();
        for record in records {
            let c_name = derive_month_file_name(&self.options.file_name_prefix, record)?;
            dict_records_by_name
                .entry(c_name)
                .or_default()
                .push(record.clone());
        }

        let mut builder = ReportExportBuilder::default();
        for (c_name, l_records) in dict_records_by_name {
            let v_existing = self.store.load(&c_name)?;
            let (v_xlsx, l_reports) =
                merge_many(v_existing.as_deref(), &l_records, &self.options.options_grid)?;
            self.store.save(&c_name, &v_xlsx)?;
            tracing::debug!(name = %c_name, n_records = l_records.len(), "saved monthly workbook");

            builder.add_merges(&l_reports);
            builder.add_file(c_name);
        }

        let report = builder.build();
        tracing::info!(summary = %report, "exported records");
        Ok(report)
    }

    /// Write `records` into a fresh range workbook, replacing any previous one.
    ///
    /// The range only names the file. Without `range`, it spans the earliest
    /// and latest record dates.
    pub fn export_range(
        &self,
        records: &[SpecTreatmentRecord],
        range: Option<&SpecDateRange>,
    ) -> Result<ReportExport, StoreError> {
        let range = match range {
            Some(range) => {
                if range.start.trim().is_empty() || range.end.trim().is_empty() {
                    return Err(StoreError::InvalidInput(
                        "date range bounds must not be empty".to_string(),
                    ));
                }
                range.clone()
            }
            None => derive_record_date_range(records).ok_or_else(|| {
                StoreError::InvalidInput(
                    "no date range given and no record has a parseable date".to_string(),
                )
            })?,
        };
        let c_name = derive_range_file_name(&self.options.file_name_prefix, &range);

        let (v_xlsx, l_reports) = merge_many(None, records, &self.options.options_grid)?;
        self.store.save(&c_name, &v_xlsx)?;

        let mut builder = ReportExportBuilder::default();
        builder.add_merges(&l_reports);
        builder.add_file(c_name);
        let report = builder.build();
        tracing::info!(
            start = %range.start,
            end = %range.end,
            summary = %report,
            "exported date range"
        );
        Ok(report)
    }
}
