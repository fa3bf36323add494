//! XLSX writer kernel that serializes a treatment grid into workbook bytes.

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::conf::{N_COL_IDX_LABEL, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumCellValue, MergeError, SpecAutofitCellsPolicy, SpecCellFormat, SpecGridWriteOptions,
    SpecTreatmentGrid,
};
use crate::util::{estimate_unicode_string_width, sanitize_sheet_name};

/// Resolved `rust_xlsxwriter` formats for one write call.
struct SpecGridFormats {
    label: Format,
    text: Format,
    integer: Format,
    decimal: Format,
}

impl SpecGridFormats {
    fn from_options(options: &SpecGridWriteOptions) -> Self {
        Self {
            label: derive_rust_xlsx_format(&options.fmt_label),
            text: derive_rust_xlsx_format(&options.fmt_text),
            integer: derive_rust_xlsx_format(&options.fmt_integer),
            decimal: derive_rust_xlsx_format(&options.fmt_decimal),
        }
    }

    fn select(&self, col_idx: usize, value: &EnumCellValue) -> &Format {
        if col_idx == N_COL_IDX_LABEL {
            return &self.label;
        }
        match value {
            EnumCellValue::Number(val) if val.fract() == 0.0 => &self.integer,
            EnumCellValue::Number(_) => &self.decimal,
            _ => &self.text,
        }
    }
}

/// Serialize `grid` as a single-sheet workbook.
///
/// Column order is written exactly as given. The grid must be rectangular.
pub fn encode_grid(
    grid: &SpecTreatmentGrid,
    options: &SpecGridWriteOptions,
) -> Result<Vec<u8>, MergeError> {
    validate_grid_shape(grid)?;
    validate_policy_autofit(&options.policy_autofit)?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sanitize_sheet_name(&options.sheet_name, "_"))
        .map_err(derive_xlsx_error)?;

    let formats = SpecGridFormats::from_options(options);
    for (n_idx_row, row) in grid.rows.iter().enumerate() {
        for (n_idx_col, value) in row.iter().enumerate() {
            write_cell_with_format(
                worksheet,
                n_idx_row,
                n_idx_col,
                value,
                formats.select(n_idx_col, value),
            )?;
        }
    }

    if grid.height() > 0 && grid.width() > 0 {
        worksheet
            .set_freeze_panes(
                cast_row_num(usize::min(options.row_freeze, grid.height()))?,
                cast_col_num(usize::min(options.col_freeze, grid.width()))?,
            )
            .map_err(derive_xlsx_error)?;
    }

    for (n_idx_col, n_width) in derive_column_widths(grid, &options.policy_autofit)
        .into_iter()
        .enumerate()
    {
        worksheet
            .set_column_width(cast_col_num(n_idx_col)?, n_width as f64)
            .map_err(derive_xlsx_error)?;
    }

    let v_xlsx = workbook.save_to_buffer().map_err(derive_xlsx_error)?;
    tracing::debug!(
        rows = grid.height(),
        cols = grid.width(),
        bytes = v_xlsx.len(),
        "encoded xlsx grid"
    );
    Ok(v_xlsx)
}

fn validate_grid_shape(grid: &SpecTreatmentGrid) -> Result<(), MergeError> {
    if !grid.is_rectangular() {
        let l_lens: Vec<usize> = grid.rows.iter().map(Vec::len).collect();
        return Err(MergeError::Encode(format!(
            "Grid is not rectangular; row lengths: {l_lens:?}"
        )));
    }
    if grid.height() > N_NROWS_EXCEL_MAX || grid.width() > N_NCOLS_EXCEL_MAX {
        return Err(MergeError::Encode(format!(
            "Grid {}x{} exceeds Excel sheet limits.",
            grid.height(),
            grid.width()
        )));
    }
    Ok(())
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), MergeError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(MergeError::Encode(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(MergeError::Encode(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        ));
    }
    Ok(())
}

/// Final width per column, clamped to the policy bounds (and Excel's 255).
pub fn derive_column_widths(
    grid: &SpecTreatmentGrid,
    policy_autofit: &SpecAutofitCellsPolicy,
) -> Vec<usize> {
    let n_min = usize::max(1, policy_autofit.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));

    let mut l_width_by_col = vec![0usize; grid.width()];
    if policy_autofit.if_autofit {
        for row in &grid.rows {
            for (n_idx_col, value) in row.iter().enumerate() {
                l_width_by_col[n_idx_col] = usize::max(
                    l_width_by_col[n_idx_col],
                    estimate_unicode_string_width(&value.to_text()),
                );
            }
        }
    }

    l_width_by_col
        .into_iter()
        .map(|n_width| {
            if !policy_autofit.if_autofit {
                return n_min;
            }
            usize::min(
                n_max,
                usize::max(n_min, n_width + policy_autofit.width_cell_padding),
            )
        })
        .collect()
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), MergeError> {
    match value {
        EnumCellValue::String(val) if !val.is_empty() => {
            worksheet
                .write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    val,
                    format,
                )
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(val) if val.is_finite() => {
            worksheet
                .write_number_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    *val,
                    format,
                )
                .map_err(derive_xlsx_error)?;
        }
        _ => {
            worksheet
                .write_blank(cast_row_num(row_idx)?, cast_col_num(col_idx)?, format)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, MergeError> {
    u32::try_from(value).map_err(|_| MergeError::Encode(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, MergeError> {
    u16::try_from(value).map_err(|_| MergeError::Encode(format!("column index overflow: {value}")))
}

fn derive_xlsx_error(err: XlsxError) -> MergeError {
    MergeError::Encode(format!("xlsx write error: {err}"))
}
