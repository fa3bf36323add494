//! XLSX reader kernel: first worksheet of a workbook into a treatment grid.
//!
//! Reads the OOXML parts directly (`xl/workbook.xml`, its relationships,
//! `xl/sharedStrings.xml`, the sheet part). Formatting is discarded; only
//! cell positions and values survive.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use quick_xml::Reader as XmlReader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{EnumCellValue, MergeError, SpecTreatmentGrid};
use crate::util::parse_cell_reference;

const C_PART_WORKBOOK: &str = "xl/workbook.xml";
const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const C_PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const C_PART_SHEET_FALLBACK: &str = "xl/worksheets/sheet1.xml";

type ZipSource<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Decode XLSX bytes into a rectangular grid.
///
/// Blank and missing cells become [`EnumCellValue::None`]; rows are padded
/// to the widest row.
pub fn decode_grid(v_xlsx: &[u8]) -> Result<SpecTreatmentGrid, MergeError> {
    let mut zip = ZipArchive::new(Cursor::new(v_xlsx))
        .map_err(|err| MergeError::Decode(format!("Failed to open xlsx container: {err}")))?;

    let c_part_sheet = derive_first_sheet_part(&mut zip)?;
    let l_shared_strings = match read_zip_part(&mut zip, C_PART_SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let xml_sheet = read_zip_part(&mut zip, &c_part_sheet)?.ok_or_else(|| {
        MergeError::Decode(format!("Worksheet part is missing: {c_part_sheet}"))
    })?;

    let mut grid = parse_sheet_cells(&xml_sheet, &l_shared_strings)?;
    let n_width = grid.width();
    for row in &mut grid.rows {
        row.resize(n_width, EnumCellValue::None);
    }

    tracing::debug!(
        sheet = %c_part_sheet,
        rows = grid.height(),
        cols = n_width,
        "decoded xlsx grid"
    );
    Ok(grid)
}

fn read_zip_part(zip: &mut ZipSource<'_>, name: &str) -> Result<Option<String>, MergeError> {
    let mut file = match zip.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => {
            return Err(MergeError::Decode(format!(
                "Failed to open xlsx part {name}: {err}"
            )));
        }
    };
    let mut c_xml = String::new();
    file.read_to_string(&mut c_xml)
        .map_err(|err| MergeError::Decode(format!("Failed to read xlsx part {name}: {err}")))?;
    Ok(Some(c_xml))
}

/// Zip path of the first `<sheet>` listed in the workbook.
fn derive_first_sheet_part(zip: &mut ZipSource<'_>) -> Result<String, MergeError> {
    let xml_workbook = read_zip_part(zip, C_PART_WORKBOOK)?
        .ok_or_else(|| MergeError::Decode("Workbook part is missing.".to_string()))?;

    let Some(c_rel_id) = parse_first_sheet_rel_id(&xml_workbook)? else {
        return Err(MergeError::Decode("Workbook lists no sheets.".to_string()));
    };

    let Some(xml_rels) = read_zip_part(zip, C_PART_WORKBOOK_RELS)? else {
        return Ok(C_PART_SHEET_FALLBACK.to_string());
    };
    let dict_targets = parse_relationship_targets(&xml_rels)?;
    match dict_targets.get(&c_rel_id) {
        Some(target) => Ok(derive_part_path_from_target(target)),
        None => Err(MergeError::Decode(format!(
            "Sheet relationship {c_rel_id} is not declared."
        ))),
    }
}

fn derive_part_path_from_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(path_abs) => path_abs.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn derive_attr_value(
    elem: &BytesStart<'_>,
    key_local: &[u8],
) -> Result<Option<String>, MergeError> {
    for attr in elem.attributes() {
        let attr = attr.map_err(|err| MergeError::Decode(format!("Bad XML attribute: {err}")))?;
        if attr.key.local_name().as_ref() == key_local {
            let value = attr
                .unescape_value()
                .map_err(|err| MergeError::Decode(format!("Bad XML attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn derive_xml_error(part: &str, err: quick_xml::Error) -> MergeError {
    MergeError::Decode(format!("Failed to parse {part}: {err}"))
}

fn parse_first_sheet_rel_id(xml: &str) -> Result<Option<String>, MergeError> {
    let mut reader = XmlReader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                return derive_attr_value(&e, b"id");
            }
            Ok(Event::Eof) => return Ok(None),
            Err(err) => return Err(derive_xml_error(C_PART_WORKBOOK, err)),
            _ => {}
        }
    }
}

fn parse_relationship_targets(xml: &str) -> Result<BTreeMap<String, String>, MergeError> {
    let mut reader = XmlReader::from_str(xml);
    let mut dict_targets = BTreeMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(c_id), Some(c_target)) = (
                    derive_attr_value(&e, b"Id")?,
                    derive_attr_value(&e, b"Target")?,
                ) {
                    dict_targets.insert(c_id, c_target);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(derive_xml_error(C_PART_WORKBOOK_RELS, err)),
            _ => {}
        }
    }
    Ok(dict_targets)
}

/// Shared string table; rich-text runs are concatenated, phonetic hints skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, MergeError> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut l_strings = Vec::new();
    let mut c_current = String::new();
    let mut if_in_item = false;
    let mut if_in_text = false;
    let mut n_depth_phonetic = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if_in_item = true;
                    c_current.clear();
                }
                b"rPh" => n_depth_phonetic += 1,
                b"t" => if_in_text = if_in_item && n_depth_phonetic == 0,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                l_strings.push(String::new());
            }
            Ok(Event::Text(e)) if if_in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| derive_xml_error(C_PART_SHARED_STRINGS, err))?;
                c_current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if_in_item = false;
                    l_strings.push(std::mem::take(&mut c_current));
                }
                b"rPh" => n_depth_phonetic = n_depth_phonetic.saturating_sub(1),
                b"t" => if_in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(derive_xml_error(C_PART_SHARED_STRINGS, err)),
            _ => {}
        }
    }

    Ok(l_strings)
}

/// Cell type attribute (`t`) of an OOXML `<c>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumXmlCellType {
    Number,
    SharedString,
    InlineString,
    FormulaString,
    Boolean,
    Error,
}

impl EnumXmlCellType {
    fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("s") => Self::SharedString,
            Some("inlineStr") => Self::InlineString,
            Some("str") => Self::FormulaString,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// In-progress `<c>` element.
struct SpecPendingCell {
    row_idx: usize,
    col_idx: usize,
    rule_type: EnumXmlCellType,
    c_value: String,
    c_inline: String,
}

fn parse_sheet_cells(
    xml: &str,
    l_shared_strings: &[String],
) -> Result<SpecTreatmentGrid, MergeError> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut l_rows: Vec<Vec<EnumCellValue>> = Vec::new();
    let mut n_row_idx_current = 0usize;
    let mut n_row_idx_next = 0usize;
    let mut n_col_idx_next = 0usize;
    let mut cell_pending: Option<SpecPendingCell> = None;
    let mut if_in_value = false;
    let mut if_in_inline_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    n_row_idx_current = derive_row_idx(&e, n_row_idx_next)?;
                    n_row_idx_next = n_row_idx_current + 1;
                    n_col_idx_next = 0;
                }
                b"c" => {
                    cell_pending = Some(derive_pending_cell(
                        &e,
                        n_row_idx_current,
                        n_col_idx_next,
                    )?);
                }
                b"v" => if_in_value = cell_pending.is_some(),
                b"t" => if_in_inline_text = cell_pending.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    n_row_idx_current = derive_row_idx(&e, n_row_idx_next)?;
                    n_row_idx_next = n_row_idx_current + 1;
                }
                b"c" => {
                    let cell = derive_pending_cell(&e, n_row_idx_current, n_col_idx_next)?;
                    n_col_idx_next = cell.col_idx + 1;
                    place_cell(&mut l_rows, cell.row_idx, cell.col_idx, EnumCellValue::None);
                }
                _ => {}
            },
            Ok(Event::Text(e)) if if_in_value || if_in_inline_text => {
                let text = e
                    .unescape()
                    .map_err(|err| MergeError::Decode(format!("Bad worksheet text: {err}")))?;
                if let Some(cell) = cell_pending.as_mut() {
                    if if_in_value {
                        cell.c_value.push_str(&text);
                    } else {
                        cell.c_inline.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => if_in_value = false,
                b"t" => if_in_inline_text = false,
                b"c" => {
                    if let Some(cell) = cell_pending.take() {
                        n_col_idx_next = cell.col_idx + 1;
                        let value = derive_cell_value(&cell, l_shared_strings)?;
                        place_cell(&mut l_rows, cell.row_idx, cell.col_idx, value);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(MergeError::Decode(format!(
                    "Failed to parse worksheet XML: {err}"
                )));
            }
            _ => {}
        }
    }

    Ok(SpecTreatmentGrid::from_rows(l_rows))
}

fn derive_row_idx(elem: &BytesStart<'_>, n_row_idx_default: usize) -> Result<usize, MergeError> {
    match derive_attr_value(elem, b"r")? {
        Some(c_row_num) => {
            let n_row_num: usize = c_row_num
                .trim()
                .parse()
                .map_err(|_| MergeError::Decode(format!("Bad row number: {c_row_num}")))?;
            if n_row_num == 0 || n_row_num > N_NROWS_EXCEL_MAX {
                return Err(MergeError::Decode(format!(
                    "Row number out of range: {n_row_num}"
                )));
            }
            Ok(n_row_num - 1)
        }
        None => Ok(n_row_idx_default),
    }
}

fn derive_pending_cell(
    elem: &BytesStart<'_>,
    n_row_idx: usize,
    n_col_idx_default: usize,
) -> Result<SpecPendingCell, MergeError> {
    let (n_row_idx, n_col_idx) = match derive_attr_value(elem, b"r")? {
        Some(c_ref) => parse_cell_reference(&c_ref)
            .ok_or_else(|| MergeError::Decode(format!("Bad cell reference: {c_ref}")))?,
        None => (n_row_idx, n_col_idx_default),
    };
    if n_col_idx >= N_NCOLS_EXCEL_MAX || n_row_idx >= N_NROWS_EXCEL_MAX {
        return Err(MergeError::Decode(format!(
            "Cell position out of range: row={n_row_idx} col={n_col_idx}"
        )));
    }
    let c_type = derive_attr_value(elem, b"t")?;
    Ok(SpecPendingCell {
        row_idx: n_row_idx,
        col_idx: n_col_idx,
        rule_type: EnumXmlCellType::from_attr(c_type.as_deref()),
        c_value: String::new(),
        c_inline: String::new(),
    })
}

fn derive_cell_value(
    cell: &SpecPendingCell,
    l_shared_strings: &[String],
) -> Result<EnumCellValue, MergeError> {
    let value = match cell.rule_type {
        EnumXmlCellType::InlineString => {
            if cell.c_inline.is_empty() {
                EnumCellValue::None
            } else {
                EnumCellValue::String(cell.c_inline.clone())
            }
        }
        _ if cell.c_value.is_empty() => EnumCellValue::None,
        EnumXmlCellType::SharedString => {
            let n_idx: usize = cell.c_value.trim().parse().map_err(|_| {
                MergeError::Decode(format!("Bad shared string index: {}", cell.c_value))
            })?;
            let text = l_shared_strings.get(n_idx).ok_or_else(|| {
                MergeError::Decode(format!("Shared string index out of range: {n_idx}"))
            })?;
            EnumCellValue::String(text.clone())
        }
        EnumXmlCellType::Number => match cell.c_value.trim().parse::<f64>() {
            Ok(val) => EnumCellValue::Number(val),
            Err(_) => EnumCellValue::String(cell.c_value.clone()),
        },
        EnumXmlCellType::Boolean => EnumCellValue::String(
            if cell.c_value.trim() == "1" {
                "True"
            } else {
                "False"
            }
            .to_string(),
        ),
        EnumXmlCellType::FormulaString | EnumXmlCellType::Error => {
            EnumCellValue::String(cell.c_value.clone())
        }
    };
    Ok(value)
}

fn place_cell(
    l_rows: &mut Vec<Vec<EnumCellValue>>,
    row_idx: usize,
    col_idx: usize,
    value: EnumCellValue,
) {
    if l_rows.len() <= row_idx {
        l_rows.resize_with(row_idx + 1, Vec::new);
    }
    let row = &mut l_rows[row_idx];
    if row.len() <= col_idx {
        row.resize(col_idx + 1, EnumCellValue::None);
    }
    row[col_idx] = value;
}
