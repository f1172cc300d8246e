//! Per-format plain-text extraction.
//!
//! Dispatch is a closed match over [`DocumentFormat`]; each extractor turns
//! one raw document into UTF-8 text. Failures are reported as errors here and
//! downgraded to inline diagnostics by the index manager so that a single
//! corrupt file never aborts a corpus build.

use crate::error::IngestError;
use crate::models::DocumentFormat;
use lopdf::Document;
use quick_xml::events::Event;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type OoxmlArchive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

/// Extract the plain-text rendering of one document.
pub fn extract_document(path: &Path, format: DocumentFormat) -> Result<String, IngestError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::PlainText => extract_txt(path),
        DocumentFormat::Csv => extract_csv(path),
        DocumentFormat::Docx => extract_docx(&fs::read(path)?),
        DocumentFormat::Spreadsheet => extract_xlsx(&fs::read(path)?),
        DocumentFormat::SlideDeck => extract_pptx(&fs::read(path)?),
    }
}

/// Inline marker substituted for a document whose extraction failed.
pub fn diagnostic_text(format: DocumentFormat, error: &IngestError) -> String {
    format!("[error reading {}: {}]", format.label(), error)
}

fn extract_pdf(path: &Path) -> Result<String, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    // A page whose text extraction fails contributes an empty string rather
    // than failing the document.
    let pages = document
        .get_pages()
        .keys()
        .map(|page_no| document.extract_text(&[*page_no]).unwrap_or_default())
        .collect::<Vec<_>>();

    Ok(pages.join("\n"))
}

fn extract_txt(path: &Path) -> Result<String, IngestError> {
    Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned())
}

fn extract_csv(path: &Path) -> Result<String, IngestError> {
    let raw = String::from_utf8_lossy(&fs::read(path)?).into_owned();
    let rows = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_csv_row(line).join("\t"))
        .collect::<Vec<_>>();
    Ok(rows.join("\n"))
}

fn parse_csv_row(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    values.push(current.trim().to_string());
    values
}

fn open_archive(bytes: &[u8]) -> Result<OoxmlArchive<'_>, IngestError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|error| IngestError::Ooxml(error.to_string()))
}

fn read_entry(archive: &mut OoxmlArchive<'_>, name: &str) -> Result<Vec<u8>, IngestError> {
    let entry = archive
        .by_name(name)
        .map_err(|error| IngestError::Ooxml(format!("{name}: {error}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|error| IngestError::Ooxml(error.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(IngestError::Ooxml(format!("{name} exceeds size limit")));
    }
    Ok(out)
}

fn read_entry_optional(
    archive: &mut OoxmlArchive<'_>,
    name: &str,
) -> Result<Option<Vec<u8>>, IngestError> {
    if !archive.file_names().any(|entry| entry == name) {
        return Ok(None);
    }
    read_entry(archive, name).map(Some)
}

/// DOCX: body paragraph text joined by newlines, then every table row as a
/// newline plus tab-joined, trimmed cell text.
fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let xml = read_entry(&mut open_archive(bytes)?, "word/document.xml")?;

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut table_depth = 0usize;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text_run => {
                let text = te.unescape().unwrap_or_default();
                if table_depth > 0 {
                    cell.push_str(&text);
                } else {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if table_depth > 0 {
                        if !cell.is_empty() && !cell.ends_with('\n') {
                            cell.push('\n');
                        }
                    } else if !paragraph.is_empty() {
                        paragraphs.push(std::mem::take(&mut paragraph));
                    }
                }
                b"tc" => row.push(std::mem::take(&mut cell)),
                b"tr" => rows.push(std::mem::take(&mut row)),
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::Ooxml(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let mut text = paragraphs.join("\n");
    for cells in rows {
        text.push('\n');
        let joined = cells
            .iter()
            .map(|value| value.trim())
            .collect::<Vec<_>>()
            .join("\t");
        text.push_str(&joined);
    }
    Ok(text)
}

/// PPTX: slides in numeric order; each text body's paragraphs one per line,
/// the body followed by a newline.
fn extract_pptx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in slide_names {
        let xml = read_entry(&mut archive, &name)?;
        out.push_str(&extract_slide_text(&xml)?);
    }
    Ok(out)
}

fn extract_slide_text(xml: &[u8]) -> Result<String, IngestError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut out = String::new();
    let mut shape = String::new();
    let mut line = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Text(te)) if in_text_run => {
                line.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !shape.is_empty() {
                        shape.push('\n');
                    }
                    shape.push_str(&line);
                    line.clear();
                }
                b"txBody" => {
                    out.push_str(&shape);
                    out.push('\n');
                    shape.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::Ooxml(error.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Raw,
    Shared,
    Inline,
}

/// XLSX: per sheet, rows newline-separated with tab-joined cell values.
fn extract_xlsx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = open_archive(bytes)?;

    let shared = match read_entry_optional(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheet_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/sheet") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    sheet_names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut sheets = Vec::new();
    for name in sheet_names {
        let xml = read_entry(&mut archive, &name)?;
        sheets.push(parse_sheet_rows(&xml, &shared)?);
    }
    Ok(sheets.join("\n"))
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, IngestError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" if in_item => in_text = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::Ooxml(error.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn parse_sheet_rows(xml: &[u8], shared: &[String]) -> Result<String, IngestError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut rows: Vec<String> = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut kind = CellKind::Raw;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => cells.clear(),
                b"c" => {
                    cell.clear();
                    kind = cell_kind(&e);
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cells.push(String::new());
                }
            }
            Ok(Event::Text(te)) => {
                let value = te.unescape().unwrap_or_default();
                if in_value {
                    match kind {
                        CellKind::Shared => {
                            if let Ok(index) = value.trim().parse::<usize>() {
                                if let Some(resolved) = shared.get(index) {
                                    cell.push_str(resolved);
                                }
                            }
                        }
                        _ => cell.push_str(value.trim()),
                    }
                } else if in_inline_text {
                    cell.push_str(&value);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => cells.push(std::mem::take(&mut cell)),
                b"row" => rows.push(cells.join("\t")),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::Ooxml(error.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows.join("\n"))
}

fn cell_kind(e: &quick_xml::events::BytesStart<'_>) -> CellKind {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"t" {
            return match attr.value.as_ref() {
                b"s" => CellKind::Shared,
                b"inlineStr" => CellKind::Inline,
                _ => CellKind::Raw,
            };
        }
    }
    CellKind::Raw
}
