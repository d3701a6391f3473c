//! Page-wise text extraction for course documents (PDF, OOXML, plain text).
//!
//! Provenance estimation needs the document's text in reading order with
//! page boundaries preserved, so every extractor returns a `Vec<String>`
//! with one entry per page (PDF), slide (PPTX) or sheet (XLSX). Formats
//! without pages yield a single entry.
//!
//! [`FileExtractor`] binds this module to the documents directory and
//! implements the core [`TextExtractor`] trait.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::Event;
use rag_chat_core::error::{ChatError, Result as ChatResult};
use rag_chat_core::provenance::TextExtractor;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Zip-bomb guard for a single decompressed entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type ZipReader<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl From<ExtractError> for ChatError {
    fn from(e: ExtractError) -> Self {
        ChatError::Extraction(e.to_string())
    }
}

/// Content type for a file name, decided by extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        "xlsx" => Some(MIME_XLSX),
        "txt" => Some(MIME_TEXT),
        "md" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Extract the page texts of `bytes` interpreted as `content_type`.
pub fn extract_pages(bytes: &[u8], content_type: &str) -> Result<Vec<String>, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes).map(|text| vec![text]),
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(vec![String::from_utf8(bytes.to_vec())?]),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn ooxml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn open_zip(bytes: &[u8]) -> Result<ZipReader<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)
}

fn read_zip_entry_bounded(
    archive: &mut ZipReader<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Entries named `{prefix}{n}.xml`, ordered by `n`.
fn numbered_entries(archive: &ZipReader<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    collect_paragraph_text(&xml)
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let slides = numbered_entries(&archive, "ppt/slides/slide");
    let mut pages = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        pages.push(collect_paragraph_text(&xml)?);
    }
    Ok(pages)
}

/// Concatenate every `<*:t>` text run, one line per `<*:p>` paragraph.
///
/// Works for both WordprocessingML (`w:`) and DrawingML (`a:`) since only
/// local names are compared.
fn collect_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_t = true,
            Ok(Event::Text(te)) if in_t => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut pages = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        pages.push(extract_sheet_rows(&xml, &shared_strings)?);
    }
    Ok(pages)
}

fn read_shared_strings(archive: &mut ZipReader<'_>) -> Result<Vec<String>, ExtractError> {
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One line per row, cells separated by a space. Inline numbers are kept
/// verbatim; shared-string indices are resolved.
fn extract_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut shared = false;
    let mut cells = 0usize;
    loop {
        if cells >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_v => {
                let raw = te.unescape().unwrap_or_default();
                let value = raw.trim();
                let text = if shared {
                    value
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i).cloned())
                } else if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
                if let Some(text) = text {
                    row.push(text);
                    cells += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => shared = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

/// Reads documents by name from a local directory.
///
/// Names are the ones the retrieval backend reports for each chunk, i.e.
/// the file names that were uploaded. Names that would escape the root are
/// refused.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    root: PathBuf,
}

impl FileExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, document: &str) -> Result<PathBuf, ChatError> {
        let rel = Path::new(document);
        let safe = !document.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ChatError::Extraction(format!(
                "refusing document name '{document}'"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract_pages(&self, document: &str) -> ChatResult<Vec<String>> {
        let path = self.resolve(document)?;
        let content_type = content_type_for(&path).ok_or_else(|| {
            ChatError::Extraction(format!("unsupported file type: {}", path.display()))
        })?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ChatError::Extraction(format!("{}: {e}", path.display())))?;

        // PDF parsing is CPU-bound.
        let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes, content_type))
            .await
            .map_err(|e| ChatError::Extraction(e.to_string()))??;
        Ok(pages)
    }
}
