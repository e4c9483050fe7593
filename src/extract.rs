//! Format-aware text extraction.
//!
//! The dispatch key is the lowercased extension of the *original* filename
//! (uploads arrive via anonymous temp paths, so the temp path carries no
//! format information). Recognized extensions map to a strategy variant;
//! everything else falls back to reading the file as UTF-8 plain text.
//!
//! Extraction is all-or-nothing per file: a parse failure propagates as
//! [`ArchiveError::Extraction`] and leaves no chunk, vector, or store side
//! effects behind.

use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader as SpreadsheetReader, open_workbook_auto};
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ArchiveError;

/// One logical unit of text extracted from a source file: a PDF page, a
/// spreadsheet row, a slide, or the whole file for plain text.
///
/// Segments are immutable once produced and consumed only by the splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegment {
    pub text: String,
    pub source_id: String,
    pub sequence: usize,
}

/// How a recognized file format is turned into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// One segment per page (`pdf`).
    Paginated,
    /// One segment per non-empty spreadsheet row (`xlsx`, `xls`).
    ElementWise,
    /// One segment per slide, in slide order (`pptx`, `ppt`).
    SlideWise,
    /// The whole document body as a single segment (`docx`, `doc`).
    WholeDocument,
    /// The whole file read as UTF-8; the route for every unknown extension.
    PlainTextFallback,
}

impl ExtractionStrategy {
    /// Looks up the strategy for a filename. Unknown extensions (or no
    /// extension at all) route to the fallback variant rather than failing.
    pub fn for_filename(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => ExtractionStrategy::Paginated,
            "xlsx" | "xls" => ExtractionStrategy::ElementWise,
            "pptx" | "ppt" => ExtractionStrategy::SlideWise,
            "docx" | "doc" => ExtractionStrategy::WholeDocument,
            _ => ExtractionStrategy::PlainTextFallback,
        }
    }
}

/// Extracts an ordered sequence of [`RawSegment`]s from the file at `path`,
/// dispatching on the extension of `original_filename`.
pub fn extract(path: &Path, original_filename: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let strategy = ExtractionStrategy::for_filename(original_filename);
    debug!(file = original_filename, ?strategy, "extracting document");
    match strategy {
        ExtractionStrategy::Paginated => pdf_pages(path, original_filename),
        ExtractionStrategy::ElementWise => spreadsheet_rows(path, original_filename),
        ExtractionStrategy::SlideWise => slides(path, original_filename),
        ExtractionStrategy::WholeDocument => document_body(path, original_filename),
        ExtractionStrategy::PlainTextFallback => plain_text(path, original_filename),
    }
}

fn pdf_pages(path: &Path, name: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|err| ArchiveError::extraction(name, err))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(sequence, text)| RawSegment {
            text,
            source_id: name.to_string(),
            sequence,
        })
        .collect())
}

fn spreadsheet_rows(path: &Path, name: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| ArchiveError::extraction(name, err))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut segments = Vec::new();
    for sheet in sheet_names {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|err| ArchiveError::extraction(name, err))?;
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(|cell| cell.to_string())
                .collect();
            if cells.is_empty() {
                continue;
            }
            segments.push(RawSegment {
                text: format!("{sheet}: {}", cells.join(" | ")),
                source_id: name.to_string(),
                sequence: segments.len(),
            });
        }
    }
    Ok(segments)
}

fn slides(path: &Path, name: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let file = std::fs::File::open(path).map_err(|err| ArchiveError::extraction(name, err))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| ArchiveError::extraction(name, err))?;

    let mut slide_parts: Vec<String> = archive
        .file_names()
        .filter(|entry| entry.starts_with("ppt/slides/slide") && entry.ends_with(".xml"))
        .map(String::from)
        .collect();
    if slide_parts.is_empty() {
        return Err(ArchiveError::extraction(name, "no slides in presentation"));
    }
    slide_parts.sort_by_key(|part| slide_number(part));

    let mut segments = Vec::with_capacity(slide_parts.len());
    for (sequence, part) in slide_parts.iter().enumerate() {
        let xml = read_zip_entry(&mut archive, part, name)?;
        segments.push(RawSegment {
            text: ooxml_text(&xml).map_err(|err| ArchiveError::extraction(name, err))?,
            source_id: name.to_string(),
            sequence,
        });
    }
    Ok(segments)
}

fn document_body(path: &Path, name: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let file = std::fs::File::open(path).map_err(|err| ArchiveError::extraction(name, err))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| ArchiveError::extraction(name, err))?;
    let xml = read_zip_entry(&mut archive, "word/document.xml", name)?;
    Ok(vec![RawSegment {
        text: ooxml_text(&xml).map_err(|err| ArchiveError::extraction(name, err))?,
        source_id: name.to_string(),
        sequence: 0,
    }])
}

fn plain_text(path: &Path, name: &str) -> Result<Vec<RawSegment>, ArchiveError> {
    let bytes = std::fs::read(path).map_err(|err| ArchiveError::extraction(name, err))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| ArchiveError::extraction(name, "file is not valid UTF-8 text"))?;
    Ok(vec![RawSegment {
        text,
        source_id: name.to_string(),
        sequence: 0,
    }])
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<std::fs::File>,
    entry: &str,
    name: &str,
) -> Result<String, ArchiveError> {
    let mut part = archive
        .by_name(entry)
        .map_err(|err| ArchiveError::extraction(name, format!("missing part '{entry}': {err}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|err| ArchiveError::extraction(name, err))?;
    Ok(xml)
}

/// Collects the text runs (`<w:t>` / `<a:t>`) of an OOXML part, inserting a
/// newline at each paragraph boundary. Works for both Word bodies and
/// PowerPoint slides since only the namespace prefix differs.
fn ooxml_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run = true,
            Event::End(e) if e.local_name().as_ref() == b"t" => in_run = false,
            Event::Text(text) if in_run => out.push_str(&text.unescape()?),
            Event::End(e) if e.local_name().as_ref() == b"p" => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out.trim_end().to_string())
}

fn slide_number(part: &str) -> u32 {
    part.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn dispatch_uses_lowercased_extension() {
        assert_eq!(
            ExtractionStrategy::for_filename("Report.PDF"),
            ExtractionStrategy::Paginated
        );
        assert_eq!(
            ExtractionStrategy::for_filename("deck.pptx"),
            ExtractionStrategy::SlideWise
        );
        assert_eq!(
            ExtractionStrategy::for_filename("budget.XLSX"),
            ExtractionStrategy::ElementWise
        );
        assert_eq!(
            ExtractionStrategy::for_filename("memo.docx"),
            ExtractionStrategy::WholeDocument
        );
    }

    #[test]
    fn unknown_and_missing_extensions_fall_back() {
        assert_eq!(
            ExtractionStrategy::for_filename("notes.log"),
            ExtractionStrategy::PlainTextFallback
        );
        assert_eq!(
            ExtractionStrategy::for_filename("README"),
            ExtractionStrategy::PlainTextFallback
        );
    }

    #[test]
    fn fallback_reads_whole_file_as_one_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        std::fs::write(&path, "plain text content").unwrap();

        let segments = extract(&path, "notes.unknown").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "plain text content");
        assert_eq!(segments[0].source_id, "notes.unknown");
        assert_eq!(segments[0].sequence, 0);
    }

    #[test]
    fn fallback_rejects_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();

        let err = extract(&path, "garbage.bin").unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { ref source_id, .. } if source_id == "garbage.bin"));
    }

    #[test]
    fn corrupt_archive_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        std::fs::write(&path, "this is not a zip archive").unwrap();

        let err = extract(&path, "legacy.docx").unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
    }

    #[test]
    fn docx_body_extracts_paragraph_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                r#"<?xml version="1.0"?>
                <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
                  <w:body>
                    <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                    <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
                  </w:body>
                </w:document>"#,
            )],
        );

        let segments = extract(&path, "memo.docx").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn pptx_extracts_one_segment_per_slide_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        let slide = |text: &str| {
            format!(
                r#"<?xml version="1.0"?>
                <p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
                       xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
                  <p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody>
                </p:sld>"#
            )
        };
        // Entry order is deliberately shuffled; extraction must sort by slide
        // number, including 10 after 2.
        let slide2 = slide("Second slide");
        let slide1 = slide("First slide");
        let slide10 = slide("Tenth slide");
        write_zip(
            &path,
            &[
                ("ppt/slides/slide10.xml", slide10.as_str()),
                ("ppt/slides/slide2.xml", slide2.as_str()),
                ("ppt/slides/slide1.xml", slide1.as_str()),
            ],
        );

        let segments = extract(&path, "deck.pptx").unwrap();
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["First slide", "Second slide", "Tenth slide"]);
        assert_eq!(
            segments.iter().map(|s| s.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn ooxml_text_unescapes_entities() {
        let xml = r#"<w:p><w:r><w:t>a &amp; b</w:t></w:r></w:p>"#;
        assert_eq!(ooxml_text(xml).unwrap(), "a & b");
    }

    fn write_zip(path: &std::path::Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}
