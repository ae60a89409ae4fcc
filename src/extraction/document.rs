//! Raw text extraction for Word documents.
//!
//! Only the OOXML container (`.docx`) is understood: the main part `word/document.xml` is read
//! out of the ZIP archive and the contents of every `<w:t>` run are collected, one line per
//! paragraph. Legacy binary `.doc` files fail with a descriptive reason.

use quick_xml::{Reader, events::Event};
use std::io::{Cursor, Read};

use super::types::{ExtractError, Payload};

const DOCUMENT_PART: &str = "word/document.xml";
/// Decompressed size ceiling for the document part.
const MAX_PART_BYTES: u64 = 50 * 1024 * 1024;

pub(crate) fn extract_document(bytes: &[u8]) -> Result<Payload, ExtractError> {
    let xml = read_document_part(bytes)?;
    collect_text(&xml).map(Payload::Text)
}

fn read_document_part(bytes: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| {
        ExtractError::Document(format!("not a valid OOXML archive: {error}"))
    })?;
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| ExtractError::Document(format!("{DOCUMENT_PART} not found")))?;

    let mut xml = Vec::new();
    part.take(MAX_PART_BYTES)
        .read_to_end(&mut xml)
        .map_err(|error| ExtractError::Document(error.to_string()))?;
    if xml.len() as u64 >= MAX_PART_BYTES {
        return Err(ExtractError::Document(format!(
            "{DOCUMENT_PART} exceeds {MAX_PART_BYTES} bytes"
        )));
    }
    Ok(xml)
}

fn collect_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) if tag.local_name().as_ref() == b"t" => in_run_text = true,
            Ok(Event::End(tag)) => match tag.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(tag)) => match tag.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_run_text => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| ExtractError::Document(error.to_string()))?;
                out.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(error) => return Err(ExtractError::Document(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file(DOCUMENT_PART, SimpleFileOptions::default())
                .unwrap();
            write!(
                writer,
                r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
            )
            .unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn paragraphs_become_lines_and_formatting_is_dropped() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p><w:p><w:r><w:t>Fish &amp; chips</w:t></w:r></w:p>"#,
        );
        let payload = extract_document(&bytes).unwrap();
        assert_eq!(payload, Payload::Text("Hello world\nFish & chips".into()));
    }

    #[test]
    fn legacy_or_corrupt_bytes_fail() {
        let error = extract_document(b"\xd0\xcf\x11\xe0 legacy doc").unwrap_err();
        assert!(error.to_string().contains("not a valid OOXML archive"));
    }

    #[test]
    fn archive_without_document_part_fails() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("other.xml", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        let error = extract_document(&cursor.into_inner()).unwrap_err();
        assert!(error.to_string().contains("word/document.xml not found"));
    }
}
