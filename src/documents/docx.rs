use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use thiserror::Error;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub(crate) enum DocxError {
    #[error("unreadable docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read word/document.xml: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document xml: {0}")]
    Xml(String),
}

/// Paragraph texts of a `.docx` body in document order, blank paragraphs included.
///
/// Tabs and explicit line breaks inside a paragraph are kept as `\t` and `\n`.
pub(crate) fn paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut part = archive.by_name(DOCUMENT_PART)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;

    parse_paragraphs(&xml)
}

pub(crate) fn parse_paragraphs(xml: &str) -> Result<Vec<String>, DocxError> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text_node = true,
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" | b"w:cr" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" | b"w:cr" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e.unescape().map_err(|err| DocxError::Xml(err.to_string()))?;
                    current.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(DocxError::Xml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;

    /// Builds a minimal `.docx` archive whose body holds one `w:p` per entry.
    pub(crate) fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|text| {
                if text.is_empty() {
                    "<w:p/>".to_string()
                } else {
                    format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
                }
            })
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(DOCUMENT_PART, FileOptions::default()).expect("start file");
        writer.write_all(xml.as_bytes()).expect("write xml");
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn reads_paragraphs_in_order() {
        let bytes = docx_bytes(&["What is force?", "Mass times acceleration.", "", "Next"]);
        let paragraphs = paragraphs(&bytes).expect("parse docx");
        assert_eq!(paragraphs, vec!["What is force?", "Mass times acceleration.", "", "Next"]);
    }

    #[test]
    fn runs_tabs_and_breaks_are_joined_within_a_paragraph() {
        let xml = "<w:document><w:body><w:p><w:r><w:t>Newton</w:t></w:r><w:r><w:tab/>\
                   <w:t>second &amp; third</w:t><w:br/><w:t>law</w:t></w:r></w:p></w:body>\
                   </w:document>";
        let paragraphs = parse_paragraphs(xml).expect("parse xml");
        assert_eq!(paragraphs, vec!["Newton\tsecond & third\nlaw"]);
    }

    #[test]
    fn non_zip_bytes_are_rejected() {
        let err = paragraphs(b"plain text, not an archive").unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }
}
