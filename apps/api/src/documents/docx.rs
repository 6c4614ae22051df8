use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::DocumentError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts the text of every body paragraph in document order, one line per paragraph.
/// Empty paragraphs still produce an (empty) line. Table cells and text boxes are skipped.
pub fn extract_text(docx_bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx_bytes))
        .map_err(|e| DocumentError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| DocumentError::Docx(format!("{DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Docx(e.to_string()))?;

    Ok(body_paragraphs(&xml)?.join("\n"))
}

fn body_paragraphs(xml: &str) -> Result<Vec<String>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    // Qualified names of currently open elements, outermost first.
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DocumentError::Docx(format!("invalid XML: {e}")))?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"w:p" if parent_is(&path, b"w:body") => current = Some(String::new()),
                    b"w:t" => {
                        in_text =
                            current.is_some() && parent_is(&path, b"w:r") && !in_text_box(&path)
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => {
                let name = e.name();
                if name.as_ref() == b"w:p" && parent_is(&path, b"w:body") {
                    paragraphs.push(String::new());
                    continue;
                }
                if !parent_is(&path, b"w:r") || in_text_box(&path) {
                    continue;
                }
                if let Some(paragraph) = current.as_mut() {
                    match name.as_ref() {
                        b"w:tab" => paragraph.push('\t'),
                        b"w:br" | b"w:cr" => paragraph.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentError::Docx(format!("invalid XML text: {e}")))?;
                if let Some(paragraph) = current.as_mut() {
                    paragraph.push_str(&text);
                }
            }
            Event::End(e) => {
                path.pop();
                match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:p" if parent_is(&path, b"w:body") => {
                        if let Some(paragraph) = current.take() {
                            paragraphs.push(paragraph);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn parent_is(path: &[Vec<u8>], name: &[u8]) -> bool {
    path.last().is_some_and(|last| last.as_slice() == name)
}

fn in_text_box(path: &[Vec<u8>]) -> bool {
    path.iter().any(|n| n.as_slice() == b"w:txbxContent")
}
