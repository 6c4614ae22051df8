use super::DocumentError;

/// Extracts the text of every page in page order using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers only.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, DocumentError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        .map_err(|e| DocumentError::Pdf(e.to_string()))?;
    Ok(join_pages(pages))
}

/// Each page with text is followed by a newline; empty pages leave no trace.
fn join_pages(pages: Vec<String>) -> String {
    pages
        .into_iter()
        .filter(|page| !page.is_empty())
        .fold(String::new(), |mut text, page| {
            text.push_str(&page);
            text.push('\n');
            text
        })
}
