use crate::error::ExtractError;
use lopdf::Document;
use std::path::Path;

/// Raw text of one physical page, before normalization.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Boundary to the PDF layout library. The pipeline only depends on the
/// (page number, text) shape, in increasing page order starting at 1.
pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        let document =
            Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        // Pages with no extractable text still appear; callers may filter.
        // An empty page list is a valid result, not an error.
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::{LopdfExtractor, PdfExtractor};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn corrupt_pdf_reports_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%not really a pdf")?;

        let result = LopdfExtractor.extract_pages(&path);
        assert!(matches!(
            result,
            Err(crate::error::ExtractError::PdfParse(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_file_reports_parse_error() {
        let result = LopdfExtractor.extract_pages(std::path::Path::new("/nonexistent/x.pdf"));
        assert!(result.is_err());
    }
}
