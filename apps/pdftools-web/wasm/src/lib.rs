//! WASM bindings for the PDF tools
//!
//! All document state lives in Rust inside a `PdfToolsSession`. JavaScript
//! handles file input, thumbnails and the page renderer used for image
//! export.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PdfToolsSession, downloadBytes } from './pkg/pdftools_wasm.js';
//!
//! await init();
//!
//! const session = new PdfToolsSession();
//! session.setProgressCallback((percent, label) => updateUI(percent, label));
//! session.setPageRenderer(renderWithPdfJs);
//!
//! const a = session.addDocument("a.pdf", "application/pdf", bytesA);
//! const b = session.addDocument("b.pdf", "application/pdf", bytesB);
//! session.selectRange(b.id, "1-3");
//!
//! const { outputs, metrics } = await session.execute({ type: "Merge" });
//! downloadBytes(outputs[0].data, outputs[0].name, outputs[0].mimeType);
//! ```

pub mod download;
pub mod raster;
pub mod session;

use pdftools_core::ranges::parse_ranges_verbose;
use pdftools_core::{format_ranges as format_spans, PageSpan};
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use download::download_bytes;
pub use raster::JsRasterizer;
pub use session::PdfToolsSession;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Cheap header/trailer check before handing a file to a session
fn check_pdf_bytes(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 8 {
        return Err("File too small to be a valid PDF".to_string());
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err("Not a valid PDF file (missing %PDF- header)".to_string());
    }
    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err("PDF file appears truncated (missing %%EOF)".to_string());
    }
    Ok(())
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    check_pdf_bytes(bytes).map_err(|e| JsValue::from_str(&e))
}

#[derive(Debug, Serialize)]
struct ParsedRanges {
    ranges: Vec<PageSpan>,
    errors: Vec<String>,
}

fn parse_ranges_report(expression: &str) -> ParsedRanges {
    let (ranges, rejected) = parse_ranges_verbose(expression);
    ParsedRanges {
        ranges,
        errors: rejected.iter().map(|e| e.to_string()).collect(),
    }
}

/// Parse a range expression such as "1-3, 5".
/// Returns `{ ranges: [{ start, end }], errors: [string] }`; malformed
/// tokens are listed in `errors` and skipped.
#[wasm_bindgen(js_name = parseRanges)]
pub fn parse_ranges(expression: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&parse_ranges_report(expression))
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Canonical form of a range expression, e.g. " 1 -3,5" becomes "1-3, 5"
#[wasm_bindgen(js_name = formatRanges)]
pub fn format_ranges(expression: &str) -> String {
    format_spans(&parse_ranges_report(expression).ranges)
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(2621440), "2.5 MB");
    }

    #[test]
    fn test_check_pdf_bytes() {
        assert!(check_pdf_bytes(b"%PDF-1.7\n1 0 obj\nendobj\n%%EOF\n").is_ok());
        assert!(check_pdf_bytes(b"%PDF").is_err());
        assert!(check_pdf_bytes(b"<html>not a pdf</html>").is_err());
        assert!(check_pdf_bytes(b"%PDF-1.7\n1 0 obj\n").is_err());
    }

    #[test]
    fn test_parse_report_lists_rejected_tokens() {
        let report = parse_ranges_report("1-3, abc, 7-5, 9");
        assert_eq!(report.ranges, vec![PageSpan::new(1, 3), PageSpan::new(9, 9)]);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_format_ranges_canonicalizes() {
        assert_eq!(format_ranges(" 1 -3,5, 8-8"), "1-3, 5, 8");
        assert_eq!(format_ranges(""), "");
    }
}
