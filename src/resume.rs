use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{info, warn};

/// Reads the resume as plain text. Any failure yields an empty string.
pub fn extract_text(path: &Path) -> String {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let result = if is_pdf {
        read_pdf(path)
    } else {
        std::fs::read_to_string(path).map_err(|e| e.to_string())
    };

    match result {
        Ok(text) => {
            let text = text.trim().to_string();
            info!(
                "Read {} characters of resume text from {}",
                text.chars().count(),
                path.display()
            );
            text
        }
        Err(e) => {
            warn!("Error reading resume {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// pdf-extract panics on some malformed documents (fonts referenced but never
/// defined, for one), so a panic is reported the same way as an error.
fn read_pdf(path: &Path) -> Result<String, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path))) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown error".to_string());
            Err(format!("PDF parser panicked: {}", message))
        }
    }
}
