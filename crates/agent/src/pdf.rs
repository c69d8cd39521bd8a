//! PDF detection (spec.md §4.8 "PDF detection"): a same-document navigation
//! that serves a bare `application/pdf` response (no DOM for the distiller
//! to walk) is downloaded to the site's folder and replaced with a fixed
//! placeholder text rather than an empty distillation.

use std::path::{Path, PathBuf};

use nav_domain::error::{Error, Result};
use nav_domain::page_driver::PageEvent;

/// True if `event` looks like a PDF response worth downloading: content
/// type starts with `application/pdf` and it is not an attachment download
/// (those already go through the download listener).
fn looks_like_pdf_response(content_type: &Option<String>, content_disposition: &Option<String>) -> bool {
    let is_pdf_type = content_type
        .as_deref()
        .map(|ct| ct.starts_with("application/pdf"))
        .unwrap_or(false);
    let is_attachment = content_disposition
        .as_deref()
        .map(|cd| cd.to_lowercase().contains("attachment"))
        .unwrap_or(false);
    is_pdf_type && !is_attachment
}

/// Scans this turn's drained page events for a PDF response, downloads the
/// body, and confirms it by sniffing the `%PDF` magic bytes before writing
/// it to `<downloads_root>/<site_folder>/`. Returns the saved path, if any.
pub async fn detect_and_save(events: &[PageEvent], downloads_root: &str, site_folder: &str) -> Result<Option<PathBuf>> {
    for event in events {
        let PageEvent::Response { url, content_type, content_disposition, .. } = event else {
            continue;
        };
        if !looks_like_pdf_response(content_type, content_disposition) {
            continue;
        }

        let body = reqwest::get(url).await.map_err(|e| Error::Http(e.to_string()))?.bytes().await.map_err(|e| Error::Http(e.to_string()))?;
        if !body.starts_with(b"%PDF") {
            continue;
        }

        let dir: PathBuf = Path::new(downloads_root).join(site_folder);
        tokio::fs::create_dir_all(&dir).await?;
        let filename = url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("document.pdf");
        let path = dir.join(filename);
        tokio::fs::write(&path, &body).await?;
        return Ok(Some(path));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pdf_response_is_detected() {
        assert!(looks_like_pdf_response(&Some("application/pdf".into()), &None));
    }

    #[test]
    fn attachment_disposition_is_excluded() {
        assert!(!looks_like_pdf_response(
            &Some("application/pdf".into()),
            &Some("attachment; filename=report.pdf".into())
        ));
    }

    #[test]
    fn non_pdf_content_type_is_excluded() {
        assert!(!looks_like_pdf_response(&Some("text/html".into()), &None));
    }
}
