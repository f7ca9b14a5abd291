//! Input loading: read paper JSON from a local path or an HTTP(S) URL.
//!
//! The bytes are parsed straight into a [`Document`]; nothing is written to
//! disk. Shape detection (nested vs. flat) happens in
//! [`Document::from_value`], not here.

use crate::document::Document;
use crate::error::Paper2SlidesError;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load and parse a paper from a path or URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, Paper2SlidesError> {
    let text = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    Document::from_json_str(&text)
}

async fn read_local(path_str: &str) -> Result<String, Paper2SlidesError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            debug!("Read {} bytes from {}", text.len(), path.display());
            Ok(text)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(Paper2SlidesError::PermissionDenied { path })
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => Err(Paper2SlidesError::InvalidDocument {
            detail: format!("'{}' is not UTF-8 text", path.display()),
        }),
        Err(_) => Err(Paper2SlidesError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<String, Paper2SlidesError> {
    info!("Downloading paper JSON from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Paper2SlidesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Paper2SlidesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Paper2SlidesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(Paper2SlidesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let text = response.text().await.map_err(map_send_err)?;
    info!("Downloaded {} bytes", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentShape;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/paper.json"));
        assert!(is_url("http://example.com/paper.json"));
        assert!(!is_url("/tmp/paper.json"));
        assert!(!is_url("paper.json"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn loads_local_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"title": "T", "abstract": "A."}}"#).unwrap();
        let doc = load_document(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.shape, DocumentShape::Flat);
        assert_eq!(doc.title.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_document("/definitely/not/here.json", 5).await.unwrap_err();
        assert!(matches!(err, Paper2SlidesError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_json_is_reported() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "not json").unwrap();
        let err = load_document(f.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, Paper2SlidesError::InvalidDocument { .. }));
    }
}
