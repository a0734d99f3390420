//! Decoding page images out of a written manifest.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use tracing::{info, warn};

use crate::Result;
use crate::types::sanitize_segment;

/// The parts of a manifest extraction reads. Lenient so older manifests
/// without a schema version still work.
#[derive(Debug, Deserialize)]
struct ExtractView {
    #[serde(default = "unknown_character")]
    character_name: String,
    #[serde(default)]
    generated_pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    generated_image_base64: String,
}

fn unknown_character() -> String {
    "unknown".to_string()
}

/// Decode every page image in a manifest into `<character>_page_<NN>.png`.
///
/// Pages with an empty or undecodable payload are skipped with a warning.
/// Returns how many files were written.
pub async fn extract_images(manifest_path: &Path, output_dir: &Path) -> Result<usize> {
    let text = tokio::fs::read_to_string(manifest_path).await?;
    let view: ExtractView = serde_json::from_str(&text)?;
    tokio::fs::create_dir_all(output_dir).await?;

    let character = sanitize_segment(&view.character_name);
    let mut extracted = 0;

    for page in &view.generated_pages {
        if page.generated_image_base64.is_empty() {
            warn!(page = page.page_number, "page has no image payload, skipping");
            continue;
        }
        let bytes = match STANDARD.decode(page.generated_image_base64.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(page = page.page_number, "page payload is not valid base64, skipping: {e}");
                continue;
            },
        };

        let path = output_dir.join(format!("{character}_page_{:02}.png", page.page_number));
        tokio::fs::write(&path, bytes).await?;
        info!(file = %path.display(), "extracted page");
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extracts_valid_pages_and_skips_bad_ones() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("m.json");
        std::fs::write(
            &manifest,
            json!({
                "character_name": "도라에몽",
                "generated_pages": [
                    {"page_number": 1, "generated_image_base64": STANDARD.encode(b"one")},
                    {"page_number": 2, "generated_image_base64": ""},
                    {"page_number": 3, "generated_image_base64": "!!not base64!!"},
                    {"page_number": 12, "generated_image_base64": STANDARD.encode(b"twelve")}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let out = dir.path().join("extracted");
        let count = extract_images(&manifest, &out).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(std::fs::read(out.join("도라에몽_page_01.png")).unwrap(), b"one");
        assert_eq!(std::fs::read(out.join("도라에몽_page_12.png")).unwrap(), b"twelve");
        assert!(!out.join("도라에몽_page_02.png").exists());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = extract_images(&dir.path().join("none.json"), dir.path()).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("bad.json");
        std::fs::write(&manifest, "{ nope").unwrap();
        let result = extract_images(&manifest, dir.path()).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_empty_manifest_extracts_nothing() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("empty.json");
        std::fs::write(&manifest, "{}").unwrap();
        assert_eq!(extract_images(&manifest, &dir.path().join("o")).await.unwrap(), 0);
    }
}
