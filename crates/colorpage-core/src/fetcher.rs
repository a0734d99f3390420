//! Reference image acquisition.
//!
//! Every candidate ends up as a file in the download directory: local
//! samples are copied, remote images are downloaded with a per-request
//! timeout.

use crate::http::{is_remote, local_path};
use crate::types::{ReferenceCandidate, sanitize_segment};
use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Turns a [`ReferenceCandidate`] into a readable file in the download directory.
pub struct AssetFetcher {
    client: Client,
    download_dir: PathBuf,
    timeout: Duration,
}

impl AssetFetcher {
    /// Create a fetcher writing into `download_dir`.
    pub fn new(client: Client, download_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            timeout,
        }
    }

    /// Directory fetched files land in.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Local file name for the `index`-th (1-based) reference of a run.
    pub fn file_name_for(character_name: &str, index: usize, timestamp: &str) -> String {
        format!("{}_{index}_{timestamp}.jpg", sanitize_segment(character_name))
    }

    /// Fetch one candidate.
    ///
    /// Local sources are copied. Remote sources try the thumbnail first and
    /// fall back to the full image once; there is no other retry.
    #[instrument(level = "debug", skip(self, candidate), fields(url = %candidate.source_url))]
    pub async fn fetch(&self, candidate: &ReferenceCandidate, filename: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let target = self.download_dir.join(sanitize_segment(filename));

        if !is_remote(&candidate.source_url) {
            return self.copy_local(local_path(&candidate.source_url), &target).await;
        }

        if let Some(thumbnail) = candidate.thumbnail_url.as_deref() {
            match self.download(thumbnail, &target).await {
                Ok(()) => {
                    info!(file = %target.display(), "downloaded thumbnail");
                    return Ok(target);
                },
                Err(e) => warn!(url = %thumbnail, "thumbnail download failed, trying original: {e}"),
            }
        }

        self.download(&candidate.source_url, &target).await?;
        info!(file = %target.display(), "downloaded reference image");
        Ok(target)
    }

    async fn copy_local(&self, source: &str, target: &Path) -> Result<PathBuf> {
        let source = Path::new(source);
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(Error::NotFound(format!(
                "reference image '{}' does not exist",
                source.display()
            )));
        }
        tokio::fs::copy(source, target).await?;
        debug!(from = %source.display(), to = %target.display(), "copied local reference");
        Ok(target.to_path_buf())
    }

    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("'{url}': {e}")))?;
        let response = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("download of '{url}'"))
                } else {
                    Error::Network(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("no image at '{url}'")));
        }
        let response = response.error_for_status()?;
        let bytes = response.bytes().await?;
        tokio::fs::write(target, &bytes).await?;
        debug!(url = %url, bytes = bytes.len(), "wrote download");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(dir: &TempDir) -> AssetFetcher {
        AssetFetcher::new(
            build_client().unwrap(),
            dir.path().join("downloads"),
            Duration::from_secs(5),
        )
    }

    fn candidate(source: String, thumbnail: Option<String>) -> ReferenceCandidate {
        ReferenceCandidate {
            source_url: source,
            display_title: "도라에몽 Official Art 1".to_string(),
            thumbnail_url: thumbnail,
        }
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(
            AssetFetcher::file_name_for("포켓몬 피카츄", 2, "20250117_120000"),
            "포켓몬_피카츄_2_20250117_120000.jpg"
        );
    }

    #[tokio::test]
    async fn test_copies_local_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("도라에몽_test.png");
        std::fs::write(&source, b"png-bytes")?;

        let fetcher = fetcher(&dir);
        let url = format!("file://{}", source.display());
        let path = fetcher.fetch(&candidate(url, None), "도라에몽_1.jpg").await?;

        assert_eq!(std::fs::read(&path)?, b"png-bytes");
        assert!(path.starts_with(fetcher.download_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_for_that_candidate() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);

        let missing = candidate(
            dir.path().join("nope.png").display().to_string(),
            None,
        );
        let result = fetcher.fetch(&missing, "x_1.jpg").await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let present = dir.path().join("ok.png");
        std::fs::write(&present, b"ok").unwrap();
        let ok = candidate(present.display().to_string(), None);
        assert!(fetcher.fetch(&ok, "x_2.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_thumbnail_first() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thumb.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/full.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let fetcher = fetcher(&dir);
        let path = fetcher
            .fetch(
                &candidate(
                    format!("{}/full.jpg", server.uri()),
                    Some(format!("{}/thumb.jpg", server.uri())),
                ),
                "c_1.jpg",
            )
            .await?;

        assert_eq!(std::fs::read(path)?, b"thumb");
        Ok(())
    }

    #[tokio::test]
    async fn test_falls_back_to_original_when_thumbnail_fails() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thumb.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/full.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let path = fetcher(&dir)
            .fetch(
                &candidate(
                    format!("{}/full.jpg", server.uri()),
                    Some(format!("{}/thumb.jpg", server.uri())),
                ),
                "c_1.jpg",
            )
            .await?;

        assert_eq!(std::fs::read(path)?, b"full");
        Ok(())
    }

    #[tokio::test]
    async fn test_both_downloads_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = fetcher(&dir)
            .fetch(
                &candidate(
                    format!("{}/full.jpg", server.uri()),
                    Some(format!("{}/thumb.jpg", server.uri())),
                ),
                "c_1.jpg",
            )
            .await;

        match result {
            Err(Error::NotFound(msg)) => assert!(msg.contains("full.jpg")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_maps_to_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = fetcher(&dir)
            .fetch(&candidate(format!("{}/a.jpg", server.uri()), None), "a.jpg")
            .await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_timeout_on_thumbnail_and_original() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(800))
                    .set_body_bytes(b"late".to_vec()),
            )
            .expect(2)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = AssetFetcher::new(
            build_client().unwrap(),
            dir.path().join("downloads"),
            Duration::from_millis(50),
        );
        let result = fetcher
            .fetch(
                &candidate(
                    format!("{}/full.jpg", server.uri()),
                    Some(format!("{}/thumb.jpg", server.uri())),
                ),
                "c_1.jpg",
            )
            .await;

        match result {
            Err(e @ Error::Timeout(_)) => {
                assert!(e.to_string().contains("full.jpg"));
                assert!(e.is_recoverable());
            },
            other => panic!("Expected Timeout, got {other:?}"),
        }
        assert!(!dir.path().join("downloads").join("c_1.jpg").exists());
    }

    #[tokio::test]
    async fn test_malformed_remote_url() {
        let dir = TempDir::new().unwrap();
        let result = fetcher(&dir)
            .fetch(&candidate("http://exa mple.com/a.jpg".to_string(), None), "a.jpg")
            .await;
        assert!(matches!(result, Err(Error::InvalidUrl(msg)) if msg.contains("exa mple")));
    }
}
