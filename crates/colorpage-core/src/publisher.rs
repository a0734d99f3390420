//! Publication of reference images and finished pages.
//!
//! With a storage bucket and token configured, assets are uploaded and
//! addressed by their public URL. Otherwise they are addressed by a
//! `file://` URL, and pages are written below the output directory first.

use crate::config::Config;
use crate::outcome::{Outcome, ServiceFailure};
use crate::types::{GenerationRequest, SynthesizedImage, file_timestamp, sanitize_segment};
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// `file://` URL for a local path.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Object storage target: bucket plus bearer token.
#[derive(Clone)]
struct StorageBackend {
    base_url: String,
    bucket: String,
    token: String,
}

impl StorageBackend {
    fn upload_url(&self, object: &str) -> Result<Url, ServiceFailure> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceFailure::BadResponse(format!("invalid storage base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ServiceFailure::BadResponse("storage base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object)
            .append_pair("predefinedAcl", "publicRead");
        Ok(url)
    }

    fn public_url(&self, object: &str) -> Result<String, ServiceFailure> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceFailure::BadResponse(format!("invalid storage base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ServiceFailure::BadResponse("storage base url cannot be a base".into()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(object.split('/'));
        Ok(url.into())
    }
}

/// Makes reference images and finished pages addressable by URL.
///
/// Uploads go to object storage when a bucket and token are configured and
/// the caller has not disabled storage. Every other case yields a `file://`
/// URL. A page that can be neither uploaded nor written locally is an error
/// for that page only; publishing never fails a run.
pub struct AssetPublisher {
    client: Client,
    storage: Option<StorageBackend>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl AssetPublisher {
    /// Build a publisher. `use_storage = false` forces the local fallback.
    pub fn new(client: Client, config: &Config, use_storage: bool) -> Self {
        let credentials = &config.credentials;
        let storage = credentials
            .storage_bucket()
            .zip(credentials.storage_token())
            .filter(|_| use_storage)
            .map(|(bucket, token)| StorageBackend {
                base_url: config.endpoints.storage_base_url.clone(),
                bucket: bucket.to_string(),
                token: token.to_string(),
            });
        Self {
            client,
            storage,
            output_dir: config.paths.output_dir.clone(),
            timeout: config.pipeline.upload_timeout(),
        }
    }

    /// Whether uploads will be attempted.
    pub const fn storage_enabled(&self) -> bool {
        self.storage.is_some()
    }

    /// Publish a fetched reference image.
    #[instrument(level = "debug", skip(self), fields(character = %character_name))]
    pub async fn publish(&self, local_path: &Path, character_name: &str) -> Outcome<String> {
        let fallback = file_url(local_path);
        let Some(storage) = &self.storage else {
            return Outcome::degraded(fallback, ServiceFailure::NoCredential);
        };

        let basename = local_path
            .file_name()
            .map_or_else(|| "reference.jpg".to_string(), |n| n.to_string_lossy().into_owned());
        let object = format!(
            "reference_images/{}/{}_{basename}",
            sanitize_segment(character_name),
            file_timestamp()
        );

        let bytes = match tokio::fs::read(local_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %local_path.display(), "cannot read reference for upload: {e}");
                return Outcome::degraded(
                    fallback,
                    ServiceFailure::TransportError(format!("read {}: {e}", local_path.display())),
                );
            },
        };

        let content_type = image::guess_format(&bytes).map_or("image/jpeg", |f| f.to_mime_type());
        match self.upload(storage, &object, bytes, content_type).await {
            Ok(url) => {
                info!(url = %url, "published reference image");
                Outcome::Fresh(url)
            },
            Err(reason) => {
                warn!(reason = reason.label(), "reference upload failed, using local path: {reason}");
                Outcome::degraded(fallback, reason)
            },
        }
    }

    /// Publish a finished page.
    ///
    /// Object name: `coloring_pages/{age}/{difficulty}/{character}/{character}_page_{NN}_{timestamp}.png`.
    /// On fallback the image is written below the output directory under the
    /// same relative path, and the returned URL points at that file.
    ///
    /// # Errors
    ///
    /// Fails when the payload is not base64, or when the upload was not made
    /// and the local write failed. No URL is returned in either case.
    #[instrument(level = "debug", skip(self, image, request), fields(character = %request.character_name(), page = page_number))]
    pub async fn publish_page(
        &self,
        image: &SynthesizedImage,
        request: &GenerationRequest,
        page_number: u32,
    ) -> crate::Result<Outcome<String>> {
        let character = sanitize_segment(request.character_name());
        let object = format!(
            "coloring_pages/{}/{}/{character}/{character}_page_{page_number:02}_{}.png",
            request.age_group(),
            request.difficulty(),
            file_timestamp()
        );
        let bytes = STANDARD.decode(image.data_base64.as_bytes())?;

        let reason = match &self.storage {
            None => ServiceFailure::NoCredential,
            Some(storage) => {
                match self
                    .upload(storage, &object, bytes.clone(), &image.mime_type)
                    .await
                {
                    Ok(url) => {
                        info!(url = %url, "published page");
                        return Ok(Outcome::Fresh(url));
                    },
                    Err(reason) => {
                        warn!(reason = reason.label(), "page upload failed, writing locally: {reason}");
                        reason
                    },
                }
            },
        };

        let local = self.output_dir.join(&object);
        if let Err(e) = write_local(&local, &bytes).await {
            warn!(path = %local.display(), "failed to write page locally: {e}");
            return Err(e.into());
        }
        Ok(Outcome::degraded(file_url(&local), reason))
    }

    async fn upload(
        &self,
        storage: &StorageBackend,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceFailure> {
        let url = storage.upload_url(object)?;
        debug!(object = %object, bytes = bytes.len(), "uploading");

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .bearer_auth(&storage.token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ServiceFailure::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(ServiceFailure::from_status(response.status()));
        }
        storage.public_url(object)
    }
}

async fn write_local(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
