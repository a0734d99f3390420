//! Reference image lookup.
//!
//! With search credentials the locator asks the custom search API for
//! official art. Without them, or whenever the search is unusable, it
//! answers from the bundled sample images so the rest of the pipeline always
//! has something to work with.

use crate::config::Config;
use crate::outcome::{Outcome, ServiceFailure};
use crate::types::ReferenceCandidate;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Characters with a bundled sample image, matched by substring.
const SAMPLE_KEYS: [&str; 6] = ["피카츄", "미키마우스", "헬로키티", "도라에몽", "하츄핑", "아이언미야옹"];

/// Copies of each sample offered by the offline resolver.
const SAMPLE_COPIES: usize = 3;

/// Sample used when no key matches.
pub const DEFAULT_SAMPLE_KEY: &str = "도라에몽";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    title: String,
    image: Option<SearchImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchImage {
    thumbnail_link: Option<String>,
}

/// Finds reference candidates for a character.
pub struct ReferenceLocator {
    client: Client,
    search_url: String,
    credentials: Option<(String, String)>,
    assets_dir: PathBuf,
    timeout: Duration,
}

impl ReferenceLocator {
    /// Build a locator from the run configuration.
    pub fn new(client: Client, config: &Config) -> Self {
        let credentials = config
            .credentials
            .search_api_key()
            .zip(config.credentials.search_engine_id())
            .map(|(key, cx)| (key.to_string(), cx.to_string()));
        Self {
            client,
            search_url: config.endpoints.search_url.clone(),
            credentials,
            assets_dir: config.paths.assets_dir.clone(),
            timeout: config.pipeline.search_timeout(),
        }
    }

    /// Ranked candidates for `character_name`, never empty when `limit >= 1`.
    #[instrument(level = "debug", skip(self), fields(character = %character_name))]
    pub async fn locate(
        &self,
        character_name: &str,
        limit: usize,
    ) -> Outcome<Vec<ReferenceCandidate>> {
        let Some((key, cx)) = &self.credentials else {
            info!("no search credentials, using bundled samples");
            return Outcome::degraded(
                self.sample_candidates(character_name, limit),
                ServiceFailure::NoCredential,
            );
        };

        match self.search(key, cx, character_name, limit).await {
            Ok(candidates) => {
                info!(count = candidates.len(), "image search complete");
                Outcome::Fresh(candidates)
            },
            Err(reason) => {
                warn!(reason = reason.label(), "image search unusable, using bundled samples: {reason}");
                Outcome::degraded(self.sample_candidates(character_name, limit), reason)
            },
        }
    }

    async fn search(
        &self,
        key: &str,
        cx: &str,
        character_name: &str,
        limit: usize,
    ) -> Result<Vec<ReferenceCandidate>, ServiceFailure> {
        let query = format!("{} official art", search_query(character_name));
        let num = limit.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .timeout(self.timeout)
            .query(&[
                ("key", key),
                ("cx", cx),
                ("q", query.as_str()),
                ("searchType", "image"),
                ("num", num.as_str()),
                ("safe", "medium"),
                ("imgSize", "large"),
                ("imgType", "photo"),
            ])
            .send()
            .await
            .map_err(|e| ServiceFailure::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(ServiceFailure::from_status(response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceFailure::BadResponse(format!("unparseable search body: {e}")))?;

        let candidates: Vec<ReferenceCandidate> = body
            .items
            .into_iter()
            .map(|item| ReferenceCandidate {
                source_url: item.link,
                display_title: item.title,
                thumbnail_url: item.image.and_then(|i| i.thumbnail_link),
            })
            .collect();

        if candidates.is_empty() {
            return Err(ServiceFailure::NoPayload);
        }
        Ok(candidates)
    }

    /// Deterministic offline answer built from the bundled samples.
    pub fn sample_candidates(&self, character_name: &str, limit: usize) -> Vec<ReferenceCandidate> {
        let (key, copies) = SAMPLE_KEYS
            .iter()
            .find(|key| character_name.contains(*key))
            .map_or((DEFAULT_SAMPLE_KEY, limit), |key| (*key, SAMPLE_COPIES.min(limit)));

        let path = self.sample_path(key);
        (1..=copies)
            .map(|n| ReferenceCandidate {
                source_url: path.clone(),
                display_title: format!("{character_name} Official Art {n}"),
                thumbnail_url: Some(path.clone()),
            })
            .collect()
    }

    fn sample_path(&self, key: &str) -> String {
        self.assets_dir
            .join(format!("{key}_test.png"))
            .to_string_lossy()
            .into_owned()
    }
}

/// Search phrasing for names that are ambiguous on their own.
fn search_query(character_name: &str) -> &str {
    match character_name {
        "아이언미야옹" => "운빨존만겜 아이언미야옹",
        "운빨존만겜" => "운빨존만겜 게임 캐릭터",
        other => other,
    }
}
