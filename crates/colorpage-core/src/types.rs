//! Domain types shared by every stage.
//!
//! A validated [`GenerationRequest`] starts a run; the other records carry
//! its intermediate and final results.

use crate::{Error, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target audience for a set of coloring pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    /// Ages 3-12.
    Child,
    /// Ages 13-18.
    Teen,
    /// Ages 19 and up.
    Adult,
}

impl AgeGroup {
    /// Every age group, in display order.
    pub const ALL: [Self; 3] = [Self::Child, Self::Teen, Self::Adult];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Teen => "teen",
            Self::Adult => "adult",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "child" => Ok(Self::Child),
            "teen" => Ok(Self::Teen),
            "adult" => Ok(Self::Adult),
            other => Err(Error::InvalidRequest(format!(
                "unknown age group '{other}' (expected child, teen or adult)"
            ))),
        }
    }
}

/// Line-art complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Bold outlines, large areas.
    Easy,
    /// Moderate detail.
    Medium,
    /// Fine lines and intricate patterns.
    Hard,
}

impl Difficulty {
    /// Every difficulty, in display order.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(Error::InvalidRequest(format!(
                "unknown difficulty '{other}' (expected easy, medium or hard)"
            ))),
        }
    }
}

/// A validated request for one pipeline run.
///
/// Construction is the only validation point; the fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    character_name: String,
    age_group: AgeGroup,
    difficulty: Difficulty,
    page_count: u32,
}

impl GenerationRequest {
    /// Validate and build a request.
    ///
    /// The character name is trimmed; an empty name or a zero page count is rejected.
    pub fn new(
        character_name: impl Into<String>,
        age_group: AgeGroup,
        difficulty: Difficulty,
        page_count: u32,
    ) -> Result<Self> {
        let character_name = character_name.into().trim().to_string();
        if character_name.is_empty() {
            return Err(Error::InvalidRequest(
                "character name must not be empty".to_string(),
            ));
        }
        if page_count == 0 {
            return Err(Error::InvalidRequest(
                "page count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            character_name,
            age_group,
            difficulty,
            page_count,
        })
    }

    /// Validate a request given as raw strings, as received from a CLI or config file.
    pub fn parse(
        character_name: &str,
        age_group: &str,
        difficulty: &str,
        page_count: u32,
    ) -> Result<Self> {
        Self::new(
            character_name,
            age_group.parse()?,
            difficulty.parse()?,
            page_count,
        )
    }

    /// Character name, trimmed.
    #[must_use]
    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    /// Target age group.
    #[must_use]
    pub const fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    /// Line-art difficulty.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Number of pages requested.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.page_count
    }
}

/// A located but not yet fetched reference image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    /// Remote URL or local path of the full image.
    pub source_url: String,
    /// Human-readable title.
    pub display_title: String,
    /// Smaller rendition, tried first when present.
    pub thumbnail_url: Option<String>,
}

/// A reference image that was fetched and published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAsset {
    /// Where it came from.
    pub candidate: ReferenceCandidate,
    /// Local copy inside the download directory.
    pub local_path: PathBuf,
    /// Storage URL, or `file://` fallback.
    pub published_url: String,
}

/// The generation prompt before and after refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedPrompt {
    /// Deterministic template output.
    pub raw_prompt: String,
    /// Refined text, or `raw_prompt` when refinement did not happen.
    pub optimized_prompt: String,
}

/// Which reference a page was seeded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum ReferenceSlot {
    /// Position in the run's reference list.
    Index(usize),
    /// The bundled placeholder used when no reference survived.
    Default,
}

/// Where a page image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    /// The image model produced it.
    Service,
    /// Drawn locally because generation was unavailable.
    LocalFallback,
}

/// Encoded image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedImage {
    /// e.g. `image/png`.
    pub mime_type: String,
    /// Standard base64, no line breaks.
    pub data_base64: String,
}

impl fmt::Debug for SynthesizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedImage")
            .field("mime_type", &self.mime_type)
            .field("data_base64_len", &self.data_base64.len())
            .finish()
    }
}

/// One successfully synthesized page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// 1-based.
    pub page_number: u32,
    /// Seed reference.
    pub reference: ReferenceSlot,
    /// Published URL of that reference (or the placeholder path).
    pub reference_url: String,
    /// Optimized prompt used for the page.
    pub prompt: String,
    /// The page image.
    pub image: SynthesizedImage,
    /// Service output or local raster.
    pub origin: ImageOrigin,
    /// Storage URL or `file://` fallback.
    pub generated_image_url: String,
    /// When the record was created.
    pub generated_at: DateTime<Utc>,
}

/// `YYYYmmdd_HHMMSS` in local time, used in file and object names.
pub(crate) fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Make a name safe to use as a single path segment.
///
/// Letters and digits from any script are kept so Korean character names
/// survive; separators and other punctuation become `_`.
pub(crate) fn sanitize_segment(name: &str) -> String {
    let mut sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }

    if sanitized.is_empty() || sanitized == "." {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let request =
            GenerationRequest::new("  도라에몽 ", AgeGroup::Child, Difficulty::Easy, 3).unwrap();
        assert_eq!(request.character_name(), "도라에몽");
        assert_eq!(request.page_count(), 3);

        assert!(matches!(
            GenerationRequest::new("도라에몽", AgeGroup::Child, Difficulty::Easy, 0),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            GenerationRequest::new("   ", AgeGroup::Teen, Difficulty::Hard, 1),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_enums() {
        assert!(GenerationRequest::parse("피카츄", "adult", "hard", 2).is_ok());
        assert!(matches!(
            GenerationRequest::parse("피카츄", "toddler", "easy", 2),
            Err(Error::InvalidRequest(msg)) if msg.contains("toddler")
        ));
        assert!(matches!(
            GenerationRequest::parse("피카츄", "child", "extreme", 2),
            Err(Error::InvalidRequest(msg)) if msg.contains("extreme")
        ));
    }

    #[test]
    fn test_enum_wire_names() {
        for age in AgeGroup::ALL {
            assert_eq!(age.as_str().parse::<AgeGroup>().unwrap(), age);
            assert_eq!(
                serde_json::to_string(&age).unwrap(),
                format!("\"{}\"", age.as_str())
            );
        }
        for difficulty in Difficulty::ALL {
            assert_eq!(difficulty.to_string().parse::<Difficulty>().unwrap(), difficulty);
        }
        assert_eq!("MEDIUM".parse::<Difficulty>().unwrap(), Difficulty::Medium);
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("하츄핑"), "하츄핑");
        assert_eq!(sanitize_segment("포켓몬 피카츄"), "포켓몬_피카츄");
        assert_eq!(sanitize_segment("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_segment(""), "unnamed");
    }

    #[test]
    fn test_file_timestamp_shape() {
        let ts = file_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'_');
    }

    #[test]
    fn test_image_debug_hides_payload() {
        let image = SynthesizedImage {
            mime_type: "image/png".into(),
            data_base64: "QUJD".repeat(100),
        };
        let rendered = format!("{image:?}");
        assert!(!rendered.contains("QUJD"));
        assert!(rendered.contains("400"));
    }
}
