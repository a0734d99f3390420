//! Prompt construction and refinement.
//!
//! [`build_prompt`] is a pure table lookup: the same character, age group and
//! difficulty always give the same bytes. [`PromptSynthesizer::optimize`] may
//! replace that text with a refined version from the text model.

use crate::gemini::GeminiClient;
use crate::outcome::{Outcome, ServiceFailure};
use crate::types::{AgeGroup, Difficulty, GenerationRequest, SynthesizedPrompt};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Visual descriptions for characters the generator knows well.
const KNOWN_CHARACTERS: [(&str, &str); 10] = [
    (
        "하츄핑",
        "pink-haired character with heart decorations, crown tiara, pink dress with white top, cute chibi proportions, magical girl style, TiniPing character",
    ),
    (
        "라라핑",
        "blue-haired character with star decorations, crown tiara, blue dress, cute chibi proportions, magical girl style, TiniPing character",
    ),
    (
        "바로핑",
        "yellow-haired character with sun decorations, crown tiara, yellow dress, cute chibi proportions, magical girl style, TiniPing character",
    ),
    (
        "차차핑",
        "green-haired character with leaf decorations, crown tiara, green dress, cute chibi proportions, magical girl style, TiniPing character",
    ),
    (
        "도라에몽",
        "blue robot cat with white belly, red collar with bell, round head, no ears, cute proportions, Doraemon character",
    ),
    (
        "미키마우스",
        "black mouse with large round ears, red shorts, yellow shoes, white gloves, Disney character",
    ),
    (
        "피카츄",
        "yellow electric mouse with red cheeks, brown stripes on back, black-tipped ears, Pokemon character",
    ),
    (
        "배트맨",
        "dark superhero with black cape, bat symbol on chest, pointy bat ears, muscular build, intimidating presence, DC Comics character",
    ),
    (
        "운빨존만겜",
        "lucky character with gambling theme, dice symbols, coin decorations, playful expression, game character style",
    ),
    (
        "아이언미야옹",
        "lucky gambling game character, cute cat with iron armor, mechanical elements, futuristic design, playful expression, distinctive helmet design, chest reactor, gaming mascot style",
    ),
];

/// How a character is described in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterDescriptor<'a> {
    /// A curated English description.
    Known(&'static str),
    /// No description on file; the name itself is used.
    Unknown(&'a str),
}

impl<'a> CharacterDescriptor<'a> {
    /// Exact-name lookup.
    pub fn lookup(character_name: &'a str) -> Self {
        KNOWN_CHARACTERS
            .iter()
            .find(|(name, _)| *name == character_name)
            .map_or(Self::Unknown(character_name), |&(_, description)| {
                Self::Known(description)
            })
    }

    /// Text placed at the start of the prompt.
    pub const fn text(self) -> &'a str {
        match self {
            Self::Known(description) => description,
            Self::Unknown(name) => name,
        }
    }
}

/// Audience clauses for the 3x3 age group and difficulty grid.
const AUDIENCE_GRID: [(AgeGroup, Difficulty, &str); 9] = [
    (
        AgeGroup::Child,
        Difficulty::Easy,
        "simple coloring page for children ages 3-6, thick bold outlines 5-6px, minimal details, large clear coloring areas, cute chibi proportions, friendly expression",
    ),
    (
        AgeGroup::Child,
        Difficulty::Medium,
        "coloring page for children ages 6-8, medium line weight 3-4px, moderate details, balanced complexity, dynamic pose, cheerful expression",
    ),
    (
        AgeGroup::Child,
        Difficulty::Hard,
        "detailed coloring page for children ages 8-10, fine line art 2-3px, intricate patterns, complex elements, expressive pose",
    ),
    (
        AgeGroup::Teen,
        Difficulty::Easy,
        "teen-friendly coloring page ages 9-12, medium line weight 3-4px, clear outlines, moderate details, cool pose",
    ),
    (
        AgeGroup::Teen,
        Difficulty::Medium,
        "detailed coloring page for teens ages 12-15, fine line art 2-3px, intricate details, dynamic composition, stylish pose",
    ),
    (
        AgeGroup::Teen,
        Difficulty::Hard,
        "complex coloring page for teens ages 15+, very fine line art 1-2px, highly detailed design, sophisticated composition, dramatic pose",
    ),
    (
        AgeGroup::Adult,
        Difficulty::Easy,
        "adult coloring page ages 16+, medium complexity, clean line art 2-3px, elegant design, sophisticated pose",
    ),
    (
        AgeGroup::Adult,
        Difficulty::Medium,
        "detailed adult coloring page, fine line art 1-2px, intricate patterns, complex composition, artistic pose",
    ),
    (
        AgeGroup::Adult,
        Difficulty::Hard,
        "highly detailed adult coloring page, very fine line art 1px, extremely intricate patterns, complex mandala-style elements, artistic masterpiece",
    ),
];

/// Audience clause for a pair; `None` selects the generic clause.
fn audience_clause(age_group: AgeGroup, difficulty: Difficulty) -> Option<&'static str> {
    AUDIENCE_GRID
        .iter()
        .find(|(age, diff, _)| *age == age_group && *diff == difficulty)
        .map(|&(_, _, clause)| clause)
}

/// Deterministic generation prompt for a character, age group and difficulty.
pub fn build_prompt(character_name: &str, age_group: AgeGroup, difficulty: Difficulty) -> String {
    let descriptor = CharacterDescriptor::lookup(character_name).text();
    audience_clause(age_group, difficulty).map_or_else(
        || format!("{descriptor}, coloring page"),
        |clause| format!("{descriptor}, {clause}"),
    )
}

fn refinement_request(raw: &str) -> String {
    format!(
        "Optimize the following coloring page generation prompt.\n\
         \n\
         Original prompt: {raw}\n\
         \n\
         Goals:\n\
         1. Emphasize clear outlines suitable for coloring\n\
         2. Match complexity to the target age group\n\
         3. Separate coloring areas with clear boundaries\n\
         4. Printable at A4 size\n\
         5. Keep line weight consistent\n\
         6. No overlapping lines\n\
         \n\
         Rules:\n\
         - Black outlines only\n\
         - White background\n\
         - No gradients or shading\n\
         - Crisp when printed\n\
         \n\
         Return only the optimized prompt, with no explanation."
    )
}

/// Builds prompts and optionally refines them through the text model.
pub struct PromptSynthesizer<'a> {
    gemini: &'a GeminiClient,
    timeout: Duration,
}

impl<'a> PromptSynthesizer<'a> {
    /// Create a synthesizer borrowing the shared client.
    pub const fn new(gemini: &'a GeminiClient, timeout: Duration) -> Self {
        Self { gemini, timeout }
    }

    /// Refine `raw`, or return it unchanged with the reason refinement failed.
    #[instrument(level = "debug", skip(self, raw))]
    pub async fn optimize(&self, raw: &str) -> Outcome<String> {
        match self
            .gemini
            .generate_text(&refinement_request(raw), self.timeout)
            .await
        {
            Ok(refined) => {
                info!("prompt refined");
                Outcome::Fresh(refined)
            },
            Err(ServiceFailure::NoCredential) => {
                info!("no generation credential, using template prompt");
                Outcome::degraded(raw.to_string(), ServiceFailure::NoCredential)
            },
            Err(reason) => {
                warn!(reason = reason.label(), "prompt refinement failed, using template prompt: {reason}");
                Outcome::degraded(raw.to_string(), reason)
            },
        }
    }

    /// Build and refine the prompt for a request.
    #[instrument(level = "debug", skip(self, request), fields(character = %request.character_name()))]
    pub async fn synthesize(&self, request: &GenerationRequest) -> Outcome<SynthesizedPrompt> {
        let raw_prompt = build_prompt(
            request.character_name(),
            request.age_group(),
            request.difficulty(),
        );
        self.optimize(&raw_prompt)
            .await
            .map(|optimized_prompt| SynthesizedPrompt {
                raw_prompt,
                optimized_prompt,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::build_client;
    use proptest::prelude::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_known_descriptor() {
        assert!(matches!(
            CharacterDescriptor::lookup("도라에몽"),
            CharacterDescriptor::Known(text) if text.starts_with("blue robot cat")
        ));
        assert_eq!(
            CharacterDescriptor::lookup("뽀로로"),
            CharacterDescriptor::Unknown("뽀로로")
        );
        assert_eq!(KNOWN_CHARACTERS.len(), 10);
    }

    #[test]
    fn test_build_prompt_child_easy() {
        let prompt = build_prompt("도라에몽", AgeGroup::Child, Difficulty::Easy);
        assert!(prompt.starts_with("blue robot cat with white belly"));
        assert!(prompt.contains("children ages 3-6"));
        assert!(prompt.contains("thick bold outlines 5-6px"));
    }

    #[test]
    fn test_build_prompt_unknown_uses_name() {
        let prompt = build_prompt("뽀로로", AgeGroup::Adult, Difficulty::Hard);
        assert!(prompt.starts_with("뽀로로, highly detailed adult coloring page"));
    }

    #[test]
    fn test_every_pair_has_a_clause() {
        for age in AgeGroup::ALL {
            for difficulty in Difficulty::ALL {
                assert!(audience_clause(age, difficulty).is_some());
            }
        }
    }

    proptest! {
        #[test]
        fn prop_build_prompt_is_deterministic(
            name in "\\PC{1,20}",
            age in 0usize..3,
            difficulty in 0usize..3,
        ) {
            let age = AgeGroup::ALL[age];
            let difficulty = Difficulty::ALL[difficulty];
            prop_assert_eq!(
                build_prompt(&name, age, difficulty),
                build_prompt(&name, age, difficulty)
            );
        }
    }

    #[tokio::test]
    async fn test_optimize_without_credential_returns_raw() {
        let gemini = GeminiClient::new(build_client().unwrap(), &Config::default());
        let synthesizer = PromptSynthesizer::new(&gemini, Duration::from_secs(1));
        let request =
            GenerationRequest::new("도라에몽", AgeGroup::Child, Difficulty::Easy, 3).unwrap();

        let outcome = synthesizer.synthesize(&request).await;
        assert_eq!(outcome.reason(), Some(&ServiceFailure::NoCredential));
        let prompt = outcome.into_inner();
        assert_eq!(prompt.raw_prompt, prompt.optimized_prompt);
    }

    #[tokio::test]
    async fn test_optimize_replaces_raw_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "crisp line art of a robot cat"}]}}]
            })))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.endpoints.gemini_base_url = server.uri();
        config.credentials.gemini_api_key = Some("k".into());
        let gemini = GeminiClient::new(build_client().unwrap(), &config);
        let synthesizer = PromptSynthesizer::new(&gemini, Duration::from_secs(5));

        let outcome = synthesizer.optimize("raw prompt").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_inner(), "crisp line art of a robot cat");
    }

    #[tokio::test]
    async fn test_optimize_falls_back_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.endpoints.gemini_base_url = server.uri();
        config.credentials.gemini_api_key = Some("k".into());
        let gemini = GeminiClient::new(build_client().unwrap(), &config);
        let synthesizer = PromptSynthesizer::new(&gemini, Duration::from_secs(5));

        let outcome = synthesizer.optimize("raw prompt").await;
        assert!(matches!(outcome.reason(), Some(ServiceFailure::BadResponse(_))));
        assert_eq!(outcome.into_inner(), "raw prompt");
    }
}
