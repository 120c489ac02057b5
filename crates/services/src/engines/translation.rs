use std::sync::Arc;

use tracing::{info, warn};

use super::{StageError, Translation, Translator};

/// Sentinel prefix on placeholder output when the translation engine is
/// unavailable. A fallback must never be indistinguishable from a real
/// translation.
pub const FALLBACK_PREFIX: &str = "[untranslated] ";

pub const FALLBACK_MODEL: &str = "placeholder";

/// Translation policy on top of the raw model capability: Indic-to-Indic
/// requests pivot through English (two hops, confidence is the minimum
/// of the hops), and engine-unavailable failures can degrade to a
/// tagged placeholder instead of failing the job.
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    fallback_on_unavailable: bool,
}

impl TranslationService {
    pub fn new(translator: Arc<dyn Translator>, fallback_on_unavailable: bool) -> Self {
        Self {
            translator,
            fallback_on_unavailable,
        }
    }

    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation, StageError> {
        if source == target {
            return Ok(Translation {
                text: text.to_string(),
                confidence: 1.0,
                model: "identity".to_string(),
            });
        }

        let result = if source != "en" && target != "en" {
            self.translate_via_english(text, source, target).await
        } else {
            self.translator.translate(text, source, target).await
        };

        match result {
            Err(StageError::EngineUnavailable(cause)) if self.fallback_on_unavailable => {
                warn!(source, target, %cause, "Translation engine unavailable, using tagged placeholder");
                Ok(Translation {
                    text: format!("{FALLBACK_PREFIX}{text}"),
                    confidence: 0.0,
                    model: FALLBACK_MODEL.to_string(),
                })
            }
            other => other,
        }
    }

    async fn translate_via_english(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation, StageError> {
        info!(source, target, "Pivoting Indic-to-Indic translation through English");

        let bridge = self.translator.translate(text, source, "en").await?;
        let final_hop = self.translator.translate(&bridge.text, "en", target).await?;

        Ok(Translation {
            text: final_hop.text,
            confidence: bridge.confidence.min(final_hop.confidence),
            model: format!("{}+pivot", final_hop.model),
        })
    }
}
