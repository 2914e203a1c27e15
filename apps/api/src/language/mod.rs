//! Language Detector: classifies input text as one of the supported language tags.
//!
//! A general statistical identifier (whatlang by default) proposes a tag and a
//! confidence. Chinese is then disambiguated by glyph-set membership, because
//! statistical models routinely confuse Traditional with Simplified and label
//! short mixed English/Chinese snippets as Korean, Vietnamese or Japanese.
//!
//! Supported: `en`, `zh-TW`. Everything else (including `zh-CN`) is rejected.

pub mod charsets;
pub mod handlers;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use whatlang::Lang;

use charsets::{is_chinese, is_kana, variant_matches};

pub const MIN_TEXT_LENGTH: usize = 10;
pub const CONFIDENCE_THRESHOLD: f64 = 0.8;
/// Relaxed threshold for zh-TW text carrying at least `CHINESE_HEAVY_CHARS` ideographs.
pub const CHINESE_HEAVY_THRESHOLD: f64 = 0.7;
pub const CHINESE_HEAVY_CHARS: usize = 20;
/// Share of alphabetic characters that must be Chinese for the composition override.
pub const TRADITIONAL_COMPOSITION_RATIO: f64 = 0.2;

// ────────────────────────────────────────────────────────────────────────────
// Supported languages
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-TW")]
    ZhTw,
}

impl Language {
    pub const SUPPORTED: [Language; 2] = [Language::En, Language::ZhTw];

    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::ZhTw => "zh-TW",
        }
    }

    /// Case-insensitive parse of a language tag (`"zh-tw"` → `ZhTw`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|l| l.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LanguageError {
    #[error("Text too short for language detection ({length} characters, minimum {minimum})")]
    TextTooShort { length: usize, minimum: usize },

    #[error("Low confidence detection: '{detected}' at {confidence:.2} (threshold {threshold:.2})")]
    LowConfidence {
        detected: String,
        confidence: f64,
        threshold: f64,
    },

    #[error("Detected language '{detected}' ({confidence:.2}) is not supported. Supported: en, zh-TW")]
    UnsupportedLanguage { detected: String, confidence: f64 },
}

impl LanguageError {
    pub fn code(&self) -> &'static str {
        match self {
            LanguageError::TextTooShort { .. } => "TEXT_TOO_SHORT",
            LanguageError::LowConfidence { .. } => "LOW_CONFIDENCE_DETECTION",
            LanguageError::UnsupportedLanguage { .. } => "UNSUPPORTED_LANGUAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub language: Language,
    pub confidence: f64,
    pub is_supported: bool,
}

/// Character composition of the input, computed once per detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositionStats {
    pub alphabetic_chars: usize,
    pub chinese_chars: usize,
    pub kana_chars: usize,
    pub traditional_matches: usize,
    pub simplified_matches: usize,
}

impl CompositionStats {
    pub fn analyze(text: &str) -> Self {
        let mut stats = CompositionStats::default();
        for c in text.chars() {
            if c.is_alphabetic() {
                stats.alphabetic_chars += 1;
            }
            if is_chinese(c) {
                stats.chinese_chars += 1;
            } else if is_kana(c) {
                stats.kana_chars += 1;
            }
        }
        let (traditional, simplified) = variant_matches(text);
        stats.traditional_matches = traditional;
        stats.simplified_matches = simplified;
        stats
    }

    /// Chinese ideographs as a share of all alphabetic characters.
    pub fn chinese_ratio(&self) -> f64 {
        if self.alphabetic_chars == 0 {
            0.0
        } else {
            self.chinese_chars as f64 / self.alphabetic_chars as f64
        }
    }

    fn favours_traditional(&self) -> bool {
        self.chinese_chars > 0
            && self.chinese_ratio() >= TRADITIONAL_COMPOSITION_RATIO
            && self.traditional_matches >= self.simplified_matches
    }

    /// Traditional wins only on a strict majority; ties fall back to Simplified.
    fn chinese_variant(&self) -> &'static str {
        if self.traditional_matches > self.simplified_matches {
            "zh-TW"
        } else {
            "zh-CN"
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Statistical identifier seam
// ────────────────────────────────────────────────────────────────────────────

/// Raw output of a statistical identifier. `tag` is a short code: `en`, `zh`,
/// `ja`, `ko`, `vi`, or the identifier's own code for anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub tag: String,
    pub confidence: f64,
}

/// A general-purpose statistical language identifier.
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, text: &str) -> Option<RawDetection>;
}

/// Default identifier backed by the `whatlang` trigram model.
pub struct WhatlangIdentifier;

impl LanguageIdentifier for WhatlangIdentifier {
    fn identify(&self, text: &str) -> Option<RawDetection> {
        let info = whatlang::detect(text)?;
        let tag = match info.lang() {
            Lang::Eng => "en",
            Lang::Cmn => "zh",
            Lang::Jpn => "ja",
            Lang::Kor => "ko",
            Lang::Vie => "vi",
            other => other.code(),
        };
        Some(RawDetection {
            tag: tag.to_string(),
            confidence: info.confidence(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detector
// ────────────────────────────────────────────────────────────────────────────

/// Stateless apart from the identifier; shared read-only across requests.
pub struct LanguageDetector {
    identifier: Box<dyn LanguageIdentifier>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(Box::new(WhatlangIdentifier))
    }
}

impl LanguageDetector {
    pub fn new(identifier: Box<dyn LanguageIdentifier>) -> Self {
        Self { identifier }
    }

    /// Detects the language of `text`.
    ///
    /// Errors: `TextTooShort` below `MIN_TEXT_LENGTH` characters,
    /// `LowConfidence` below the (possibly relaxed) threshold,
    /// `UnsupportedLanguage` for anything outside `Language::SUPPORTED`.
    pub fn detect(&self, text: &str) -> Result<DetectionResult, LanguageError> {
        let length = text.trim().chars().count();
        if length < MIN_TEXT_LENGTH {
            return Err(LanguageError::TextTooShort {
                length,
                minimum: MIN_TEXT_LENGTH,
            });
        }

        let stats = CompositionStats::analyze(text);
        let raw = self.identifier.identify(text).unwrap_or(RawDetection {
            tag: "und".to_string(),
            confidence: 0.0,
        });

        debug!(
            raw_tag = %raw.tag,
            raw_confidence = raw.confidence,
            chinese_ratio = stats.chinese_ratio(),
            traditional = stats.traditional_matches,
            simplified = stats.simplified_matches,
            "Language composition analysed"
        );

        let (tag, confidence) = resolve(&raw, &stats);

        let threshold = if tag == "zh-TW" && stats.chinese_chars >= CHINESE_HEAVY_CHARS {
            CHINESE_HEAVY_THRESHOLD
        } else {
            CONFIDENCE_THRESHOLD
        };

        if confidence < threshold {
            return Err(LanguageError::LowConfidence {
                detected: tag,
                confidence,
                threshold,
            });
        }

        let language = Language::from_tag(&tag).ok_or_else(|| LanguageError::UnsupportedLanguage {
            detected: tag.clone(),
            confidence,
        })?;

        info!("Language detected: {language}, confidence: {confidence:.3}");

        Ok(DetectionResult {
            language,
            confidence,
            is_supported: true,
        })
    }
}

/// Applies the Chinese corrections to a raw identifier result.
fn resolve(raw: &RawDetection, stats: &CompositionStats) -> (String, f64) {
    let tag = raw.tag.to_ascii_lowercase();
    let confidence = raw.confidence;

    // Kana present: genuine Japanese, no Chinese override.
    if tag == "ja" && stats.kana_chars > 0 {
        return (raw.tag.clone(), confidence);
    }

    if stats.favours_traditional() {
        let boosted = (0.8 + stats.chinese_ratio() * 0.3).min(0.95);
        if tag != "zh-tw" {
            info!(
                "Composition override: {} -> zh-TW (Chinese ratio {:.1}%)",
                raw.tag,
                stats.chinese_ratio() * 100.0
            );
        }
        return ("zh-TW".to_string(), confidence.max(boosted));
    }

    if tag == "ja" || tag.starts_with("zh") {
        return (stats.chinese_variant().to_string(), confidence);
    }

    // Chinese content mislabelled as another Asian language, or an unsure label.
    if stats.chinese_chars >= 10
        && (tag == "ko" || tag == "vi" || confidence < 0.9)
        && stats.chinese_variant() == "zh-TW"
    {
        return ("zh-TW".to_string(), confidence.max(0.85));
    }

    (raw.tag.clone(), confidence)
}

#[cfg(test)]
pub mod testing {
    use super::{LanguageIdentifier, RawDetection};

    /// Identifier returning a fixed raw result.
    pub struct FixedIdentifier(pub &'static str, pub f64);

    impl LanguageIdentifier for FixedIdentifier {
        fn identify(&self, _text: &str) -> Option<RawDetection> {
            Some(RawDetection {
                tag: self.0.to_string(),
                confidence: self.1,
            })
        }
    }
}
