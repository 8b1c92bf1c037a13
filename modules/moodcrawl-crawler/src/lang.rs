// Post-text language detection.

/// Label used when no language can be determined.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Detects the language of a post's text. Never fails: undetermined text
/// yields [`UNKNOWN_LANGUAGE`].
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> String;
}

/// Trigram detector backed by `whatlang`.
///
/// Codes are ISO 639-1 where one exists (`ru`, `kk`, `en`, ...), otherwise
/// the ISO 639-3 code whatlang reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return UNKNOWN_LANGUAGE.to_string();
        }
        match whatlang::detect(text) {
            Some(info) => short_code(info.lang().code()).to_string(),
            None => UNKNOWN_LANGUAGE.to_string(),
        }
    }
}

fn short_code(iso639_3: &str) -> &str {
    match iso639_3 {
        "rus" => "ru",
        "kaz" => "kk",
        "eng" => "en",
        "ukr" => "uk",
        "bel" => "be",
        "uzb" => "uz",
        "kir" => "ky",
        "tur" => "tr",
        "deu" => "de",
        "fra" => "fr",
        "spa" => "es",
        "por" => "pt",
        "ita" => "it",
        "pol" => "pl",
        "jpn" => "ja",
        "kor" => "ko",
        "cmn" => "zh",
        "ara" => "ar",
        other => other,
    }
}

/// Always reports the same language.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy)]
pub struct FixedLanguage(pub &'static str);

#[cfg(any(test, feature = "test-support"))]
impl LanguageDetector for FixedLanguage {
    fn detect(&self, _text: &str) -> String {
        self.0.to_string()
    }
}
