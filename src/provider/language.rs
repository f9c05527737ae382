//! Language code helpers shared by providers and schema validation

use icu_locale::Locale;

use crate::provider::error::{ProviderError, ProviderResult};

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("en-US", "American English"),
    ("en-GB", "British English"),
    ("en-AU", "Australian English"),
    ("en-CA", "Canadian English"),
    ("pt", "Portuguese"),
    ("pt-BR", "Brazilian Portuguese"),
    ("pt-PT", "European Portuguese"),
    ("es", "Spanish"),
    ("es-ES", "European Spanish"),
    ("es-MX", "Mexican Spanish"),
    ("es-AR", "Argentinian Spanish"),
    ("fr", "French"),
    ("fr-FR", "French"),
    ("fr-CA", "Canadian French"),
    ("fr-BE", "Belgian French"),
    ("fr-CH", "Swiss French"),
    ("de", "German"),
    ("de-DE", "German"),
    ("de-AT", "Austrian German"),
    ("de-CH", "Swiss German"),
    ("it", "Italian"),
    ("it-IT", "Italian"),
    ("ja", "Japanese"),
    ("ja-JP", "Japanese"),
    ("ko", "Korean"),
    ("ko-KR", "Korean"),
    ("zh", "Chinese"),
    ("zh-CN", "Simplified Chinese"),
    ("zh-TW", "Traditional Chinese"),
    ("zh-HK", "Hong Kong Chinese"),
    ("ru", "Russian"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("sv", "Swedish"),
    ("no", "Norwegian"),
    ("da", "Danish"),
    ("fi", "Finnish"),
    ("ar", "Arabic"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
];

/// Human-readable name for a language code, used in prompts.
///
/// Falls back to the base language name (`pt-AO` → `Portuguese`) and then to
/// the code itself.
pub fn language_name(code: &str) -> String {
    if let Some((_, name)) = LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
    {
        return (*name).to_string();
    }
    let base = base_language(code);
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(&base))
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| code.to_string())
}

/// `pt-BR` → `pt`
pub fn base_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .to_lowercase()
}

/// Check that a language code is a well-formed BCP 47 tag
pub fn validate_locale(code: &str) -> ProviderResult<()> {
    if code.trim().is_empty() {
        return Err(ProviderError::InvalidLocale(
            "Locale code is empty".to_string(),
        ));
    }
    code.parse::<Locale>()
        .map(|_| ())
        .map_err(|e| ProviderError::InvalidLocale(format!("'{}': {}", code, e)))
}
