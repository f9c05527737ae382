//! Normalization of raw model output
//!
//! Every provider funnels its responses through these functions so that the
//! generation engine only ever sees well-formed values: plural results with
//! exactly the `=0`, `=1` and `>1` forms, batch keys that match what was sent,
//! and text no longer than the entry's `maxLength`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::provider::data::{BatchRequest, GeneratedText, PluralForms};
use crate::provider::error::{ProviderError, ProviderResult};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));

static KEY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:translation_|translated_|text_)").expect("valid regex"));

/// Pull the JSON object out of a reply that may wrap it in a Markdown fence
/// or surrounding prose
pub fn extract_json(response: &str) -> &str {
    if let Some(inner) = CODE_FENCE
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| s.starts_with('{'))
    {
        return inner;
    }
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response.trim(),
    }
}

pub fn parse_json_object(response: &str) -> ProviderResult<Map<String, Value>> {
    let json = extract_json(response);
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProviderError::InvalidResponse(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(ProviderError::InvalidResponse(format!(
            "failed to parse JSON response: {}",
            e
        ))),
    }
}

/// Strip whitespace, control characters and prefixes models like to invent
pub fn clean_key(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect();
    KEY_PREFIX.replace(&compact, "").into_owned()
}

/// Reduce a model's plural object to exactly the three supported forms.
///
/// Extra keys (`other`, `few`, ...) are dropped; a missing required form is
/// an error.
pub fn normalize_plural(value: &Value) -> ProviderResult<PluralForms> {
    let obj = value.as_object().ok_or_else(|| {
        ProviderError::InvalidResponse("pluralized result must be a JSON object".to_string())
    })?;

    let mut zero = None;
    let mut one = None;
    let mut many = None;
    for (raw_key, form) in obj {
        let key = clean_key(raw_key);
        let slot = match key.as_str() {
            "=0" => &mut zero,
            "=1" => &mut one,
            ">1" => &mut many,
            _ => {
                debug!("Dropping extra plural form '{}'", raw_key);
                continue;
            }
        };
        match form.as_str() {
            Some(text) => *slot = Some(text.trim().to_string()),
            None => {
                return Err(ProviderError::InvalidResponse(format!(
                    "plural form '{}' is not a string",
                    key
                )));
            }
        }
    }

    match (zero, one, many) {
        (Some(zero), Some(one), Some(many)) => Ok(PluralForms { zero, one, many }),
        _ => Err(ProviderError::InvalidResponse(
            "pluralized result must contain \"=0\", \"=1\" and \">1\"".to_string(),
        )),
    }
}

/// Cut `text` to at most `max_length` characters, preferring a word boundary
pub fn enforce_max_length(text: &str, max_length: Option<usize>, label: &str) -> String {
    let Some(max) = max_length else {
        return text.to_string();
    };
    let char_count = text.chars().count();
    if char_count <= max {
        return text.to_string();
    }

    let hard_cut: String = text.chars().take(max).collect();
    let next_is_space = text.chars().nth(max).is_some_and(char::is_whitespace);
    let truncated = if next_is_space {
        hard_cut.trim_end().to_string()
    } else {
        match hard_cut.rfind(char::is_whitespace) {
            Some(idx) if idx > 0 => hard_cut[..idx].trim_end().to_string(),
            _ => hard_cut,
        }
    };

    warn!(
        "Truncated '{}' from {} to {} characters (maxLength {})",
        label,
        char_count,
        truncated.chars().count(),
        max
    );
    truncated
}

/// Apply the length constraint to every form of a result
pub fn conform(text: GeneratedText, max_length: Option<usize>, label: &str) -> GeneratedText {
    match text {
        GeneratedText::Single(s) => GeneratedText::Single(enforce_max_length(&s, max_length, label)),
        GeneratedText::Plural(forms) => GeneratedText::Plural(PluralForms {
            zero: enforce_max_length(&forms.zero, max_length, &format!("{}.=0", label)),
            one: enforce_max_length(&forms.one, max_length, &format!("{}.=1", label)),
            many: enforce_max_length(&forms.many, max_length, &format!("{}.>1", label)),
        }),
    }
}

/// Turn the content of a single translate/generate reply into a result
pub fn parse_completion(
    content: &str,
    is_plural: bool,
    max_length: Option<usize>,
    label: &str,
) -> ProviderResult<GeneratedText> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ProviderError::InvalidResponse("empty response".to_string()));
    }
    let text = if is_plural {
        let obj = parse_json_object(content)?;
        GeneratedText::Plural(normalize_plural(&Value::Object(obj))?)
    } else {
        GeneratedText::Single(content.to_string())
    };
    Ok(conform(text, max_length, label))
}

/// Turn the content of a batch reply into per-key results.
///
/// Returned keys are matched against the request after both sides are
/// cleaned, and results are keyed by the key that was sent.
///
/// A reply that is not a JSON object fails the whole batch. Individual values
/// that are malformed, and keys that were never sent, are logged and left out
/// so one bad item does not discard the rest.
pub fn parse_batch_result(
    content: &str,
    request: &BatchRequest,
) -> ProviderResult<BTreeMap<String, GeneratedText>> {
    let obj = parse_json_object(content)?;
    let mut results = BTreeMap::new();

    for (raw_key, value) in &obj {
        let cleaned = clean_key(raw_key);
        let Some(item) = request
            .items
            .iter()
            .find(|item| item.key == *raw_key)
            .or_else(|| request.items.iter().find(|item| clean_key(&item.key) == cleaned))
        else {
            debug!("Ignoring unexpected key '{}' in batch result", raw_key);
            continue;
        };
        let key = &item.key;

        let text = if item.is_plural {
            match normalize_plural(value) {
                Ok(forms) => GeneratedText::Plural(forms),
                Err(e) => {
                    warn!("Discarding malformed result for '{}': {}", key, e);
                    continue;
                }
            }
        } else {
            match value.as_str() {
                Some(text) if !text.trim().is_empty() => GeneratedText::Single(text.trim().to_string()),
                _ => {
                    warn!("Discarding non-text result for '{}'", key);
                    continue;
                }
            }
        };

        results.insert(key.clone(), conform(text, item.max_length, key));
    }

    Ok(results)
}
