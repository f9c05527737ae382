//! Content and text fingerprints used for change detection

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::provider::GeneratedText;
use crate::schema::{Glossary, LeafRef, Persona};

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of everything that shapes the generated text of a leaf.
///
/// The input is canonical JSON (object keys sorted), so the hash is stable
/// across runs and independent of key order in the schema file. Editing the
/// description, plural flag, length limit, any context, the category, the
/// effective persona or the effective glossary changes it.
pub fn content_hash(leaf: &LeafRef<'_>, persona: Option<&Persona>, glossary: Option<&Glossary>) -> String {
    let entry = leaf.entry;
    let canonical = json!({
        "description": entry.description,
        "isPlural": entry.is_plural,
        "maxLength": entry.constraints.max_length,
        "context": entry.context,
        "entityContext": leaf.entity_context,
        "category": entry.category,
        "persona": persona,
        "glossary": glossary,
    });
    sha256_hex(&canonical.to_string())
}

/// Fingerprint of a generated value as written to an output document
pub fn text_hash(text: &GeneratedText) -> String {
    match text {
        GeneratedText::Single(s) => sha256_hex(s),
        GeneratedText::Plural(forms) => {
            let serialized = serde_json::to_string(forms).unwrap_or_default();
            sha256_hex(&serialized)
        }
    }
}
