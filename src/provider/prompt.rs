//! Prompt construction shared by the HTTP providers

use std::fmt::{self, Write};

use serde_json::{Map, Value};

use crate::provider::data::{BatchRequest, Operation, ReviewRequest, TranslationRequest};
use crate::provider::language::language_name;
use crate::schema::{Glossary, Persona};

pub const DEFAULT_PERSONA: &str = "Standard professional and clear.";

const PLURAL_RULES: &str = "**Pluralization Rules:**\n\
- \"=0\": Exactly zero items (e.g., \"No messages\")\n\
- \"=1\": Exactly one item (e.g., \"1 message\")\n\
- \">1\": More than one item, use {count} placeholder (e.g., \"{count} messages\")\n\
Return exactly these three keys and nothing else.\n";

/// A system/user prompt pair
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn persona_section(persona: Option<&Persona>, include_examples: bool) -> String {
    let Some(persona) = persona else {
        return DEFAULT_PERSONA.to_string();
    };
    let mut out = String::new();
    render(&mut out, |out| write_persona(out, persona, include_examples));
    if out.is_empty() {
        DEFAULT_PERSONA.to_string()
    } else {
        out
    }
}

fn write_persona(out: &mut String, persona: &Persona, include_examples: bool) -> fmt::Result {
    if let Some(role) = &persona.role {
        writeln!(out, "**Role:** Act as a {}.", role)?;
    }
    if let Some(tone) = &persona.tone {
        writeln!(out, "**Tone:** {}.", tone)?;
    }
    if let Some(audience) = &persona.audience {
        writeln!(out, "**Audience:** {}.", audience)?;
    }
    if include_examples && !persona.examples.is_empty() {
        out.push_str("**Examples:**\n");
        for example in &persona.examples {
            writeln!(
                out,
                "- Input: \"{}\" → Output: \"{}\"",
                example.input, example.output
            )?;
        }
    }
    Ok(())
}

pub fn glossary_section(glossary: Option<&Glossary>) -> String {
    let Some(glossary) = glossary.filter(|g| !g.is_empty()) else {
        return String::new();
    };
    let mut out = String::from("**Glossary (preserve these terms exactly):**\n");
    for (term, rendering) in glossary {
        out.push_str(&format!("- \"{}\" → \"{}\"\n", term, rendering));
    }
    out
}

fn header(operation: Operation, source_language: &str, target_language: &str) -> String {
    match operation {
        Operation::Translate => format!(
            "You are a professional translator. Translate from {} to {}.\n\n",
            language_name(source_language),
            language_name(target_language)
        ),
        Operation::Generate => format!(
            "You are a professional content writer. Generate text in {} from the description you are given. \
             The description is an instruction, not text to copy.\n\n",
            language_name(target_language)
        ),
    }
}

/// Run a section writer over a `String`, which cannot fail
fn render(out: &mut String, section: impl FnOnce(&mut String) -> fmt::Result) {
    let _ = section(out);
}

pub fn translation_prompt(request: &TranslationRequest) -> Prompt {
    let operation = request.operation();
    let mut system = header(
        operation,
        &request.source_language,
        &request.target_language,
    );
    system.push_str(&persona_section(request.persona.as_ref(), true));
    system.push_str("\n\n");
    system.push_str(&glossary_section(request.glossary.as_ref()));
    render(&mut system, |out| {
        if let Some(context) = &request.context {
            writeln!(out, "**Context:** {}", context)?;
        }
        if let Some(category) = &request.category {
            writeln!(out, "**Category:** {}", category)?;
        }
        if let Some(max) = request.max_length {
            writeln!(out, "**Constraints:** Maximum {} characters", max)?;
        }
        Ok(())
    });
    if request.is_plural {
        system.push_str(PLURAL_RULES);
        system.push_str("Return ONLY a JSON object, no markdown or explanations.");
    } else {
        system.push_str("Return ONLY the resulting text, no quotes or explanations.");
    }

    let user = match operation {
        Operation::Translate => format!("Translate this text:\n\n{}", request.source_text),
        Operation::Generate => format!(
            "Generate text based on this description:\n\n{}",
            request.source_text
        ),
    };
    Prompt { system, user }
}

pub fn batch_prompt(request: &BatchRequest) -> Prompt {
    let operation = request.operation();
    let mut system = header(
        operation,
        &request.source_language,
        &request.target_language,
    );
    system.push_str(&persona_section(request.persona.as_ref(), false));
    system.push_str("\n\n");
    system.push_str(&glossary_section(request.glossary.as_ref()));
    render(&mut system, |out| write_batch_instructions(out, request));

    let mut input = Map::new();
    for item in &request.items {
        let value = if item.is_plural {
            serde_json::json!({ "text": item.source_text, "pluralized": true })
        } else {
            Value::String(item.source_text.clone())
        };
        input.insert(item.key.clone(), value);
    }
    let input = serde_json::to_string_pretty(&Value::Object(input)).unwrap_or_default();

    let user = match operation {
        Operation::Translate => format!("Translate these texts:\n\n{}", input),
        Operation::Generate => format!("Generate texts based on these descriptions:\n\n{}", input),
    };
    Prompt { system, user }
}

fn write_batch_instructions(out: &mut String, request: &BatchRequest) -> fmt::Result {
    if let Some(context) = &request.context {
        writeln!(out, "**Context:** {}\n", context)?;
    }
    if let Some(category) = &request.category {
        writeln!(out, "**Category:** {}\n", category)?;
    }
    if request.items.iter().any(|item| item.is_plural) {
        out.push_str(PLURAL_RULES);
        out.push('\n');
    }

    let limited: Vec<_> = request
        .items
        .iter()
        .filter_map(|item| item.max_length.map(|max| (&item.key, max)))
        .collect();
    if !limited.is_empty() {
        out.push_str("**Length Constraints:**\n");
        for (key, max) in limited {
            writeln!(out, "- \"{}\": Maximum {} characters", key, max)?;
        }
        out.push('\n');
    }

    let notes: Vec<_> = request
        .items
        .iter()
        .filter(|item| item.context.is_some() || item.category.is_some())
        .collect();
    if !notes.is_empty() {
        out.push_str("**Item Notes:**\n");
        for item in notes {
            let mut parts = Vec::new();
            if let Some(context) = &item.context {
                parts.push(format!("context: {}", context));
            }
            if let Some(category) = &item.category {
                parts.push(format!("category: {}", category));
            }
            writeln!(out, "- \"{}\": {}", item.key, parts.join("; "))?;
        }
        out.push('\n');
    }

    writeln!(
        out,
        "**Output Format:** Return a JSON object where keys are the item keys and values are the {} texts.",
        request.operation().verb()
    )?;
    out.push_str("For pluralized items, return an object with keys \"=0\", \"=1\", and \">1\".\n");
    out.push_str("Return ONLY valid JSON, no markdown or explanations.");
    Ok(())
}

pub fn review_prompt(request: &ReviewRequest) -> Prompt {
    let mut system = format!(
        "You are a professional translation reviewer for {}.\n\n",
        language_name(&request.language)
    );
    if request.persona.is_some() {
        system.push_str(&persona_section(request.persona.as_ref(), false));
        system.push_str("\n\n");
    }
    render(&mut system, |out| {
        if let Some(context) = &request.context {
            writeln!(out, "**Context:** {}\n", context)?;
        }
        if let Some(max) = request.max_length {
            writeln!(out, "**Max Length:** {} characters\n", max)?;
        }
        Ok(())
    });
    system.push_str(
        "**Output Format:** Return a JSON object with:\n\
         - \"toneOk\": boolean, the tone matches the persona\n\
         - \"grammarOk\": boolean, the text is grammatically correct\n\
         - \"lengthOk\": boolean, the text respects the length limit\n\
         - \"comment\": short explanation of any problem\n\
         - \"schemaSuggestion\": how the source description could be improved, or empty\n\
         Return ONLY valid JSON, no markdown or explanations.",
    );
    let user = format!(
        "Review this translation:\n\nSource: {}\n\nTranslation: {}",
        request.source_text, request.translated_text
    );
    Prompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::data::BatchItem;

    #[test]
    fn test_generate_prompt_says_generate() {
        let request = TranslationRequest {
            source_text: "A warm welcome for returning users".to_string(),
            source_language: "en".to_string(),
            target_language: "en".to_string(),
            ..Default::default()
        };
        let prompt = translation_prompt(&request);
        assert!(prompt.system.contains("Generate text in English"));
        assert!(prompt.user.starts_with("Generate text based on this description"));
    }

    #[test]
    fn test_translate_prompt_includes_constraints() {
        let mut glossary = Glossary::new();
        glossary.insert("Dashboard".to_string(), "Painel".to_string());
        let request = TranslationRequest {
            source_text: "Open dashboard".to_string(),
            source_language: "en".to_string(),
            target_language: "pt-BR".to_string(),
            glossary: Some(glossary),
            is_plural: true,
            max_length: Some(20),
            ..Default::default()
        };
        let prompt = translation_prompt(&request);
        assert!(prompt.system.contains("Translate from English to Brazilian Portuguese"));
        assert!(prompt.system.contains("\"Dashboard\" → \"Painel\""));
        assert!(prompt.system.contains("Maximum 20 characters"));
        assert!(prompt.system.contains("Pluralization Rules"));
        assert!(prompt.system.contains(DEFAULT_PERSONA));
    }

    #[test]
    fn test_batch_prompt_lists_items() {
        let request = BatchRequest {
            items: vec![
                BatchItem {
                    key: "user.greeting".to_string(),
                    source_text: "Hello".to_string(),
                    is_plural: false,
                    max_length: Some(10),
                    context: Some("home".to_string()),
                    category: None,
                },
                BatchItem {
                    key: "user.messages".to_string(),
                    source_text: "Messages".to_string(),
                    is_plural: true,
                    max_length: None,
                    context: None,
                    category: None,
                },
            ],
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            context: Some("Account".to_string()),
            ..Default::default()
        };
        let prompt = batch_prompt(&request);
        assert!(prompt.system.contains("**Context:** Account"));
        assert!(prompt.system.contains("\"user.greeting\": Maximum 10 characters"));
        assert!(prompt.system.contains("\"user.greeting\": context: home"));
        assert!(prompt.system.contains("translated texts"));
        assert!(prompt.user.contains("\"user.messages\""));
        assert!(prompt.user.contains("\"pluralized\": true"));
    }

    #[test]
    fn test_persona_section() {
        let persona = Persona {
            role: Some("pirate".to_string()),
            tone: Some("playful".to_string()),
            ..Default::default()
        };
        let section = persona_section(Some(&persona), true);
        assert!(section.contains("Act as a pirate"));
        assert!(section.contains("**Tone:** playful"));
        assert_eq!(persona_section(None, true), DEFAULT_PERSONA);
        assert_eq!(persona_section(Some(&Persona::default()), true), DEFAULT_PERSONA);
    }
}
