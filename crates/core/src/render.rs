//! Per-recipient message rendering.
//!
//! Rendering is a pure function of the campaign draft, topic, tone, and the
//! target's snapshotted language and formal-address preference, so a preview
//! always shows exactly what will be sent. Phrasing lives in a static
//! lookup table keyed by (tone, language) with a formal and an informal
//! variant per entry; the fallback policy for unsupported languages is owned
//! by the caller, not by this module.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Language used by callers as the rendering fallback.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Languages with a template row for every tone.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "de", "fr", "es"];

/// Campaign tone, selecting the phrasing frame around the draft text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Short,
    Friendly,
    Formal,
}

impl Tone {
    /// Database representation (the `campaigns.tone` column).
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Short => "short",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "short" => Ok(Tone::Short),
            "friendly" => Ok(Tone::Friendly),
            "formal" => Ok(Tone::Formal),
            other => Err(CoreError::Validation(format!(
                "Unknown tone '{other}'. Must be one of: short, friendly, formal"
            ))),
        }
    }
}

/// Phrasing frame for one (tone, language) pair.
///
/// `{text}` marks where the draft text is substituted. The two variants
/// carry the grammatical register; languages without a register distinction
/// still provide both so selection stays uniform.
struct ToneTemplate {
    formal: &'static str,
    informal: &'static str,
}

/// Topic lead-in appended below the body when the campaign has a topic.
fn topic_line(language: &str) -> &'static str {
    match language {
        "de" => "Thema: {topic}",
        "fr" => "Sujet : {topic}",
        "es" => "Tema: {topic}",
        _ => "Topic: {topic}",
    }
}

fn template_for(tone: Tone, language: &str) -> Option<&'static ToneTemplate> {
    // Static table; adding a language means adding its three tone rows here
    // and listing it in SUPPORTED_LANGUAGES.
    match (tone, language) {
        (Tone::Short, "en") => Some(&ToneTemplate {
            formal: "{text}",
            informal: "{text}",
        }),
        (Tone::Friendly, "en") => Some(&ToneTemplate {
            formal: "Hello! {text}",
            informal: "Hi there! {text}",
        }),
        (Tone::Formal, "en") => Some(&ToneTemplate {
            formal: "Dear user, {text}",
            informal: "Dear user, {text}",
        }),
        (Tone::Short, "de") => Some(&ToneTemplate {
            formal: "{text}",
            informal: "{text}",
        }),
        (Tone::Friendly, "de") => Some(&ToneTemplate {
            formal: "Guten Tag! {text}",
            informal: "Hallo! {text}",
        }),
        (Tone::Formal, "de") => Some(&ToneTemplate {
            formal: "Sehr geehrte Nutzerin, sehr geehrter Nutzer, {text}",
            informal: "Liebe Nutzerin, lieber Nutzer, {text}",
        }),
        (Tone::Short, "fr") => Some(&ToneTemplate {
            formal: "{text}",
            informal: "{text}",
        }),
        (Tone::Friendly, "fr") => Some(&ToneTemplate {
            formal: "Bonjour ! {text}",
            informal: "Salut ! {text}",
        }),
        (Tone::Formal, "fr") => Some(&ToneTemplate {
            formal: "Madame, Monsieur, {text}",
            informal: "Chère utilisatrice, cher utilisateur, {text}",
        }),
        (Tone::Short, "es") => Some(&ToneTemplate {
            formal: "{text}",
            informal: "{text}",
        }),
        (Tone::Friendly, "es") => Some(&ToneTemplate {
            formal: "¡Buenos días! {text}",
            informal: "¡Hola! {text}",
        }),
        (Tone::Formal, "es") => Some(&ToneTemplate {
            formal: "Estimado usuario, {text}",
            informal: "Querido usuario, {text}",
        }),
        _ => None,
    }
}

/// Render the outgoing text for one target.
///
/// Returns [`CoreError::UnsupportedLanguage`] when no template row exists
/// for `language`; callers decide whether to fall back to
/// [`DEFAULT_LANGUAGE`] or skip the target.
pub fn render(
    tone: Tone,
    language: &str,
    formal_address: bool,
    draft_text: &str,
    topic: Option<&str>,
) -> Result<String, CoreError> {
    let template = template_for(tone, language)
        .ok_or_else(|| CoreError::UnsupportedLanguage(language.to_string()))?;

    let frame = if formal_address {
        template.formal
    } else {
        template.informal
    };

    let mut text = frame.replace("{text}", draft_text.trim());
    if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
        text.push_str("\n\n");
        text.push_str(&topic_line(language).replace("{topic}", topic));
    }
    Ok(text)
}
