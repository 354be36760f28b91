//! Pulling structured payloads out of free-form model replies.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::roles::NoveltyLevel;

fn fenced_block() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?(.*?)```").ok())
        .as_ref()
}

fn out_of_ten() -> Option<&'static Regex> {
    static SCORE: OnceLock<Option<Regex>> = OnceLock::new();
    SCORE
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10").ok())
        .as_ref()
}

/// The contents of the first fenced code block, or the whole reply.
pub fn extract_json_block(reply: &str) -> &str {
    fenced_block()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| reply.trim())
}

/// Deserialize the JSON payload of a model reply.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json_block(reply))
}

/// First `N/10` score mentioned in free text.
pub fn score_out_of_ten(text: &str) -> Option<f64> {
    out_of_ten()?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

fn level_cues() -> Option<&'static [(NoveltyLevel, Regex)]> {
    static CUES: OnceLock<Option<Vec<(NoveltyLevel, Regex)>>> = OnceLock::new();
    CUES.get_or_init(|| {
        [
            (
                NoveltyLevel::Breakthrough,
                r"(?i)\b(?:breakthrough|revolutionary)\b|突破|革命",
            ),
            (
                NoveltyLevel::Significant,
                r"(?i)\bsignificant(?:ly)?\b|\bsubstantial\b|\bhigh(?:ly)?\s+(?:novel|novelty|original|innovative)\b|\bnovelty(?:\s+level)?\s*(?:is\s+|:\s*)high\b|显著",
            ),
            (
                NoveltyLevel::Moderate,
                r"(?i)\b(?:moderate(?:ly)?|medium)\b|中等",
            ),
            (
                NoveltyLevel::Low,
                r"(?i)\b(?:low|minor|incremental|limited)\b|低",
            ),
        ]
        .into_iter()
        .map(|(level, pattern)| Regex::new(pattern).ok().map(|re| (level, re)))
        .collect()
    })
    .as_deref()
}

fn negation() -> Option<&'static Regex> {
    static NEGATION: OnceLock<Option<Regex>> = OnceLock::new();
    NEGATION
        .get_or_init(|| {
            Regex::new(r"(?i)\b(?:not|no|hardly|never|without)\s+(?:(?:a|an|very|particularly|really)\s+)?$")
                .ok()
        })
        .as_ref()
}

/// Novelty level implied by wording, strongest claim first.
///
/// Cues must be whole words and a directly negated cue ("not a breakthrough")
/// is skipped. `None` when no cue is present.
pub fn novelty_level_from_text(text: &str) -> Option<NoveltyLevel> {
    let negated = |start: usize| negation().is_some_and(|re| re.is_match(&text[..start]));
    level_cues()?
        .iter()
        .find(|(_, re)| re.find_iter(text).any(|m| !negated(m.start())))
        .map(|(level, _)| *level)
}
