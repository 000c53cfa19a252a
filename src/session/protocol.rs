/*!
 * Reply validation for the portion protocol.
 *
 * Every model reply goes through this module before it touches session
 * state. Parsing failures come back as `TranslationError::Protocol` and
 * content-policy refusals as `TranslationError::Refusal`, so the retry logic
 * in the session only ever matches on error variants.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TranslationError;

/// Sent as the user turn to ask for the next portion.
pub const CONTINUATION_TOKEN: &str = "@@@@";

static SHORTFALL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[\s*REMAINING\s*:\s*([0-9]+)\s*\]\]").expect("shortfall pattern is valid")
});

static COUNT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s*_`'\x22(\[]*([0-9]+)[\s*_`'\x22)\].]*$").expect("count pattern is valid")
});

const REFUSAL_OPENERS: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "sorry, but",
    "i can't",
    "i cannot",
    "i can not",
    "i'm unable",
    "i am unable",
    "i won't",
    "i will not",
    "unfortunately, i",
    "as an ai",
];

const REFUSAL_VERBS: &[&str] = &["can't", "cannot", "can not", "unable", "won't", "will not", "not able"];

const REFUSAL_OBJECTS: &[&str] = &[
    "translat",
    "help",
    "assist",
    "provide",
    "comply",
    "copyright",
    "policy",
    "guidelines",
];

/// One validated portion reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portion {
    /// Translated text with protocol markers removed
    pub text: String,

    /// Extra portions the model says it still needs
    pub remaining: Option<usize>,
}

/// Detect a content-policy refusal. Returns the refusal text if found.
pub fn detect_refusal(reply: &str) -> Option<String> {
    let head: String = reply.trim().chars().take(300).collect::<String>().to_lowercase();
    let opens_like_refusal = REFUSAL_OPENERS.iter().any(|p| head.starts_with(p));
    if !opens_like_refusal {
        return None;
    }
    let declines = REFUSAL_VERBS.iter().any(|v| head.contains(v))
        && REFUSAL_OBJECTS.iter().any(|o| head.contains(o));
    declines.then(|| reply.trim().chars().take(200).collect())
}

/// Parse the negotiation reply: a single integer in `1..=max_portions`.
pub fn parse_portion_count(reply: &str, max_portions: usize) -> Result<usize, TranslationError> {
    if let Some(refusal) = detect_refusal(reply) {
        return Err(TranslationError::Refusal(refusal));
    }

    let reply = ascii_digits(reply);
    let captures = COUNT_PATTERN.captures(reply.trim()).ok_or_else(|| {
        TranslationError::Protocol(format!(
            "Expected a single portion count, got: {}",
            preview(&reply)
        ))
    })?;
    let count: usize = captures[1].parse().map_err(|_| {
        TranslationError::Protocol(format!("Portion count out of range: {}", &captures[1]))
    })?;

    if count == 0 {
        return Err(TranslationError::Protocol("Portion count must be at least 1".to_string()));
    }
    if count > max_portions {
        return Err(TranslationError::Protocol(format!(
            "Portion count {} exceeds the maximum of {}",
            count, max_portions
        )));
    }
    Ok(count)
}

/// Parse one translated portion.
pub fn parse_portion(reply: &str) -> Result<Portion, TranslationError> {
    if let Some(refusal) = detect_refusal(reply) {
        return Err(TranslationError::Refusal(refusal));
    }

    let remaining = SHORTFALL_PATTERN
        .captures_iter(reply)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .last();
    let text = SHORTFALL_PATTERN.replace_all(reply, "");
    // Drop blank lines left where the marker was, keep the portion's own spacing
    let text = text.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string();

    if text.trim().is_empty() {
        return Err(TranslationError::Protocol("Empty portion".to_string()));
    }
    if text.trim() == CONTINUATION_TOKEN {
        return Err(TranslationError::Protocol(
            "Model echoed the continuation token instead of a portion".to_string(),
        ));
    }
    Ok(Portion { text, remaining })
}

/// Check the translated/source length ratio. Returns the ratio when plausible.
pub fn check_length_ratio(
    source_chars: usize,
    translated_chars: usize,
    min_ratio: f64,
    max_ratio: f64,
) -> Result<f64, TranslationError> {
    if source_chars == 0 {
        return Ok(1.0);
    }
    let ratio = translated_chars as f64 / source_chars as f64;
    if ratio < min_ratio || ratio > max_ratio {
        return Err(TranslationError::Protocol(format!(
            "Implausible translation length: ratio {:.2} outside [{:.2}, {:.2}]",
            ratio, min_ratio, max_ratio
        )));
    }
    Ok(ratio)
}

/// Concatenate portions in order.
///
/// Portions are joined verbatim unless the seam falls right after sentence
/// punctuation with no whitespace on either side, where a space (Latin) is
/// inserted. CJK punctuation joins without a space.
pub fn join_portions(portions: &[String]) -> String {
    let mut joined = String::new();
    for portion in portions {
        let needs_space = match (joined.chars().last(), portion.chars().next()) {
            (Some(prev), Some(next)) => {
                matches!(prev, '.' | '!' | '?' | '…' | '”')
                    && !next.is_whitespace()
            }
            _ => false,
        };
        if needs_space {
            joined.push(' ');
        }
        joined.push_str(portion);
    }
    joined
}

/// Fold full-width digits (common in CJK replies) to ASCII.
fn ascii_digits(reply: &str) -> String {
    reply
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect()
}

fn preview(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
