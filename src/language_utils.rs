use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Configured languages may be ISO 639-1 (2-letter), ISO 639-2/T or /B
/// (3-letter) codes, or English language names. Prompts always use the
/// English name.
/// ISO 639-2/B codes that differ from their ISO 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Resolve a language code or English name
pub fn resolve_language(input: &str) -> Result<Language> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();

    let by_code = match lowered.len() {
        2 => Language::from_639_1(&lowered),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == lowered)
                .map(|(_, t)| *t)
                .unwrap_or(&lowered);
            Language::from_639_3(part2t)
        }
        _ => None,
    };
    if let Some(language) = by_code {
        return Ok(language);
    }

    Language::from_name(trimmed)
        .or_else(|| Language::from_name(&capitalize(&lowered)))
        .ok_or_else(|| anyhow!("Invalid language: {}", input))
}

/// Normalize a language code or name to ISO 639-3 (2-letter inputs included)
pub fn normalize_to_part2t(input: &str) -> Result<String> {
    Ok(resolve_language(input)?.to_639_3().to_string())
}

/// Check if two inputs represent the same language
pub fn language_codes_match(a: &str, b: &str) -> bool {
    match (resolve_language(a), resolve_language(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code or name
pub fn get_language_name(input: &str) -> Result<String> {
    Ok(resolve_language(input)?.to_name().to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
