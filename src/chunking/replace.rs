/*!
 * Configurable regex substitutions.
 *
 * Each pattern runs at one stage of the pipeline:
 * - `Immediate`: on the document text before it is divided
 * - `OnSubmit`: on the chunk text sent to the model only
 * - `OnExport`: on the final rendered output
 */

use std::borrow::Cow;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// When a replacement pattern is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStage {
    #[default]
    Immediate,
    OnSubmit,
    OnExport,
}

/// A named regex substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePattern {
    pub name: String,

    /// Regex source
    pub pattern: String,

    /// Replacement text; `None` removes the match
    #[serde(default)]
    pub replacement: Option<String>,

    #[serde(default)]
    pub stage: ReplaceStage,
}

impl ReplacePattern {
    pub fn new(name: &str, pattern: &str, replacement: Option<&str>, stage: ReplaceStage) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            replacement: replacement.map(str::to_string),
            stage,
        }
    }
}

/// Compiled set of replacement patterns.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    compiled: Vec<(Regex, String, ReplaceStage)>,
}

impl Replacer {
    pub fn new(patterns: &[ReplacePattern]) -> Result<Self, AppError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                let regex = Regex::new(&p.pattern).map_err(|e| {
                    AppError::Config(format!("Invalid replace pattern '{}': {}", p.name, e))
                })?;
                Ok((regex, p.replacement.clone().unwrap_or_default(), p.stage))
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Self { compiled })
    }

    /// Apply every pattern registered for `stage`, in configuration order.
    pub fn apply<'a>(&self, text: &'a str, stage: ReplaceStage) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(text);
        for (regex, replacement, _) in self.compiled.iter().filter(|(_, _, s)| *s == stage) {
            let replaced = match regex.replace_all(&result, replacement.as_str()) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                result = Cow::Owned(replaced);
            }
        }
        result
    }

    pub fn has_stage(&self, stage: ReplaceStage) -> bool {
        self.compiled.iter().any(|(_, _, s)| *s == stage)
    }
}
