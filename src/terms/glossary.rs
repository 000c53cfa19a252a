/*!
 * Glossary files.
 *
 * A glossary is a JSON array of entries mapping a source term to its
 * accepted translations, with an optional description:
 *
 * ```json
 * [{"source": "山田", "translations": ["Yamada"], "description": "Protagonist"}]
 * ```
 *
 * Seeding registers each entry as a term and fixes its rendering to the
 * first listed translation.
 */

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::terms::{TermId, TermIndex};

/// One glossary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub source: String,
    pub translations: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Display for GlossaryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.source, self.translations.join(", "))?;
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}

/// Read glossary entries from a JSON file
pub fn load_glossary<P: AsRef<Path>>(path: P) -> Result<Vec<GlossaryEntry>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
    let entries: Vec<GlossaryEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse glossary file: {}", path.display()))?;
    Ok(entries)
}

/// Write every term that has a rendering to a JSON glossary file
pub fn save_glossary<P: AsRef<Path>>(path: P, index: &TermIndex) -> Result<usize> {
    let path = path.as_ref();
    let entries: Vec<GlossaryEntry> = index
        .terms()
        .into_iter()
        .filter_map(|term| {
            term.rendering.map(|rendering| GlossaryEntry {
                source: term.canonical,
                translations: vec![rendering],
                description: term.description,
            })
        })
        .collect();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&entries).context("Failed to serialize glossary")?;
    fs::write(path, json).with_context(|| format!("Failed to write glossary file: {}", path.display()))?;
    Ok(entries.len())
}

impl TermIndex {
    /// Register glossary entries and fix their renderings.
    pub fn seed(&self, entries: &[GlossaryEntry]) -> Vec<TermId> {
        let ids: Vec<TermId> = entries
            .iter()
            .filter(|entry| !entry.source.trim().is_empty())
            .map(|entry| {
                let id = self.register(&entry.source);
                if let Some(first) = entry.translations.first() {
                    self.set_rendering(id, first);
                }
                if let Some(description) = &entry.description {
                    self.set_description(id, description);
                }
                id
            })
            .collect();
        info!("Seeded {} glossary terms", ids.len());
        ids
    }
}
